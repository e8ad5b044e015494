use std::{
    collections::{BTreeSet, HashMap},
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use tokio::sync::{mpsc, watch};

use crate::api::Topic;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Message received on a topic
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Inbound {
    pub topic: Topic,
    pub body: String,
}

/// Way of opening a connection to the push channel
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self) -> anyhow::Result<Box<dyn Connection>>;
}

#[async_trait::async_trait]
pub trait Connection: Send {
    async fn subscribe(&mut self, topic: &Topic) -> anyhow::Result<()>;
    async fn unsubscribe(&mut self, topic: &Topic) -> anyhow::Result<()>;

    /// Wait for the next message. An error means the connection is lost
    /// and must not be used any longer.
    async fn next(&mut self) -> anyhow::Result<Inbound>;

    async fn close(self: Box<Self>);
}

type SubId = u64;

enum Command {
    Subscribe {
        id: SubId,
        topic: Topic,
        sender: mpsc::UnboundedSender<String>,
    },
    Unsubscribe {
        id: SubId,
    },
    Shutdown,
}

struct Driver {
    commands: mpsc::UnboundedSender<Command>,
    refs: usize,
}

#[derive(Default)]
struct DriverSlot {
    current: Option<Driver>,
    generation: u64,
}

struct HubInner {
    transport: Arc<dyn Transport>,
    retry_delay: Duration,
    next_id: AtomicU64,
    driver: parking_lot::Mutex<DriverSlot>,
    state: watch::Sender<ConnectionState>,
}

/// Shares one push channel connection between all the subscriptions of a
/// client.
///
/// The connection is opened along with the first subscription and closed
/// when the last one goes away. While at least one subscription is alive,
/// a lost connection is retried at a fixed interval, and all the live
/// topics are subscribed again once it is back.
///
/// Subscribing must happen from within a tokio runtime.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new(transport: Arc<dyn Transport>, retry_delay: Duration) -> Hub {
        Hub {
            inner: Arc::new(HubInner {
                transport,
                retry_delay,
                next_id: AtomicU64::new(0),
                driver: parking_lot::Mutex::new(DriverSlot::default()),
                state: watch::channel(ConnectionState::Disconnected).0,
            }),
        }
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut slot = self.inner.driver.lock();
        if slot.current.is_none() {
            slot.generation += 1;
            let (commands, command_receiver) = mpsc::unbounded_channel();
            tokio::spawn(run_driver(
                self.inner.clone(),
                slot.generation,
                command_receiver,
            ));
            slot.current = Some(Driver { commands, refs: 0 });
            self.inner.state.send_replace(ConnectionState::Connecting);
        }
        if let Some(driver) = slot.current.as_mut() {
            driver.refs += 1;
            let _ = driver.commands.send(Command::Subscribe {
                id,
                topic: topic.clone(),
                sender,
            });
        }
        Subscription {
            id,
            topic,
            receiver,
            hub: Some(self.inner.clone()),
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Number of live subscriptions, all topics included
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .driver
            .lock()
            .current
            .as_ref()
            .map(|d| d.refs)
            .unwrap_or(0)
    }
}

impl HubInner {
    fn release(&self, id: SubId) {
        let mut slot = self.driver.lock();
        let last = match slot.current.as_mut() {
            None => return,
            Some(driver) => {
                let _ = driver.commands.send(Command::Unsubscribe { id });
                driver.refs = driver.refs.saturating_sub(1);
                driver.refs == 0
            }
        };
        if last {
            if let Some(driver) = slot.current.take() {
                let _ = driver.commands.send(Command::Shutdown);
            }
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    fn set_state(&self, generation: u64, state: ConnectionState) {
        let slot = self.driver.lock();
        if slot.generation == generation && slot.current.is_some() {
            self.state.send_replace(state);
        }
    }
}

/// Messages received on one topic, until unsubscribed or dropped
pub struct Subscription {
    id: SubId,
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<String>,
    hub: Option<Arc<HubInner>>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Stop receiving messages. Messages already queued are discarded, and
    /// calling this more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(hub) = self.hub.take() {
            hub.release(self.id);
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl futures::Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.receiver.poll_recv(cx)
    }
}

#[derive(Default)]
struct Routes {
    subscribers: HashMap<SubId, (Topic, mpsc::UnboundedSender<String>)>,
}

impl Routes {
    // Returns true iff this is the first subscriber for this topic
    fn add(&mut self, id: SubId, topic: Topic, sender: mpsc::UnboundedSender<String>) -> bool {
        let first = !self.subscribers.values().any(|(t, _)| *t == topic);
        self.subscribers.insert(id, (topic, sender));
        first
    }

    // Returns the topic iff it has no subscriber left
    fn remove(&mut self, id: SubId) -> Option<Topic> {
        let (topic, _) = self.subscribers.remove(&id)?;
        match self.subscribers.values().any(|(t, _)| *t == topic) {
            true => None,
            false => Some(topic),
        }
    }

    fn topics(&self) -> BTreeSet<Topic> {
        self.subscribers.values().map(|(t, _)| t.clone()).collect()
    }

    fn dispatch(&self, msg: Inbound) {
        let mut delivered = false;
        for (topic, sender) in self.subscribers.values() {
            if *topic == msg.topic {
                // closed receivers are being unsubscribed
                let _ = sender.send(msg.body.clone());
                delivered = true;
            }
        }
        if !delivered {
            tracing::debug!(topic = %msg.topic, "dropping message for topic without subscriber");
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

// Bookkeeping of commands received while no connection is established
fn handle_offline(routes: &mut Routes, cmd: Option<Command>) -> Flow {
    match cmd {
        None | Some(Command::Shutdown) => Flow::Stop,
        Some(Command::Subscribe { id, topic, sender }) => {
            routes.add(id, topic, sender);
            Flow::Continue
        }
        Some(Command::Unsubscribe { id }) => {
            routes.remove(id);
            Flow::Continue
        }
    }
}

async fn run_driver(
    hub: Arc<HubInner>,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut routes = Routes::default();
    let mut first_attempt = true;
    'reconnect: loop {
        if !first_attempt {
            hub.set_state(generation, ConnectionState::Disconnected);
            tracing::info!(delay = ?hub.retry_delay, "waiting before reconnecting to push channel");
            let sleep = tokio::time::sleep(hub.retry_delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    cmd = commands.recv() => {
                        if let Flow::Stop = handle_offline(&mut routes, cmd) {
                            return;
                        }
                    }
                }
            }
        }
        first_attempt = false;

        hub.set_state(generation, ConnectionState::Connecting);
        let connect = hub.transport.connect();
        tokio::pin!(connect);
        let mut conn = loop {
            tokio::select! {
                res = &mut connect => match res {
                    Ok(conn) => break conn,
                    Err(err) => {
                        tracing::warn!(?err, "failed connecting to push channel");
                        continue 'reconnect;
                    }
                },
                cmd = commands.recv() => {
                    // returning drops the pending connection attempt
                    if let Flow::Stop = handle_offline(&mut routes, cmd) {
                        return;
                    }
                }
            }
        };

        for topic in routes.topics() {
            if let Err(err) = conn.subscribe(&topic).await {
                tracing::warn!(?err, %topic, "failed subscribing to topic");
                continue 'reconnect;
            }
        }
        hub.set_state(generation, ConnectionState::Connected);
        tracing::info!("connected to push channel");

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    None | Some(Command::Shutdown) => {
                        conn.close().await;
                        tracing::info!("closed push channel connection");
                        return;
                    }
                    Some(Command::Subscribe { id, topic, sender }) => {
                        if routes.add(id, topic.clone(), sender) {
                            if let Err(err) = conn.subscribe(&topic).await {
                                tracing::warn!(?err, %topic, "failed subscribing to topic");
                                continue 'reconnect;
                            }
                        }
                    }
                    Some(Command::Unsubscribe { id }) => {
                        if let Some(topic) = routes.remove(id) {
                            if let Err(err) = conn.unsubscribe(&topic).await {
                                tracing::warn!(?err, %topic, "failed unsubscribing from topic");
                                continue 'reconnect;
                            }
                        }
                    }
                },
                msg = conn.next() => match msg {
                    Ok(msg) => routes.dispatch(msg),
                    Err(err) => {
                        tracing::warn!(?err, "lost push channel connection");
                        continue 'reconnect;
                    }
                },
            }
        }
    }
}
