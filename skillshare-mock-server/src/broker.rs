use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use parking_lot::Mutex;
use skillshare_client::{
    api::{ActivityEvent, NotificationItem, PostId, Topic, UserId},
    Connection, Inbound, Transport,
};
use tokio::sync::{mpsc, watch};

/// In-memory push channel, with knobs to make connections misbehave
#[derive(Clone)]
pub struct MockBroker(Arc<Mutex<Broker>>);

struct Broker {
    next_peer: u64,
    peers: HashMap<u64, Peer>,
    connect_attempts: usize,
    subscribe_requests: usize,
    failing_connects: usize,
    // connections complete only while this is true
    gate: watch::Sender<bool>,
}

struct Peer {
    topics: HashSet<Topic>,
    sender: mpsc::UnboundedSender<Inbound>,
}

impl Default for MockBroker {
    fn default() -> MockBroker {
        MockBroker::new()
    }
}

impl MockBroker {
    pub fn new() -> MockBroker {
        MockBroker(Arc::new(Mutex::new(Broker {
            next_peer: 0,
            peers: HashMap::new(),
            connect_attempts: 0,
            subscribe_requests: 0,
            failing_connects: 0,
            gate: watch::channel(true).0,
        })))
    }

    /// Deliver `body` to every connection subscribed to `topic`, returning
    /// the number of deliveries
    pub fn publish(&self, topic: &Topic, body: &str) -> usize {
        let b = self.0.lock();
        b.peers
            .values()
            .filter(|p| p.topics.contains(topic))
            .filter(|p| {
                p.sender
                    .send(Inbound {
                        topic: topic.clone(),
                        body: String::from(body),
                    })
                    .is_ok()
            })
            .count()
    }

    pub fn publish_activity(&self, post: &PostId, evt: &ActivityEvent) -> usize {
        match serde_json::to_string(evt) {
            Ok(body) => self.publish(&Topic::post_activity(post), &body),
            Err(err) => {
                tracing::error!(?err, "failed serializing activity event");
                0
            }
        }
    }

    pub fn publish_notification(&self, user: &UserId, item: &NotificationItem) -> usize {
        match serde_json::to_string(item) {
            Ok(body) => self.publish(&Topic::notifications(user), &body),
            Err(err) => {
                tracing::error!(?err, "failed serializing notification");
                0
            }
        }
    }

    /// Make the next `n` connection attempts fail
    pub fn fail_next_connects(&self, n: usize) {
        self.0.lock().failing_connects = n;
    }

    /// Keep connection attempts pending until `release_connects`
    pub fn hold_connects(&self) {
        self.0.lock().gate.send_replace(false);
    }

    pub fn release_connects(&self) {
        self.0.lock().gate.send_replace(true);
    }

    /// Break every open connection
    pub fn drop_connections(&self) {
        self.0.lock().peers.clear();
    }

    pub fn connect_attempts(&self) -> usize {
        self.0.lock().connect_attempts
    }

    pub fn open_connections(&self) -> usize {
        self.0.lock().peers.len()
    }

    /// Total number of subscribe requests received, over all connections
    pub fn subscribe_requests(&self) -> usize {
        self.0.lock().subscribe_requests
    }

    pub fn subscribers(&self, topic: &Topic) -> usize {
        self.0
            .lock()
            .peers
            .values()
            .filter(|p| p.topics.contains(topic))
            .count()
    }
}

#[async_trait::async_trait]
impl Transport for MockBroker {
    async fn connect(&self) -> anyhow::Result<Box<dyn Connection>> {
        let mut gate = {
            let mut b = self.0.lock();
            b.connect_attempts += 1;
            if b.failing_connects > 0 {
                b.failing_connects -= 1;
                return Err(anyhow!("connection refused by mock broker"));
            }
            b.gate.subscribe()
        };
        loop {
            let open = *gate.borrow();
            if open {
                break;
            }
            gate.changed().await.context("mock broker went away")?;
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut b = self.0.lock();
        let id = b.next_peer;
        b.next_peer += 1;
        b.peers.insert(
            id,
            Peer {
                topics: HashSet::new(),
                sender,
            },
        );
        Ok(Box::new(MockConnection {
            id,
            broker: self.0.clone(),
            receiver,
        }))
    }
}

struct MockConnection {
    id: u64,
    broker: Arc<Mutex<Broker>>,
    receiver: mpsc::UnboundedReceiver<Inbound>,
}

impl MockConnection {
    fn with_peer<R>(&self, f: impl FnOnce(&mut Peer) -> R) -> anyhow::Result<R> {
        let mut b = self.broker.lock();
        b.peers
            .get_mut(&self.id)
            .map(f)
            .ok_or_else(|| anyhow!("connection was dropped by mock broker"))
    }
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    async fn subscribe(&mut self, topic: &Topic) -> anyhow::Result<()> {
        self.with_peer(|p| p.topics.insert(topic.clone()))?;
        self.broker.lock().subscribe_requests += 1;
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &Topic) -> anyhow::Result<()> {
        self.with_peer(|p| p.topics.remove(topic))?;
        Ok(())
    }

    async fn next(&mut self) -> anyhow::Result<Inbound> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| anyhow!("connection was dropped by mock broker"))
    }

    async fn close(self: Box<Self>) {}
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.broker.lock().peers.remove(&self.id);
    }
}
