use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::extract::ws::Message;
use futures::{channel::mpsc, select, SinkExt, StreamExt};
use skillshare_api::{ClientFrame, FeedMessage, Topic, TopicInfo, Uuid};
use tokio::sync::RwLock;

type Sockets = HashMap<Uuid, mpsc::UnboundedSender<FeedMessage>>;

/// Websocket connections, by the topics they subscribed to
#[derive(Clone, Debug, Default)]
pub struct Topics(Arc<RwLock<HashMap<Topic, Sockets>>>);

impl Topics {
    pub fn new() -> Topics {
        Topics::default()
    }

    pub async fn add_connection<W, R>(self, mut write: W, read: R)
    where
        W: 'static + Send + Unpin + futures::Sink<Message>,
        <W as futures::Sink<Message>>::Error: Send,
        R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
    {
        // Note: if this were bounded, there would be a deadlock between the write-lock to
        // unsubscribe a socket and the read-lock to relay a message to all subscribers
        let (sender, mut receiver) = mpsc::unbounded();
        let conn = Uuid::new_v4();

        let this = self.clone();
        let mut read = read.fuse();
        tokio::spawn(async move {
            let mut subscribed: HashSet<Topic> = HashSet::new();
            macro_rules! remove_self {
                () => {{
                    this.remove_connection(conn, &subscribed).await;
                    tracing::debug!(%conn, "feed websocket disconnected");
                    return;
                }};
            }
            macro_rules! send_message {
                ( $msg:expr ) => {{
                    let msg: FeedMessage = $msg;
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::error!(?err, ?msg, "failed serializing message to json");
                            continue;
                        }
                    };
                    if write.send(Message::Text(json)).await.is_err() {
                        remove_self!();
                    }
                }};
            }
            loop {
                select! {
                    msg = receiver.next() => match msg {
                        None => remove_self!(),
                        Some(msg) => send_message!(msg),
                    },
                    msg = read.next() => match msg {
                        None | Some(Ok(Message::Close(_))) => remove_self!(),
                        Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                            Ok(ClientFrame::Subscribe { topic }) => {
                                if let Err(err) = topic.validate() {
                                    tracing::info!(%conn, ?err, "refusing subscription");
                                    continue;
                                }
                                this.subscribe(&topic, conn, sender.clone()).await;
                                subscribed.insert(topic);
                            }
                            Ok(ClientFrame::Unsubscribe { topic }) => {
                                this.unsubscribe(&topic, conn).await;
                                subscribed.remove(&topic);
                            }
                            Ok(ClientFrame::Ping) => send_message!(FeedMessage::Pong),
                            Err(err) => {
                                tracing::warn!(?err, "received unexpected message from client: {text:?}");
                                remove_self!();
                            }
                        },
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => (),
                        Some(msg) => {
                            tracing::warn!("received unexpected message from client: {msg:?}");
                            remove_self!();
                        }
                    },
                }
            }
        });
    }

    async fn subscribe(
        &self,
        topic: &Topic,
        conn: Uuid,
        sender: mpsc::UnboundedSender<FeedMessage>,
    ) {
        tracing::debug!(%conn, %topic, "subscribing");
        self.0
            .write()
            .await
            .entry(topic.clone())
            .or_insert_with(HashMap::new)
            .insert(conn, sender);
    }

    async fn unsubscribe(&self, topic: &Topic, conn: Uuid) {
        tracing::debug!(%conn, %topic, "unsubscribing");
        let mut topics = self.0.write().await;
        if let Some(socks) = topics.get_mut(topic) {
            socks.remove(&conn);
            if socks.is_empty() {
                topics.remove(topic);
            }
        }
    }

    async fn remove_connection(&self, conn: Uuid, subscribed: &HashSet<Topic>) {
        let mut topics = self.0.write().await;
        for t in subscribed {
            if let Some(socks) = topics.get_mut(t) {
                socks.remove(&conn);
                if socks.is_empty() {
                    topics.remove(t);
                }
            }
        }
    }

    /// Send `body` to all the subscribers of `topic`, returning how many
    /// connections it was handed to
    pub async fn relay(&self, topic: &Topic, body: String) -> usize {
        let topics = self.0.read().await;
        let Some(socks) = topics.get(topic) else {
            return 0;
        };
        socks
            .values()
            .filter(|s| {
                s.unbounded_send(FeedMessage::Message {
                    topic: topic.clone(),
                    body: body.clone(),
                })
                .is_ok()
            })
            .count()
    }

    pub async fn list(&self) -> Vec<TopicInfo> {
        let mut res: Vec<TopicInfo> = self
            .0
            .read()
            .await
            .iter()
            .map(|(topic, socks)| TopicInfo {
                topic: topic.clone(),
                subscribers: socks.len(),
            })
            .collect();
        res.sort_by(|a, b| a.topic.cmp(&b.topic));
        res
    }
}
