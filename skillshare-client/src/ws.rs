use std::time::Duration;

use anyhow::{anyhow, Context};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, time::Instant};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::{
    api::{ClientFrame, FeedMessage, Topic},
    Config, Connection, Inbound, Transport,
};

/// Push channel over the relay's websocket endpoint
pub struct WsTransport {
    url: String,
    ping_interval: Duration,
    disconnect_interval: Duration,
}

impl WsTransport {
    pub fn new(relay: &str, config: &Config) -> WsTransport {
        WsTransport {
            url: normalize_url(relay),
            ping_interval: config.ping_interval,
            disconnect_interval: config.disconnect_interval,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn normalize_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    let url = match url {
        u if u.starts_with("ws://") || u.starts_with("wss://") => String::from(u),
        u if u.starts_with("http://") => format!("ws://{}", &u[7..]),
        u if u.starts_with("https://") => format!("wss://{}", &u[8..]),
        u => format!("wss://{u}"),
    };
    match url.ends_with("/ws") {
        true => url,
        false => format!("{url}/ws"),
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> anyhow::Result<Box<dyn Connection>> {
        tracing::debug!(url = %self.url, "opening websocket");
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("connecting to {}", self.url))?;
        let now = Instant::now();
        Ok(Box::new(WsConnection {
            stream,
            ping_interval: self.ping_interval,
            disconnect_interval: self.disconnect_interval,
            next_ping: now + self.ping_interval,
            last_heard: now,
        }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ping_interval: Duration,
    disconnect_interval: Duration,
    next_ping: Instant,
    last_heard: Instant,
}

impl WsConnection {
    async fn send_frame(&mut self, frame: &ClientFrame) -> anyhow::Result<()> {
        let json = serde_json::to_string(frame).context("serializing client frame")?;
        self.stream
            .send(Message::Text(json))
            .await
            .context("sending frame to relay")
    }
}

#[async_trait::async_trait]
impl Connection for WsConnection {
    async fn subscribe(&mut self, topic: &Topic) -> anyhow::Result<()> {
        self.send_frame(&ClientFrame::Subscribe {
            topic: topic.clone(),
        })
        .await
    }

    async fn unsubscribe(&mut self, topic: &Topic) -> anyhow::Result<()> {
        self.send_frame(&ClientFrame::Unsubscribe {
            topic: topic.clone(),
        })
        .await
    }

    async fn next(&mut self) -> anyhow::Result<Inbound> {
        loop {
            let deadline = self.last_heard + self.disconnect_interval;
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(anyhow!(
                        "relay stayed silent for {:?}",
                        self.disconnect_interval
                    ));
                }
                _ = tokio::time::sleep_until(self.next_ping) => {
                    self.next_ping = Instant::now() + self.ping_interval;
                    self.send_frame(&ClientFrame::Ping).await?;
                }
                msg = self.stream.next() => {
                    let msg = match msg {
                        None => return Err(anyhow!("websocket stream ended")),
                        Some(msg) => msg.context("reading from websocket")?,
                    };
                    self.last_heard = Instant::now();
                    let frame = match msg {
                        Message::Text(text) => serde_json::from_str::<FeedMessage>(&text),
                        Message::Binary(bytes) => serde_json::from_slice::<FeedMessage>(&bytes),
                        Message::Close(_) => return Err(anyhow!("websocket closed by relay")),
                        _ => continue,
                    };
                    match frame {
                        Ok(FeedMessage::Message { topic, body }) => return Ok(Inbound { topic, body }),
                        Ok(FeedMessage::Pong) => tracing::trace!("received pong"),
                        Err(err) => tracing::warn!(?err, "ignoring unrecognized frame from relay"),
                    }
                }
            }
        }
    }

    async fn close(mut self: Box<Self>) {
        if let Err(err) = self.stream.close(None).await {
            tracing::debug!(?err, "failed closing websocket cleanly");
        }
    }
}
