use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    Json,
};
use futures::StreamExt;
use skillshare_api::{Publish, TopicInfo};

use crate::{extractors::*, Error, Topics};

pub async fn feed(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(feeds): State<Topics>,
) -> axum::response::Response {
    ws.on_upgrade(move |sock| async move {
        tracing::debug!(%peer, "feed websocket connected");
        let (write, read) = sock.split();
        feeds.add_connection(write, read).await;
    })
}

pub async fn publish(
    AdminAuth: AdminAuth,
    State(feeds): State<Topics>,
    Json(data): Json<Publish>,
) -> Result<Json<usize>, Error> {
    data.topic.validate()?;
    let body = match data.body {
        serde_json::Value::String(s) => s,
        body => body.to_string(),
    };
    let delivered = feeds.relay(&data.topic, body).await;
    tracing::debug!(topic = %data.topic, delivered, "published message");
    Ok(Json(delivered))
}

pub async fn list_topics(
    AdminAuth: AdminAuth,
    State(feeds): State<Topics>,
) -> Json<Vec<TopicInfo>> {
    Json(feeds.list().await)
}
