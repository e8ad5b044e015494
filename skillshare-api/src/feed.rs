use crate::Topic;

/// Frames sent by clients on the relay websocket
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ClientFrame {
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
    Ping,
}

/// Frames sent by the relay to its websocket clients
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum FeedMessage {
    Message { topic: Topic, body: String },
    Pong,
}

/// Request body of the relay's publish endpoint
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Publish {
    pub topic: Topic,
    pub body: serde_json::Value,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TopicInfo {
    pub topic: Topic,
    pub subscribers: usize,
}
