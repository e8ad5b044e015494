use crate::{Time, UserId};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct NotificationId(pub String);

impl From<&str> for NotificationId {
    fn from(s: &str) -> NotificationId {
        NotificationId(String::from(s))
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    System,
    Comment,
    Like,
    Mention,
    Follow,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: NotificationId,

    /// Recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    #[serde(rename = "type")]
    pub kind: NotificationKind,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message: String,

    /// Post for likes, comments and mentions, follower for follows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_item_id: Option<String>,

    #[serde(default)]
    pub read: bool,

    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: Time,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UnreadCount {
    pub count: u64,
}
