use anyhow::{anyhow, Context};

use crate::{Comment, CommentId};

/// Message pushed on a post's activity topic
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityEvent {
    LikeUpdate {
        #[serde(rename = "likeCount")]
        like_count: u64,
    },
    CommentCreated {
        comment: Comment,
    },
    CommentUpdated {
        comment: Comment,
    },
    CommentDeleted {
        #[serde(rename = "commentId")]
        comment_id: CommentId,
    },
}

impl ActivityEvent {
    /// Id of the comment this event is about, if any
    pub fn comment_id(&self) -> Option<&CommentId> {
        match self {
            ActivityEvent::LikeUpdate { .. } => None,
            ActivityEvent::CommentCreated { comment } => Some(&comment.id),
            ActivityEvent::CommentUpdated { comment } => Some(&comment.id),
            ActivityEvent::CommentDeleted { comment_id } => Some(comment_id),
        }
    }

    /// Parse a message body received on an activity topic.
    ///
    /// Besides the tagged form this type serializes to, the shapes the
    /// backend historically broadcast are accepted too:
    /// - `{"type": "LIKE", "likeCount": n}`
    /// - `{"type": "COMMENT", "comment": {...}}`
    /// - a bare comment object, for edits
    /// - `{"deleted": "<comment id>"}`
    pub fn parse(body: &str) -> anyhow::Result<ActivityEvent> {
        let value: serde_json::Value =
            serde_json::from_str(body).context("activity message is not valid json")?;
        if let Ok(evt) = serde_json::from_value::<ActivityEvent>(value.clone()) {
            return Ok(evt);
        }
        match value.get("type").and_then(|t| t.as_str()) {
            Some("LIKE") => {
                let like_count = value
                    .get("likeCount")
                    .and_then(|n| n.as_u64())
                    .ok_or_else(|| anyhow!("like message without a valid likeCount"))?;
                return Ok(ActivityEvent::LikeUpdate { like_count });
            }
            Some("COMMENT") => {
                let comment = value
                    .get("comment")
                    .cloned()
                    .ok_or_else(|| anyhow!("comment message without a comment"))?;
                return Ok(ActivityEvent::CommentCreated {
                    comment: serde_json::from_value(comment)
                        .context("parsing comment of comment message")?,
                });
            }
            Some(t) => return Err(anyhow!("unknown or malformed activity message of type {t:?}")),
            None => (),
        }
        if let Some(id) = value.get("deleted").and_then(|d| d.as_str()) {
            return Ok(ActivityEvent::CommentDeleted {
                comment_id: CommentId(String::from(id)),
            });
        }
        if value.get("id").is_some() {
            return Ok(ActivityEvent::CommentUpdated {
                comment: serde_json::from_value(value).context("parsing bare comment update")?,
            });
        }
        Err(anyhow!("unrecognized activity message shape"))
    }
}
