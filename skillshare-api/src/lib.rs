pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

mod comment;
pub use comment::{Comment, CommentId, NewComment};

mod error;
pub use error::Error;

mod event;
pub use event::ActivityEvent;

mod feed;
pub use feed::{ClientFrame, FeedMessage, Publish, TopicInfo};

mod notification;
pub use notification::{NotificationId, NotificationItem, NotificationKind, UnreadCount};

mod time;
pub use time::parse_time;

mod topic;
pub use topic::Topic;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserId(pub String);

impl UserId {
    pub fn stub() -> UserId {
        UserId(String::from("stub-user"))
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub String);

impl PostId {
    pub fn stub() -> PostId {
        PostId(String::from("stub-post"))
    }
}

/// Like count as reported by the server, along with whether the current user is
/// one of the likers
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub like_count: u64,
    #[serde(default, alias = "hasLiked")]
    pub liked: bool,
}

// Strings coming from users end up in other people's databases and terminals,
// so refuse the few things that are never legitimate there.
pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

pub fn validate_comment_text(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    if s.trim().is_empty() {
        return Err(Error::EmptyText);
    }
    Ok(())
}
