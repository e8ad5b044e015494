use crate::{PostId, Time, UserId};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(String::from("stub-comment"))
    }
}

impl From<&str> for CommentId {
    fn from(s: &str) -> CommentId {
        CommentId(String::from(s))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Server-assigned, the only valid de-duplication key
    pub id: CommentId,
    pub post_id: PostId,
    #[serde(rename = "userId", alias = "authorId")]
    pub author_id: UserId,
    pub text: String,
    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: Time,

    /// Filled in by the server for display purposes only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

/// Body of a comment creation or edition request
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub text: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_comment_text(&self.text)
    }
}
