use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid topic {0:?}")]
    InvalidTopic(String),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Text must not be empty")]
    EmptyText,
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidTopic(_) => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::EmptyText => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound(what) => json!({
                "message": "resource not found",
                "type": "not-found",
                "what": what,
            }),
            Error::InvalidTopic(t) => json!({
                "message": "invalid topic name",
                "type": "invalid-topic",
                "topic": t,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::EmptyText => json!({
                "message": "text must not be empty",
                "type": "empty-text",
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let field = |name: &str| data.get(name).and_then(|v| v.as_str());
        Ok(
            match field("type").ok_or_else(|| anyhow!("error type is not a string"))? {
                "unknown" => Error::Unknown(String::from(field("message").unwrap_or(""))),
                "permission-denied" => Error::PermissionDenied,
                "not-found" => Error::NotFound(String::from(
                    field("what").ok_or_else(|| anyhow!("not-found error without a resource"))?,
                )),
                "invalid-topic" => Error::InvalidTopic(String::from(
                    field("topic").ok_or_else(|| anyhow!("invalid-topic error without a topic"))?,
                )),
                "null-byte" => Error::NullByteInString(String::from(
                    field("string").ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "empty-text" => Error::EmptyText,
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
