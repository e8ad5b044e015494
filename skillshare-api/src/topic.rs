use std::fmt;

use crate::{Error, PostId, UserId};

const MAX_TOPIC_LEN: usize = 256;

/// Name of a push channel destination, eg. `/topic/posts/42/activity`
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct Topic(pub String);

impl Topic {
    pub fn post_activity(post: &PostId) -> Topic {
        Topic(format!("/topic/posts/{}/activity", post.0))
    }

    pub fn notifications(user: &UserId) -> Topic {
        Topic(format!("/user/{}/queue/notifications", user.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // See comments on `validate_string`
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.0)?;
        let valid = self.0.starts_with('/')
            && self.0.len() <= MAX_TOPIC_LEN
            && !self.0.contains("//")
            && !self.0.chars().any(|c| c.is_whitespace() || c.is_control());
        match valid {
            true => Ok(()),
            false => Err(Error::InvalidTopic(self.0.clone())),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
