use anyhow::{anyhow, Context};

use crate::{
    api::{
        self, Comment, CommentId, LikeStatus, NewComment, NotificationId, NotificationItem,
        PostId, UnreadCount, UserId,
    },
    Error,
};

/// Request/response collaborator of the live views: hydration and mutations
#[async_trait::async_trait]
pub trait Rest: Send + Sync + 'static {
    async fn fetch_comments(&self, post: &PostId) -> Result<Vec<Comment>, Error>;
    async fn fetch_like_status(&self, post: &PostId, user: &UserId) -> Result<LikeStatus, Error>;
    async fn add_comment(&self, post: &PostId, user: &UserId, text: &str)
        -> Result<Comment, Error>;
    async fn edit_comment(
        &self,
        comment: &CommentId,
        user: &UserId,
        text: &str,
    ) -> Result<Comment, Error>;
    async fn delete_comment(&self, comment: &CommentId, user: &UserId) -> Result<(), Error>;

    /// Returns the new like count
    async fn like(&self, post: &PostId, user: &UserId) -> Result<u64, Error>;
    async fn unlike(&self, post: &PostId, user: &UserId) -> Result<u64, Error>;

    async fn fetch_notifications(&self, user: &UserId) -> Result<Vec<NotificationItem>, Error>;
    async fn fetch_unread_count(&self, user: &UserId) -> Result<u64, Error>;
    async fn mark_read(&self, notification: &NotificationId) -> Result<(), Error>;
    async fn mark_unread(&self, notification: &NotificationId) -> Result<(), Error>;
    async fn mark_all_read(&self, user: &UserId) -> Result<(), Error>;
    async fn delete_notification(&self, notification: &NotificationId) -> Result<(), Error>;
}

/// `Rest` against the application's HTTP API
pub struct HttpRest {
    host: String,
    client: reqwest::Client,
}

impl HttpRest {
    pub fn new(host: &str) -> HttpRest {
        HttpRest {
            host: String::from(host.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let resp = req.send().await.context("sending request to server")?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let url = resp.url().to_string();
        let body = resp.bytes().await.context("reading error body")?;
        Err(match api::Error::parse(&body) {
            Ok(err) => Error::Api(err),
            Err(_) => match status {
                reqwest::StatusCode::NOT_FOUND => Error::Api(api::Error::NotFound(url)),
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    Error::Api(api::Error::PermissionDenied)
                }
                _ => Error::Anyhow(anyhow!("server answered {status} for {url}")),
            },
        })
    }

    async fn json<R>(&self, req: reqwest::RequestBuilder) -> Result<R, Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        Ok(self
            .send(req)
            .await?
            .json()
            .await
            .context("parsing server response")?)
    }
}

#[async_trait::async_trait]
impl Rest for HttpRest {
    async fn fetch_comments(&self, post: &PostId) -> Result<Vec<Comment>, Error> {
        self.json(self.client.get(self.url(&format!("posts/{}/comments", post.0))))
            .await
    }

    async fn fetch_like_status(&self, post: &PostId, user: &UserId) -> Result<LikeStatus, Error> {
        self.json(
            self.client
                .get(self.url(&format!("posts/{}/likes", post.0)))
                .query(&[("userId", &user.0)]),
        )
        .await
    }

    async fn add_comment(
        &self,
        post: &PostId,
        user: &UserId,
        text: &str,
    ) -> Result<Comment, Error> {
        let body = NewComment {
            text: String::from(text),
        };
        body.validate()?;
        self.json(
            self.client
                .post(self.url(&format!("posts/{}/comments", post.0)))
                .query(&[("userId", &user.0)])
                .json(&body),
        )
        .await
    }

    async fn edit_comment(
        &self,
        comment: &CommentId,
        user: &UserId,
        text: &str,
    ) -> Result<Comment, Error> {
        let body = NewComment {
            text: String::from(text),
        };
        body.validate()?;
        self.json(
            self.client
                .put(self.url(&format!("comments/{}", comment.0)))
                .query(&[("userId", &user.0)])
                .json(&body),
        )
        .await
    }

    async fn delete_comment(&self, comment: &CommentId, user: &UserId) -> Result<(), Error> {
        self.send(
            self.client
                .delete(self.url(&format!("comments/{}", comment.0)))
                .query(&[("userId", &user.0)]),
        )
        .await?;
        Ok(())
    }

    async fn like(&self, post: &PostId, user: &UserId) -> Result<u64, Error> {
        let status: LikeStatus = self
            .json(
                self.client
                    .post(self.url(&format!("posts/{}/like", post.0)))
                    .query(&[("userId", &user.0)]),
            )
            .await?;
        Ok(status.like_count)
    }

    async fn unlike(&self, post: &PostId, user: &UserId) -> Result<u64, Error> {
        let status: LikeStatus = self
            .json(
                self.client
                    .delete(self.url(&format!("posts/{}/like", post.0)))
                    .query(&[("userId", &user.0)]),
            )
            .await?;
        Ok(status.like_count)
    }

    async fn fetch_notifications(&self, user: &UserId) -> Result<Vec<NotificationItem>, Error> {
        self.json(
            self.client
                .get(self.url(&format!("notifications/user/{}", user.0))),
        )
        .await
    }

    async fn fetch_unread_count(&self, user: &UserId) -> Result<u64, Error> {
        let count: UnreadCount = self
            .json(
                self.client
                    .get(self.url(&format!("notifications/user/{}/unread/count", user.0))),
            )
            .await?;
        Ok(count.count)
    }

    async fn mark_read(&self, notification: &NotificationId) -> Result<(), Error> {
        self.send(
            self.client
                .put(self.url(&format!("notifications/{}/read", notification.0))),
        )
        .await?;
        Ok(())
    }

    async fn mark_unread(&self, notification: &NotificationId) -> Result<(), Error> {
        self.send(
            self.client
                .put(self.url(&format!("notifications/{}/unread", notification.0))),
        )
        .await?;
        Ok(())
    }

    async fn mark_all_read(&self, user: &UserId) -> Result<(), Error> {
        self.send(
            self.client
                .put(self.url(&format!("notifications/user/{}/read-all", user.0))),
        )
        .await?;
        Ok(())
    }

    async fn delete_notification(&self, notification: &NotificationId) -> Result<(), Error> {
        self.send(
            self.client
                .delete(self.url(&format!("notifications/{}", notification.0))),
        )
        .await?;
        Ok(())
    }
}
