use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::anyhow;
use parking_lot::Mutex;
use skillshare_client::{
    api::{
        self, ActivityEvent, Comment, CommentId, LikeStatus, NotificationId, NotificationItem,
        NotificationKind, PostId, UserId,
    },
    mention, Error, Rest,
};

use crate::MockBroker;

/// In-memory stand-in for the application's HTTP API.
///
/// When given a broker, mutations broadcast their activity events the way the
/// real backend does, including the echo to the user who made them.
#[derive(Clone)]
pub struct MockRest {
    db: Arc<Mutex<Db>>,
    broker: Option<MockBroker>,
}

#[derive(Default)]
struct Db {
    next_id: u64,
    comments: Vec<Comment>,
    likes: HashMap<PostId, HashSet<UserId>>,
    notifications: Vec<NotificationItem>,
    failing_calls: usize,
    latency: Duration,
    echo_delay: Duration,
}

impl Db {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn like_count(&self, post: &PostId) -> u64 {
        self.likes.get(post).map(|l| l.len() as u64).unwrap_or(0)
    }

    fn notification_mut(&mut self, id: &NotificationId) -> Result<&mut NotificationItem, Error> {
        self.notifications
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or_else(|| Error::Api(api::Error::NotFound(format!("notification {}", id.0))))
    }

    fn own_comment_mut(&mut self, id: &CommentId, user: &UserId) -> Result<&mut Comment, Error> {
        let c = self
            .comments
            .iter_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| Error::Api(api::Error::NotFound(format!("comment {}", id.0))))?;
        match c.author_id == *user {
            true => Ok(c),
            false => Err(Error::Api(api::Error::PermissionDenied)),
        }
    }
}

impl Default for MockRest {
    fn default() -> MockRest {
        MockRest::new()
    }
}

impl MockRest {
    pub fn new() -> MockRest {
        MockRest {
            db: Arc::new(Mutex::new(Db::default())),
            broker: None,
        }
    }

    pub fn with_broker(broker: MockBroker) -> MockRest {
        MockRest {
            db: Arc::new(Mutex::new(Db::default())),
            broker: Some(broker),
        }
    }

    /// Make the next `n` calls fail with a server error
    pub fn fail_next(&self, n: usize) {
        self.db.lock().failing_calls = n;
    }

    /// Delay every answer by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.db.lock().latency = latency;
    }

    /// Delay the broadcast of activity events caused by mutations
    pub fn set_echo_delay(&self, delay: Duration) {
        self.db.lock().echo_delay = delay;
    }

    /// Add a comment without broadcasting anything
    pub fn seed_comment(&self, post: &PostId, author: &UserId, text: &str) -> Comment {
        let mut db = self.db.lock();
        let comment = Comment {
            id: CommentId(db.fresh_id("c")),
            post_id: post.clone(),
            author_id: author.clone(),
            text: String::from(text),
            created_at: chrono::Utc::now(),
            author_name: Some(author.0.clone()),
        };
        db.comments.push(comment.clone());
        comment
    }

    pub fn seed_like(&self, post: &PostId, user: &UserId) {
        self.db
            .lock()
            .likes
            .entry(post.clone())
            .or_default()
            .insert(user.clone());
    }

    /// Add a notification without pushing it
    pub fn seed_notification(
        &self,
        user: &UserId,
        kind: NotificationKind,
        read: bool,
    ) -> NotificationItem {
        let mut db = self.db.lock();
        let item = NotificationItem {
            id: NotificationId(db.fresh_id("n")),
            user_id: Some(user.clone()),
            kind,
            title: format!("{kind:?}"),
            message: String::from("seeded notification"),
            related_item_id: None,
            read,
            created_at: chrono::Utc::now(),
        };
        db.notifications.push(item.clone());
        item
    }

    /// Store a notification and push it, the way the backend does on activity
    pub fn notify(
        &self,
        user: &UserId,
        kind: NotificationKind,
        message: &str,
        related: Option<&PostId>,
    ) -> NotificationItem {
        let item = {
            let mut db = self.db.lock();
            let item = NotificationItem {
                id: NotificationId(db.fresh_id("n")),
                user_id: Some(user.clone()),
                kind,
                title: format!("{kind:?}"),
                message: String::from(message),
                related_item_id: related.map(|p| p.0.clone()),
                read: false,
                created_at: chrono::Utc::now(),
            };
            db.notifications.push(item.clone());
            item
        };
        if let Some(broker) = &self.broker {
            broker.publish_notification(user, &item);
        }
        item
    }

    pub fn comments(&self, post: &PostId) -> Vec<Comment> {
        self.db
            .lock()
            .comments
            .iter()
            .filter(|c| c.post_id == *post)
            .cloned()
            .collect()
    }

    pub fn like_count(&self, post: &PostId) -> u64 {
        self.db.lock().like_count(post)
    }

    async fn enter(&self) -> Result<(), Error> {
        let latency = {
            let mut db = self.db.lock();
            if db.failing_calls > 0 {
                db.failing_calls -= 1;
                return Err(Error::Api(api::Error::Unknown(String::from(
                    "mock server failure",
                ))));
            }
            db.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    fn broadcast(&self, post: &PostId, evt: ActivityEvent) {
        let Some(broker) = self.broker.clone() else {
            return;
        };
        let delay = self.db.lock().echo_delay;
        match delay.is_zero() {
            true => {
                broker.publish_activity(post, &evt);
            }
            false => {
                let post = post.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    broker.publish_activity(&post, &evt);
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl Rest for MockRest {
    async fn fetch_comments(&self, post: &PostId) -> Result<Vec<Comment>, Error> {
        self.enter().await?;
        Ok(self.comments(post))
    }

    async fn fetch_like_status(&self, post: &PostId, user: &UserId) -> Result<LikeStatus, Error> {
        self.enter().await?;
        let db = self.db.lock();
        Ok(LikeStatus {
            like_count: db.like_count(post),
            liked: db.likes.get(post).map(|l| l.contains(user)).unwrap_or(false),
        })
    }

    async fn add_comment(
        &self,
        post: &PostId,
        user: &UserId,
        text: &str,
    ) -> Result<Comment, Error> {
        self.enter().await?;
        api::validate_comment_text(text)?;
        let comment = self.seed_comment(post, user, text);
        self.broadcast(
            post,
            ActivityEvent::CommentCreated {
                comment: comment.clone(),
            },
        );
        for name in mention::mentions(text) {
            self.notify(
                &UserId(name),
                NotificationKind::Mention,
                &format!("{} mentioned you in a comment", user.0),
                Some(post),
            );
        }
        Ok(comment)
    }

    async fn edit_comment(
        &self,
        comment: &CommentId,
        user: &UserId,
        text: &str,
    ) -> Result<Comment, Error> {
        self.enter().await?;
        api::validate_comment_text(text)?;
        let edited = {
            let mut db = self.db.lock();
            let c = db.own_comment_mut(comment, user)?;
            c.text = String::from(text);
            c.clone()
        };
        self.broadcast(
            &edited.post_id,
            ActivityEvent::CommentUpdated {
                comment: edited.clone(),
            },
        );
        Ok(edited)
    }

    async fn delete_comment(&self, comment: &CommentId, user: &UserId) -> Result<(), Error> {
        self.enter().await?;
        let post = {
            let mut db = self.db.lock();
            let post = db.own_comment_mut(comment, user)?.post_id.clone();
            db.comments.retain(|c| c.id != *comment);
            post
        };
        self.broadcast(
            &post,
            ActivityEvent::CommentDeleted {
                comment_id: comment.clone(),
            },
        );
        Ok(())
    }

    async fn like(&self, post: &PostId, user: &UserId) -> Result<u64, Error> {
        self.enter().await?;
        self.seed_like(post, user);
        let like_count = self.like_count(post);
        self.broadcast(post, ActivityEvent::LikeUpdate { like_count });
        Ok(like_count)
    }

    async fn unlike(&self, post: &PostId, user: &UserId) -> Result<u64, Error> {
        self.enter().await?;
        let like_count = {
            let mut db = self.db.lock();
            if let Some(likers) = db.likes.get_mut(post) {
                likers.remove(user);
            }
            db.like_count(post)
        };
        self.broadcast(post, ActivityEvent::LikeUpdate { like_count });
        Ok(like_count)
    }

    async fn fetch_notifications(&self, user: &UserId) -> Result<Vec<NotificationItem>, Error> {
        self.enter().await?;
        let mut res: Vec<NotificationItem> = self
            .db
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id.as_ref() == Some(user))
            .cloned()
            .collect();
        res.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(res)
    }

    async fn fetch_unread_count(&self, user: &UserId) -> Result<u64, Error> {
        self.enter().await?;
        Ok(self
            .db
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id.as_ref() == Some(user) && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, notification: &NotificationId) -> Result<(), Error> {
        self.enter().await?;
        self.db.lock().notification_mut(notification)?.read = true;
        Ok(())
    }

    async fn mark_unread(&self, notification: &NotificationId) -> Result<(), Error> {
        self.enter().await?;
        self.db.lock().notification_mut(notification)?.read = false;
        Ok(())
    }

    async fn mark_all_read(&self, user: &UserId) -> Result<(), Error> {
        self.enter().await?;
        for n in self.db.lock().notifications.iter_mut() {
            if n.user_id.as_ref() == Some(user) {
                n.read = true;
            }
        }
        Ok(())
    }

    async fn delete_notification(&self, notification: &NotificationId) -> Result<(), Error> {
        self.enter().await?;
        let mut db = self.db.lock();
        let before = db.notifications.len();
        db.notifications.retain(|n| n.id != *notification);
        match db.notifications.len() == before {
            true => Err(Error::Api(api::Error::NotFound(format!(
                "notification {}",
                notification.0
            )))),
            false => Ok(()),
        }
    }
}
