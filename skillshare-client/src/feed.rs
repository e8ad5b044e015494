use std::{
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};

use crate::{
    api::{ActivityEvent, Comment, CommentId, NotificationItem, PostId, Topic, UserId},
    Hub, Subscription,
};

/// Something that can be received on a push channel topic
pub trait FeedItem: Sized + Send + 'static {
    fn parse(body: &str) -> anyhow::Result<Self>;
}

impl FeedItem for ActivityEvent {
    fn parse(body: &str) -> anyhow::Result<ActivityEvent> {
        ActivityEvent::parse(body)
    }
}

impl FeedItem for NotificationItem {
    fn parse(body: &str) -> anyhow::Result<NotificationItem> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Parsed messages of one topic. Malformed messages are logged and skipped.
pub struct Feed<T> {
    sub: Subscription,
    _phantom: PhantomData<fn() -> T>,
}

pub type ActivityFeed = Feed<ActivityEvent>;
pub type NotificationFeed = Feed<NotificationItem>;

impl<T: FeedItem> Feed<T> {
    fn new(sub: Subscription) -> Feed<T> {
        Feed {
            sub,
            _phantom: PhantomData,
        }
    }

    pub fn topic(&self) -> &Topic {
        self.sub.topic()
    }

    pub fn unsubscribe(&mut self) {
        self.sub.unsubscribe()
    }
}

impl<T: FeedItem> Stream for Feed<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            let body = match futures::ready!(self.sub.poll_next_unpin(cx)) {
                Some(body) => body,
                None => return Poll::Ready(None),
            };
            match T::parse(&body) {
                Ok(item) => return Poll::Ready(Some(item)),
                Err(err) => {
                    tracing::warn!(?err, topic = %self.sub.topic(), %body, "dropping malformed message")
                }
            }
        }
    }
}

/// Callbacks for a post's live activity
pub trait ActivityHandler: Send + 'static {
    fn on_like_update(&mut self, like_count: u64);
    fn on_new_comment(&mut self, comment: Comment);
    fn on_comment_update(&mut self, comment: Comment);
    fn on_comment_deleted(&mut self, _comment_id: CommentId) {}
}

pub trait NotificationHandler: Send + 'static {
    fn on_notification(&mut self, item: NotificationItem);
}

impl<F: FnMut(NotificationItem) + Send + 'static> NotificationHandler for F {
    fn on_notification(&mut self, item: NotificationItem) {
        self(item)
    }
}

/// Handle to a callback-style subscription.
///
/// Once `unsubscribe` returned, no callback runs any longer. It must not be
/// called from within one of the callbacks, as it waits for the running
/// callback to complete.
pub struct Unsubscribe {
    alive: Arc<parking_lot::Mutex<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Unsubscribe {
    fn spawn<T, H, F>(mut feed: Feed<T>, mut handler: H, deliver: F) -> Unsubscribe
    where
        T: FeedItem,
        H: Send + 'static,
        F: Fn(&mut H, T) + Send + 'static,
    {
        let alive = Arc::new(parking_lot::Mutex::new(true));
        let task = tokio::spawn({
            let alive = alive.clone();
            async move {
                while let Some(item) = feed.next().await {
                    let delivered = {
                        let alive = alive.lock();
                        if *alive {
                            deliver(&mut handler, item);
                        }
                        *alive
                    };
                    if !delivered {
                        break;
                    }
                }
            }
        });
        Unsubscribe {
            alive,
            task: Some(task),
        }
    }

    pub fn unsubscribe(&mut self) {
        *self.alive.lock() = false;
        if let Some(task) = self.task.take() {
            // dropping the task drops its subscription
            task.abort();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Live activity of posts: like counts and comment changes
#[derive(Clone)]
pub struct ActivityChannel {
    hub: Hub,
}

impl ActivityChannel {
    pub fn new(hub: Hub) -> ActivityChannel {
        ActivityChannel { hub }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn subscribe(&self, post: &PostId) -> ActivityFeed {
        Feed::new(self.hub.subscribe(Topic::post_activity(post)))
    }

    pub fn subscribe_with<H: ActivityHandler>(&self, post: &PostId, handler: H) -> Unsubscribe {
        Unsubscribe::spawn(self.subscribe(post), handler, |h: &mut H, evt| match evt {
            ActivityEvent::LikeUpdate { like_count } => h.on_like_update(like_count),
            ActivityEvent::CommentCreated { comment } => h.on_new_comment(comment),
            ActivityEvent::CommentUpdated { comment } => h.on_comment_update(comment),
            ActivityEvent::CommentDeleted { comment_id } => h.on_comment_deleted(comment_id),
        })
    }
}

/// Notifications addressed to a user
#[derive(Clone)]
pub struct NotificationChannel {
    hub: Hub,
}

impl NotificationChannel {
    pub fn new(hub: Hub) -> NotificationChannel {
        NotificationChannel { hub }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn subscribe(&self, user: &UserId) -> NotificationFeed {
        Feed::new(self.hub.subscribe(Topic::notifications(user)))
    }

    pub fn subscribe_with<H: NotificationHandler>(&self, user: &UserId, handler: H) -> Unsubscribe {
        Unsubscribe::spawn(self.subscribe(user), handler, |h: &mut H, n| {
            h.on_notification(n)
        })
    }
}
