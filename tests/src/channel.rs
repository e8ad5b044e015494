use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use skillshare_api::{ActivityEvent, Comment, PostId, Topic};
use skillshare_client::{ActivityHandler, ConnectionState, LoadState, Rest};
use tokio::time::Instant;

use crate::*;

fn post(n: u32) -> PostId {
    PostId(format!("p{n}"))
}

#[tokio::test(start_paused = true)]
async fn one_connection_for_all_subscriptions() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let mut state = session.hub().state();
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);

    let first = session.open_post(post(1));
    let second = session.open_post(post(2));
    let inbox = session.open_inbox();
    wait_for(&mut state, "connection", |s| *s == ConnectionState::Connected).await;
    stack.wait_subscribed(&Topic::post_activity(&post(1)), 1).await;
    stack.wait_subscribed(&Topic::post_activity(&post(2)), 1).await;
    stack
        .wait_subscribed(&Topic::notifications(&user("alice")), 1)
        .await;
    assert_eq!(stack.broker.open_connections(), 1);
    assert_eq!(stack.broker.connect_attempts(), 1);
    assert_eq!(session.hub().subscriber_count(), 3);

    drop(first);
    stack.wait_subscribed(&Topic::post_activity(&post(1)), 0).await;
    assert_eq!(stack.broker.open_connections(), 1);
    assert_eq!(*state.borrow(), ConnectionState::Connected);

    drop(second);
    drop(inbox);
    let broker = stack.broker.clone();
    eventually("connection close", || broker.open_connections() == 0).await;
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    assert_eq!(session.hub().subscriber_count(), 0);

    // a new subscription opens a new connection
    let _again = session.open_post(post(1));
    wait_for(&mut state, "reconnection", |s| *s == ConnectionState::Connected).await;
    assert_eq!(stack.broker.connect_attempts(), 2);
    assert_eq!(stack.broker.open_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn same_topic_is_subscribed_once() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let first = session.open_post(post(1));
    let _second = session.open_post(post(1));
    stack.wait_subscribed(&Topic::post_activity(&post(1)), 1).await;
    settle().await;
    assert_eq!(stack.broker.subscribe_requests(), 1);

    // the topic stays subscribed while a view still needs it
    drop(first);
    settle().await;
    assert_eq!(stack.broker.subscribers(&Topic::post_activity(&post(1))), 1);
    assert_eq!(session.hub().subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_after_delay_and_resubscribes() {
    let stack = Stack::new();
    stack.broker.fail_next_connects(1);
    let session = stack.session(&user("alice"));
    let mut state = session.hub().state();
    let start = Instant::now();
    let view = session.open_post(post(1));
    let mut snaps = view.watch();
    let inbox = session.open_inbox();

    wait_for(&mut state, "first failure", |s| *s == ConnectionState::Disconnected).await;
    wait_for(&mut state, "connection", |s| *s == ConnectionState::Connected).await;
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(stack.broker.connect_attempts(), 2);
    stack.wait_subscribed(&Topic::post_activity(&post(1)), 1).await;

    stack.broker.drop_connections();
    wait_for(&mut state, "disconnection", |s| *s == ConnectionState::Disconnected).await;
    let lost = Instant::now();
    wait_for(&mut snaps, "view to see the disconnection", |s| {
        s.connection == ConnectionState::Disconnected
    })
    .await;
    wait_for(&mut state, "reconnection", |s| *s == ConnectionState::Connected).await;
    assert!(lost.elapsed() >= Duration::from_secs(5));
    assert_eq!(stack.broker.connect_attempts(), 3);
    stack.wait_subscribed(&Topic::post_activity(&post(1)), 1).await;
    stack
        .wait_subscribed(&Topic::notifications(&user("alice")), 1)
        .await;

    // the view keeps working on the new connection
    wait_for(&mut snaps, "post to load", |s| s.load == LoadState::Ready).await;
    stack
        .rest
        .add_comment(&post(1), &user("bob"), "after the storm")
        .await
        .unwrap();
    wait_for(&mut snaps, "comment", |s| s.comments.len() == 1).await;
    let mut inbox_snaps = inbox.watch();
    wait_for(&mut inbox_snaps, "connected inbox", |s| {
        s.connection == ConnectionState::Connected
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn unsubscribing_cancels_pending_connection() {
    let stack = Stack::new();
    stack.broker.hold_connects();
    let session = stack.session(&user("alice"));
    let hub = session.hub().clone();

    let sub = hub.subscribe(Topic::post_activity(&post(1)));
    let broker = stack.broker.clone();
    eventually("connection attempt", || broker.connect_attempts() == 1).await;
    assert_eq!(*hub.state().borrow(), ConnectionState::Connecting);

    drop(sub);
    assert_eq!(*hub.state().borrow(), ConnectionState::Disconnected);
    assert_eq!(hub.subscriber_count(), 0);
    settle().await;
    stack.broker.release_connects();
    settle().await;
    assert_eq!(stack.broker.open_connections(), 0);
    assert_eq!(stack.broker.connect_attempts(), 1);
}

#[derive(Clone, Default)]
struct Recorder {
    likes: Arc<Mutex<Vec<u64>>>,
    comments: Arc<Mutex<Vec<String>>>,
}

impl ActivityHandler for Recorder {
    fn on_like_update(&mut self, like_count: u64) {
        self.likes.lock().push(like_count);
    }

    fn on_new_comment(&mut self, comment: Comment) {
        self.comments.lock().push(comment.text);
    }

    fn on_comment_update(&mut self, comment: Comment) {
        self.comments.lock().push(comment.text);
    }
}

#[tokio::test(start_paused = true)]
async fn no_callbacks_after_unsubscribe() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let rec = Recorder::default();
    let mut handle = session.activity().subscribe_with(&post(1), rec.clone());
    stack.wait_subscribed(&Topic::post_activity(&post(1)), 1).await;

    stack
        .broker
        .publish_activity(&post(1), &ActivityEvent::LikeUpdate { like_count: 1 });
    stack
        .rest
        .add_comment(&post(1), &user("bob"), "hello")
        .await
        .unwrap();
    let (likes, comments) = (rec.likes.clone(), rec.comments.clone());
    eventually("callbacks", || {
        likes.lock().len() == 1 && comments.lock().len() == 1
    })
    .await;

    stack
        .broker
        .publish_activity(&post(1), &ActivityEvent::LikeUpdate { like_count: 2 });
    handle.unsubscribe();
    stack
        .broker
        .publish_activity(&post(1), &ActivityEvent::LikeUpdate { like_count: 3 });
    settle().await;
    assert_eq!(*rec.likes.lock(), vec![1]);
    assert_eq!(*rec.comments.lock(), vec![String::from("hello")]);
    let hub = session.hub().clone();
    eventually("subscription release", || hub.subscriber_count() == 0).await;
}

#[tokio::test(start_paused = true)]
async fn callbacks_unsubscribed_before_connecting_never_fire() {
    let stack = Stack::new();
    stack.broker.hold_connects();
    let session = stack.session(&user("alice"));
    let rec = Recorder::default();
    let mut handle = session.activity().subscribe_with(&post(1), rec.clone());
    let broker = stack.broker.clone();
    eventually("connection attempt", || broker.connect_attempts() == 1).await;

    handle.unsubscribe();
    handle.unsubscribe();
    settle().await;
    stack.broker.release_connects();
    settle().await;
    stack
        .broker
        .publish_activity(&post(1), &ActivityEvent::LikeUpdate { like_count: 1 });
    settle().await;
    assert!(rec.likes.lock().is_empty());
    assert!(rec.comments.lock().is_empty());
    assert_eq!(stack.broker.open_connections(), 0);
    assert_eq!(session.hub().subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn notification_callbacks() {
    let stack = Stack::new();
    let session = stack.session(&user("bob"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _handle = session.notifications().subscribe_with(&user("bob"), {
        let seen = seen.clone();
        move |n: skillshare_api::NotificationItem| seen.lock().push(n.kind)
    });
    stack
        .wait_subscribed(&Topic::notifications(&user("bob")), 1)
        .await;

    stack
        .rest
        .add_comment(&post(1), &user("alice"), "ping @bob and @carol")
        .await
        .unwrap();
    eventually("mention", || seen.lock().len() == 1).await;
    assert_eq!(
        *seen.lock(),
        vec![skillshare_api::NotificationKind::Mention]
    );
}
