use std::sync::Arc;

use skillshare_api::{NotificationItem, NotificationKind, PostId, Topic, UserId};
use skillshare_client::{Inbox, InboxSnapshot, LoadState, Rest};
use tokio::sync::watch;

use crate::*;

async fn open_ready(
    stack: &Stack,
    user: &UserId,
    desktop: RecordingDesktop,
) -> (Inbox, watch::Receiver<InboxSnapshot>) {
    let session = stack.session(user).with_desktop(Arc::new(desktop));
    let inbox = session.open_inbox();
    let mut snaps = inbox.watch();
    wait_for(&mut snaps, "inbox to load", |s| s.load == LoadState::Ready).await;
    stack.wait_subscribed(&Topic::notifications(user), 1).await;
    (inbox, snaps)
}

#[tokio::test(start_paused = true)]
async fn pushes_add_to_fetched_unread_count() {
    let stack = Stack::new();
    let bob = user("bob");
    for _ in 0..4 {
        stack.rest.seed_notification(&bob, NotificationKind::Like, false);
    }
    stack.rest.seed_notification(&bob, NotificationKind::Follow, true);
    stack
        .rest
        .seed_notification(&user("alice"), NotificationKind::Like, false);
    let desktop = RecordingDesktop::default();
    let (inbox, mut snaps) = open_ready(&stack, &bob, desktop.clone()).await;
    wait_for(&mut snaps, "fetched count", |s| s.unread == 4).await;
    assert_eq!(snaps.borrow().items.len(), 5);

    let post = PostId(String::from("p1"));
    let first = stack
        .rest
        .notify(&bob, NotificationKind::Comment, "alice commented", Some(&post));
    let second = stack
        .rest
        .notify(&bob, NotificationKind::Like, "alice liked", Some(&post));
    let s = wait_for(&mut snaps, "pushed notifications", |s| s.unread == 6).await;
    assert_eq!(s.items.len(), 7);
    assert_eq!(inbox.unread_count(), 6);
    let shown: Vec<_> = desktop.shown.lock().iter().map(|n| n.id.clone()).collect();
    assert_eq!(shown, vec![first.id, second.id]);
}

#[tokio::test(start_paused = true)]
async fn repeated_pushes_replace_items() {
    let stack = Stack::new();
    let bob = user("bob");
    let desktop = RecordingDesktop::default();
    let (_inbox, mut snaps) = open_ready(&stack, &bob, desktop.clone()).await;

    let item = stack
        .rest
        .notify(&bob, NotificationKind::System, "welcome", None);
    wait_for(&mut snaps, "push", |s| s.unread == 1).await;

    let read = NotificationItem {
        read: true,
        ..item.clone()
    };
    stack.broker.publish_notification(&bob, &read);
    let s = wait_for(&mut snaps, "replaced push", |s| s.unread == 0).await;
    assert_eq!(s.items, vec![read]);
    assert_eq!(desktop.shown.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn denied_desktop_notifications_are_not_shown() {
    let stack = Stack::new();
    let bob = user("bob");
    let desktop = RecordingDesktop {
        denied: true,
        ..RecordingDesktop::default()
    };
    let (_inbox, mut snaps) = open_ready(&stack, &bob, desktop.clone()).await;
    stack
        .rest
        .notify(&bob, NotificationKind::Follow, "carol follows you", None);
    wait_for(&mut snaps, "push", |s| s.unread == 1).await;
    assert!(desktop.shown.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn inbox_actions_follow_the_server() {
    let stack = Stack::new();
    let bob = user("bob");
    let a = stack.rest.seed_notification(&bob, NotificationKind::Like, false);
    let b = stack
        .rest
        .seed_notification(&bob, NotificationKind::Comment, false);
    let c = stack.rest.seed_notification(&bob, NotificationKind::Follow, false);
    let (inbox, mut snaps) = open_ready(&stack, &bob, RecordingDesktop::default()).await;
    wait_for(&mut snaps, "fetched count", |s| s.unread == 3).await;

    inbox.mark_read(&a.id).await.unwrap();
    let s = wait_for(&mut snaps, "read", |s| s.unread == 2).await;
    assert!(s.items.iter().any(|n| n.id == a.id && n.read));

    inbox.mark_unread(&a.id).await.unwrap();
    wait_for(&mut snaps, "unread", |s| s.unread == 3).await;

    inbox.delete(&b.id).await.unwrap();
    let s = wait_for(&mut snaps, "deletion", |s| s.unread == 2).await;
    assert_eq!(s.items.len(), 2);
    assert!(s.items.iter().all(|n| n.id != b.id));

    inbox.mark_all_read().await.unwrap();
    let s = wait_for(&mut snaps, "all read", |s| s.unread == 0).await;
    assert!(s.items.iter().all(|n| n.read));
    assert_eq!(stack.rest.fetch_unread_count(&bob).await.unwrap(), 0);

    // failed actions leave the inbox untouched
    stack.rest.fail_next(1);
    assert!(inbox.mark_unread(&c.id).await.is_err());
    settle().await;
    assert_eq!(inbox.unread_count(), 0);
    assert!(inbox.delete(&b.id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn refresh_replaces_the_baseline() {
    let stack = Stack::new();
    let bob = user("bob");
    let (inbox, mut snaps) = open_ready(&stack, &bob, RecordingDesktop::default()).await;
    stack
        .rest
        .notify(&bob, NotificationKind::Like, "liked", None);
    wait_for(&mut snaps, "push", |s| s.unread == 1).await;

    stack.rest.seed_notification(&bob, NotificationKind::Like, false);
    inbox.refresh();
    let s = wait_for(&mut snaps, "refetched count", |s| {
        s.load == LoadState::Ready && s.unread == 2
    })
    .await;
    assert_eq!(s.items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn mentions_notify_the_mentioned_user() {
    let stack = Stack::new();
    let bob = user("bob");
    let desktop = RecordingDesktop::default();
    let (_inbox, mut snaps) = open_ready(&stack, &bob, desktop.clone()).await;

    let alice = stack.session(&user("alice"));
    let view = alice.open_post(PostId(String::from("p1")));
    view.add_comment("thanks @bob!").await.unwrap();
    let s = wait_for(&mut snaps, "mention", |s| s.unread == 1).await;
    assert_eq!(s.items[0].kind, NotificationKind::Mention);
    assert_eq!(s.items[0].related_item_id.as_deref(), Some("p1"));
}
