use std::time::Duration;

use skillshare_api::{ActivityEvent, Comment, CommentId, PostId, Topic};
use skillshare_client::{
    Composer, ComposerState, Error, LoadState, PostSnapshot, PostView, Rest, Session,
};
use tokio::{sync::watch, time::Instant};

use crate::*;

fn post() -> PostId {
    PostId(String::from("p1"))
}

fn texts(s: &PostSnapshot) -> Vec<&str> {
    s.comments.iter().map(|c| c.comment.text.as_str()).collect()
}

async fn open_ready(
    stack: &Stack,
    session: &Session,
) -> (PostView, watch::Receiver<PostSnapshot>) {
    let view = session.open_post(post());
    let mut snaps = view.watch();
    wait_for(&mut snaps, "post to load", |s| s.load == LoadState::Ready).await;
    stack.wait_subscribed(&Topic::post_activity(&post()), 1).await;
    (view, snaps)
}

#[tokio::test(start_paused = true)]
async fn hydrates_comments_and_likes() {
    let stack = Stack::new();
    stack.rest.seed_comment(&post(), &user("bob"), "first");
    stack.rest.seed_like(&post(), &user("bob"));
    stack.rest.seed_like(&post(), &user("alice"));
    let session = stack.session(&user("alice"));
    let (_view, snaps) = open_ready(&stack, &session).await;

    let s = snaps.borrow().clone();
    assert_eq!(s.like_count, 2);
    assert!(s.liked);
    assert_eq!(texts(&s), vec!["first"]);
    assert!(!s.comments[0].is_new);
}

#[tokio::test(start_paused = true)]
async fn events_during_loading_are_applied_after_it() {
    let stack = Stack::new();
    stack.rest.set_latency(Duration::from_secs(1));
    let session = stack.session(&user("alice"));
    let view = session.open_post(post());
    let mut snaps = view.watch();
    stack.wait_subscribed(&Topic::post_activity(&post()), 1).await;
    assert_eq!(view.snapshot().load, LoadState::Loading);

    // pushed but not stored, so only the buffered event can show it
    let c = Comment {
        post_id: post(),
        ..stack
            .rest
            .seed_comment(&PostId(String::from("elsewhere")), &user("bob"), "early bird")
    };
    stack.broker.publish_activity(
        &post(),
        &ActivityEvent::CommentCreated { comment: c.clone() },
    );
    let s = wait_for(&mut snaps, "post to load", |s| s.load == LoadState::Ready).await;
    assert_eq!(texts(&s), vec!["early bird"]);
    assert_eq!(s.comments[0].comment.id, c.id);
}

#[tokio::test(start_paused = true)]
async fn failed_load_can_be_refreshed() {
    let stack = Stack::new();
    stack.rest.seed_comment(&post(), &user("bob"), "hello");
    stack.rest.fail_next(1);
    let session = stack.session(&user("alice"));
    let view = session.open_post(post());
    let mut snaps = view.watch();
    let s = wait_for(&mut snaps, "load failure", |s| {
        matches!(s.load, LoadState::Failed(_))
    })
    .await;
    assert_eq!(
        s.load,
        LoadState::Failed(String::from("Something went wrong, please retry"))
    );

    view.refresh();
    let s = wait_for(&mut snaps, "post to load", |s| s.load == LoadState::Ready).await;
    assert_eq!(texts(&s), vec!["hello"]);
}

#[tokio::test(start_paused = true)]
async fn others_comments_show_up_emphasized() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (_view, mut snaps) = open_ready(&stack, &session).await;

    stack
        .rest
        .add_comment(&post(), &user("bob"), "hi @alice")
        .await
        .unwrap();
    let s = wait_for(&mut snaps, "new comment", |s| s.comments.len() == 1).await;
    assert!(s.comments[0].is_new);
    assert_eq!(s.comments[0].segments.len(), 2);

    let start = Instant::now();
    wait_for(&mut snaps, "emphasis to fade", |s| !s.comments[0].is_new).await;
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(2) && elapsed <= Duration::from_millis(2010),
        "emphasis lasted {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_creations_show_once() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (_view, mut snaps) = open_ready(&stack, &session).await;

    let c = stack
        .rest
        .add_comment(&post(), &user("bob"), "once")
        .await
        .unwrap();
    wait_for(&mut snaps, "new comment", |s| s.comments.len() == 1).await;
    stack.broker.publish_activity(
        &post(),
        &ActivityEvent::CommentCreated { comment: c.clone() },
    );
    settle().await;
    assert_eq!(texts(&snaps.borrow()), vec!["once"]);
}

#[tokio::test(start_paused = true)]
async fn updates_of_unknown_comments_insert_them() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (_view, mut snaps) = open_ready(&stack, &session).await;

    let c = stack
        .rest
        .add_comment(&post(), &user("bob"), "known")
        .await
        .unwrap();
    wait_for(&mut snaps, "new comment", |s| s.comments.len() == 1).await;

    let unknown = Comment {
        id: CommentId::from("c-unknown"),
        text: String::from("edited before we saw it"),
        ..c.clone()
    };
    stack.broker.publish_activity(
        &post(),
        &ActivityEvent::CommentUpdated { comment: unknown },
    );
    let s = wait_for(&mut snaps, "inserted comment", |s| s.comments.len() == 2).await;
    assert_eq!(texts(&s), vec!["known", "edited before we saw it"]);

    stack
        .rest
        .edit_comment(&c.id, &user("bob"), "known, edited")
        .await
        .unwrap();
    let s = wait_for(&mut snaps, "updated comment", |s| {
        s.comments[0].comment.text == "known, edited"
    })
    .await;
    assert!(s.comments[0].is_updated);
    assert_eq!(s.comments.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn deletions_fade_out_and_are_idempotent() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (_view, mut snaps) = open_ready(&stack, &session).await;

    let c = stack
        .rest
        .add_comment(&post(), &user("bob"), "bye")
        .await
        .unwrap();
    wait_for(&mut snaps, "new comment", |s| s.comments.len() == 1).await;

    stack.rest.delete_comment(&c.id, &user("bob")).await.unwrap();
    wait_for(&mut snaps, "comment to fade", |s| {
        s.comments.first().map(|c| c.removing) == Some(true)
    })
    .await;
    let start = Instant::now();
    let deleted = ActivityEvent::CommentDeleted {
        comment_id: c.id.clone(),
    };
    stack.broker.publish_activity(&post(), &deleted);

    wait_for(&mut snaps, "comment removal", |s| s.comments.is_empty()).await;
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(500) && elapsed <= Duration::from_millis(510),
        "removal took {elapsed:?}"
    );

    stack.broker.publish_activity(&post(), &deleted);
    settle().await;
    assert!(snaps.borrow().comments.is_empty());
}

#[tokio::test(start_paused = true)]
async fn like_counts_are_replaced() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (_view, mut snaps) = open_ready(&stack, &session).await;

    stack
        .broker
        .publish_activity(&post(), &ActivityEvent::LikeUpdate { like_count: 5 });
    wait_for(&mut snaps, "5 likes", |s| s.like_count == 5).await;
    stack
        .broker
        .publish_activity(&post(), &ActivityEvent::LikeUpdate { like_count: 3 });
    let s = wait_for(&mut snaps, "3 likes", |s| s.like_count == 3).await;
    assert!(!s.liked);
}

#[tokio::test(start_paused = true)]
async fn malformed_messages_are_skipped() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (_view, mut snaps) = open_ready(&stack, &session).await;

    let topic = Topic::post_activity(&post());
    stack.broker.publish(&topic, "{not json");
    stack.broker.publish(&topic, r#"{"type":"SOMETHING_ELSE"}"#);
    stack
        .broker
        .publish(&topic, r#"{"type":"LIKE","likeCount":4}"#);
    let s = wait_for(&mut snaps, "4 likes", |s| s.like_count == 4).await;
    assert_eq!(s.load, LoadState::Ready);
}

#[tokio::test(start_paused = true)]
async fn own_likes_are_optimistic() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (view, mut snaps) = open_ready(&stack, &session).await;

    stack.rest.set_latency(Duration::from_secs(1));
    let (res, _) = tokio::join!(
        view.like(),
        wait_for(&mut snaps, "optimistic like", |s| s.liked && s.like_count == 1)
    );
    assert_eq!(res.unwrap(), 1);

    stack.rest.fail_next(1);
    assert!(view.unlike().await.is_err());
    settle().await;
    let s = view.snapshot();
    assert!(s.liked);
    assert_eq!(s.like_count, 1);
    assert_eq!(stack.rest.like_count(&post()), 1);
}

#[tokio::test(start_paused = true)]
async fn own_echoes_are_suppressed() {
    let stack = Stack::new();
    stack.rest.set_echo_delay(Duration::from_secs(1));
    let session = stack.session(&user("alice"));
    let (view, mut snaps) = open_ready(&stack, &session).await;

    let c = view.add_comment("oops").await.unwrap();
    wait_for(&mut snaps, "own comment", |s| texts(s) == vec!["oops"]).await;
    view.delete_comment(&c.id).await.unwrap();
    wait_for(&mut snaps, "own comment removal", |s| s.comments.is_empty()).await;

    // the creation echo arrives after the deletion, and must not revive it
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(view.snapshot().comments.is_empty());

    let kept = view.add_comment("kept").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let s = view.snapshot();
    assert_eq!(texts(&s), vec!["kept"]);
    assert_eq!(s.comments[0].comment.id, kept.id);
}

#[tokio::test(start_paused = true)]
async fn composer_keeps_draft_until_confirmed() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (view, mut snaps) = open_ready(&stack, &session).await;
    let mut composer = Composer::new();

    composer.set_draft("   ");
    assert!(composer.submit(&view).await.is_err());
    assert_eq!(
        *composer.state(),
        ComposerState::Failed(String::from("Please write something first"))
    );

    composer.set_draft("hello");
    stack.rest.fail_next(1);
    assert!(composer.submit(&view).await.is_err());
    assert_eq!(composer.draft(), "hello");
    assert!(matches!(composer.state(), ComposerState::Failed(_)));

    let c = composer.submit(&view).await.unwrap();
    assert_eq!(composer.draft(), "");
    assert_eq!(*composer.state(), ComposerState::Idle);
    wait_for(&mut snaps, "posted comment", |s| texts(s) == vec!["hello"]).await;

    composer.start_edit(&c);
    assert_eq!(composer.draft(), "hello");
    composer.set_draft("hello again");
    let edited = composer.submit(&view).await.unwrap();
    assert_eq!(edited.id, c.id);
    assert_eq!(composer.editing(), None);
    let s = wait_for(&mut snaps, "edited comment", |s| {
        texts(s) == vec!["hello again"]
    })
    .await;
    assert_eq!(s.comments.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn others_cannot_edit_my_comments() {
    let stack = Stack::new();
    let c = stack.rest.seed_comment(&post(), &user("alice"), "mine");
    let session = stack.session(&user("bob"));
    let (view, _snaps) = open_ready(&stack, &session).await;

    let err = view.edit_comment(&c.id, "theirs").await.unwrap_err();
    assert_eq!(err.user_message(), "You are not allowed to do this");
    assert_eq!(stack.rest.comments(&post())[0].text, "mine");
}

#[tokio::test(start_paused = true)]
async fn closed_views_refuse_actions() {
    let stack = Stack::new();
    let session = stack.session(&user("alice"));
    let (mut view, _snaps) = open_ready(&stack, &session).await;

    view.close();
    view.close();
    assert!(matches!(view.add_comment("late").await, Err(Error::ViewClosed)));
    assert!(matches!(view.like().await, Err(Error::ViewClosed)));
    assert!(stack.rest.comments(&post()).is_empty());
    stack.wait_subscribed(&Topic::post_activity(&post()), 0).await;
}
