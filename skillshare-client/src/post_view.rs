use std::{collections::VecDeque, sync::Arc, time::Instant};

use futures::{future::BoxFuture, FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::{
    api::{self, ActivityEvent, Comment, CommentId, LikeStatus, PostId, UserId},
    ActivityChannel, ActivityFeed, CommentThread, CommentView, Config, ConnectionState, Error,
    PostActivity, Rest,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// Everything a post's live view displays
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PostSnapshot {
    pub post_id: PostId,
    pub load: LoadState,
    pub connection: ConnectionState,
    pub like_count: u64,
    /// Whether the current user likes the post
    pub liked: bool,
    pub comments: Vec<CommentView>,
}

enum Command {
    MarkLocal(CommentId),
    Created(Comment),
    Edited(Comment),
    Deleted(CommentId),
    LikeRequested { liked: bool },
    LikeSettled { liked: bool, like_count: u64 },
    LikeFailed { liked: bool },
    Refresh,
}

struct ViewState {
    activity: PostActivity,
    thread: CommentThread,
    load: LoadState,
    connection: ConnectionState,
    liked: bool,
    // liked state before the optimistic change of an in-flight like request
    like_before: Option<bool>,
    // the server replaced the like count since the last like request
    like_count_replaced: bool,
    // events received while loading, applied on top of the fetched state
    pending: VecDeque<ActivityEvent>,
}

impl ViewState {
    fn new(post_id: PostId, config: &Config) -> ViewState {
        ViewState {
            activity: PostActivity::new(post_id, config.echo_window),
            thread: CommentThread::new(config.emphasis_duration, config.removal_delay),
            load: LoadState::Loading,
            connection: ConnectionState::Disconnected,
            liked: false,
            like_before: None,
            like_count_replaced: false,
            pending: VecDeque::new(),
        }
    }

    fn snapshot(&self) -> PostSnapshot {
        PostSnapshot {
            post_id: self.activity.post_id().clone(),
            load: self.load.clone(),
            connection: self.connection,
            like_count: self.activity.like_count(),
            liked: self.liked,
            comments: self.thread.view(),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.thread.next_deadline(), self.activity.next_echo_expiry()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn advance(&mut self, now: Instant) {
        self.activity.expire_echoes(now);
        self.thread.advance(now);
    }

    fn on_hydrated(&mut self, res: Result<(Vec<Comment>, LikeStatus), Error>, now: Instant) {
        match res {
            Ok((comments, likes)) => {
                tracing::debug!(post = %self.activity.post_id().0, comments = comments.len(), "hydrated post view");
                self.activity.hydrate(comments, likes.like_count);
                self.like_count_replaced = true;
                if self.like_before.is_none() {
                    self.liked = likes.liked;
                }
                self.thread.reset(self.activity.comments());
                self.load = LoadState::Ready;
                while let Some(evt) = self.pending.pop_front() {
                    self.apply_event(evt, now);
                }
            }
            Err(err) => {
                tracing::warn!(?err, post = %self.activity.post_id().0, "failed loading post activity");
                self.load = LoadState::Failed(err.user_message());
                self.pending.clear();
            }
        }
    }

    fn on_event(&mut self, evt: ActivityEvent, now: Instant) {
        match self.load {
            LoadState::Loading => self.pending.push_back(evt),
            LoadState::Ready => self.apply_event(evt, now),
            LoadState::Failed(_) => {
                tracing::debug!(?evt, "ignoring activity on a post that failed loading")
            }
        }
    }

    fn apply_event(&mut self, evt: ActivityEvent, now: Instant) {
        if let ActivityEvent::LikeUpdate { .. } = evt {
            self.like_count_replaced = true;
        }
        let change = self.activity.apply_event(evt, now);
        tracing::trace!(?change, "applied activity event");
        self.thread.apply(&change, now);
    }

    fn on_command(&mut self, cmd: Command, now: Instant) {
        match cmd {
            Command::MarkLocal(id) => self.activity.mark_local(id, now),
            Command::Created(c) => {
                let change = self.activity.append_local(c, now);
                self.thread.apply(&change, now);
            }
            Command::Edited(c) => {
                let change = self.activity.replace_local(c, now);
                self.thread.apply(&change, now);
            }
            Command::Deleted(id) => {
                let change = self.activity.remove_local(id);
                self.thread.apply(&change, now);
            }
            Command::LikeRequested { liked } => {
                if self.liked != liked {
                    self.like_before = Some(self.liked);
                    self.like_count_replaced = false;
                    self.liked = liked;
                    self.shift_like_count(liked);
                }
            }
            Command::LikeSettled { liked, like_count } => {
                self.like_before = None;
                self.liked = liked;
                if !self.like_count_replaced {
                    self.activity.set_like_count(like_count);
                }
            }
            Command::LikeFailed { liked } => {
                if let Some(before) = self.like_before.take() {
                    if self.liked == liked {
                        self.liked = before;
                        if !self.like_count_replaced {
                            self.shift_like_count(before);
                        }
                    }
                }
            }
            Command::Refresh => self.load = LoadState::Loading,
        }
    }

    fn shift_like_count(&mut self, up: bool) {
        let count = self.activity.like_count();
        self.activity.set_like_count(match up {
            true => count + 1,
            false => count.saturating_sub(1),
        });
    }
}

type Hydration = BoxFuture<'static, Result<(Vec<Comment>, LikeStatus), Error>>;

fn hydrate(rest: Arc<dyn Rest>, post: PostId, user: UserId) -> Hydration {
    async move {
        futures::try_join!(
            rest.fetch_comments(&post),
            rest.fetch_like_status(&post, &user)
        )
    }
    .boxed()
}

async fn pending_hydration(h: &mut Option<Hydration>) -> Result<(Vec<Comment>, LikeStatus), Error> {
    match h {
        Some(h) => h.await,
        None => std::future::pending().await,
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn run(
    mut state: ViewState,
    mut feed: ActivityFeed,
    mut connection: watch::Receiver<ConnectionState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshot: watch::Sender<PostSnapshot>,
    rest: Arc<dyn Rest>,
    user: UserId,
) {
    let post = state.activity.post_id().clone();
    let mut hydration = Some(hydrate(rest.clone(), post.clone(), user.clone()));
    let mut connection_alive = true;
    state.connection = *connection.borrow();
    snapshot.send_replace(state.snapshot());
    loop {
        let deadline = state.next_deadline();
        // local confirmations go first, so that their echoes find them
        tokio::select! {
            biased;
            cmd = commands.recv() => match cmd {
                None => break,
                Some(Command::Refresh) => {
                    hydration = Some(hydrate(rest.clone(), post.clone(), user.clone()));
                    state.on_command(Command::Refresh, now());
                }
                Some(cmd) => state.on_command(cmd, now()),
            },
            res = pending_hydration(&mut hydration) => {
                hydration = None;
                state.on_hydrated(res, now());
            }
            evt = feed.next() => match evt {
                Some(evt) => state.on_event(evt, now()),
                None => {
                    tracing::debug!(post = %post.0, "activity feed ended");
                    break;
                }
            },
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline.unwrap_or_else(now))), if deadline.is_some() => {
                state.advance(now());
            }
            res = connection.changed(), if connection_alive => match res {
                Ok(()) => state.connection = *connection.borrow(),
                Err(_) => connection_alive = false,
            },
        }
        snapshot.send_replace(state.snapshot());
    }
}

/// Live view of one post: comments and likes, kept up to date from the
/// post's activity topic, and the actions the current user can take on it.
///
/// The view lives until `close` is called or it is dropped. Afterwards no
/// more updates happen, and answers to requests still in flight are ignored.
pub struct PostView {
    post_id: PostId,
    user: UserId,
    rest: Arc<dyn Rest>,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<PostSnapshot>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PostView {
    pub fn open(
        post_id: PostId,
        user: UserId,
        channel: &ActivityChannel,
        rest: Arc<dyn Rest>,
        config: &Config,
    ) -> PostView {
        let feed = channel.subscribe(&post_id);
        let state = ViewState::new(post_id.clone(), config);
        let (snapshot_sender, snapshot) = watch::channel(state.snapshot());
        let (commands, command_receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(
            state,
            feed,
            channel.hub().state(),
            command_receiver,
            snapshot_sender,
            rest.clone(),
            user.clone(),
        ));
        PostView {
            post_id,
            user,
            rest,
            commands,
            snapshot,
            task: Some(task),
        }
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn snapshot(&self) -> PostSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on each change of the snapshot
    pub fn watch(&self) -> watch::Receiver<PostSnapshot> {
        self.snapshot.clone()
    }

    /// Fetch the post's comments and likes again
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub async fn add_comment(&self, text: &str) -> Result<Comment, Error> {
        self.check_open()?;
        api::validate_comment_text(text)?;
        let comment = self.rest.add_comment(&self.post_id, &self.user, text).await?;
        self.send(Command::Created(comment.clone()));
        Ok(comment)
    }

    pub async fn edit_comment(&self, id: &CommentId, text: &str) -> Result<Comment, Error> {
        self.check_open()?;
        api::validate_comment_text(text)?;
        self.send(Command::MarkLocal(id.clone()));
        let comment = self.rest.edit_comment(id, &self.user, text).await?;
        self.send(Command::Edited(comment.clone()));
        Ok(comment)
    }

    pub async fn delete_comment(&self, id: &CommentId) -> Result<(), Error> {
        self.check_open()?;
        self.rest.delete_comment(id, &self.user).await?;
        self.send(Command::Deleted(id.clone()));
        Ok(())
    }

    /// Returns the like count confirmed by the server
    pub async fn like(&self) -> Result<u64, Error> {
        self.set_liked(true).await
    }

    pub async fn unlike(&self) -> Result<u64, Error> {
        self.set_liked(false).await
    }

    async fn set_liked(&self, liked: bool) -> Result<u64, Error> {
        self.check_open()?;
        self.send(Command::LikeRequested { liked });
        let res = match liked {
            true => self.rest.like(&self.post_id, &self.user).await,
            false => self.rest.unlike(&self.post_id, &self.user).await,
        };
        match res {
            Ok(like_count) => {
                self.send(Command::LikeSettled { liked, like_count });
                Ok(like_count)
            }
            Err(err) => {
                self.send(Command::LikeFailed { liked });
                Err(err)
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(post = %self.post_id.0, "closed post view");
        }
    }

    fn check_open(&self) -> Result<(), Error> {
        match self.task {
            Some(_) => Ok(()),
            None => Err(Error::ViewClosed),
        }
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            tracing::debug!(post = %self.post_id.0, "post view is gone, dropping local update");
        }
    }
}

impl Drop for PostView {
    fn drop(&mut self) {
        self.close();
    }
}
