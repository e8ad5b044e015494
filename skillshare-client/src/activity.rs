use std::time::{Duration, Instant};

use crate::{
    api::{ActivityEvent, Comment, CommentId, PostId},
    LocalEchoSet,
};

/// What applying an event did to the aggregated state
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Change {
    LikeCount(u64),
    Created(Comment),
    Updated(Comment),
    /// Content replaced by the echo of an edit this client made itself
    Refreshed(Comment),
    Deleted(CommentId),
    /// Echo of a comment this client created itself, already displayed
    Suppressed(CommentId),
    Unchanged,
}

/// Live state of one post: its comments, in arrival order, and like count.
///
/// Comments are keyed by their server-assigned id: applying the same event
/// twice, or a creation after the comment is already known, changes nothing.
#[derive(Clone, Debug)]
pub struct PostActivity {
    post_id: PostId,
    like_count: u64,
    comments: Vec<Comment>,
    echoes: LocalEchoSet,
}

impl PostActivity {
    pub fn new(post_id: PostId, echo_window: Duration) -> PostActivity {
        PostActivity {
            post_id,
            like_count: 0,
            comments: Vec::new(),
            echoes: LocalEchoSet::new(echo_window),
        }
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn like_count(&self) -> u64 {
        self.like_count
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == *id)
    }

    /// Replace the whole state with freshly fetched data.
    ///
    /// The local echo set is kept: a request issued just before the refetch
    /// may still have its echo in flight.
    pub fn hydrate(&mut self, comments: Vec<Comment>, like_count: u64) {
        self.comments.clear();
        for c in comments {
            self.upsert(c);
        }
        self.like_count = like_count;
    }

    pub fn apply_event(&mut self, event: ActivityEvent, now: Instant) -> Change {
        match event {
            ActivityEvent::LikeUpdate { like_count } => {
                if self.like_count == like_count {
                    return Change::Unchanged;
                }
                self.like_count = like_count;
                Change::LikeCount(like_count)
            }
            ActivityEvent::CommentCreated { comment } => self.apply_created(comment, now),
            ActivityEvent::CommentUpdated { comment } => {
                let local = self.echoes.is_local(&comment.id, now);
                match self.comments.iter_mut().find(|c| c.id == comment.id) {
                    None => self.apply_created(comment, now),
                    Some(c) if *c == comment => Change::Unchanged,
                    Some(c) => {
                        *c = comment.clone();
                        match local {
                            true => Change::Refreshed(comment),
                            false => Change::Updated(comment),
                        }
                    }
                }
            }
            ActivityEvent::CommentDeleted { comment_id } => match self.remove(&comment_id) {
                true => Change::Deleted(comment_id),
                false => Change::Unchanged,
            },
        }
    }

    fn apply_created(&mut self, comment: Comment, now: Instant) -> Change {
        if self.echoes.is_local(&comment.id, now) {
            return Change::Suppressed(comment.id);
        }
        if self.comment(&comment.id).is_some() {
            return Change::Unchanged;
        }
        self.comments.push(comment.clone());
        Change::Created(comment)
    }

    /// Record that this client is about to create or edit `id`
    pub fn mark_local(&mut self, id: CommentId, now: Instant) {
        self.echoes.mark_local(id, now);
    }

    /// Insert the server's answer to a comment this client just created
    pub fn append_local(&mut self, comment: Comment, now: Instant) -> Change {
        self.echoes.mark_local(comment.id.clone(), now);
        match self.upsert(comment.clone()) {
            true => Change::Created(comment),
            false => Change::Refreshed(comment),
        }
    }

    /// Insert the server's answer to an edit this client just made
    pub fn replace_local(&mut self, comment: Comment, now: Instant) -> Change {
        self.echoes.mark_local(comment.id.clone(), now);
        self.upsert(comment.clone());
        Change::Updated(comment)
    }

    /// Apply a deletion this client just made
    pub fn remove_local(&mut self, id: CommentId) -> Change {
        match self.remove(&id) {
            true => Change::Deleted(id),
            false => Change::Unchanged,
        }
    }

    pub fn set_like_count(&mut self, like_count: u64) {
        self.like_count = like_count;
    }

    pub fn expire_echoes(&mut self, now: Instant) {
        self.echoes.expire(now);
    }

    pub fn next_echo_expiry(&self) -> Option<Instant> {
        self.echoes.next_expiry()
    }

    // Returns true iff the comment was not known yet
    fn upsert(&mut self, comment: Comment) -> bool {
        match self.comments.iter_mut().find(|c| c.id == comment.id) {
            Some(c) => {
                *c = comment;
                false
            }
            None => {
                self.comments.push(comment);
                true
            }
        }
    }

    fn remove(&mut self, id: &CommentId) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != *id);
        before != self.comments.len()
    }
}
