use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::api::CommentId;

/// Comments this client itself just created or edited, so that the server's
/// echo of the same event is not rendered a second time.
///
/// Entries stop suppressing once their window is over, so that later edits to
/// the same comment coming from elsewhere are shown normally.
#[derive(Clone, Debug)]
pub struct LocalEchoSet {
    window: Duration,
    // comment -> instant at which it stops being considered local
    entries: HashMap<CommentId, Instant>,
}

impl LocalEchoSet {
    pub fn new(window: Duration) -> LocalEchoSet {
        LocalEchoSet {
            window,
            entries: HashMap::new(),
        }
    }

    pub fn mark_local(&mut self, id: CommentId, now: Instant) {
        self.entries.insert(id, now + self.window);
    }

    pub fn is_local(&self, id: &CommentId, now: Instant) -> bool {
        matches!(self.entries.get(id), Some(until) if now < *until)
    }

    /// Forget entries whose window is over, returning how many were dropped
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, until| now < *until);
        before - self.entries.len()
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
