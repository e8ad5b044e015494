use std::time::{Duration, Instant};

use crate::{
    api::{Comment, CommentId},
    mention::{self, Segment},
    Change,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Emphasis {
    New,
    Updated,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Stable,
    Emphasized { kind: Emphasis, until: Instant },
    Removing { until: Instant },
}

#[derive(Clone, Debug)]
struct Entry {
    comment: Comment,
    phase: Phase,
}

/// One comment, as it should currently be displayed
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentView {
    pub comment: Comment,
    pub is_new: bool,
    pub is_updated: bool,
    /// Deleted, fading out before disappearing
    pub removing: bool,
    pub segments: Vec<Segment>,
}

/// Display state of a post's comments.
///
/// Every comment carries its own timers: highlighting a new comment or
/// fading out a deleted one never touches the others.
#[derive(Clone, Debug)]
pub struct CommentThread {
    emphasis: Duration,
    removal: Duration,
    entries: Vec<Entry>,
}

impl CommentThread {
    pub fn new(emphasis: Duration, removal: Duration) -> CommentThread {
        CommentThread {
            emphasis,
            removal,
            entries: Vec::new(),
        }
    }

    /// Display `comments`, none of them highlighted
    pub fn reset(&mut self, comments: &[Comment]) {
        self.entries = comments
            .iter()
            .map(|c| Entry {
                comment: c.clone(),
                phase: Phase::Stable,
            })
            .collect();
    }

    pub fn apply(&mut self, change: &Change, now: Instant) {
        match change {
            Change::Created(c) => self.emphasize(c, Emphasis::New, now),
            Change::Updated(c) => self.emphasize(c, Emphasis::Updated, now),
            Change::Refreshed(c) => match self.live_entry_mut(&c.id) {
                Some(e) => e.comment = c.clone(),
                None => self.entries.push(Entry {
                    comment: c.clone(),
                    phase: Phase::Stable,
                }),
            },
            Change::Deleted(id) => {
                self.begin_removal(id, now);
            }
            Change::LikeCount(_) | Change::Suppressed(_) | Change::Unchanged => (),
        }
    }

    /// Start fading `id` out, returns false if it was not displayed or is
    /// already fading out
    pub fn begin_removal(&mut self, id: &CommentId, now: Instant) -> bool {
        let until = now + self.removal;
        match self.entry_mut(id) {
            Some(e) if !matches!(e.phase, Phase::Removing { .. }) => {
                e.phase = Phase::Removing { until };
                true
            }
            _ => false,
        }
    }

    /// Let time pass, returns true iff the display changed
    pub fn advance(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for e in self.entries.iter_mut() {
            if let Phase::Emphasized { until, .. } = e.phase {
                if until <= now {
                    e.phase = Phase::Stable;
                    changed = true;
                }
            }
        }
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e.phase, Phase::Removing { until } if until <= now));
        changed || before != self.entries.len()
    }

    /// Next instant at which `advance` will have something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|e| match e.phase {
                Phase::Stable => None,
                Phase::Emphasized { until, .. } | Phase::Removing { until } => Some(until),
            })
            .min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn view(&self) -> Vec<CommentView> {
        self.entries
            .iter()
            .map(|e| CommentView {
                comment: e.comment.clone(),
                is_new: matches!(e.phase, Phase::Emphasized { kind: Emphasis::New, .. }),
                is_updated: matches!(
                    e.phase,
                    Phase::Emphasized {
                        kind: Emphasis::Updated,
                        ..
                    }
                ),
                removing: matches!(e.phase, Phase::Removing { .. }),
                segments: mention::segments(&e.comment.text),
            })
            .collect()
    }

    fn emphasize(&mut self, comment: &Comment, kind: Emphasis, now: Instant) {
        let phase = Phase::Emphasized {
            kind,
            until: now + self.emphasis,
        };
        match self.live_entry_mut(&comment.id) {
            Some(e) => {
                e.comment = comment.clone();
                e.phase = phase;
            }
            None => self.entries.push(Entry {
                comment: comment.clone(),
                phase,
            }),
        }
    }

    fn entry_mut(&mut self, id: &CommentId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.comment.id == *id)
    }

    /// Entry for `id` unless it is fading out. A fading entry is dropped, so
    /// that a comment coming back is displayed last, where the post's
    /// comment list has it.
    fn live_entry_mut(&mut self, id: &CommentId) -> Option<&mut Entry> {
        self.entries
            .retain(|e| !(e.comment.id == *id && matches!(e.phase, Phase::Removing { .. })));
        self.entry_mut(id)
    }
}
