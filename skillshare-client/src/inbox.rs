use std::collections::HashSet;

use crate::api::{NotificationId, NotificationItem};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InboxChange {
    Added(NotificationItem),
    Replaced(NotificationItem),
    Unchanged,
}

/// A user's notifications, newest first, and their unread counter.
///
/// The unread counter is the last count fetched from the server plus the
/// adjustments made by pushes and actions since then, so that a late
/// answer to the count request does not erase pushes that arrived before it.
#[derive(Clone, Debug, Default)]
pub struct NotificationInbox {
    items: Vec<NotificationItem>,
    baseline: u64,
    delta: i64,
    // bumped when the counter is reset, counts requested before are stale
    generation: u64,
    // pushed since the last hydration, kept if the fetched list misses them
    pushed: HashSet<NotificationId>,
}

impl NotificationInbox {
    pub fn new() -> NotificationInbox {
        NotificationInbox::default()
    }

    pub fn items(&self) -> &[NotificationItem] {
        &self.items
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationItem> {
        self.items.iter().find(|n| n.id == *id)
    }

    pub fn unread_count(&self) -> u64 {
        u64::try_from(i128::from(self.baseline) + i128::from(self.delta)).unwrap_or(0)
    }

    /// Replace the list with freshly fetched notifications. The unread counter
    /// is left alone, it has its own source.
    pub fn hydrate_items(&mut self, mut fetched: Vec<NotificationItem>) {
        let fetched_ids: HashSet<NotificationId> = fetched.iter().map(|n| n.id.clone()).collect();
        let pushed = std::mem::take(&mut self.pushed);
        fetched.extend(
            self.items
                .drain(..)
                .filter(|n| pushed.contains(&n.id) && !fetched_ids.contains(&n.id)),
        );
        fetched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.items = fetched;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Set the count fetched from the server, unless the counter was reset
    /// since `generation` was read when requesting it. Returns whether the
    /// count was used.
    pub fn hydrate_unread(&mut self, count: u64, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.baseline = count;
        true
    }

    /// Forget the adjustments made so far, ahead of a new count request: the
    /// server's answer will include them. Until it comes, the counter keeps
    /// its current value.
    pub fn rebase(&mut self) {
        self.baseline = self.unread_count();
        self.delta = 0;
    }

    pub fn push(&mut self, item: NotificationItem) -> InboxChange {
        self.pushed.insert(item.id.clone());
        match self.items.iter_mut().find(|n| n.id == item.id) {
            Some(n) if *n == item => InboxChange::Unchanged,
            Some(n) => {
                match (n.read, item.read) {
                    (false, true) => self.delta -= 1,
                    (true, false) => self.delta += 1,
                    _ => (),
                }
                *n = item.clone();
                InboxChange::Replaced(item)
            }
            None => {
                if !item.read {
                    self.delta += 1;
                }
                self.items.insert(0, item.clone());
                InboxChange::Added(item)
            }
        }
    }

    /// Returns false if nothing changed
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        self.set_read(id, true)
    }

    pub fn mark_unread(&mut self, id: &NotificationId) -> bool {
        self.set_read(id, false)
    }

    pub fn mark_all_read(&mut self) {
        for n in self.items.iter_mut() {
            n.read = true;
        }
        self.baseline = 0;
        self.delta = 0;
        self.generation += 1;
    }

    pub fn delete(&mut self, id: &NotificationId) -> Option<NotificationItem> {
        let pos = self.items.iter().position(|n| n.id == *id)?;
        let item = self.items.remove(pos);
        if !item.read {
            self.delta -= 1;
        }
        Some(item)
    }

    fn set_read(&mut self, id: &NotificationId, read: bool) -> bool {
        match self.items.iter_mut().find(|n| n.id == *id) {
            Some(n) if n.read != read => {
                n.read = read;
                self.delta += if read { -1 } else { 1 };
                true
            }
            _ => false,
        }
    }
}
