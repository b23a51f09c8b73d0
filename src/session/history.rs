//! Selection history over open sessions
//!
//! Two orderings are kept side by side:
//! - the recency list, most recently selected first, used for eviction and
//!   the recent views list
//! - the trail, a browser-style back/forward stack with a cursor

use super::SessionId;

/// A session reference with the rank of its last selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: SessionId,
    pub rank: u64,
}

#[derive(Debug, Default)]
pub struct History {
    recent: Vec<HistoryEntry>,
    trail: Vec<SessionId>,
    cursor: usize,
    next_rank: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection made by the user: promote `id` and push it on the trail,
    /// dropping anything ahead of the cursor.
    pub fn record_selection(&mut self, id: SessionId) {
        self.promote(id);

        if self.trail.get(self.cursor) == Some(&id) {
            return;
        }
        if !self.trail.is_empty() {
            self.trail.truncate(self.cursor + 1);
        }
        self.trail.push(id);
        self.cursor = self.trail.len() - 1;
    }

    /// Drop every entry referencing `id`
    pub fn remove(&mut self, id: SessionId) {
        self.recent.retain(|e| e.id != id);

        let mut kept: Vec<SessionId> = Vec::with_capacity(self.trail.len());
        let mut cursor = 0;
        for (i, &entry) in self.trail.iter().enumerate() {
            if entry == id {
                continue;
            }
            if kept.last() != Some(&entry) {
                kept.push(entry);
            }
            if i <= self.cursor {
                cursor = kept.len() - 1;
            }
        }
        self.trail = kept;
        self.cursor = cursor;
    }

    pub fn can_go_backward(&self) -> bool {
        !self.trail.is_empty() && self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.trail.len()
    }

    /// Where `go_backward` would land, without moving
    pub fn backward_target(&self) -> Option<SessionId> {
        if self.can_go_backward() {
            self.trail.get(self.cursor - 1).copied()
        } else {
            None
        }
    }

    /// Where `go_forward` would land, without moving
    pub fn forward_target(&self) -> Option<SessionId> {
        if self.can_go_forward() {
            self.trail.get(self.cursor + 1).copied()
        } else {
            None
        }
    }

    pub fn go_backward(&mut self) -> Option<SessionId> {
        let id = self.backward_target()?;
        self.cursor -= 1;
        self.promote(id);
        Some(id)
    }

    pub fn go_forward(&mut self) -> Option<SessionId> {
        let id = self.forward_target()?;
        self.cursor += 1;
        self.promote(id);
        Some(id)
    }

    /// Tail of the recency list, skipping `excluding`
    pub fn least_recently_used(&self, excluding: Option<SessionId>) -> Option<HistoryEntry> {
        self.recent
            .iter()
            .rev()
            .find(|e| Some(e.id) != excluding)
            .copied()
    }

    /// Session ids, most recently selected first
    pub fn mru(&self) -> Vec<SessionId> {
        self.recent.iter().map(|e| e.id).collect()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
        self.trail.clear();
        self.cursor = 0;
    }

    fn promote(&mut self, id: SessionId) {
        self.recent.retain(|e| e.id != id);
        let rank = self.next_rank;
        self.next_rank += 1;
        self.recent.insert(0, HistoryEntry { id, rank });
    }
}
