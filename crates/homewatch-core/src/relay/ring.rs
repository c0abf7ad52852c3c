// ── Bounded event history ──

use std::collections::VecDeque;

use homewatch_api::Event;

/// Events retained by default.
pub const DEFAULT_CAPACITY: usize = 100;

/// Events returned by a recent-events query that names no limit.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Most-recent-first event store with head insertion and tail eviction.
///
/// Arrival order is recency order: the last appended event is always at
/// index 0.
#[derive(Debug, Clone)]
pub struct EventRing {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventRing {
    /// A ring holding at most `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head, evicting the oldest events beyond capacity.
    pub fn append(&mut self, event: Event) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        self.events.iter().take(limit).cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
