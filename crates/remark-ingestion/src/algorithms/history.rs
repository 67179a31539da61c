//! Bounded newest-first history of observed events.

use parking_lot::RwLock;
use std::collections::VecDeque;

/// Newest-first list capped at a fixed length.
pub struct RingHistory<T> {
    entries: RwLock<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> RingHistory<T> {
    /// Create a history keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Prepend an entry, dropping the oldest beyond capacity.
    pub fn push(&self, entry: T) {
        let mut entries = self.entries.write();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Copy of the current entries, newest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().iter().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
