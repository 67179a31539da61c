//! # Processed-Event Deduplicator
//!
//! Bounded set of [`ProcessedEventKey`]s with an atomic check-then-insert.
//!
//! When the set grows past its capacity it is truncated to the newest
//! `capacity / 2` keys, so an old duplicate may slip through after heavy
//! traffic. The store's own idempotency covers that window.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

use crate::domain::ProcessedEventKey;

struct Inner {
    seen: HashSet<ProcessedEventKey>,
    order: VecDeque<ProcessedEventKey>,
}

/// Thread-safe dedup cache shared by all in-flight notifications.
pub struct Deduplicator {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Deduplicator {
    /// Create a cache holding at most `capacity` keys (minimum 2).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            inner: Mutex::new(Inner {
                seen: HashSet::with_capacity(capacity + 1),
                order: VecDeque::with_capacity(capacity + 1),
            }),
            capacity,
        }
    }

    /// Returns `true` exactly once per key, and records it.
    pub fn should_process(&self, key: &ProcessedEventKey) -> bool {
        let mut inner = self.inner.lock();
        if !inner.seen.insert(key.clone()) {
            return false;
        }
        inner.order.push_back(key.clone());

        if inner.order.len() > self.capacity {
            let keep = self.capacity / 2;
            while inner.order.len() > keep {
                if let Some(old) = inner.order.pop_front() {
                    inner.seen.remove(&old);
                }
            }
        }
        true
    }

    /// Drop `key` so a later sighting is processed again. Used when the
    /// write it guarded failed.
    pub fn forget(&self, key: &ProcessedEventKey) {
        let mut inner = self.inner.lock();
        if inner.seen.remove(key) {
            inner.order.retain(|k| k != key);
        }
    }

    /// Whether `key` is currently remembered.
    pub fn contains(&self, key: &ProcessedEventKey) -> bool {
        self.inner.lock().seen.contains(key)
    }

    /// Number of remembered keys.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
