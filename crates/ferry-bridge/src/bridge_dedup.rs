//! Bounded FIFO cache of recently processed event ids.
//!
//! The source platform re-delivers webhook events on retry, so every event id
//! passes through here before any other work happens. The whole
//! check-then-insert runs under one lock: two concurrent deliveries of the
//! same re-sent id cannot both pass the membership check.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

pub const DEDUP_CACHE_DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct DedupCacheInner {
    order: VecDeque<String>,
    members: HashSet<String>,
}

/// Bounded FIFO set of recently seen event ids.
///
/// Eviction is strict FIFO; an id evicted after `capacity` newer ids is
/// forgotten and a later redelivery of it will be reprocessed. That bounded
/// false-negative window is accepted.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    inner: Mutex<DedupCacheInner>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(DedupCacheInner::default()),
        }
    }

    /// Returns `true` and leaves the cache unchanged when `event_id` is
    /// already recorded; otherwise records it (evicting the oldest entry at
    /// capacity) and returns `false`.
    pub fn seen_or_record(&self, event_id: &str) -> bool {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if inner.members.contains(event_id) {
            return true;
        }
        if inner.order.len() >= self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.members.remove(&evicted);
            }
        }
        inner.order.push_back(event_id.to_string());
        inner.members.insert(event_id.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEDUP_CACHE_DEFAULT_CAPACITY)
    }
}
