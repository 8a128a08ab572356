//! Time-ordered event queue with deterministic tie-breaking.
//!
//! Events are bucketed by nanosecond timestamp. Buckets drain in ascending
//! key order; inside a bucket, market data and quotes go first, then
//! fills, then acknowledgements, and events of equal kind keep their
//! insertion order. Two identical input sequences therefore always replay
//! identically.

use std::collections::BTreeMap;

use crate::model::event::Event;

/// Pre-run event queue. Frozen once the kernel starts draining it.
#[derive(Debug, Default)]
pub struct EventQueue {
    buckets: BTreeMap<u64, Vec<Event>>,
    len: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.buckets.entry(event.ts_ns()).or_default().push(event);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first_ts(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    pub fn last_ts(&self) -> Option<u64> {
        self.buckets.keys().next_back().copied()
    }

    /// Drain into `(timestamp, sorted bucket)` pairs in replay order.
    ///
    /// The per-bucket sort is stable on kind priority, which preserves
    /// insertion order within a kind.
    pub fn into_buckets(self) -> impl Iterator<Item = (u64, Vec<Event>)> {
        self.buckets.into_iter().map(|(ts, mut events)| {
            events.sort_by_key(|e| e.kind().priority());
            (ts, events)
        })
    }
}
