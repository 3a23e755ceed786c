//! Insert sequences.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::last::LastValue;

/// Hands out successive integers starting at a configured seed.
///
/// Increments are atomic, so a counter can be shared freely between worker threads. Every value
/// is handed out exactly once.
#[derive(Debug)]
pub struct CounterGenerator {
    start: u64,
    next: AtomicU64,
}

impl CounterGenerator {
    /// Creates a counter whose first value is `start`.
    pub fn new(start: u64) -> Self {
        Self {
            start,
            next: AtomicU64::new(start),
        }
    }

    /// The first value of this counter.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Returns the next value and advances the counter.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    /// Returns the value most recently handed out by [`next`](Self::next).
    pub fn last(&self) -> Option<u64> {
        let next = self.next.load(Ordering::Acquire);
        (next > self.start).then(|| next - 1)
    }
}

/// A [`CounterGenerator`] that additionally tracks which values have been durably used.
///
/// Inserts draw an id with [`next`](Self::next) and call [`acknowledge`](Self::acknowledge)
/// once the store write for that id has returned. [`last`](Self::last) is the highest id such
/// that it and every id before it were acknowledged, so readers never observe an id whose write
/// is still in flight on another thread.
#[derive(Debug)]
pub struct AcknowledgedCounter {
    counter: CounterGenerator,
    pending: Mutex<BTreeSet<u64>>,
    limit: LastValue,
}

impl AcknowledgedCounter {
    /// Creates a counter whose first value is `start`.
    pub fn new(start: u64) -> Self {
        Self {
            counter: CounterGenerator::new(start),
            pending: Mutex::new(BTreeSet::new()),
            limit: LastValue::new(),
        }
    }

    /// Creates a counter that treats every id below `start` as already acknowledged.
    ///
    /// This models a key space that was populated by an earlier load.
    #[cfg(test)]
    pub(crate) fn preloaded(start: u64) -> Self {
        let counter = Self::new(start);
        if let Some(limit) = start.checked_sub(1) {
            counter.limit.store(limit);
        }
        counter
    }

    /// Returns the next id and advances the counter.
    pub fn next(&self) -> u64 {
        self.counter.next()
    }

    /// The id most recently handed out, acknowledged or not.
    pub fn last_issued(&self) -> Option<u64> {
        self.counter.last()
    }

    /// Marks `id` as durably used.
    pub fn acknowledge(&self, id: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.insert(id);

        let mut limit = self.limit.load();
        loop {
            let candidate = match limit {
                Some(limit) => limit + 1,
                None => self.counter.start(),
            };
            if !pending.remove(&candidate) {
                break;
            }
            limit = Some(candidate);
        }

        // Ids at or below an inherited limit can never advance it; drop them.
        if let Some(limit) = limit {
            while pending.first().is_some_and(|first| *first <= limit) {
                pending.pop_first();
            }
            self.limit.store(limit);
        }
    }

    /// The highest id below which every id has been acknowledged.
    pub fn last(&self) -> Option<u64> {
        self.limit.load()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn counter_hands_out_successive_values() {
        let counter = CounterGenerator::new(5);
        assert_eq!(counter.last(), None);
        assert_eq!(counter.next(), 5);
        assert_eq!(counter.next(), 6);
        assert_eq!(counter.last(), Some(6));
    }

    #[test]
    fn counter_is_unique_across_threads() {
        let counter = Arc::new(CounterGenerator::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || (0..1000).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut values: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        values.sort_unstable();
        values.dedup();

        assert_eq!(values.len(), 4000);
        assert_eq!(counter.last(), Some(3999));
    }

    #[test]
    fn acknowledged_waits_for_gaps() {
        let counter = AcknowledgedCounter::new(10);
        let a = counter.next();
        let b = counter.next();
        let c = counter.next();
        assert_eq!(counter.last_issued(), Some(12));
        assert_eq!(counter.last(), None);

        counter.acknowledge(c);
        assert_eq!(counter.last(), None);

        counter.acknowledge(a);
        assert_eq!(counter.last(), Some(10));

        counter.acknowledge(b);
        assert_eq!(counter.last(), Some(12));
    }

    #[test]
    fn preloaded_starts_with_limit() {
        let counter = AcknowledgedCounter::preloaded(100);
        assert_eq!(counter.last(), Some(99));

        let id = counter.next();
        assert_eq!(id, 100);
        assert_eq!(counter.last(), Some(99));

        counter.acknowledge(id);
        assert_eq!(counter.last(), Some(100));

        let empty = AcknowledgedCounter::preloaded(0);
        assert_eq!(empty.last(), None);
    }
}
