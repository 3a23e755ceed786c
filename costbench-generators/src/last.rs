use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "nothing recorded yet". Generated values never reach `u64::MAX`.
const NONE: u64 = u64::MAX;

/// The most recent value of a generator, readable from any thread.
#[derive(Debug)]
pub(crate) struct LastValue(AtomicU64);

impl LastValue {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(NONE))
    }

    pub(crate) fn store(&self, value: u64) {
        self.0.store(value, Ordering::Release);
    }

    pub(crate) fn load(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            NONE => None,
            value => Some(value),
        }
    }
}

impl Default for LastValue {
    fn default() -> Self {
        Self::new()
    }
}
