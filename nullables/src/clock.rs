//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use datt_types::Timestamp;

/// A deterministic millisecond clock.
///
/// Time only advances when you tell it to.
pub struct NullClock {
    current: AtomicU64,
}

impl NullClock {
    pub fn new(initial_millis: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_millis),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.current.load(Ordering::SeqCst))
    }

    pub fn advance(&self, millis: u64) {
        self.current.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.current.store(millis, Ordering::SeqCst);
    }

    /// Current time, then advance by `millis`.
    pub fn tick(&self, millis: u64) -> Timestamp {
        Timestamp::from_millis(self.current.fetch_add(millis, Ordering::SeqCst))
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::new(0)
    }
}
