//! Process-wide id generator for providers and log entries

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id sequence, never hands out the same id twice
#[derive(Debug, Default)]
pub struct IdSequence {
    last: AtomicU64,
}

impl IdSequence {
    /// Continue after the highest id already in use
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Next unused id
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }
}
