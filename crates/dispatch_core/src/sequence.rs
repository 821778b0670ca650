//! Monotonic id generation.
//!
//! Each component that mints ids (the dispatcher for journeys, the HTTP
//! boundary for requests) owns its own `Sequence` instead of sharing a
//! process-wide counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// An atomic monotonic counter starting at zero.
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next id. Ids are unique and strictly increasing per sequence.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
