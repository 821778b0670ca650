//! Domain telemetry: classified log entries buffered for batched delivery.
//!
//! Entries are captured at the moment of the event they describe and held
//! in a bounded buffer until the dispatcher's flush arm drains them to the
//! external bus. When the buffer is full the oldest entry is dropped; the
//! drop-oldest policy keeps the freshest telemetry under sustained overload.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Classification tag for a domain log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainLogKind {
    StateSnapshot,
    JourneyDispatched,
    JourneyFinished,
    TruckNotFound,
}

impl DomainLogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DomainLogKind::StateSnapshot => "state_snapshot",
            DomainLogKind::JourneyDispatched => "journey_dispatched",
            DomainLogKind::JourneyFinished => "journey_finished",
            DomainLogKind::TruckNotFound => "truck_not_found",
        }
    }
}

/// A classified, timestamped telemetry record. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct DomainLog {
    pub kind: DomainLogKind,
    pub data: Value,
    pub timestamp_ms: i64,
}

impl DomainLog {
    /// Capture an entry now, stamping it with the current wall-clock time.
    pub fn new(kind: DomainLogKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Bounded buffer between log producers and the periodic flush.
#[derive(Debug)]
pub struct DomainLogBuffer {
    entries: Mutex<VecDeque<DomainLog>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl DomainLogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue an entry, evicting the oldest one if the buffer is full.
    pub fn push(&self, log: DomainLog) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped_total = dropped, "domain log buffer full, dropped oldest entry");
        }
        entries.push_back(log);
    }

    /// Take every queued entry, oldest first.
    pub fn drain(&self) -> Vec<DomainLog> {
        self.entries.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Total entries evicted since construction.
    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
