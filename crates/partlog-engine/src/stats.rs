//! Per-log counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of a log's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemLogStats {
    /// Records accepted into the buffer
    pub pushed: u64,
    /// Records dropped because the buffer was full
    pub dropped_overflow: u64,
    /// Records emitted while the log is disabled
    pub dropped_disabled: u64,
    /// Records dropped with a failed or timed-out flush
    pub dropped_failed: u64,
    /// Records written to the destination table
    pub flushed_rows: u64,
    /// Successful batch inserts
    pub flushes: u64,
    /// Failed batch inserts
    pub failed_flushes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LogCounters {
    pub pushed: AtomicU64,
    pub dropped_overflow: AtomicU64,
    pub dropped_failed: AtomicU64,
    pub flushed_rows: AtomicU64,
    pub flushes: AtomicU64,
    pub failed_flushes: AtomicU64,
}

impl LogCounters {
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SystemLogStats {
        SystemLogStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            // Disabled kinds have no counters of their own; the registry fills this in
            dropped_disabled: 0,
            dropped_failed: self.dropped_failed.load(Ordering::Relaxed),
            flushed_rows: self.flushed_rows.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }
}
