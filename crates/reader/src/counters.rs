//! Reader counters

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Reader metrics
///
/// Shared between the reader handle and its producer task.
#[derive(Debug, Default)]
pub struct ReaderMetrics {
    /// Entries pushed onto the channel
    pub entries_read: AtomicU64,

    /// Lines or frames that could not be decoded
    pub parse_errors: AtomicU64,

    /// Source position after the last pushed entry
    pub offset: AtomicI64,

    /// Source exhausted
    pub finished: AtomicBool,
}

impl ReaderMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record entry pushed
    pub fn record_read(&self) {
        self.entries_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Record parse error
    pub fn record_parse_error(&self, reader: &'static str) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("redis_syncer_reader_parse_errors_total", "reader" => reader)
            .increment(1);
    }

    /// Update source position
    pub fn set_offset(&self, offset: i64) {
        self.offset.store(offset, Ordering::Relaxed);
    }

    /// Mark source exhausted
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_read: self.entries_read.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            offset: self.offset.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub entries_read: u64,
    pub parse_errors: u64,
    pub offset: i64,
    pub finished: bool,
}
