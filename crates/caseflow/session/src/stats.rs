//! Operation counters and the statistics snapshot

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a session's state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub initialized: bool,
    pub environment: String,
    pub profile: String,
    /// Transactional operations executed
    pub total_operations: u64,
    /// Transactional operations per operation name
    pub operations: BTreeMap<String, u64>,
    /// Lock-protected reads outside a transaction
    pub reads: u64,
    pub cache_enabled: bool,
    pub cache_size: usize,
    pub initialized_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub(crate) struct OperationCounters {
    total: AtomicU64,
    reads: AtomicU64,
    histogram: Mutex<BTreeMap<String, u64>>,
}

impl OperationCounters {
    /// Record an operation, returning its sequence number (1-based)
    pub(crate) fn record_operation(&self, operation: &str) -> u64 {
        *self
            .histogram
            .lock()
            .entry(operation.to_string())
            .or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub(crate) fn histogram(&self) -> BTreeMap<String, u64> {
        self.histogram.lock().clone()
    }
}
