//! Client Metrics
//!
//! Cache-line aligned per-verb counters, cheap enough to bump on every call
//! from any task. Callers read them through [`ClientMetrics::snapshot`].

use crate::error::Error;
use crate::transport::Verb;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

// =============================================================================
// Per-Verb Metrics (Cache-Line Aligned)
// =============================================================================

/// Counters for a single transport verb, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug)]
pub struct VerbMetrics {
    /// Calls handed to the transport
    pub requests: AtomicU64,
    /// Calls that returned an error
    pub failures: AtomicU64,
    /// Calls that hit their deadline
    pub deadline_exceeded: AtomicU64,
    /// Calls the server rejected with a version conflict
    pub conflicts: AtomicU64,
    /// Last update timestamp (Unix millis)
    pub last_update_ms: AtomicU64,
    _padding: [u8; 24],
}

const _: () = assert!(std::mem::size_of::<VerbMetrics>() <= CACHE_LINE_SIZE);

impl Default for VerbMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl VerbMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            deadline_exceeded: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            last_update_ms: AtomicU64::new(0),
            _padding: [0; 24],
        }
    }

    #[inline]
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Record a failed call, classifying the error
    #[inline]
    pub fn record_failure(&self, error: &Error) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if matches!(error, Error::DeadlineExceeded { .. }) {
            self.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
        }
        if error.is_conflict() {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        self.touch();
    }

    #[inline]
    fn touch(&self) {
        self.last_update_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::Release);
    }

    pub fn snapshot(&self) -> VerbMetricsSnapshot {
        VerbMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            deadline_exceeded: self.deadline_exceeded.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of one verb's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerbMetricsSnapshot {
    pub requests: u64,
    pub failures: u64,
    pub deadline_exceeded: u64,
    pub conflicts: u64,
}

impl VerbMetricsSnapshot {
    /// Fraction of calls that failed (0.0 to 1.0)
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64
        }
    }
}

// =============================================================================
// Client Metrics
// =============================================================================

/// Counters shared by every clone of a client
#[derive(Debug)]
pub struct ClientMetrics {
    verbs: [VerbMetrics; 6],
    /// Writes refused locally by the write gate
    pub rejected_writes: AtomicU64,
    /// Specs that failed to decode and were replaced by the default
    pub decode_fallbacks: AtomicU64,
    /// Items a bulk delete failed to remove
    pub bulk_delete_failures: AtomicU64,
    /// Streams ended by caller cancellation
    pub cancelled_streams: AtomicU64,
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self {
            verbs: Default::default(),
            rejected_writes: AtomicU64::new(0),
            decode_fallbacks: AtomicU64::new(0),
            bulk_delete_failures: AtomicU64::new(0),
            cancelled_streams: AtomicU64::new(0),
        }
    }

    /// Counters for a specific verb
    pub fn verb(&self, verb: Verb) -> &VerbMetrics {
        &self.verbs[verb.index()]
    }

    pub fn record_rejected_write(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_fallback(&self) {
        self.decode_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bulk_delete_failure(&self) {
        self.bulk_delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_stream(&self) {
        self.cancelled_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        let mut verbs = [(Verb::Get, VerbMetricsSnapshot::default()); 6];
        for (slot, verb) in verbs.iter_mut().zip(Verb::ALL) {
            *slot = (verb, self.verb(verb).snapshot());
        }

        ClientMetricsSnapshot {
            verbs,
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
            decode_fallbacks: self.decode_fallbacks.load(Ordering::Relaxed),
            bulk_delete_failures: self.bulk_delete_failures.load(Ordering::Relaxed),
            cancelled_streams: self.cancelled_streams.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Aggregate Snapshot
// =============================================================================

/// Point-in-time snapshot of every client counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
    pub verbs: [(Verb, VerbMetricsSnapshot); 6],
    pub rejected_writes: u64,
    pub decode_fallbacks: u64,
    pub bulk_delete_failures: u64,
    pub cancelled_streams: u64,
}

impl ClientMetricsSnapshot {
    pub fn verb(&self, verb: Verb) -> &VerbMetricsSnapshot {
        &self.verbs[verb.index()].1
    }

    pub fn total_requests(&self) -> u64 {
        self.verbs.iter().map(|(_, m)| m.requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.verbs.iter().map(|(_, m)| m.failures).sum()
    }
}
