//! Task outcome counters
//!
//! Counters live for the lifetime of the process and are logged on shutdown.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared outcome counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    succeeded: AtomicU64,
    requeued: AtomicU64,
    failed: AtomicU64,
    decode_errors: AtomicU64,
    dead_lettered: AtomicU64,
    publish_failed: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Result payload published and message finished
    pub succeeded: u64,
    /// Handler failed and the message went back to the broker
    pub requeued: u64,
    /// Failure payload published and message finished
    pub failed: u64,
    /// Deliveries whose body could not be decoded
    pub decode_errors: u64,
    /// Undecodable bodies moved to the dead-letter subject
    pub dead_lettered: u64,
    /// Payloads that could not be handed off; message left for redelivery
    pub publish_failed: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeue(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            publish_failed: self.publish_failed.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "succeeded={} requeued={} failed={} decode_errors={} dead_lettered={} publish_failed={}",
            self.succeeded,
            self.requeued,
            self.failed,
            self.decode_errors,
            self.dead_lettered,
            self.publish_failed
        )
    }
}
