//! Overlay statistics.
//!
//! # Usage
//!
//! ```rust,ignore
//! let db = TxDb::new(InMemoryEngine::new());
//! db.tx_put("k", "v", TxOptions::new()).await?.commit().await?;
//!
//! let stats = db.stats();
//! println!("Committed: {}", stats.transactions_committed());
//! println!("Gated reads: {}", stats.gated_reads());
//! ```

use crate::types::RollbackCause;
use std::sync::atomic::{AtomicU64, Ordering};

/// Overlay counters.
///
/// All counters are atomic and monotonically increasing, and can be read
/// while transactions are in flight.
#[derive(Debug, Default)]
pub struct TxStats {
    // Transaction counters
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    transactions_timed_out: AtomicU64,
    failed_mutations: AtomicU64,
    rollback_failures: AtomicU64,

    // Contention counters
    acquire_retries: AtomicU64,
    gated_reads: AtomicU64,
    gated_streams: AtomicU64,
    deferred_writes: AtomicU64,
}

impl TxStats {
    /// Creates a new stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self, cause: RollbackCause, failed: bool) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
        if cause == RollbackCause::Timeout {
            self.transactions_timed_out.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.rollback_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_failed_mutation(&self) {
        self.failed_mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acquire_retries(&self, retries: usize) {
        self.acquire_retries
            .fetch_add(retries as u64, Ordering::Relaxed);
    }

    /// Records a point read that had to wait on a lock.
    pub(crate) fn record_gated_read(&self) {
        self.gated_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a range stream whose creation had to wait on a lock.
    pub(crate) fn record_gated_stream(&self) {
        self.gated_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_write(&self) {
        self.deferred_writes.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of transactions whose mutation was applied.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of committed transactions.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled-back transactions, timeouts included.
    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of rollbacks triggered by the timeout guard.
    pub fn transactions_timed_out(&self) -> u64 {
        self.transactions_timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of mutations that failed before producing a handle.
    pub fn failed_mutations(&self) -> u64 {
        self.failed_mutations.load(Ordering::Relaxed)
    }

    /// Returns the number of rollbacks whose compensating batch failed.
    pub fn rollback_failures(&self) -> u64 {
        self.rollback_failures.load(Ordering::Relaxed)
    }

    /// Returns the total failed lock acquisition attempts.
    ///
    /// A high value relative to `transactions_started` means heavy
    /// contention on overlapping key sets.
    pub fn acquire_retries(&self) -> u64 {
        self.acquire_retries.load(Ordering::Relaxed)
    }

    /// Returns the number of point reads that waited on a lock.
    pub fn gated_reads(&self) -> u64 {
        self.gated_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of range streams that waited on a lock.
    pub fn gated_streams(&self) -> u64 {
        self.gated_streams.load(Ordering::Relaxed)
    }

    /// Returns the number of write-stream entries deferred behind a lock.
    pub fn deferred_writes(&self) -> u64 {
        self.deferred_writes.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions still open.
    pub fn open_transactions(&self) -> u64 {
        self.transactions_started()
            .saturating_sub(self.transactions_committed())
            .saturating_sub(self.transactions_rolled_back())
    }
}
