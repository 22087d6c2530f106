//! Transactional overlay facade.

use crate::config::{Config, TxOptions};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventFeed, TxEvent};
use crate::gate::{Gate, TxWriteStream};
use crate::lock::LockTable;
use crate::rollback::RollbackLog;
use crate::stats::TxStats;
use crate::transaction::Transaction;
use crate::types::TransactionId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use txkv_storage::{
    distinct_keys, BatchOp, EntryIter, Key, KeyIter, RangeOptions, StorageEngine, StorageResult,
    Value, ValueIter,
};

/// State shared by an overlay, its transactions and its write streams.
pub(crate) struct DbInner<E: StorageEngine> {
    pub(crate) engine: Arc<E>,
    pub(crate) locks: LockTable,
    pub(crate) events: EventFeed,
    pub(crate) stats: TxStats,
    pub(crate) config: Config,
    next_txid: AtomicU64,
}

/// A storage engine with transactional mutations and lock-aware reads.
///
/// `TxDb` is the coordinator of the overlay. It owns the lock table that
/// every transaction and gate goes through, the event feed and the stats.
/// Cloning a `TxDb` yields another handle to the same coordinator.
///
/// # Mutations
///
/// [`tx_put`](Self::tx_put), [`tx_del`](Self::tx_del) and
/// [`tx_batch`](Self::tx_batch) lock every key they touch, capture the
/// keys' current state, apply the mutation atomically and return a
/// [`Transaction`] with the keys still locked. A mutation on a key that is
/// already locked waits for the holder to resolve.
///
/// # Reads and writes around transactions
///
/// [`tx_get`](Self::tx_get) and the `tx_*_stream` producers wait until none
/// of the keys in their scope is locked, so they never observe an
/// in-flight value. [`tx_write_stream`](Self::tx_write_stream) defers only
/// the entries whose key is locked.
///
/// # Example
///
/// ```rust,ignore
/// use txkv_core::{TxDb, TxOptions};
/// use txkv_storage::InMemoryEngine;
///
/// let db = TxDb::new(InMemoryEngine::new());
///
/// let tx = db.tx_put("k1", "v1", TxOptions::new()).await?;
/// tx.rollback().await?;
/// assert!(db.tx_get("k1").await.unwrap_err().is_not_found());
/// ```
pub struct TxDb<E: StorageEngine> {
    inner: Arc<DbInner<E>>,
}

impl<E: StorageEngine> Clone for TxDb<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: StorageEngine> TxDb<E> {
    /// Wraps `engine` with the default configuration.
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, Config::default())
    }

    /// Wraps `engine` with `config`.
    pub fn with_config(engine: E, config: Config) -> Self {
        Self::from_shared(Arc::new(engine), config)
    }

    /// Wraps an engine that is also used elsewhere.
    ///
    /// Writes made directly to the engine bypass the lock table.
    pub fn from_shared(engine: Arc<E>, config: Config) -> Self {
        Self {
            inner: Arc::new(DbInner {
                engine,
                locks: LockTable::new(config.lock_wait),
                events: EventFeed::with_max_history(config.event_history),
                stats: TxStats::new(),
                config,
                next_txid: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.inner.engine
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the overlay counters.
    #[must_use]
    pub fn stats(&self) -> &TxStats {
        &self.inner.stats
    }

    /// Returns the event feed, for history polling.
    #[must_use]
    pub fn events(&self) -> &EventFeed {
        &self.inner.events
    }

    /// Subscribes to commit and rollback events.
    pub fn subscribe(&self) -> UnboundedReceiver<TxEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the keys currently held by open transactions.
    #[must_use]
    pub fn locked_keys(&self) -> Vec<Key> {
        self.inner.locks.locked_keys()
    }

    /// Returns `true` if `key` is held by an open transaction.
    #[must_use]
    pub fn is_locked(&self, key: &[u8]) -> bool {
        self.inner.locks.is_locked(key)
    }

    // === Transactional mutations ===

    /// Writes `value` under `key` in a new transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if capturing the prior state or applying the write
    /// fails. No handle is produced and the key is left unlocked.
    pub async fn tx_put(
        &self,
        key: impl Into<Key>,
        value: impl Into<Value>,
        options: TxOptions,
    ) -> CoreResult<Transaction<E>> {
        self.tx_batch(vec![BatchOp::put(key, value)], options).await
    }

    /// Deletes `key` in a new transaction.
    ///
    /// # Errors
    ///
    /// See [`tx_put`](Self::tx_put).
    pub async fn tx_del(&self, key: impl Into<Key>, options: TxOptions) -> CoreResult<Transaction<E>> {
        self.tx_batch(vec![BatchOp::delete(key)], options).await
    }

    /// Applies `ops` atomically in a new transaction.
    ///
    /// Waits until none of the touched keys is locked, claims all of them,
    /// reads their prior state, then applies the batch. The returned
    /// transaction holds the keys until it resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if capturing the prior state or applying the batch
    /// fails. No handle is produced and every key claimed for the attempt is
    /// released again.
    pub async fn tx_batch(&self, ops: Vec<BatchOp>, options: TxOptions) -> CoreResult<Transaction<E>> {
        let inner = &self.inner;
        let (lease, retries) = inner.locks.acquire(distinct_keys(&ops)).await;
        inner.stats.record_acquire_retries(retries);
        debug!(keys = lease.keys().len(), retries, "keys acquired");

        let rollback_log = match RollbackLog::capture(&inner.engine, lease.keys()).await {
            Ok(log) => log,
            Err(err) => {
                inner.stats.record_failed_mutation();
                return Err(err);
            }
        };

        if let Err(err) = inner.engine.batch(&ops) {
            inner.stats.record_failed_mutation();
            debug!(error = %err, "forward batch failed");
            return Err(CoreError::Storage(err));
        }

        let keys = lease.keep();
        let id = TransactionId::new(inner.next_txid.fetch_add(1, Ordering::SeqCst));
        inner.stats.record_start();
        Ok(Transaction::begin(
            Arc::clone(inner),
            id,
            keys,
            rollback_log,
            options.resolve_timeout(&inner.config),
        ))
    }

    // === Gated reads ===

    /// Reads `key`, waiting while an open transaction holds it.
    ///
    /// The value returned is the one left by the holder's resolution, never
    /// the holder's in-flight value unless it committed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent, or a storage
    /// error.
    pub async fn tx_get(&self, key: impl Into<Key>) -> CoreResult<Value> {
        let key = key.into();
        let engine = &self.inner.engine;
        let (result, waited) = Gate::Key(key.clone())
            .pass(&self.inner.locks, || engine.get(&key))
            .await;
        if waited {
            self.inner.stats.record_gated_read();
        }
        Ok(result?)
    }

    /// Opens an entry stream over `range` once no key in it is locked.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the stream cannot be created.
    pub async fn tx_read_stream(&self, range: RangeOptions) -> CoreResult<EntryIter> {
        let engine = &self.inner.engine;
        self.gated_stream(range, |range| engine.read_stream(range))
            .await
    }

    /// Opens a key stream over `range` once no key in it is locked.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the stream cannot be created.
    pub async fn tx_key_stream(&self, range: RangeOptions) -> CoreResult<KeyIter> {
        let engine = &self.inner.engine;
        self.gated_stream(range, |range| engine.key_stream(range))
            .await
    }

    /// Opens a value stream over `range` once no key in it is locked.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the stream cannot be created.
    pub async fn tx_value_stream(&self, range: RangeOptions) -> CoreResult<ValueIter> {
        let engine = &self.inner.engine;
        self.gated_stream(range, |range| engine.value_stream(range))
            .await
    }

    /// Opens a write stream that defers entries for locked keys.
    #[must_use]
    pub fn tx_write_stream(&self) -> TxWriteStream<E> {
        TxWriteStream::new(Arc::clone(&self.inner))
    }

    async fn gated_stream<T>(
        &self,
        range: RangeOptions,
        open: impl FnOnce(&RangeOptions) -> StorageResult<T>,
    ) -> CoreResult<T> {
        let (result, waited) = Gate::Range(range.clone())
            .pass(&self.inner.locks, || open(&range))
            .await;
        if waited {
            self.inner.stats.record_gated_stream();
            debug!("range stream released after wait");
        }
        Ok(result?)
    }

    // === Pass-through ===

    /// Reads `key` without consulting the lock table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent, or a storage
    /// error.
    pub fn get(&self, key: &[u8]) -> CoreResult<Value> {
        Ok(self.inner.engine.get(key)?)
    }

    /// Writes directly to the engine, bypassing locks.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    pub fn put(&self, key: impl Into<Key>, value: impl Into<Value>) -> CoreResult<()> {
        Ok(self.inner.engine.put(key.into(), value.into())?)
    }

    /// Applies a batch directly to the engine, bypassing locks.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    pub fn batch(&self, ops: &[BatchOp]) -> CoreResult<()> {
        Ok(self.inner.engine.batch(ops)?)
    }
}

impl<E: StorageEngine> fmt::Debug for TxDb<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxDb")
            .field("locked_keys", &self.inner.locks.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
