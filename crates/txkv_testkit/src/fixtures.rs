//! Test fixtures and overlay helpers.
//!
//! Provides seeded engines, ready-made overlays and a fault-injecting
//! engine wrapper for exercising storage failure paths.

use parking_lot::Mutex;
use std::collections::HashSet;
use txkv_core::{Config, TxDb};
use txkv_storage::{
    BatchOp, EntryIter, InMemoryEngine, Key, RangeOptions, StorageEngine, StorageError,
    StorageResult, Value,
};

/// Returns the fixture key for index `i`: `"key i"`.
#[must_use]
pub fn key(i: usize) -> Key {
    Key::from(format!("key {i}"))
}

/// Returns the fixture value for index `i`: `"value i"`.
#[must_use]
pub fn value(i: usize) -> Value {
    Value::from(format!("value {i}"))
}

/// Returns puts of `key i -> value i` for `i` in `0..n`.
#[must_use]
pub fn seed_ops(n: usize) -> Vec<BatchOp> {
    (0..n).map(|i| BatchOp::put(key(i), value(i))).collect()
}

/// Creates an engine holding `key i -> value i` for `i` in `0..n`.
#[must_use]
pub fn seeded_engine(n: usize) -> InMemoryEngine {
    InMemoryEngine::with_entries((0..n).map(|i| (key(i), value(i))))
}

/// Creates an overlay on an empty engine.
#[must_use]
pub fn empty_db() -> TxDb<InMemoryEngine> {
    TxDb::new(InMemoryEngine::new())
}

/// Creates an overlay on [`seeded_engine`]`(n)`.
#[must_use]
pub fn seeded_db(n: usize) -> TxDb<InMemoryEngine> {
    TxDb::new(seeded_engine(n))
}

/// Creates an overlay on [`seeded_engine`]`(n)` with `config`.
#[must_use]
pub fn seeded_db_with(n: usize, config: Config) -> TxDb<InMemoryEngine> {
    TxDb::with_config(seeded_engine(n), config)
}

/// Which engine calls a [`FaultyEngine`] currently fails.
#[derive(Debug, Default)]
struct Faults {
    gets: HashSet<Key>,
    batches: usize,
    puts: usize,
}

/// An engine wrapper that fails selected calls on demand.
///
/// Faults are armed explicitly and are consumed as they trigger, except for
/// per-key read faults which stay until [`heal`](Self::heal) is called.
/// Everything else is delegated to the wrapped engine.
///
/// # Example
///
/// ```rust,ignore
/// let engine = FaultyEngine::new(seeded_engine(3));
/// engine.fail_get("key 1");
/// assert!(engine.get(b"key 1").is_err());
/// ```
#[derive(Debug, Default)]
pub struct FaultyEngine<E = InMemoryEngine> {
    inner: E,
    faults: Mutex<Faults>,
}

impl<E: StorageEngine> FaultyEngine<E> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Returns the wrapped engine.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Fails every read of `key` until healed.
    pub fn fail_get(&self, key: impl Into<Key>) {
        self.faults.lock().gets.insert(key.into());
    }

    /// Fails the next `count` batches.
    pub fn fail_next_batches(&self, count: usize) {
        self.faults.lock().batches = count;
    }

    /// Fails the next `count` puts.
    pub fn fail_next_puts(&self, count: usize) {
        self.faults.lock().puts = count;
    }

    /// Disarms every fault.
    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }

    fn injected(op: &str) -> StorageError {
        StorageError::backend(format!("injected {op} failure"))
    }

    fn take(counter: &mut usize) -> bool {
        if *counter == 0 {
            false
        } else {
            *counter -= 1;
            true
        }
    }
}

impl<E: StorageEngine> StorageEngine for FaultyEngine<E> {
    fn get(&self, key: &[u8]) -> StorageResult<Value> {
        if self.faults.lock().gets.contains(key) {
            return Err(Self::injected("get"));
        }
        self.inner.get(key)
    }

    fn put(&self, key: Key, value: Value) -> StorageResult<()> {
        if Self::take(&mut self.faults.lock().puts) {
            return Err(Self::injected("put"));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: Key) -> StorageResult<()> {
        self.inner.delete(key)
    }

    fn batch(&self, ops: &[BatchOp]) -> StorageResult<()> {
        if Self::take(&mut self.faults.lock().batches) {
            return Err(Self::injected("batch"));
        }
        self.inner.batch(ops)
    }

    fn read_stream(&self, range: &RangeOptions) -> StorageResult<EntryIter> {
        self.inner.read_stream(range)
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use txkv_core::{CoreResult, Transaction, TxOptions};

    /// Opens `count` single-key transactions on distinct keys.
    ///
    /// # Errors
    ///
    /// Returns the first mutation failure.
    pub async fn open_transactions<E: StorageEngine>(
        db: &TxDb<E>,
        count: usize,
        options: TxOptions,
    ) -> CoreResult<Vec<Transaction<E>>> {
        let mut open = Vec::with_capacity(count);
        for i in 0..count {
            open.push(db.tx_put(key(i), format!("in flight {i}"), options).await?);
        }
        Ok(open)
    }

    /// Returns `true` if every `key i` for `i` in `0..n` holds `value i`.
    pub fn holds_seed<E: StorageEngine>(engine: &E, n: usize) -> bool {
        (0..n).all(|i| engine.get(&key(i)).map_or(false, |v| v == value(i)))
    }
}
