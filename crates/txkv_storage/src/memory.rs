//! In-memory storage engine.

use crate::batch::{BatchOp, RangeOptions};
use crate::engine::{EntryIter, StorageEngine};
use crate::error::{StorageError, StorageResult};
use crate::{Key, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory storage engine.
///
/// This engine keeps all entries in an ordered map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// The engine is thread-safe. A batch is applied under a single write lock,
/// so readers never observe half of it.
///
/// # Example
///
/// ```rust
/// use txkv_storage::{BatchOp, InMemoryEngine, StorageEngine};
///
/// let engine = InMemoryEngine::new();
/// engine.put("a".into(), "1".into()).unwrap();
/// engine.batch(&[BatchOp::put("b", "2"), BatchOp::delete("a")]).unwrap();
/// assert!(engine.get(b"a").unwrap_err().is_not_found());
/// assert_eq!(engine.get(b"b").unwrap(), "2");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    data: RwLock<BTreeMap<Key, Value>>,
    closed: AtomicBool,
}

impl InMemoryEngine {
    /// Creates a new empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine pre-populated with `entries`.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: RwLock::new(data),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns a copy of all entries.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Key, Value> {
        self.data.read().clone()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if the engine holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Closes the engine. Every later call fails with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl StorageEngine for InMemoryEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Value> {
        self.ensure_open()?;
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(Key::copy_from_slice(key)))
    }

    fn put(&self, key: Key, value: Value) -> StorageResult<()> {
        self.ensure_open()?;
        self.data.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: Key) -> StorageResult<()> {
        self.ensure_open()?;
        self.data.write().remove(&key);
        Ok(())
    }

    fn batch(&self, ops: &[BatchOp]) -> StorageResult<()> {
        self.ensure_open()?;
        let mut data = self.data.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                BatchOp::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }

    fn read_stream(&self, range: &RangeOptions) -> StorageResult<EntryIter> {
        self.ensure_open()?;
        if range.is_empty() || range.limit == Some(0) {
            return Ok(Box::new(std::iter::empty()));
        }

        // Snapshot the bounded range so the stream does not hold the lock.
        let data = self.data.read();
        let selected = data.range::<[u8], _>(range.bounds());
        let limit = range.limit.unwrap_or(usize::MAX);
        let entries: Vec<(Key, Value)> = if range.reverse {
            selected
                .rev()
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            selected
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}
