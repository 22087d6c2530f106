//! Storage engine trait definition.

use crate::batch::{BatchOp, RangeOptions};
use crate::error::StorageResult;
use crate::{Key, Value};

/// An ordered stream of `(key, value)` entries produced by a range read.
///
/// Streams are lazy, finite and not restartable.
pub type EntryIter = Box<dyn Iterator<Item = StorageResult<(Key, Value)>> + Send>;

/// An ordered stream of keys.
pub type KeyIter = Box<dyn Iterator<Item = StorageResult<Key>> + Send>;

/// An ordered stream of values.
pub type ValueIter = Box<dyn Iterator<Item = StorageResult<Value>> + Send>;

/// A key-value storage engine.
///
/// Engines provide single-key reads and writes plus atomic multi-key
/// batches. They have no notion of transactions; the overlay in `txkv_core`
/// adds that on top.
///
/// # Invariants
///
/// - `get` on an absent key fails with [`StorageError::NotFound`]
/// - `batch` applies all of its operations or none of them
/// - range reads yield keys in lexicographic byte order
/// - Engines must be `Send + Sync` for concurrent access
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
///
/// # Implementors
///
/// - [`super::InMemoryEngine`] - For testing and ephemeral data
pub trait StorageEngine: Send + Sync + 'static {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent, or any engine failure.
    fn get(&self, key: &[u8]) -> StorageResult<Value>;

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, key: Key, value: Value) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, key: Key) -> StorageResult<()>;

    /// Applies `ops` atomically, in order.
    ///
    /// When several operations touch the same key, the last one wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be applied. In that case no
    /// operation of the batch is visible.
    fn batch(&self, ops: &[BatchOp]) -> StorageResult<()>;

    /// Opens an ordered entry stream over `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be created.
    fn read_stream(&self, range: &RangeOptions) -> StorageResult<EntryIter>;

    /// Opens an ordered key stream over `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be created.
    fn key_stream(&self, range: &RangeOptions) -> StorageResult<KeyIter> {
        let entries = self.read_stream(range)?;
        Ok(Box::new(entries.map(|entry| entry.map(|(key, _)| key))))
    }

    /// Opens an ordered value stream over `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be created.
    fn value_stream(&self, range: &RangeOptions) -> StorageResult<ValueIter> {
        let entries = self.read_stream(range)?;
        Ok(Box::new(entries.map(|entry| entry.map(|(_, value)| value))))
    }
}
