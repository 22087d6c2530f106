//! Sequential write consumer.

use crate::engine::StorageEngine;
use crate::error::StorageResult;
use crate::{Key, Value};
use std::sync::Arc;

/// Applies a sequence of `{key, value}` entries to an engine, one `put` each.
///
/// Entries are written in arrival order. The stream holds no buffer; each
/// [`WriteStream::write`] call is durable once it returns.
///
/// ```rust
/// use std::sync::Arc;
/// use txkv_storage::{InMemoryEngine, StorageEngine, WriteStream};
///
/// let engine = Arc::new(InMemoryEngine::new());
/// let mut stream = WriteStream::new(Arc::clone(&engine));
/// stream.write("a".into(), "1".into()).unwrap();
/// stream.write("b".into(), "2".into()).unwrap();
/// assert_eq!(stream.finish(), 2);
/// assert_eq!(engine.get(b"b").unwrap(), "2");
/// ```
#[derive(Debug)]
pub struct WriteStream<E: ?Sized> {
    engine: Arc<E>,
    written: usize,
}

impl<E: StorageEngine + ?Sized> WriteStream<E> {
    /// Creates a write stream over `engine`.
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine, written: 0 }
    }

    /// Writes one entry.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the put fails.
    pub fn write(&mut self, key: Key, value: Value) -> StorageResult<()> {
        self.engine.put(key, value)?;
        self.written += 1;
        Ok(())
    }

    /// Writes every entry of `entries`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first engine error encountered.
    pub fn write_all<I>(&mut self, entries: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        for (key, value) in entries {
            self.write(key, value)?;
        }
        Ok(())
    }

    /// Returns the number of entries written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Ends the stream and returns the number of entries written.
    #[must_use]
    pub fn finish(self) -> usize {
        self.written
    }
}
