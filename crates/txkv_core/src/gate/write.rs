//! Per-entry write gating.

use super::Gate;
use crate::database::DbInner;
use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::trace;
use txkv_storage::{Key, StorageEngine, Value};

/// Outcome of a finished [`TxWriteStream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Entries written, deferred ones included.
    pub written: usize,
    /// Entries that had to wait for their key to unlock.
    pub deferred: usize,
}

/// A sequential write consumer that steps around locked keys.
///
/// Each entry whose key is free is written straight through. An entry whose
/// key is locked is parked until that key is released and then written,
/// while later entries keep flowing. Deferred entries therefore land after
/// entries that arrived behind them.
///
/// Call [`finish`](Self::finish) to wait for deferred entries. Dropping the
/// stream abandons any entry still waiting.
pub struct TxWriteStream<E: StorageEngine> {
    db: Arc<DbInner<E>>,
    deferred: JoinSet<CoreResult<()>>,
    immediate: usize,
    deferred_count: usize,
}

impl<E: StorageEngine> TxWriteStream<E> {
    pub(crate) fn new(db: Arc<DbInner<E>>) -> Self {
        Self {
            db,
            deferred: JoinSet::new(),
            immediate: 0,
            deferred_count: 0,
        }
    }

    /// Writes one entry, or defers it if its key is locked.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if an immediate write fails. Failures of
    /// deferred writes surface from [`finish`](Self::finish).
    pub fn write(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> CoreResult<()> {
        let key = key.into();
        let value = value.into();
        let gate = Gate::Key(key.clone());

        let engine = &self.db.engine;
        let immediate = self.db.locks.if_clear(
            |locked| gate.is_blocked(locked),
            || engine.put(key.clone(), value.clone()),
        );

        match immediate {
            Some(result) => {
                result?;
                self.immediate += 1;
            }
            None => {
                trace!(key = %String::from_utf8_lossy(&key), "write deferred behind lock");
                self.db.stats.record_deferred_write();
                self.deferred_count += 1;

                let db = Arc::clone(&self.db);
                self.deferred.spawn(async move {
                    let engine = Arc::clone(&db.engine);
                    let (result, _) = gate.pass(&db.locks, move || engine.put(key, value)).await;
                    result.map_err(CoreError::from)
                });
            }
        }
        Ok(())
    }

    /// Writes every entry of `entries` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first immediate write failure.
    pub fn write_all<I, K, V>(&mut self, entries: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.write(key, value)?;
        }
        Ok(())
    }

    /// Consumes entries from `source` until it closes, then finishes.
    ///
    /// # Errors
    ///
    /// Returns the first write failure, immediate or deferred.
    pub async fn pipe_from(mut self, mut source: mpsc::Receiver<(Key, Value)>) -> CoreResult<WriteSummary> {
        while let Some((key, value)) = source.recv().await {
            self.write(key, value)?;
        }
        self.finish().await
    }

    /// Returns the number of deferred entries not yet written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Waits for every deferred entry to be written.
    ///
    /// # Errors
    ///
    /// Returns the first deferred write failure, after all deferred entries
    /// have settled.
    pub async fn finish(mut self) -> CoreResult<WriteSummary> {
        let mut failure = None;
        let mut landed = 0usize;
        while let Some(joined) = self.deferred.join_next().await {
            match joined {
                Ok(Ok(())) => landed += 1,
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(join) => {
                    failure.get_or_insert(CoreError::task(join.to_string()));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(WriteSummary {
                written: self.immediate + landed,
                deferred: self.deferred_count,
            }),
        }
    }
}

impl<E: StorageEngine> fmt::Debug for TxWriteStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxWriteStream")
            .field("immediate", &self.immediate)
            .field("deferred", &self.deferred_count)
            .field("pending", &self.deferred.len())
            .finish_non_exhaustive()
    }
}
