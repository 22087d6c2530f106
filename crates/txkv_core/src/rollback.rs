//! Rollback log construction.
//!
//! Before a transaction's forward batch is applied, the overlay reads the
//! current state of every key the batch touches. The resulting log is the
//! inverse batch: keys that existed are put back with their prior value,
//! keys that did not exist are deleted.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use txkv_storage::{BatchOp, Key, StorageEngine, Value};

/// How one key is restored on rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackEntry {
    /// The key existed; restore `prior_value`.
    Put {
        /// Key to restore.
        key: Key,
        /// Value the key held before the transaction.
        prior_value: Value,
    },
    /// The key did not exist; delete it.
    Delete {
        /// Key to remove.
        key: Key,
    },
}

impl RollbackEntry {
    /// Returns the key this entry restores.
    #[must_use]
    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }

    /// Returns the batch operation that reverses the forward mutation.
    #[must_use]
    pub fn to_op(&self) -> BatchOp {
        match self {
            Self::Put { key, prior_value } => BatchOp::Put {
                key: key.clone(),
                value: prior_value.clone(),
            },
            Self::Delete { key } => BatchOp::Delete { key: key.clone() },
        }
    }
}

/// Pre-transaction state of every key in a mutation, one entry per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackLog {
    entries: Vec<RollbackEntry>,
}

impl RollbackLog {
    /// Captures the current state of `keys`.
    ///
    /// One read per key is issued on the blocking pool and all of them are
    /// joined before returning. A missing key becomes a `Delete` entry. Any
    /// other read failure fails the whole build, after every read has
    /// finished, and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the first non-`NotFound` storage error, in key order, or a
    /// task error if a read worker panicked.
    pub async fn capture<E: StorageEngine>(
        engine: &Arc<E>,
        keys: &BTreeSet<Key>,
    ) -> CoreResult<Self> {
        let reads: Vec<_> = keys
            .iter()
            .cloned()
            .map(|key| {
                let engine = Arc::clone(engine);
                tokio::task::spawn_blocking(move || {
                    let prior = engine.get(&key);
                    (key, prior)
                })
            })
            .collect();

        let mut entries = Vec::with_capacity(reads.len());
        let mut failure = None;
        for read in reads {
            match read.await {
                Ok((key, Ok(prior_value))) => entries.push(RollbackEntry::Put { key, prior_value }),
                Ok((key, Err(err))) if err.is_not_found() => {
                    entries.push(RollbackEntry::Delete { key });
                }
                Ok((_, Err(err))) => {
                    failure.get_or_insert(CoreError::Storage(err));
                }
                Err(join) => {
                    failure.get_or_insert(CoreError::task(join.to_string()));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(Self { entries }),
        }
    }

    /// Creates a log from pre-built entries.
    #[must_use]
    pub fn from_entries(entries: Vec<RollbackEntry>) -> Self {
        Self { entries }
    }

    /// Returns the inverse batch.
    #[must_use]
    pub fn to_batch(&self) -> Vec<BatchOp> {
        self.entries.iter().map(RollbackEntry::to_op).collect()
    }

    /// Returns the entries.
    pub fn entries(&self) -> impl Iterator<Item = &RollbackEntry> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
