//! Gates that hold reads and writes back while keys are locked.
//!
//! A gate pairs a predicate over the lock table with an operation that has
//! not been started yet. The operation runs only once the predicate is
//! clear; while blocked, the predicate is re-evaluated on every release, so
//! a range gate that stays overlapped by a newly locked key keeps waiting.
//!
//! Gates are checked when an operation starts. A range stream that has been
//! produced is not affected by keys locked afterwards.

mod write;

pub use write::{TxWriteStream, WriteSummary};

use crate::lock::{overlaps, LockTable};
use std::collections::BTreeSet;
use txkv_storage::{Key, RangeOptions};

/// What a gated operation must not overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// A single key.
    Key(Key),
    /// Every key inside an inclusive range.
    Range(RangeOptions),
}

impl Gate {
    /// Returns `true` while `locked` intersects this gate's scope.
    #[must_use]
    pub fn is_blocked(&self, locked: &BTreeSet<Key>) -> bool {
        match self {
            Self::Key(key) => locked.contains(key),
            Self::Range(range) => overlaps(locked, range),
        }
    }

    /// Runs `produce` once the gate is clear.
    ///
    /// Returns the produced value and whether the caller had to wait.
    pub(crate) async fn pass<T>(&self, locks: &LockTable, produce: impl FnOnce() -> T) -> (T, bool) {
        let (value, retries) = locks
            .when_clear(|locked| self.is_blocked(locked), produce)
            .await;
        (value, retries > 0)
    }
}
