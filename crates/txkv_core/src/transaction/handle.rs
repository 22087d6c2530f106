//! The commit/rollback handle returned by a transactional mutation.

use super::timeout::TimeoutGuard;
use crate::database::DbInner;
use crate::error::{CoreError, CoreResult};
use crate::events::TxEventKind;
use crate::rollback::RollbackLog;
use crate::types::{RollbackCause, TransactionId, TxState};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use txkv_storage::{Key, StorageEngine};

/// An applied, not yet resolved transaction.
///
/// By the time a caller holds a `Transaction`, its mutation is already in
/// the engine and its keys are locked. Exactly one resolution takes effect:
///
/// - [`commit`](Self::commit) releases the keys and discards the rollback log
/// - [`rollback`](Self::rollback) writes the rollback log back, then
///   releases the keys
/// - if neither happens before the timeout, the guard rolls back
///
/// Resolving a second time fails with [`CoreError::AlreadyResolved`] and
/// touches neither the engine nor the lock table.
///
/// Dropping the handle does not resolve the transaction; the timeout guard
/// still will. Handles are cheap to clone and all clones share one state.
pub struct Transaction<E: StorageEngine> {
    inner: Arc<TxInner<E>>,
}

impl<E: StorageEngine> Clone for Transaction<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct TxInner<E: StorageEngine> {
    id: TransactionId,
    db: Arc<DbInner<E>>,
    keys: BTreeSet<Key>,
    state: Mutex<TxState>,
    rollback_log: Mutex<Option<RollbackLog>>,
    guard: Mutex<Option<TimeoutGuard>>,
    deadline: Instant,
}

impl<E: StorageEngine> Transaction<E> {
    /// Wraps an applied mutation and arms its timeout guard.
    ///
    /// `keys` must already be held in `db`'s lock table.
    pub(crate) fn begin(
        db: Arc<DbInner<E>>,
        id: TransactionId,
        keys: BTreeSet<Key>,
        rollback_log: RollbackLog,
        timeout: Duration,
    ) -> Self {
        let inner = Arc::new(TxInner {
            id,
            db,
            keys,
            state: Mutex::new(TxState::Open),
            rollback_log: Mutex::new(Some(rollback_log)),
            guard: Mutex::new(None),
            deadline: Instant::now() + timeout,
        });

        let expiring = Arc::clone(&inner);
        let guard = TimeoutGuard::arm(timeout, async move {
            if expiring.state() == TxState::Open {
                warn!(txid = %expiring.id, keys = expiring.keys.len(), "transaction timed out");
            }
            // Err means it already resolved, or the compensating batch
            // failed and was logged by `roll_back`.
            let _ = expiring.roll_back(RollbackCause::Timeout);
        });

        {
            let mut slot = inner.guard.lock();
            if inner.state() == TxState::Open {
                *slot = Some(guard);
            }
        }

        debug!(txid = %id, keys = inner.keys.len(), ?timeout, "transaction open");
        Self { inner }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    /// Returns the keys this transaction holds.
    #[must_use]
    pub fn keys(&self) -> &BTreeSet<Key> {
        &self.inner.keys
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.inner.state()
    }

    /// Returns `true` until the transaction resolves.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == TxState::Open
    }

    /// Returns when the timeout guard will roll back an unresolved
    /// transaction.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    /// Returns the number of rollback entries still held, zero once
    /// resolved.
    #[must_use]
    pub fn rollback_log_len(&self) -> usize {
        self.inner
            .rollback_log
            .lock()
            .as_ref()
            .map_or(0, RollbackLog::len)
    }

    /// Commits the transaction.
    ///
    /// The mutation is already durable, so commit only disarms the guard,
    /// drops the rollback log and releases the keys. It then yields once
    /// before signalling so that callers blocked on these keys get to run
    /// ahead of the committer's continuation. The commit is counted and its
    /// event emitted even if this future is dropped at that yield.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyResolved`] if the transaction was already
    /// committed or rolled back, including by timeout.
    pub async fn commit(&self) -> CoreResult<()> {
        let inner = &self.inner;
        inner.claim(TxState::Committed)?;
        inner.disarm();
        inner.rollback_log.lock().take();
        inner.db.locks.release(&inner.keys);
        debug!(txid = %inner.id, keys = inner.keys.len(), "transaction committed");

        // Signals on drop, which also covers a future cancelled at the yield.
        let notice = CommitNotice { inner: &**inner };
        tokio::task::yield_now().await;
        drop(notice);
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// Every key is restored to its pre-transaction state in one atomic
    /// batch. The keys are released even if that batch fails, so a failed
    /// compensating write never leaves keys locked.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyResolved`] if the transaction was already
    /// resolved, or the storage error of the compensating batch.
    pub async fn rollback(&self) -> CoreResult<()> {
        self.inner.roll_back(RollbackCause::Explicit)
    }
}

/// Records the commit and emits its event when dropped.
struct CommitNotice<'a, E: StorageEngine> {
    inner: &'a TxInner<E>,
}

impl<E: StorageEngine> Drop for CommitNotice<'_, E> {
    fn drop(&mut self) {
        let inner = self.inner;
        inner.db.stats.record_commit();
        inner.db.events.emit(
            inner.id,
            inner.keys.iter().cloned().collect(),
            TxEventKind::Committed,
        );
    }
}

impl<E: StorageEngine> TxInner<E> {
    fn state(&self) -> TxState {
        *self.state.lock()
    }

    /// Moves `Open` to `target`, or reports the state already reached.
    fn claim(&self, target: TxState) -> CoreResult<()> {
        let mut state = self.state.lock();
        if *state != TxState::Open {
            return Err(CoreError::AlreadyResolved {
                id: self.id,
                state: *state,
            });
        }
        *state = target;
        Ok(())
    }

    fn disarm(&self) {
        if let Some(guard) = self.guard.lock().take() {
            guard.disarm();
        }
    }

    fn roll_back(&self, cause: RollbackCause) -> CoreResult<()> {
        self.claim(TxState::RolledBack)?;
        self.disarm();

        let log = self.rollback_log.lock().take().unwrap_or_default();
        let result = self.db.engine.batch(&log.to_batch());
        self.db.locks.release(&self.keys);

        let failed = result.is_err();
        if let Err(err) = &result {
            warn!(txid = %self.id, %cause, error = %err, "compensating batch failed");
        } else {
            debug!(txid = %self.id, %cause, entries = log.len(), "transaction rolled back");
        }

        self.db.stats.record_rollback(cause, failed);
        self.db.events.emit(
            self.id,
            self.keys.iter().cloned().collect(),
            TxEventKind::RolledBack { cause, failed },
        );
        result.map_err(CoreError::Storage)
    }
}

impl<E: StorageEngine> fmt::Debug for Transaction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("keys", &self.inner.keys.len())
            .finish_non_exhaustive()
    }
}
