//! Key-level lock table.
//!
//! The lock table is the set of keys currently owned by an unresolved
//! transaction. It is the only shared mutable state in the overlay, and
//! every gate decides whether to proceed by looking at it.
//!
//! All access goes through one mutex. A set of keys is claimed as a unit or
//! not at all, so a transaction never holds some of its keys while waiting
//! for the rest; contention can delay a caller but cannot deadlock it.

use crate::config::LockWait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tokio::sync::Notify;
use tracing::trace;
use txkv_storage::{Key, RangeOptions};

/// Tracks which keys are held by in-flight transactions.
#[derive(Debug)]
pub struct LockTable {
    locked: Mutex<BTreeSet<Key>>,
    released: Notify,
    wait: LockWait,
}

impl LockTable {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new(wait: LockWait) -> Self {
        Self {
            locked: Mutex::new(BTreeSet::new()),
            released: Notify::new(),
            wait,
        }
    }

    /// Claims all of `keys` if none of them is held.
    ///
    /// Returns `false` and changes nothing if any key is already held.
    pub fn try_acquire(&self, keys: &BTreeSet<Key>) -> bool {
        let mut locked = self.locked.lock();
        if keys.iter().any(|key| locked.contains(key)) {
            return false;
        }
        locked.extend(keys.iter().cloned());
        true
    }

    /// Releases `keys` and wakes every waiter so it can re-check.
    ///
    /// Releasing a key that isn't held is a no-op.
    pub fn release(&self, keys: &BTreeSet<Key>) {
        {
            let mut locked = self.locked.lock();
            for key in keys {
                locked.remove(key);
            }
        }
        self.released.notify_waiters();
    }

    /// Returns `true` if `key` is held.
    #[must_use]
    pub fn is_locked(&self, key: &[u8]) -> bool {
        self.locked.lock().contains(key)
    }

    /// Returns `true` if any held key falls inside `range`.
    #[must_use]
    pub fn overlaps(&self, range: &RangeOptions) -> bool {
        overlaps(&self.locked.lock(), range)
    }

    /// Returns the held keys in order.
    #[must_use]
    pub fn locked_keys(&self) -> Vec<Key> {
        self.locked.lock().iter().cloned().collect()
    }

    /// Returns the number of held keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locked.lock().len()
    }

    /// Returns `true` if no key is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locked.lock().is_empty()
    }

    /// Claims `keys`, waiting until the whole set is free.
    ///
    /// Returns a lease that releases the keys when dropped unless it is
    /// [kept](KeyLease::keep), together with the number of failed attempts.
    pub async fn acquire(&self, keys: BTreeSet<Key>) -> (KeyLease<'_>, usize) {
        let retries = self
            .wait_for(|locked| {
                if keys.iter().any(|key| locked.contains(key)) {
                    None
                } else {
                    locked.extend(keys.iter().cloned());
                    Some(())
                }
            })
            .await
            .1;
        (
            KeyLease {
                table: self,
                keys: Some(keys),
            },
            retries,
        )
    }

    /// Runs `produce` once `blocked` is false, while the table is held.
    ///
    /// Producing under the table mutex means no transaction can claim a
    /// key between the check and the read.
    pub(crate) async fn when_clear<T>(
        &self,
        blocked: impl Fn(&BTreeSet<Key>) -> bool,
        produce: impl FnOnce() -> T,
    ) -> (T, usize) {
        let mut produce = Some(produce);
        self.wait_for(|locked| {
            if blocked(locked) {
                None
            } else {
                produce.take().map(|f| f())
            }
        })
        .await
    }

    /// Runs `produce` if `blocked` is false right now.
    pub(crate) fn if_clear<T>(
        &self,
        blocked: impl FnOnce(&BTreeSet<Key>) -> bool,
        produce: impl FnOnce() -> T,
    ) -> Option<T> {
        let locked = self.locked.lock();
        if blocked(&locked) {
            None
        } else {
            Some(produce())
        }
    }

    /// Re-runs `attempt` under the table mutex until it yields a value.
    async fn wait_for<T>(
        &self,
        mut attempt: impl FnMut(&mut BTreeSet<Key>) -> Option<T>,
    ) -> (T, usize) {
        let mut retries = 0usize;
        loop {
            match self.wait {
                LockWait::Notify => {
                    // Register before checking so a release between the
                    // check and the await is not missed.
                    let notified = self.released.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    let attempted = attempt(&mut *self.locked.lock());
                    if let Some(value) = attempted {
                        return (value, retries);
                    }
                    notified.await;
                }
                LockWait::Poll(interval) => {
                    let attempted = attempt(&mut *self.locked.lock());
                    if let Some(value) = attempted {
                        return (value, retries);
                    }
                    if interval.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
            retries += 1;
            trace!(retries, "lock wait retry");
        }
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(LockWait::default())
    }
}

pub(crate) fn overlaps(locked: &BTreeSet<Key>, range: &RangeOptions) -> bool {
    if range.is_empty() {
        return false;
    }
    locked.range::<[u8], _>(range.bounds()).next().is_some()
}

/// Keys claimed from a [`LockTable`] but not yet handed to a transaction.
///
/// Dropping the lease releases the keys, so an error or a cancelled future
/// between acquisition and the forward batch never leaves keys locked.
#[derive(Debug)]
pub struct KeyLease<'a> {
    table: &'a LockTable,
    keys: Option<BTreeSet<Key>>,
}

impl KeyLease<'_> {
    /// Returns the leased keys.
    #[must_use]
    pub fn keys(&self) -> &BTreeSet<Key> {
        static EMPTY: BTreeSet<Key> = BTreeSet::new();
        self.keys.as_ref().unwrap_or(&EMPTY)
    }

    /// Keeps the keys locked past the lease and returns them.
    ///
    /// The caller becomes responsible for releasing them.
    #[must_use]
    pub fn keep(mut self) -> BTreeSet<Key> {
        self.keys.take().unwrap_or_default()
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        if let Some(keys) = self.keys.take() {
            self.table.release(&keys);
        }
    }
}
