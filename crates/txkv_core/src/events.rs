//! Event feed for observing transaction resolution.
//!
//! Every commit and rollback, including timeout-triggered rollbacks, emits
//! one [`TxEvent`]. Events are emitted after the transaction's keys have
//! been released, so a subscriber reacting to an event never finds the
//! keys still locked by that transaction.
//!
//! # Usage
//!
//! ```rust,ignore
//! let db = TxDb::new(InMemoryEngine::new());
//! let mut events = db.subscribe();
//!
//! let tx = db.tx_put("k1", "v1", TxOptions::with_timeout_ms(200)).await?;
//! // Nobody resolves `tx`; the timeout guard rolls it back.
//! let event = events.recv().await.unwrap();
//! assert!(event.is_rollback());
//! ```

use crate::types::{RollbackCause, SequenceNumber, TransactionId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use txkv_storage::Key;

/// How a transaction resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEventKind {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack {
        /// What triggered the rollback.
        cause: RollbackCause,
        /// Whether the compensating batch failed.
        failed: bool,
    },
}

/// A resolved transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEvent {
    /// Emission order across the overlay.
    pub sequence: SequenceNumber,
    /// The resolved transaction.
    pub txid: TransactionId,
    /// Keys the transaction held.
    pub keys: Vec<Key>,
    /// How it resolved.
    pub kind: TxEventKind,
}

impl TxEvent {
    /// Returns `true` for a commit event.
    #[must_use]
    pub fn is_commit(&self) -> bool {
        self.kind == TxEventKind::Committed
    }

    /// Returns `true` for a rollback event of any cause.
    #[must_use]
    pub fn is_rollback(&self) -> bool {
        matches!(self.kind, TxEventKind::RolledBack { .. })
    }

    /// Returns `true` for a rollback fired by the timeout guard.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            TxEventKind::RolledBack {
                cause: RollbackCause::Timeout,
                ..
            }
        )
    }
}

/// Distributes transaction events to subscribers.
///
/// The feed:
/// - Preserves emission order
/// - Supports multiple subscribers
/// - Keeps a bounded history for polling
/// - Is thread-safe
#[derive(Debug)]
pub struct EventFeed {
    subscribers: RwLock<Vec<UnboundedSender<TxEvent>>>,
    history: RwLock<VecDeque<TxEvent>>,
    max_history: usize,
    next_sequence: AtomicU64,
}

impl EventFeed {
    /// Creates a feed retaining up to `max_history` events.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Subscribes to the feed.
    ///
    /// The receiver gets every event emitted from now on. Dropping it
    /// unsubscribes on the next emission.
    pub fn subscribe(&self) -> UnboundedReceiver<TxEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event for `txid` and returns it.
    ///
    /// Sequence assignment, the history push and delivery all happen under
    /// the history lock, so history and every subscriber see events in
    /// sequence order.
    pub(crate) fn emit(&self, txid: TransactionId, keys: Vec<Key>, kind: TxEventKind) -> TxEvent {
        let mut history = self.history.write();
        let event = TxEvent {
            sequence: SequenceNumber::new(self.next_sequence.fetch_add(1, Ordering::SeqCst)),
            txid,
            keys,
            kind,
        };

        history.push_back(event.clone());
        while history.len() > self.max_history {
            history.pop_front();
        }

        // Send to subscribers, dropping disconnected ones
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
        event
    }

    /// Returns events with sequence greater than `cursor`, up to `limit`.
    #[must_use]
    pub fn poll(&self, cursor: SequenceNumber, limit: usize) -> Vec<TxEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest emitted sequence, or zero if none.
    #[must_use]
    pub fn latest_sequence(&self) -> SequenceNumber {
        self.history
            .read()
            .back()
            .map_or(SequenceNumber::new(0), |e| e.sequence)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of retained events.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::with_max_history(1024)
    }
}
