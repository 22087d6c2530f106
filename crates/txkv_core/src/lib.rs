//! # txkv Core
//!
//! Key-locking transactional overlay for txkv storage engines.
//!
//! This crate provides:
//! - A lock table of keys held by in-flight transactions
//! - Transactional put, delete and batch with commit and rollback
//! - Automatic rollback of transactions left unresolved past a timeout
//! - Point reads, range streams and write streams gated on the lock table
//! - Commit/rollback events and overlay counters
//!
//! A transactional mutation is applied to the engine immediately. What the
//! overlay adds is that its keys stay locked, and a rollback log is kept,
//! until the returned [`Transaction`] commits, rolls back or times out.
//! Gated reads never observe an in-flight value.
//!
//! ## Example
//!
//! ```rust,ignore
//! use txkv_core::{TxDb, TxOptions};
//! use txkv_storage::InMemoryEngine;
//!
//! let db = TxDb::new(InMemoryEngine::new());
//!
//! let tx = db.tx_put("key 1", "value 1", TxOptions::with_timeout_ms(200)).await?;
//! tx.commit().await?;
//! assert_eq!(db.tx_get("key 1").await?, "value 1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod events;
mod gate;
mod lock;
mod rollback;
mod stats;
mod transaction;
mod types;

pub use config::{Config, LockWait, TxOptions};
pub use database::TxDb;
pub use error::{CoreError, CoreResult};
pub use events::{EventFeed, TxEvent, TxEventKind};
pub use gate::{Gate, TxWriteStream, WriteSummary};
pub use lock::{KeyLease, LockTable};
pub use rollback::{RollbackEntry, RollbackLog};
pub use stats::TxStats;
pub use transaction::{TimeoutGuard, Transaction};
pub use types::{RollbackCause, SequenceNumber, TransactionId, TxState};

pub use txkv_storage::{
    BatchOp, EntryIter, InMemoryEngine, Key, KeyIter, RangeOptions, StorageEngine, StorageError,
    Value, ValueIter,
};
