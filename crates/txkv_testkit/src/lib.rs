//! # txkv Testkit
//!
//! Test utilities for txkv.
//!
//! This crate provides:
//! - Seeded engines and overlays for scenario tests
//! - A fault-injecting engine wrapper for storage failure paths
//! - Property-based test generators using proptest
//! - Concurrent stress runs against the overlay
//!
//! ## Usage
//!
//! ```rust,ignore
//! use txkv_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn rollback_restores_seed() {
//!     let db = seeded_db(10);
//!     let tx = db.tx_del("key 8", TxOptions::new()).await.unwrap();
//!     tx.rollback().await.unwrap();
//!     assert_eq!(db.get(b"key 8").unwrap(), "value 8");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use txkv_core::{Config, LockWait, TxDb, TxOptions};
    pub use txkv_storage::{BatchOp, InMemoryEngine, Key, RangeOptions, StorageEngine, Value};
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
