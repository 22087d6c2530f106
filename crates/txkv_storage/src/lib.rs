//! # txkv Storage
//!
//! Storage engine trait and implementations for txkv.
//!
//! This crate provides the key-value engine the transactional overlay sits
//! on. Engines offer only single-key reads and writes, atomic batches and
//! ordered range reads; they know nothing about transactions or locks.
//!
//! ## Design Principles
//!
//! - Engines are plain ordered byte maps
//! - A missing key is reported as [`StorageError::NotFound`], never as an
//!   empty value
//! - `batch` is atomic: all operations apply or none do
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - For testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use txkv_storage::{InMemoryEngine, RangeOptions, StorageEngine};
//!
//! let engine = InMemoryEngine::new();
//! engine.put("key 1".into(), "value 1".into()).unwrap();
//! let keys: Vec<_> = engine
//!     .key_stream(&RangeOptions::new())
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(keys, vec!["key 1"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod engine;
mod error;
mod memory;
mod write;

pub use batch::{distinct_keys, BatchOp, RangeOptions};
pub use engine::{EntryIter, KeyIter, StorageEngine, ValueIter};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryEngine;
pub use write::WriteStream;

/// A key. Keys order lexicographically by their bytes.
pub type Key = bytes::Bytes;

/// A stored value.
pub type Value = bytes::Bytes;
