//! Error types for the transactional overlay.

use crate::types::{TransactionId, TxState};
use txkv_storage::{Key, StorageError};
use thiserror::Error;

/// Result type for overlay operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in overlay operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The key is absent from the engine.
    #[error("key not found: {}", String::from_utf8_lossy(key))]
    NotFound {
        /// The key that was looked up.
        key: Key,
    },

    /// Any other engine failure. Fatal to the operation that hit it.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Commit or rollback was called on a transaction that already resolved.
    #[error("transaction {id} already resolved ({state:?})")]
    AlreadyResolved {
        /// The transaction.
        id: TransactionId,
        /// The terminal state it reached first.
        state: TxState,
    },

    /// A background read or write task panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a background task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }

    /// Returns `true` if this error reports a missing key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this error reports caller misuse of a handle.
    #[must_use]
    pub fn is_already_resolved(&self) -> bool {
        matches!(self, Self::AlreadyResolved { .. })
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => Self::NotFound { key },
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err: CoreError = StorageError::not_found("k").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn other_storage_errors_stay_storage() {
        let err: CoreError = StorageError::Closed.into();
        assert!(matches!(err, CoreError::Storage(StorageError::Closed)));
    }

    #[test]
    fn already_resolved_display() {
        let err = CoreError::AlreadyResolved {
            id: TransactionId::new(7),
            state: TxState::Committed,
        };
        assert!(err.is_already_resolved());
        assert_eq!(err.to_string(), "transaction txn:7 already resolved (Committed)");
    }
}
