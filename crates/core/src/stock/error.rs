use thiserror::Error;

use crate::cache::CacheError;
use crate::storage::RepositoryError;

use super::StockId;

/// Typed failure of a stock operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("Stock not found: {id}")]
    NotFound { id: StockId },
    #[error("Insufficient quantity for stock {id}: available {available}, requested {requested}")]
    InsufficientQuantity {
        id: StockId,
        available: i64,
        requested: i64,
    },
    #[error("Concurrent modification of stock {id}")]
    Conflict { id: StockId },
    #[error("Gave up on stock {id} after {attempts} attempts")]
    Exhausted { id: StockId, attempts: u32 },
    #[error("Could not acquire lock {key}")]
    LockAcquisitionFailed { key: String },
    #[error("Cache synchronization failed for stock {id}: {reason}")]
    SynchronizationFailed { id: StockId, reason: String },
    #[error(
        "Cache and store diverged for stock {id}: store write failed ({store_error}) \
         and restoring {amount} to the cache failed ({cache_error})"
    )]
    CompensationFailed {
        id: StockId,
        amount: i64,
        store_error: String,
        cache_error: String,
    },
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("Quantity must not be negative, got {0}")]
    InvalidQuantity(i64),
    #[error(transparent)]
    Storage(RepositoryError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl StockError {
    /// Translates a store error raised while working on `id`.
    ///
    /// Version and lock contention become [`StockError::Conflict`], a missing
    /// row becomes [`StockError::NotFound`], everything else is wrapped.
    pub fn from_repository(id: StockId, err: RepositoryError) -> Self {
        match err {
            RepositoryError::StaleVersion { .. } | RepositoryError::Busy(_) => {
                StockError::Conflict { id }
            }
            RepositoryError::NotFound { .. } => StockError::NotFound { id },
            other => StockError::Storage(other),
        }
    }

    /// Returns true for the kinds a retry loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StockError::Conflict { .. } | StockError::LockAcquisitionFailed { .. }
        )
    }

    /// Returns a stable snake_case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StockError::NotFound { .. } => "not_found",
            StockError::InsufficientQuantity { .. } => "insufficient_quantity",
            StockError::Conflict { .. } => "conflict",
            StockError::Exhausted { .. } => "exhausted",
            StockError::LockAcquisitionFailed { .. } => "lock_acquisition_failed",
            StockError::SynchronizationFailed { .. } => "synchronization_failed",
            StockError::CompensationFailed { .. } => "compensation_failed",
            StockError::InvalidAmount(_) => "invalid_amount",
            StockError::InvalidQuantity(_) => "invalid_quantity",
            StockError::Storage(_) => "storage",
            StockError::Cache(_) => "cache",
        }
    }
}

/// Errors from parsing a strategy selector.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyParseError {
    #[error("Unknown decrement strategy: {0}")]
    Unknown(String),
    #[error("Retry count must be at least 1")]
    ZeroRetries,
}
