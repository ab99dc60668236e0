use thiserror::Error;

use crate::stock::StockId;

/// Errors that can occur during quantity store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("Stale version for stock {id}: expected version {expected}")]
    StaleVersion { id: StockId, expected: i64 },
    #[error("Store is busy: {0}")]
    Busy(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_not_found_display() {
        let error = RepositoryError::NotFound {
            entity_type: "Stock",
            id: "42".to_string(),
        };
        assert_eq!(error.to_string(), "Stock not found: 42");
    }

    #[test]
    fn test_repository_error_stale_version_display() {
        let error = RepositoryError::StaleVersion { id: 7, expected: 3 };
        assert_eq!(
            error.to_string(),
            "Stale version for stock 7: expected version 3"
        );
    }

    #[test]
    fn test_repository_error_busy_display() {
        let error = RepositoryError::Busy("database is locked".to_string());
        assert_eq!(error.to_string(), "Store is busy: database is locked");
    }

    #[test]
    fn test_repository_error_connection_failed_display() {
        let error = RepositoryError::ConnectionFailed("timeout after 30s".to_string());
        assert_eq!(error.to_string(), "Connection failed: timeout after 30s");
    }

    #[test]
    fn test_repository_error_invalid_data_display() {
        let error = RepositoryError::InvalidData("negative quantity".to_string());
        assert_eq!(error.to_string(), "Invalid data: negative quantity");
    }
}
