use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Invalid cache value: {0}")]
    InvalidValue(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let error = CacheError::ConnectionFailed("timeout".to_string());
        assert_eq!(error.to_string(), "Cache connection failed: timeout");
    }

    #[test]
    fn test_operation_failed_display() {
        let error = CacheError::OperationFailed("NOSCRIPT".to_string());
        assert_eq!(error.to_string(), "Cache operation failed: NOSCRIPT");
    }

    #[test]
    fn test_invalid_value_display() {
        let error = CacheError::InvalidValue("abc is not an integer".to_string());
        assert_eq!(error.to_string(), "Invalid cache value: abc is not an integer");
    }
}
