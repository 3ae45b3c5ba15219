//! Error types for the EWT service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific resolution scenarios
#[derive(Debug, thiserror::Error)]
pub enum EwtError {
    #[error("Invalid queue locator: {reason}")]
    InvalidQueueLocator { reason: String },

    #[error("Metrics source call '{operation}' failed: {message}")]
    UpstreamMetrics { operation: String, message: String },

    #[error("External call '{operation}' timed out after {timeout_ms}ms")]
    UpstreamTimeout { operation: String, timeout_ms: u64 },

    #[error("Estimate store read failed: {message}")]
    StoreRead { message: String },

    #[error("Estimate store write failed for queue '{queue_id}': {message}")]
    StorePersist { queue_id: String, message: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl EwtError {
    /// Whether the error came from an external collaborator rather than this service
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            EwtError::UpstreamMetrics { .. }
                | EwtError::UpstreamTimeout { .. }
                | EwtError::StoreRead { .. }
                | EwtError::StorePersist { .. }
        )
    }
}
