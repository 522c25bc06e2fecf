use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Script execution error: {0}")]
    ScriptExecutionError(String),

    #[error("File system error: {0}")]
    FileSystemError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AdmissionError {
    /// Store-class failures are absorbed by the limiter's fail-open policy.
    /// Everything else propagates to the caller.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            AdmissionError::StoreUnavailable(_)
                | AdmissionError::RedisError(_)
                | AdmissionError::ScriptExecutionError(_)
        )
    }
}

/// Result type alias for admission-control operations
pub type Result<T> = std::result::Result<T, AdmissionError>;
