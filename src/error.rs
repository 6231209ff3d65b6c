use thiserror::Error;

/// Air monitor error types
#[derive(Error, Debug, Clone)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Fusion source failed: {0}")]
    Source(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Storage(format!("JSON: {}", err))
    }
}
