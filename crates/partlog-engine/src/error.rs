//! Error types for the flush engine

use thiserror::Error;

use partlog_core::LogKind;
use partlog_storage::StorageError;

/// Errors surfaced by the lifecycle and admin APIs
///
/// Producers never see these: `emit` swallows every failure.
#[derive(Debug, Error)]
pub enum SystemLogError {
    /// Invalid configuration, detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// The process-wide registry was installed twice
    #[error("System logs already initialized")]
    AlreadyInitialized,

    /// No process-wide registry has been installed
    #[error("System logs not initialized")]
    NotInitialized,

    /// The registry or the log has been shut down
    #[error("System logs are shut down")]
    ShutDown,

    /// The log kind has no configuration entry
    #[error("Log {0} is not configured")]
    NotConfigured(LogKind),

    /// Startup outside a tokio runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SystemLogError {
    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for engine operations
pub type SystemLogResult<T> = Result<T, SystemLogError>;
