//! Error types for PartLog core

use thiserror::Error;

/// Errors raised while interpreting core values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown part event type code: {0}")]
    UnknownEventCode(u8),

    #[error("Unknown part event type: {0}")]
    UnknownEventName(String),

    #[error("Unknown log kind: {0}")]
    UnknownLogKind(String),

    #[error("Invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },
}
