//! FlowGuard error types

use thiserror::Error;

/// FlowGuard error type
#[derive(Error, Debug)]
pub enum Error {
    /// Requested policy does not exist or is inactive
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// Malformed input record, rejected before classification
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Durable audit append failed; the enforcement call fails closed
    #[error("Audit write failed: {0}")]
    AuditWriteFailed(String),

    /// A delegated action (encryption, notification) failed
    #[error("Action apply failed: {0}")]
    ActionApplyFailed(String),

    /// Policy document failed to load or validate
    #[error("Policy error: {0}")]
    Policy(String),

    /// Classifier construction error (invalid pattern)
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for FlowGuard operations
pub type Result<T> = std::result::Result<T, Error>;
