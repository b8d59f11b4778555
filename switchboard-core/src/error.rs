//! Error types for switchboard operations.
//!
//! None of these escape a public executor operation: failures are folded
//! into the uniform result envelope at each operation's boundary. The
//! types exist for the internal seams (connection source, cache store)
//! and for collaborators that load configuration.

use thiserror::Error;

/// Configuration errors. A missing required value is fatal to the host
/// application at startup; this layer never tolerates it at call time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Relational-store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Statement failed: {reason}")]
    StatementFailed { reason: String },

    #[error("Commit failed: {reason}")]
    CommitFailed { reason: String },

    #[error("Rollback failed: {reason}")]
    RollbackFailed { reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

/// Side-cache errors. Always absorbed where they occur: caching is
/// best-effort and must never turn a working read or write path into a
/// failing one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache operation failed on {key}: {reason}")]
    OperationFailed { key: String, reason: String },
}

/// Master error type for all switchboard errors.
#[derive(Debug, Clone, Error)]
pub enum SwitchboardError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for switchboard operations.
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;
