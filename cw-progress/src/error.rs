//! Error types for cw-progress
//!
//! Defines service-specific error types using thiserror for clear error
//! propagation. Every entrypoint recovers these at the API boundary and
//! converts them to a structured failure response.

use thiserror::Error;

/// Main error type for the progress service
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid user/client context; no state mutation attempted
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Required identifiers absent; surfaced before any store access
    #[error("Missing parameters: {0}")]
    MissingParameters(String),

    /// Update targeted a record that no longer exists
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Content package unknown or deleted
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// Interaction would exceed the package's attempt limit
    #[error("Attempt limit reached: {0}")]
    AttemptLimit(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed stored payload or request body
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<cw_common::Error> for Error {
    fn from(err: cw_common::Error) -> Self {
        match err {
            cw_common::Error::Database(e) => Error::Database(e),
            cw_common::Error::NotFound(msg) => Error::RecordNotFound(msg),
            cw_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(format!("Payload serialization: {}", err))
    }
}

/// Convenience Result type using cw-progress Error
pub type Result<T> = std::result::Result<T, Error>;
