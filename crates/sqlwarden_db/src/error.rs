//! Error types for the storage layer.

use sqlwarden_guard::GatewayError;
use std::time::Duration;
use thiserror::Error;

/// Storage operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Storage errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation (unique, foreign key, etc.)
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A statement exceeded its time budget
    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization error (allowed_columns JSON)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }
}

impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => GatewayError::NotFound(msg),
            DbError::Constraint(msg) => GatewayError::Conflict(msg),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}
