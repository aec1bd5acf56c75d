//! Error taxonomy shared by every gateway component.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Gateway result type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Stable classification of a [`GatewayError`], reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }

    /// Client errors are never worth retrying.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorKind::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by validation, permission checks and execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The statement is malformed, unsupported or unsafe.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced table does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The principal lacks the grant required for the statement.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Execution or storage failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            GatewayError::Conflict(_) => ErrorKind::Conflict,
            GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::Validation(m)
            | GatewayError::NotFound(m)
            | GatewayError::PermissionDenied(m)
            | GatewayError::Conflict(m)
            | GatewayError::Internal(m) => m,
        }
    }
}
