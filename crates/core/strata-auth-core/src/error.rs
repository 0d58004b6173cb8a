//! Platform error codes shared by the identity pipeline and the REST controller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error code carried by every platform error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const OTHER_CAUSE: ErrorCode = ErrorCode(-1);
    pub const INTERNAL_SERVER_ERROR: ErrorCode = ErrorCode(1);
    pub const CONNECTION_FAILED: ErrorCode = ErrorCode(100);
    pub const OBJECT_NOT_FOUND: ErrorCode = ErrorCode(101);
    pub const INVALID_JSON: ErrorCode = ErrorCode(107);
    pub const INVALID_SESSION_TOKEN: ErrorCode = ErrorCode(209);
    /// Raised by the storage layer when a transaction lost an optimistic
    /// concurrency race and may be retried from scratch.
    pub const TRANSACTION_CONFLICT: ErrorCode = ErrorCode(251);
    pub const UNSUPPORTED_SERVICE: ErrorCode = ErrorCode(252);
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An error as the platform reports it to clients: a code and a message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct PlatformError {
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
}

impl PlatformError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn other_cause(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OTHER_CAUSE, message)
    }

    pub fn object_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OBJECT_NOT_FOUND, message)
    }

    pub fn invalid_session_token() -> Self {
        Self::new(ErrorCode::INVALID_SESSION_TOKEN, "Invalid session token")
    }

    pub fn transaction_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TRANSACTION_CONFLICT, message)
    }

    /// The error a router raises when no route matches `method` and `path`.
    pub fn cannot_route(method: &str, path: &str) -> Self {
        Self::new(ErrorCode::INVALID_JSON, format!("cannot route {method} {path}"))
    }

    /// Whether this is exactly the no-route error for `method` and `path`.
    pub fn is_cannot_route(&self, method: &str, path: &str) -> bool {
        self.code == ErrorCode::INVALID_JSON && self.message == format!("cannot route {method} {path}")
    }
}
