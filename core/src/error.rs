//! Error types for the API contract layer.
//!
//! # Design
//! `ApiError` separates "no response arrived" (`Network`, `Timeout`) from
//! "a response arrived and says no" (`Classified`). Callers branch on the
//! variant or on `status_code()`, never on message text. `ClassifiedError`
//! displays as its bare message so screens can show it directly.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// A failure reported by the server, ready for display.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub message: String,
    pub status_code: Option<u16>,
    /// Field-level validation detail, as sent under `errors`.
    pub validation_details: Option<Value>,
}

impl ClassifiedError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
            validation_details: None,
        }
    }
}

/// Errors returned by the dispatcher and the envelope codec.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP call failed before any response was received.
    #[error("network error: {message}")]
    Network { message: String },

    /// The caller-supplied deadline elapsed while waiting for the server.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The server responded and signalled failure.
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// A success response whose body did not match its declared shape.
    #[error("malformed response (HTTP {status}): {reason}")]
    MalformedResponse { status: u16, reason: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    /// HTTP status attached to the failure, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Classified(e) => e.status_code,
            ApiError::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_status(&self, status: u16) -> bool {
        self.status_code() == Some(status)
    }

    pub fn as_classified(&self) -> Option<&ClassifiedError> {
        match self {
            ApiError::Classified(e) => Some(e),
            _ => None,
        }
    }
}

/// Failures of the persistent key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes exist but cannot be decoded.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("storage backend failed: {0}")]
    Backend(String),
}
