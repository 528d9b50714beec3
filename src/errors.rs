//! # Store Errors
//!
//! Internal error type for executor and backend code. Converted into a
//! [`ResultEnvelope`](crate::envelope::ResultEnvelope) at the execution
//! boundary; callers never see it as a `Result`.

use thiserror::Error;

use crate::envelope::ErrorKind;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Single/update/delete matched nothing
    #[error("No rows matched in '{0}'")]
    NotFound(String),

    /// Network, permission or validation failure reported by a backend
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        /// Native error code, preserved opaquely
        code: Option<String>,
    },

    /// A lock guarding in-process state was poisoned
    #[error("Lock poisoned: {0}")]
    Poisoned(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create a not found error for a collection
    pub fn not_found(collection: impl Into<String>) -> Self {
        Self::NotFound(collection.into())
    }

    /// Create a backend error without a native code
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            code: None,
        }
    }

    /// Create a backend error carrying a native code
    pub fn backend_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Machine-checkable kind reported in the envelope
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::BackendError,
        }
    }

    /// Native error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            StoreError::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned(err.to_string())
    }
}
