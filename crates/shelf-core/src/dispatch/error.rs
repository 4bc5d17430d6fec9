//! Dispatch error types

use serde::Serialize;
use thiserror::Error;

use crate::models::{InvalidValue, Record};
use crate::resolver::ResolveError;
use crate::storage::StorageError;

/// Caller-facing failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    NotFound,
    Ambiguous,
    Validation,
    Io,
}

/// Errors raised while carrying out an intent
///
/// None of these leave a partial change behind: validation and resolution
/// happen before the store is touched, and store writes are whole-file.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Required input missing or unusable
    #[error("{0}")]
    Validation(String),

    /// Target record does not exist or the reference matched nothing
    #[error("{0}")]
    NotFound(String),

    /// Reference matched several records
    #[error("{message}")]
    Ambiguous {
        message: String,
        candidates: Vec<Record>,
    },

    #[error("unsupported operation '{0}'")]
    Unsupported(String),

    #[error("malformed intent: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Failure category reported to the caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Unsupported(_) | Self::Malformed(_) => {
                ErrorKind::Validation
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::Storage(StorageError::Schema { .. }) => ErrorKind::Schema,
            Self::Storage(_) => ErrorKind::Io,
        }
    }

    /// Records the caller can pick from, for ambiguous references
    pub fn candidates(&self) -> &[Record] {
        match self {
            Self::Ambiguous { candidates, .. } => candidates,
            _ => &[],
        }
    }
}

impl From<ResolveError> for DispatchError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Ambiguous {
                kind,
                value,
                candidates,
            } => Self::Ambiguous {
                message: format!(
                    "{} records match {} '{}'; give the id or be more specific",
                    candidates.len(),
                    kind,
                    value
                ),
                candidates,
            },
            ResolveError::Storage(e) => Self::Storage(e),
            ResolveError::NotFound { .. } => Self::NotFound(error.to_string()),
            other => Self::NotFound(format!("could not identify a single record: {}", other)),
        }
    }
}

impl From<InvalidValue> for DispatchError {
    fn from(error: InvalidValue) -> Self {
        Self::Validation(error.to_string())
    }
}
