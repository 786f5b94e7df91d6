//! Error types for opvault operations

use crate::provider::onepassword::{BackendError, PathError};
use thiserror::Error;

/// The main error type for opvault operations
///
/// Every variant produced by a provider operation carries the operation name
/// and the request path, so a failure can be diagnosed from its message alone.
/// Backend failures keep the original backend error as their source.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("{operation} '{path}': invalid path: {source}")]
    InvalidPath {
        operation: &'static str,
        path: String,
        #[source]
        source: PathError,
    },
    #[error("{operation} '{path}': secret not found")]
    NotFound {
        operation: &'static str,
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("{operation} '{path}': access denied")]
    AccessDenied {
        operation: &'static str,
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("{operation} '{path}': ambiguous path, multiple matches found")]
    Ambiguous {
        operation: &'static str,
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("{operation} '{path}': provider is closed")]
    Closed {
        operation: &'static str,
        path: String,
    },
    #[error("{operation} '{path}': {source}")]
    Unknown {
        operation: &'static str,
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("Provider backend '{0}' not found")]
    ProviderNotFound(String),
    #[error("Provider operation failed: {0}")]
    ProviderOperationFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Discriminant of [`VaultError`] for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    AccessDenied,
    Ambiguous,
    Closed,
    Unknown,
    ProviderNotFound,
    ProviderOperationFailed,
    Config,
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidPath { .. } => ErrorKind::InvalidPath,
            VaultError::NotFound { .. } => ErrorKind::NotFound,
            VaultError::AccessDenied { .. } => ErrorKind::AccessDenied,
            VaultError::Ambiguous { .. } => ErrorKind::Ambiguous,
            VaultError::Closed { .. } => ErrorKind::Closed,
            VaultError::Unknown { .. } => ErrorKind::Unknown,
            VaultError::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            VaultError::ProviderOperationFailed(_) => ErrorKind::ProviderOperationFailed,
            VaultError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The operation that failed, when the error came from one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            VaultError::InvalidPath { operation, .. }
            | VaultError::NotFound { operation, .. }
            | VaultError::AccessDenied { operation, .. }
            | VaultError::Ambiguous { operation, .. }
            | VaultError::Closed { operation, .. }
            | VaultError::Unknown { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// The request path the error refers to, when the error came from an operation.
    pub fn path(&self) -> Option<&str> {
        match self {
            VaultError::InvalidPath { path, .. }
            | VaultError::NotFound { path, .. }
            | VaultError::AccessDenied { path, .. }
            | VaultError::Ambiguous { path, .. }
            | VaultError::Closed { path, .. }
            | VaultError::Unknown { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn closed(operation: &'static str, path: impl Into<String>) -> Self {
        VaultError::Closed {
            operation,
            path: path.into(),
        }
    }

    pub(crate) fn invalid_path(
        operation: &'static str,
        path: impl Into<String>,
        source: PathError,
    ) -> Self {
        VaultError::InvalidPath {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// A type alias for `Result<T, VaultError>`
pub type Result<T> = std::result::Result<T, VaultError>;
