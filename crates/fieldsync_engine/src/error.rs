//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Route-assignment lookup failed; the run's scope fails closed.
    #[error("scope resolution failed: {0}")]
    ScopeResolution(String),

    /// Remote read failed; the run aborts without advancing its cursor.
    #[error("remote fetch failed: {message}")]
    RemoteFetch {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Remote write failed; the push aborts without advancing its cursor.
    #[error("remote write failed: {message}")]
    RemoteWrite {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Local relational store failed.
    #[error("local store error: {0}")]
    LocalStore(String),

    /// Cursor or statistics row could not be persisted; the run fails
    /// outright.
    #[error("metadata write failed: {0}")]
    MetadataWrite(String),

    /// Entity type not registered with the runner.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    /// Declared entity dependencies do not form a DAG.
    #[error("dependency cycle involving entity type: {0}")]
    DependencyCycle(String),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable remote fetch error.
    pub fn fetch_retryable(message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote fetch error.
    pub fn fetch_fatal(message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a retryable remote write error.
    pub fn write_retryable(message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote write error.
    pub fn write_fatal(message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a local store error.
    pub fn local(message: impl Into<String>) -> Self {
        Self::LocalStore(message.into())
    }

    /// Creates a metadata write error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::MetadataWrite(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RemoteFetch { retryable, .. } => *retryable,
            SyncError::RemoteWrite { retryable, .. } => *retryable,
            SyncError::ScopeResolution(_) => true,
            _ => false,
        }
    }
}
