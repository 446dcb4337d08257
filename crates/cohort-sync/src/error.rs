//! Sync run error taxonomy.
//!
//! Only failures that invalidate a whole run live here. Feed failures
//! are scoped to one OU (skip and count), apply failures to one entry
//! (log and continue); neither surfaces as a `SyncError`.

use thiserror::Error;

use cohort_core::StoreError;

/// Fatal errors for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Run preconditions not met: missing or unusable endpoint secret,
    /// invalid sync configuration.
    #[error("sync configuration error: {message}")]
    Configuration { message: String },

    /// Another run holds the run guard.
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    /// The membership store failed in a way no narrower scope can absorb.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Caller-supplied snapshot payload was rejected.
    #[error("snapshot payload rejected: {message}")]
    Snapshot { message: String },
}

impl SyncError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration {
            message: message.into(),
        }
    }

    /// Create a snapshot rejection error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        SyncError::Snapshot {
            message: message.into(),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
