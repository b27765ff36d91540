//! Capture App Error Types
//!
//! ```text
//! StorageError   local queue failed (database, encoding, closed handle)
//! RemoteError    Remote Report Store call failed (transport, non-2xx, bad body)
//! CaptureError   a form submission could not be captured at all
//! SyncError      a sync pass had to stop before visiting every entry
//! ```
//!
//! A `RemoteError` during submit is not a `CaptureError`: the payload falls
//! back to the local queue and the remote error travels with the outcome.

use reqwest::StatusCode;
use thiserror::Error;

use crate::shared::SharedError;

/// Local Durable Queue failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode captured data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Local store is closed")]
    Closed,

    #[error("Failed to prepare local store: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote Report Store failures
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure: DNS, refused connection, timeout, broken body
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The store answered with a non-2xx status
    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// 401; the stored token has been cleared
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// 2xx answer to a submit without a usable identifier
    #[error("Server response did not include a report ID")]
    MissingIdentifier,

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether resubmitting the same payload later can succeed
    ///
    /// Transport errors, 5xx, 408 and 429 are transient. Other 4xx answers
    /// mean the payload itself was refused.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::MissingIdentifier => true,
            RemoteError::Rejected { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            RemoteError::Unauthorized | RemoteError::InvalidResponse(_) => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RemoteError::Network(e) => e.status(),
            RemoteError::Rejected { status, .. } => Some(*status),
            RemoteError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            RemoteError::MissingIdentifier | RemoteError::InvalidResponse(_) => None,
        }
    }
}

/// Failures of `CaptureController::submit`
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Validation(#[from] SharedError),

    /// The payload could be neither delivered nor queued
    #[error("Failed to save report locally: {0}")]
    Storage(#[from] StorageError),
}

impl CaptureError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CaptureError::Validation(e) if e.is_validation())
    }
}

/// Failures that end a sync pass early
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to read the local queue: {0}")]
    Storage(#[from] StorageError),

    #[error("Sync stopped: session expired, please log in again")]
    Unauthorized,
}
