//! Shared Error Types
//!
//! This module defines error types that can be raised anywhere a report
//! payload is assembled or decoded, independent of storage or transport.
//!
//! # Error Categories
//!
//! - `ValidationError` - Submission data rejected before any I/O happens
//!
//! # Usage
//!
//! ```rust
//! use report_builder_pro::shared::error::SharedError;
//!
//! let error = SharedError::validation("capturedData", "Please fill in at least one field");
//! assert!(error.is_validation());
//! ```
use thiserror::Error;

/// Shared error types that can occur on either side of the API
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised by input validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }
}
