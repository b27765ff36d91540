//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the capture client, the command-line tool and anything else that talks to
//! the Report Builder Pro REST API.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types: the report payload
//! submitted to `POST /api/reports`, the template structure a capture form is
//! generated from, the keyword risk scanner, and the shared error and
//! configuration types. Apart from loading a config file, nothing in here
//! performs I/O.

/// Report payloads and captured components
pub mod report;

/// Report templates
pub mod template;

/// Keyword risk detection over report text
pub mod risk;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use report::{
    CapturedComponent, CapturedData, ComponentKind, QueuedReport, ReportPayload, ReportSummary,
    SubmitReceipt,
};
pub use template::{Template, TemplateComponent};
pub use risk::{analyze_report_text, report_text, DetectedIssue, RiskCategory, Severity};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
