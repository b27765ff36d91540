//! Report Builder Pro - Offline Capture Library
//!
//! Client-side core of Report Builder Pro: field reports are captured against
//! a template, sent to the report server when it can be reached, and held in
//! a local durable queue when it cannot. A sync reconciler drains the queue
//! once connectivity returns.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared with the report server
//!   - Report payloads, captured components, templates
//!   - Keyword risk scanner
//!   - Shared error and configuration types
//!
//! - **`capture_app`** - The capture client
//!   - REST client, SQLite offline queue
//!   - Capture form controller and sync reconciler
//!   - Connectivity monitor and background sync service
//!   - `rbp-capture` command-line binary (`cli` feature)
//!
//! # Data Flow
//!
//! ```text
//! CaptureForm ─▶ CaptureController ─┬─ online ──▶ report server
//!                                   └─ offline / failed ─▶ ReportQueue
//!                                                            │
//!                 SyncReconciler ◀── reconnect / manual ─────┘
//!                       └──────────▶ report server, then mark synced + remove
//! ```
//!
//! # Error Handling
//!
//! - `shared::SharedError` for validation and encoding problems
//! - `capture_app::error` for storage, remote, capture and sync failures

/// Shared types and data structures
pub mod shared;

/// Offline capture client
pub mod capture_app;
