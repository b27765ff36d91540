//! Offline Capture Client
//!
//! Field client for the report server: captures reports against a template,
//! keeps them on the device while the server is unreachable, and syncs them
//! back once it is.
//!
//! # Module Structure
//!
//! ```text
//! capture_app/
//! ├── mod.rs        - Module exports and documentation
//! ├── main.rs       - rbp-capture command-line entry point
//! ├── config.rs     - Server URL, data directory and session token
//! ├── error.rs      - Storage, remote, capture and sync errors
//! ├── api.rs        - REST client for the report server
//! ├── local_db/     - SQLite-backed offline queue
//! ├── offline/      - Queue contract, capture controller, sync reconciler
//! └── sync/         - Connectivity monitor and background sync service
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod local_db;
pub mod offline;
pub mod sync;

// Re-export commonly used types
pub use api::{ApiClient, HealthStatus, LoginResponse, ReachabilityProbe, ReportStore};
pub use config::Config;
pub use error::{CaptureError, RemoteError, StorageError, SyncError};
pub use local_db::{DatabaseStats, LocalDatabase};
pub use offline::{
    CaptureController, CaptureForm, MemoryReportQueue, PassOutcome, ReportQueue, SubmitOutcome,
    SyncPhase, SyncReconciler, SyncReport, SyncTrigger,
};
pub use sync::network_monitor::{ConnectivityMonitor, ListenerId, NetworkStatus};
pub use sync::{SyncService, SyncStatus};
