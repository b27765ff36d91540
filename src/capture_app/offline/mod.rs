//! # Offline Capture
//!
//! Keeps captured reports on the device while the Remote Report Store cannot
//! be reached, and drains them once it can.
//!
//! ## Key Components
//!
//! - `ReportQueue`: the Local Durable Queue contract
//! - `queue.rs`: in-memory queue, for tests and throwaway sessions
//! - `capture.rs`: capture form and the submit routing controller
//! - `reconciliation.rs`: the sync reconciler and its `Idle`/`Syncing` guard
//!
//! The SQLite-backed queue lives in `local_db`.

pub mod capture;
pub mod queue;
pub mod reconciliation;

pub use capture::{CaptureController, CaptureForm, SubmitOutcome};
pub use queue::MemoryReportQueue;
pub use reconciliation::{
    PassOutcome, SyncFailure, SyncPhase, SyncReconciler, SyncReport, SyncTrigger,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::capture_app::error::StorageError;
use crate::shared::{QueuedReport, ReportPayload};

/// Local Durable Queue
///
/// Holds payloads that have not been confirmed by the server. `mark_synced`
/// and `remove` succeed as no-ops for unknown ids.
#[async_trait]
pub trait ReportQueue: Send + Sync {
    /// Store a payload under a fresh local id, unsynced
    async fn enqueue(&self, payload: ReportPayload) -> Result<QueuedReport, StorageError>;

    /// Every entry, synced or not, oldest first
    async fn list_all(&self) -> Result<Vec<QueuedReport>, StorageError>;

    /// Entries still waiting for the server, oldest first
    async fn list_unsynced(&self) -> Result<Vec<QueuedReport>, StorageError>;

    async fn mark_synced(&self, local_id: &str, server_id: &str) -> Result<(), StorageError>;

    async fn remove(&self, local_id: &str) -> Result<(), StorageError>;

    async fn count_unsynced(&self) -> Result<usize, StorageError>;
}

/// Fresh local id: enqueue time in milliseconds plus a random v4 suffix
pub fn generate_local_id() -> String {
    format!(
        "local-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable `ReportStore` for controller and reconciler tests

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;
    use tokio::sync::Semaphore;

    use crate::capture_app::api::ReportStore;
    use crate::capture_app::error::RemoteError;
    use crate::shared::{CapturedComponent, CapturedData, ReportPayload};

    /// Scripted answer of the fake store
    #[derive(Debug, Clone)]
    pub enum Reply {
        Accept(String),
        Reject(u16, String),
        Unauthorized,
        NoIdentifier,
    }

    /// Answers submissions from a script, then with `fallback`
    #[derive(Debug)]
    pub struct ScriptedStore {
        script: Mutex<VecDeque<Reply>>,
        fallback: Reply,
        calls: AtomicUsize,
        received: Mutex<Vec<ReportPayload>>,
        gate: Option<Semaphore>,
    }

    impl ScriptedStore {
        pub fn accepting() -> Self {
            Self::with_fallback(Reply::Accept("srv-auto".to_string()))
        }

        pub fn with_fallback(fallback: Reply) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
            let store = Self::accepting();
            store.script.lock().unwrap().extend(replies);
            store
        }

        /// Block every submission until `release` hands out a permit
        pub fn gated(mut self) -> Self {
            self.gate = Some(Semaphore::new(0));
            self
        }

        pub fn release(&self, permits: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(permits);
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn received(&self) -> Vec<ReportPayload> {
            self.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    #[async_trait]
    impl ReportStore for ScriptedStore {
        async fn submit_report(&self, payload: &ReportPayload) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            self.received.lock().unwrap().push(payload.clone());

            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match reply {
                Reply::Accept(id) => Ok(id),
                Reply::Reject(code, message) => Err(RemoteError::Rejected {
                    status: StatusCode::from_u16(code).unwrap(),
                    message,
                }),
                Reply::Unauthorized => Err(RemoteError::Unauthorized),
                Reply::NoIdentifier => Err(RemoteError::MissingIdentifier),
            }
        }
    }

    /// Payload with one text component `c1`
    pub fn text_payload(value: &str) -> ReportPayload {
        let mut data = CapturedData::new();
        data.insert("c1".to_string(), CapturedComponent::text("Notes", value));
        ReportPayload::new(
            "t1",
            Some("J-1".to_string()),
            data,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }
}
