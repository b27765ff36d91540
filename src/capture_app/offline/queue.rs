//! # In-Memory Report Queue
//!
//! `ReportQueue` without persistence. Useful for tests and for sessions that
//! must not leave data on the device. Follows the same lifecycle as the SQLite
//! queue: after `close()` every operation fails with `StorageError::Closed`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{generate_local_id, ReportQueue};
use crate::capture_app::error::StorageError;
use crate::shared::{QueuedReport, ReportPayload};

/// Report queue held in process memory
#[derive(Debug, Default)]
pub struct MemoryReportQueue {
    entries: RwLock<BTreeMap<String, QueuedReport>>,
    closed: AtomicBool,
}

impl MemoryReportQueue {
    /// Create a new, open, empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the queue and drop its contents
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.entries.write().await.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    async fn collect(&self, unsynced_only: bool) -> Result<Vec<QueuedReport>, StorageError> {
        self.ensure_open()?;
        let entries = self.entries.read().await;
        let mut reports: Vec<QueuedReport> = entries
            .values()
            .filter(|r| !unsynced_only || !r.synced)
            .cloned()
            .collect();
        reports.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        Ok(reports)
    }
}

#[async_trait]
impl ReportQueue for MemoryReportQueue {
    async fn enqueue(&self, payload: ReportPayload) -> Result<QueuedReport, StorageError> {
        self.ensure_open()?;
        let report = QueuedReport::new(generate_local_id(), payload, Utc::now().timestamp_millis());

        let mut entries = self.entries.write().await;
        entries.insert(report.local_id.clone(), report.clone());
        Ok(report)
    }

    async fn list_all(&self) -> Result<Vec<QueuedReport>, StorageError> {
        self.collect(false).await
    }

    async fn list_unsynced(&self) -> Result<Vec<QueuedReport>, StorageError> {
        self.collect(true).await
    }

    async fn mark_synced(&self, local_id: &str, server_id: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        if let Some(report) = entries.get_mut(local_id) {
            report.synced = true;
            report.server_id = Some(server_id.to_string());
        }
        Ok(())
    }

    async fn remove(&self, local_id: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.entries.write().await.remove(local_id);
        Ok(())
    }

    async fn count_unsynced(&self) -> Result<usize, StorageError> {
        self.ensure_open()?;
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|r| !r.synced).count())
    }
}
