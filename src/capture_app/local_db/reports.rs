//! # Offline Report Operations
//!
//! `ReportQueue` over the `offline_reports` table. Captured data is stored as
//! its JSON wire form so queued entries resubmit byte-for-byte what was
//! captured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;

use super::queries::{
    COUNT_UNSYNCED_REPORTS, DELETE_REPORT, INSERT_REPORT, MARK_REPORT_SYNCED, SELECT_ALL_REPORTS,
    SELECT_UNSYNCED_REPORTS,
};
use super::LocalDatabase;
use crate::capture_app::error::StorageError;
use crate::capture_app::offline::{generate_local_id, ReportQueue};
use crate::shared::{CapturedData, QueuedReport, ReportPayload};

#[derive(Debug, FromRow)]
struct QueuedReportRow {
    local_id: String,
    template_id: String,
    job_id: Option<String>,
    captured_data: String,
    timestamp: DateTime<Utc>,
    synced: bool,
    server_id: Option<String>,
    created_at: i64,
}

impl QueuedReportRow {
    fn into_domain(self) -> Result<QueuedReport, StorageError> {
        let captured_data: CapturedData = serde_json::from_str(&self.captured_data)?;
        Ok(QueuedReport {
            local_id: self.local_id,
            template_id: self.template_id,
            job_id: self.job_id,
            captured_data,
            timestamp: self.timestamp,
            synced: self.synced,
            server_id: self.server_id,
            created_at: self.created_at,
        })
    }
}

impl LocalDatabase {
    async fn fetch_reports(&self, sql: &str) -> Result<Vec<QueuedReport>, StorageError> {
        let rows = sqlx::query_as::<_, QueuedReportRow>(sql)
            .fetch_all(self.pool()?)
            .await?;
        rows.into_iter().map(QueuedReportRow::into_domain).collect()
    }
}

#[async_trait]
impl ReportQueue for LocalDatabase {
    async fn enqueue(&self, payload: ReportPayload) -> Result<QueuedReport, StorageError> {
        let report = QueuedReport::new(generate_local_id(), payload, Utc::now().timestamp_millis());
        let captured_data = serde_json::to_string(&report.captured_data)?;

        sqlx::query(INSERT_REPORT)
            .bind(&report.local_id)
            .bind(&report.template_id)
            .bind(&report.job_id)
            .bind(captured_data)
            .bind(report.timestamp)
            .bind(report.created_at)
            .execute(self.pool()?)
            .await?;

        debug!(local_id = %report.local_id, "Queued report locally");
        Ok(report)
    }

    async fn list_all(&self) -> Result<Vec<QueuedReport>, StorageError> {
        self.fetch_reports(SELECT_ALL_REPORTS).await
    }

    async fn list_unsynced(&self) -> Result<Vec<QueuedReport>, StorageError> {
        self.fetch_reports(SELECT_UNSYNCED_REPORTS).await
    }

    async fn mark_synced(&self, local_id: &str, server_id: &str) -> Result<(), StorageError> {
        let result = sqlx::query(MARK_REPORT_SYNCED)
            .bind(local_id)
            .bind(server_id)
            .execute(self.pool()?)
            .await?;

        if result.rows_affected() == 0 {
            debug!(local_id, "mark_synced on missing entry, ignoring");
        }
        Ok(())
    }

    async fn remove(&self, local_id: &str) -> Result<(), StorageError> {
        sqlx::query(DELETE_REPORT)
            .bind(local_id)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }

    async fn count_unsynced(&self) -> Result<usize, StorageError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_UNSYNCED_REPORTS)
            .fetch_one(self.pool()?)
            .await?;
        Ok(count as usize)
    }
}
