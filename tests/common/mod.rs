//! Common test utilities and helpers
//!
//! - Report payload fixtures
//! - Mock report server wiring
//! - Offline queue databases

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use report_builder_pro::capture_app::{ApiClient, Config, LocalDatabase};
use report_builder_pro::shared::{AppConfig, CapturedComponent, CapturedData, ReportPayload};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-token";

/// Payload with a single filled notes field
pub fn notes_payload(notes: &str) -> ReportPayload {
    let mut data = CapturedData::new();
    data.insert("0_comp-text-1".to_string(), CapturedComponent::text("Notes", notes));
    ReportPayload::new(
        "test-template",
        Some("JOB-7".to_string()),
        data,
        Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
    )
}

/// API client pointed at the mock server, logged in with `TEST_TOKEN`
pub fn api_client(server: &MockServer) -> Arc<ApiClient> {
    let mut config = Config::with_builder(AppConfig::builder().server_url(server.uri())).unwrap();
    config.set_token(Some(TEST_TOKEN.to_string()));
    Arc::new(ApiClient::new(&config).unwrap())
}

/// File-backed queue in a fresh temporary directory
///
/// Keep the `TempDir` alive for as long as the database is used.
pub async fn temp_database() -> (Arc<LocalDatabase>, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = LocalDatabase::open(dir.path().join("offline_reports.db")).await.unwrap();
    (Arc::new(db), dir)
}

/// Mount a `POST /api/reports` handler answering with `server_id`
pub async fn accept_reports(server: &MockServer, server_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": server_id, "message": "Report saved successfully" })),
        )
        .mount(server)
        .await;
}
