//! End-to-end offline capture and sync against a mock report server

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{accept_reports, api_client, notes_payload, temp_database, TEST_TOKEN};
use pretty_assertions::assert_eq;
use report_builder_pro::capture_app::{
    ApiClient, CaptureController, CaptureError, CaptureForm, Config, ConnectivityMonitor,
    LocalDatabase, PassOutcome, ReachabilityProbe, RemoteError, ReportQueue, SubmitOutcome,
    SyncError, SyncReconciler, SyncService, SyncTrigger,
};
use report_builder_pro::shared::{AppConfig, Template};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn filled_form() -> CaptureForm {
    let mut form = CaptureForm::new(Template::test_template());
    form.set_job_id("JOB-7");
    form.set_field("comp-title-1", "Level 3 slab pour").unwrap();
    form.set_field("comp-text-1", "Formwork checked, pour at 10:00").unwrap();
    form
}

#[tokio::test]
async fn test_offline_capture_then_sync_on_reconnect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .and(body_partial_json(json!({ "templateId": "test-template", "jobId": "JOB-7" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "srv-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let (db, _dir) = temp_database().await;
    let api = api_client(&server);
    let monitor = ConnectivityMonitor::new(false);

    let controller = CaptureController::new(Arc::clone(&db), Arc::clone(&api), monitor.clone());
    let mut form = filled_form();
    let outcome = controller.submit(&mut form).await.unwrap();

    assert!(outcome.is_saved_offline());
    assert_eq!(form.field("comp-title-1"), Some(""));
    let pending = db.list_unsynced().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].synced);
    assert_eq!(pending[0].job_id.as_deref(), Some("JOB-7"));

    let config = AppConfig::builder()
        .server_url(server.uri())
        .min_sync_interval_secs(0)
        .build()
        .unwrap();
    let service = SyncService::from_config(Arc::clone(&db), api, monitor.clone(), &config);

    monitor.set_online(true);
    let outcome = service.sync_now().await.unwrap();

    assert_matches!(
        outcome,
        PassOutcome::Completed(ref report) if report.synced == 1 && report.failed == 0
    );
    assert!(db.list_unsynced().await.unwrap().is_empty());
    assert!(db.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_submission_sends_and_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let db = Arc::new(LocalDatabase::open_in_memory().await.unwrap());
    let controller = CaptureController::new(
        Arc::clone(&db),
        api_client(&server),
        ConnectivityMonitor::new(true),
    );

    let mut form = CaptureForm::new(Template::test_template());
    form.set_field("comp-text-1", "   ").unwrap();

    let err = controller.submit(&mut form).await.unwrap_err();
    assert_matches!(err, CaptureError::Validation(_));
    assert!(err.is_validation());
    assert_eq!(form.field("comp-text-1"), Some("   "));
    assert_eq!(db.count_unsynced().await.unwrap(), 0);
}

#[tokio::test]
async fn test_server_error_falls_back_to_queue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "message": "Database unavailable" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = Arc::new(LocalDatabase::open_in_memory().await.unwrap());
    let controller = CaptureController::new(
        Arc::clone(&db),
        api_client(&server),
        ConnectivityMonitor::new(true),
    );

    let outcome = controller.submit_payload(notes_payload("rebar delivered")).await.unwrap();

    let SubmitOutcome::SavedOffline { report, cause } = outcome else {
        panic!("expected offline fallback");
    };
    let cause = cause.unwrap();
    assert_eq!(cause.status().map(|s| s.as_u16()), Some(503));
    assert!(cause.to_string().contains("Database unavailable"));
    assert!(cause.is_retryable());

    let pending = db.list_unsynced().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].local_id, report.local_id);
}

#[tokio::test]
async fn test_online_submit_skips_queue() {
    let server = MockServer::start().await;
    accept_reports(&server, "srv-9").await;

    let db = Arc::new(LocalDatabase::open_in_memory().await.unwrap());
    let controller = CaptureController::new(
        Arc::clone(&db),
        api_client(&server),
        ConnectivityMonitor::new(true),
    );

    let mut form = filled_form();
    let outcome = controller.submit(&mut form).await.unwrap();

    assert_eq!(outcome.server_id(), Some("srv-9"));
    assert_eq!(form.job_id(), "");
    assert!(db.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_failure_keeps_rejected_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .and(body_partial_json(json!({ "jobId": "BAD" })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Unknown template" })),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    accept_reports(&server, "srv-ok").await;

    let (db, _dir) = temp_database().await;
    db.enqueue(notes_payload("first")).await.unwrap();
    let mut bad = notes_payload("second");
    bad.job_id = Some("BAD".to_string());
    let bad = db.enqueue(bad).await.unwrap();
    db.enqueue(notes_payload("third")).await.unwrap();

    let reconciler = SyncReconciler::new(
        Arc::clone(&db),
        api_client(&server),
        ConnectivityMonitor::new(true),
    );
    let outcome = reconciler.run(SyncTrigger::Manual).await.unwrap();

    let PassOutcome::Completed(report) = outcome else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.synced, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].local_id, bad.local_id);
    assert!(!report.failures[0].retryable);
    assert!(report.failures[0].reason.contains("Unknown template"));

    let left = db.list_all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].local_id, bad.local_id);
    assert!(!left[0].synced);
}

#[tokio::test]
async fn test_expired_session_stops_pass() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = Arc::new(LocalDatabase::open_in_memory().await.unwrap());
    db.enqueue(notes_payload("a")).await.unwrap();
    db.enqueue(notes_payload("b")).await.unwrap();

    let api = api_client(&server);
    let reconciler = SyncReconciler::new(
        Arc::clone(&db),
        Arc::clone(&api),
        ConnectivityMonitor::new(true),
    );

    let err = reconciler.run(SyncTrigger::Manual).await.unwrap_err();
    assert_matches!(err, SyncError::Unauthorized);
    assert_eq!(api.token(), None);
    assert_eq!(db.count_unsynced().await.unwrap(), 2);
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let (db, dir) = temp_database().await;
    let queued = db.enqueue(notes_payload("kept")).await.unwrap();
    db.close().await;

    let reopened = LocalDatabase::open(dir.path().join("offline_reports.db")).await.unwrap();
    let pending = reopened.list_unsynced().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].local_id, queued.local_id);
    assert_eq!(pending[0].payload(), queued.payload());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = Config::with_builder(AppConfig::builder().server_url(uri)).unwrap();
    let api = ApiClient::new(&config).unwrap();
    assert!(!api.is_reachable().await);
    let err = api.submit_report(&notes_payload("x")).await.unwrap_err();
    assert_matches!(err, RemoteError::Network(_));
    assert!(err.is_retryable());
}
