pub(super) const INSERT_REPORT: &str = r#"
    INSERT INTO offline_reports (
        local_id, template_id, job_id, captured_data, timestamp, synced, server_id, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6)
"#;

pub(super) const SELECT_ALL_REPORTS: &str = r#"
    SELECT local_id, template_id, job_id, captured_data, timestamp, synced, server_id, created_at
    FROM offline_reports
    ORDER BY created_at ASC, local_id ASC
"#;

pub(super) const SELECT_UNSYNCED_REPORTS: &str = r#"
    SELECT local_id, template_id, job_id, captured_data, timestamp, synced, server_id, created_at
    FROM offline_reports
    WHERE synced = 0
    ORDER BY created_at ASC, local_id ASC
"#;

pub(super) const MARK_REPORT_SYNCED: &str = r#"
    UPDATE offline_reports
    SET synced = 1,
        server_id = ?2
    WHERE local_id = ?1
"#;

pub(super) const DELETE_REPORT: &str = "DELETE FROM offline_reports WHERE local_id = ?1";

pub(super) const COUNT_UNSYNCED_REPORTS: &str =
    "SELECT COUNT(*) FROM offline_reports WHERE synced = 0";

pub(super) const COUNT_ALL_REPORTS: &str = "SELECT COUNT(*) FROM offline_reports";
