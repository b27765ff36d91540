//! Database Schema Definitions
//!
//! Each migration is a list of statements applied in one transaction and
//! recorded in `schema_migrations`.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

pub(super) const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    )
"#;

const MIGRATION_1: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS offline_reports (
        local_id TEXT PRIMARY KEY NOT NULL,
        template_id TEXT NOT NULL,
        job_id TEXT,
        captured_data TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        synced INTEGER NOT NULL DEFAULT 0,
        server_id TEXT,
        created_at INTEGER NOT NULL,
        CHECK (synced = 0 OR server_id IS NOT NULL)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_offline_reports_synced ON offline_reports (synced, created_at)",
];

/// Schema migrations, in version order
pub const MIGRATIONS: &[(i64, &[&str])] = &[(1, MIGRATION_1)];

/// Check if database needs migration
pub fn needs_migration(current_version: i64) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Migrations newer than `current_version`
pub fn pending_migrations(
    current_version: i64,
) -> impl Iterator<Item = &'static (i64, &'static [&'static str])> {
    MIGRATIONS.iter().filter(move |(v, _)| *v > current_version)
}
