//! # Local Database Module
//!
//! SQLite storage for reports captured while offline. `LocalDatabase` is the
//! durable implementation of `ReportQueue`: entries survive process restarts
//! until the sync reconciler removes them.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool, lifecycle and schema management
//! - `schema.rs`: schema versions and migrations
//! - `queries.rs`: SQL statements
//! - `reports.rs`: the `ReportQueue` implementation

pub mod schema;
mod queries;
mod reports;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::capture_app::config::Config;
use crate::capture_app::error::StorageError;
use schema::{pending_migrations, CREATE_MIGRATIONS_TABLE};

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Local database connection manager
///
/// Explicit open/close lifecycle. Once closed, every operation fails with
/// `StorageError::Closed`.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Creates the parent directory if needed and uses WAL mode.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        info!(path = %path.display(), "Opened local report database");
        Ok(db)
    }

    /// Open the database at the configured data directory
    pub async fn open_default(config: &Config) -> Result<Self> {
        Self::open(config.database_path()).await
    }

    /// Private in-memory database, gone once closed or dropped
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single long-lived connection, since each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Close every connection; later operations fail with `StorageError::Closed`
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Closed local report database");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Get connection pool reference
    pub fn pool(&self) -> Result<&SqlitePool> {
        if self.pool.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(&self.pool)
    }

    /// Apply pending schema migrations
    async fn run_migrations(&self) -> Result<()> {
        let pool = self.pool()?;
        sqlx::query(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

        let current = self.schema_version().await?;
        for &(version, statements) in pending_migrations(current) {
            let mut tx = pool.begin().await?;
            for statement in statements.iter() {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(version, "Applied local schema migration");
        }
        Ok(())
    }

    /// Highest applied migration, 0 for a fresh file
    pub async fn schema_version(&self) -> Result<i64> {
        let (version,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(self.pool()?)
                .await?;
        Ok(version)
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let pool = self.pool()?;
        let (total,): (i64,) = sqlx::query_as(queries::COUNT_ALL_REPORTS)
            .fetch_one(pool)
            .await?;
        let (unsynced,): (i64,) = sqlx::query_as(queries::COUNT_UNSYNCED_REPORTS)
            .fetch_one(pool)
            .await?;

        Ok(DatabaseStats {
            total_reports: total as u64,
            unsynced_reports: unsynced as u64,
            schema_version: self.schema_version().await?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Entries in the queue, synced or not
    pub total_reports: u64,
    /// Entries still waiting for the server
    pub unsynced_reports: u64,
    pub schema_version: i64,
}
