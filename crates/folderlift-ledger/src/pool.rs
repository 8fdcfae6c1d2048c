//! Database connection pool management
//!
//! Wraps SQLx's SqlitePool with directory creation, WAL journaling,
//! automatic schema migration and an in-memory mode for tests.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::LedgerError;

/// Manages a pool of SQLite connections for the upload ledger
///
/// - WAL journal mode, so a torn write is rolled back on next open
/// - 5 max connections for file-based databases
/// - 1 connection for in-memory databases (required for data persistence)
/// - 5-second busy timeout to handle write contention
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the ledger database at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ConnectionFailed` if the connection cannot be established,
    /// or `LedgerError::MigrationFailed` if schema migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::ConnectionFailed(format!(
                        "Failed to create ledger directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                LedgerError::ConnectionFailed(format!(
                    "Failed to open ledger at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "Ledger database opened");

        Ok(Self { pool })
    }

    /// Creates an in-memory ledger database for testing
    ///
    /// Uses a single connection since SQLite in-memory databases are
    /// per-connection.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ConnectionFailed` if the connection cannot be established,
    /// or `LedgerError::MigrationFailed` if schema migrations fail.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                LedgerError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory ledger initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), LedgerError> {
        let migration_sql = include_str!("migrations/20260301_upload_ledger.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                LedgerError::MigrationFailed(format!("Failed to create ledger schema: {}", e))
            })?;

        tracing::debug!("Ledger migrations completed");
        Ok(())
    }
}
