//! FolderLift Ledger - Durable record of completed uploads
//!
//! SQLite-based storage for the fingerprint ledger: which local folders
//! were fully uploaded, and where they landed remotely.
//!
//! ## Architecture
//!
//! This crate implements the `ILedger` port from `folderlift-core` using
//! SQLite as the storage backend. It is a driven (secondary) adapter in the
//! hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteLedger`] - `ILedger` implementation
//! - [`LedgerError`] - Error types for ledger operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use folderlift_ledger::{DatabasePool, SqliteLedger};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/folderlift/ledger.db")).await?;
//! let ledger = SqliteLedger::new(pool.pool().clone());
//! // Use ledger as ILedger...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteLedger;

/// Errors that can occur during ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be turned back into a domain value
    #[error("Corrupt ledger row: {0}")]
    CorruptRow(String),

    /// A 1-based index did not address an existing entry
    #[error("Index {index} out of range (ledger has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::QueryFailed(e.to_string())
    }
}
