//! SQLite implementation of ILedger
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                   |
//! |-------------------|----------|--------------------------------------------|
//! | FingerprintHash   | TEXT     | `.as_str()` / `FingerprintHash::new()`     |
//! | PathBuf           | TEXT     | lossy UTF-8 string                         |
//! | RemoteId          | TEXT     | `.as_str()` / `RemoteId::new()`            |
//! | DateTime<Utc>     | TEXT     | RFC 3339 via `to_rfc3339()`                |
//! | LedgerStatus      | TEXT     | `as_str()` / `FromStr`                     |

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use folderlift_core::domain::{FingerprintHash, LedgerEntry, LedgerStatus, RemoteId};
use folderlift_core::ports::ILedger;

use crate::LedgerError;

/// SQLite-backed upload ledger
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Creates a ledger over an already-migrated connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| LedgerError::CorruptRow(format!("bad timestamp '{}': {}", s, e)))
}

fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, LedgerError> {
    let fingerprint: String = row.try_get("fingerprint")?;
    let folder_path: String = row.try_get("folder_path")?;
    let folder_name: String = row.try_get("folder_name")?;
    let remote_id: String = row.try_get("remote_id")?;
    let uploaded_at: String = row.try_get("uploaded_at")?;
    let status: String = row.try_get("status")?;

    Ok(LedgerEntry {
        fingerprint: FingerprintHash::new(fingerprint)
            .map_err(|e| LedgerError::CorruptRow(e.to_string()))?,
        folder_path: PathBuf::from(folder_path),
        folder_name,
        remote_id: RemoteId::new(remote_id).map_err(|e| LedgerError::CorruptRow(e.to_string()))?,
        uploaded_at: parse_datetime(&uploaded_at)?,
        status: status
            .parse::<LedgerStatus>()
            .map_err(|e| LedgerError::CorruptRow(e.to_string()))?,
    })
}

const SELECT_COLUMNS: &str =
    "SELECT id, fingerprint, folder_path, folder_name, remote_id, uploaded_at, status \
     FROM upload_ledger";

// ============================================================================
// ILedger implementation
// ============================================================================

#[async_trait::async_trait]
impl ILedger for SqliteLedger {
    async fn lookup(&self, fingerprint: &FingerprintHash) -> anyhow::Result<Option<LedgerEntry>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE fingerprint = ?"))
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(LedgerError::from)?;

        match row {
            Some(ref r) => Ok(Some(entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn record(&self, entry: &LedgerEntry) -> anyhow::Result<()> {
        // A single upsert statement is atomic; an existing row keeps its id
        // and therefore its position in the listing order.
        sqlx::query(
            "INSERT INTO upload_ledger \
             (fingerprint, folder_path, folder_name, remote_id, uploaded_at, status) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(fingerprint) DO UPDATE SET \
               folder_path = excluded.folder_path, \
               folder_name = excluded.folder_name, \
               remote_id = excluded.remote_id, \
               uploaded_at = excluded.uploaded_at, \
               status = excluded.status",
        )
        .bind(entry.fingerprint.as_str())
        .bind(entry.folder_path.to_string_lossy().into_owned())
        .bind(&entry.folder_name)
        .bind(entry.remote_id.as_str())
        .bind(entry.uploaded_at.to_rfc3339())
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(LedgerError::from)?;

        tracing::debug!(
            fingerprint = %entry.fingerprint,
            folder = %entry.folder_path.display(),
            remote_id = %entry.remote_id,
            "Recorded ledger entry"
        );
        Ok(())
    }

    async fn delete(&self, index: usize) -> anyhow::Result<LedgerEntry> {
        let mut tx = self.pool.begin().await.map_err(LedgerError::from)?;

        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM upload_ledger")
            .fetch_one(&mut *tx)
            .await
            .map_err(LedgerError::from)?;
        let len = len as usize;

        if index == 0 || index > len {
            return Err(LedgerError::IndexOutOfRange { index, len }.into());
        }

        let row = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC LIMIT 1 OFFSET ?"))
            .bind((index - 1) as i64)
            .fetch_one(&mut *tx)
            .await
            .map_err(LedgerError::from)?;
        let id: i64 = row.try_get("id").map_err(LedgerError::from)?;
        let entry = entry_from_row(&row)?;

        sqlx::query("DELETE FROM upload_ledger WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(LedgerError::from)?;

        tx.commit().await.map_err(LedgerError::from)?;

        tracing::info!(index, folder = %entry.folder_path.display(), "Deleted ledger entry");
        Ok(entry)
    }

    async fn clear(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM upload_ledger")
            .execute(&self.pool)
            .await
            .map_err(LedgerError::from)?;

        let removed = result.rows_affected();
        tracing::info!(removed, "Cleared ledger");
        Ok(removed)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(LedgerError::from)?;

        rows.iter()
            .map(|r| entry_from_row(r).map_err(anyhow::Error::from))
            .collect()
    }
}
