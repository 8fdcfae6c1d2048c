//! Fingerprint ledger port (driven/secondary port)
//!
//! The ledger is the source of truth for "this folder was already
//! uploaded". Entries are keyed by fingerprint hash and kept in insertion
//! order, which is the order management commands use for 1-based indices.

use crate::domain::{FingerprintHash, LedgerEntry};

#[async_trait::async_trait]
pub trait ILedger: Send + Sync {
    /// Returns the entry recorded for `fingerprint`, if any
    async fn lookup(&self, fingerprint: &FingerprintHash) -> anyhow::Result<Option<LedgerEntry>>;

    /// Inserts or replaces the entry for `entry.fingerprint`
    ///
    /// The write is durable before this returns.
    async fn record(&self, entry: &LedgerEntry) -> anyhow::Result<()>;

    /// Removes the entry at 1-based `index` and returns it
    async fn delete(&self, index: usize) -> anyhow::Result<LedgerEntry>;

    /// Removes every entry, returning how many were removed
    async fn clear(&self) -> anyhow::Result<u64>;

    /// All entries in insertion order
    async fn list_all(&self) -> anyhow::Result<Vec<LedgerEntry>>;
}
