//! Ledger command - Inspect and prune the record of uploaded folders
//!
//! Entries are addressed by their 1-based position in `folderlift ledger list`.
//! Removing an entry makes the next upload of that folder run again.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;
use tracing::info;

use folderlift_core::domain::LedgerEntry;
use folderlift_core::ports::ILedger;

use super::{load_config, open_ledger};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// List uploaded folders
    List,
    /// Forget one uploaded folder
    Delete {
        /// 1-based index as shown by `ledger list`
        index: usize,
    },
    /// Forget every uploaded folder
    Clear {
        /// Confirm removal of all entries
        #[arg(long)]
        yes: bool,
    },
}

impl LedgerCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let ledger = open_ledger(&config).await?;

        match self {
            LedgerCommand::List => list(ledger.as_ref(), format).await,
            LedgerCommand::Delete { index } => delete(ledger.as_ref(), *index, format).await,
            LedgerCommand::Clear { yes } => clear(ledger.as_ref(), *yes, format).await,
        }
    }
}

async fn list(ledger: &dyn ILedger, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let entries = ledger.list_all().await?;

    if matches!(format, OutputFormat::Json) {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| entry_json(i + 1, e))
            .collect();
        formatter.print_json(&serde_json::json!({ "entries": rows }));
        return Ok(());
    }

    if entries.is_empty() {
        formatter.success("Ledger is empty");
        return Ok(());
    }

    formatter.success(&format!("{} recorded", plural(entries.len(), "folder")));
    for (i, entry) in entries.iter().enumerate() {
        formatter.info(&entry_line(i + 1, entry));
    }
    Ok(())
}

async fn delete(ledger: &dyn ILedger, index: usize, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let entry = ledger.delete(index).await?;
    info!(index, folder = %entry.folder_path.display(), "Removed ledger entry");

    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({
            "deleted": entry_json(index, &entry),
        }));
    } else {
        formatter.success(&format!(
            "Removed {} from the ledger",
            entry.folder_path.display()
        ));
    }
    Ok(())
}

async fn clear(ledger: &dyn ILedger, confirmed: bool, format: OutputFormat) -> Result<()> {
    if !confirmed {
        bail!("Refusing to clear the ledger without --yes");
    }

    let formatter = get_formatter(format);
    let removed = ledger.clear().await?;

    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({ "removed": removed }));
    } else {
        formatter.success(&format!("Removed {} ledger entries", removed));
    }
    Ok(())
}

fn entry_line(index: usize, entry: &LedgerEntry) -> String {
    format!(
        "{:>3}. {}  -> {}  ({})",
        index,
        entry.folder_path.display(),
        entry.remote_id,
        entry.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn entry_json(index: usize, entry: &LedgerEntry) -> serde_json::Value {
    serde_json::json!({
        "index": index,
        "fingerprint": entry.fingerprint.as_str(),
        "folder_path": entry.folder_path.display().to_string(),
        "folder_name": entry.folder_name,
        "remote_id": entry.remote_id.as_str(),
        "uploaded_at": entry.uploaded_at.to_rfc3339(),
        "status": entry.status.as_str(),
    })
}
