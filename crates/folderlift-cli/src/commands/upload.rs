//! Upload commands - Send local folder trees to Drive
//!
//! Provides `folderlift upload` and `folderlift upload-all`, which:
//! 1. Load configuration and apply command-line overrides
//! 2. Open the ledger and build the Drive adapter from the access token
//! 3. Run the planner and print the report
//!
//! A report with failed units ends the command with an error so the exit
//! status reflects it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use folderlift_core::config::{Config, UploadOptions};
use folderlift_core::domain::{RemoteId, SubtreeStatus, UploadReport};
use folderlift_drive::{DriveClient, DriveRemote};
use folderlift_engine::{FsWalker, RetryController, RetryPolicy, SyncPlanner};

use super::{load_config, open_ledger, resolve_token, TOKEN_ENV_VAR};
use crate::output::{format_duration_ms, get_formatter, plural, OutputFormat};

/// Options shared by both upload commands
#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Drive folder id to upload into (defaults to remote.default_parent_id, then "root")
    #[arg(long)]
    pub parent_id: Option<String>,

    /// Upload even if the ledger says the folder was already uploaded
    #[arg(long)]
    pub force: bool,

    /// Concurrent file transfers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Files per scheduling batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Wall-clock budget for the run, in minutes
    #[arg(long, value_name = "MINUTES")]
    pub timeout: Option<u64>,

    /// Bearer access token (overrides FOLDERLIFT_ACCESS_TOKEN and remote.token_file)
    #[arg(long)]
    pub token: Option<String>,
}

impl TransferArgs {
    /// Config-file defaults with command-line overrides applied
    pub fn options(&self, config: &Config) -> UploadOptions {
        let mut options = UploadOptions::from(&config.upload);
        options.force |= self.force;
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        if self.timeout.is_some() {
            options.timeout_minutes = self.timeout;
        }
        options
    }

    /// Target folder: flag, then config, then the drive root
    pub fn parent(&self, config: &Config) -> Result<RemoteId> {
        let raw = self
            .parent_id
            .clone()
            .or_else(|| config.remote.default_parent_id.clone())
            .unwrap_or_else(|| "root".to_string());
        RemoteId::new(raw.clone()).with_context(|| format!("Invalid parent id '{raw}'"))
    }

    async fn planner(&self, config: &Config) -> Result<SyncPlanner> {
        let token = resolve_token(
            self.token.as_deref(),
            std::env::var(TOKEN_ENV_VAR).ok(),
            config,
        )?;
        let client = DriveClient::with_base_urls(
            token,
            config.remote.api_base_url.clone(),
            config.remote.upload_base_url.clone(),
        )?;
        let ledger = open_ledger(config).await?;

        Ok(SyncPlanner::new(
            Arc::new(DriveRemote::new(client)),
            ledger,
            Arc::new(FsWalker),
            RetryController::new(RetryPolicy::from(&config.retry)),
        ))
    }
}

/// Upload a single folder tree
#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local folder to upload
    pub path: PathBuf,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

impl UploadCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let options = self.transfer.options(&config);
        let parent = self.transfer.parent(&config)?;
        let planner = self.transfer.planner(&config).await?;

        info!(path = %self.path.display(), %parent, "Uploading folder");
        formatter.info(&format!("Uploading {} ...", self.path.display()));

        let report = planner.upload_tree(&self.path, &parent, &options).await?;
        print_report(&report, format);
        finish(&report)
    }
}

/// Upload every immediate subfolder of a directory
#[derive(Debug, Args)]
pub struct UploadAllCommand {
    /// Directory whose subfolders are uploaded
    pub pending_dir: PathBuf,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

impl UploadAllCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let options = self.transfer.options(&config);
        let parent = self.transfer.parent(&config)?;
        let planner = self.transfer.planner(&config).await?;

        info!(pending_dir = %self.pending_dir.display(), %parent, "Uploading pending folders");
        formatter.info(&format!(
            "Uploading folders in {} ...",
            self.pending_dir.display()
        ));

        let report = planner
            .upload_all(&self.pending_dir, &parent, &options)
            .await?;
        print_report(&report, format);
        finish(&report)
    }
}

fn finish(report: &UploadReport) -> Result<()> {
    if report.is_complete() {
        Ok(())
    } else {
        bail!(
            "{} did not upload; rerun to retry them",
            plural(report.failed.len(), "unit")
        )
    }
}

fn print_report(report: &UploadReport, format: OutputFormat) {
    let formatter = get_formatter(format);

    if matches!(format, OutputFormat::Json) {
        match serde_json::to_value(report) {
            Ok(json) => formatter.print_json(&json),
            Err(e) => formatter.error(&format!("Failed to serialize report: {e}")),
        }
        return;
    }

    let (completed, already, partial) = report.subtree_counts();
    let duration = format_duration_ms(report.duration_ms);
    if report.is_complete() {
        formatter.success(&format!("Upload finished in {duration}"));
    } else {
        formatter.error(&format!(
            "Upload finished in {duration} with {}",
            plural(report.failed.len(), "failure")
        ));
    }

    formatter.info(&format!(
        "Folders:  {}",
        plural(report.uploaded_folders, "folder")
    ));
    formatter.info(&format!(
        "Uploaded: {}",
        plural(report.uploaded_files, "file")
    ));
    if report.skipped > 0 {
        formatter.info(&format!("Skipped:  {}", report.skipped));
    }
    formatter.info(&format!(
        "Subtrees: {completed} completed, {already} already uploaded, {partial} partial"
    ));
    if report.degraded {
        formatter.warn("Ran sequentially after the worker pool could not be built");
    }

    for subtree in &report.subtrees {
        let status = match &subtree.status {
            SubtreeStatus::Completed { remote_id } => format!("completed -> {remote_id}"),
            SubtreeStatus::AlreadyUploaded { remote_id } => {
                format!("already uploaded -> {remote_id}")
            }
            SubtreeStatus::Partial { failed } => format!("partial ({failed} failed)"),
        };
        formatter.info(&format!("  {}: {status}", subtree.path.display()));
    }

    for failure in &report.failed {
        let retry = if failure.retriable { ", retriable" } else { "" };
        formatter.info(&format!(
            "  FAILED {} [{}{retry}]: {}",
            failure.path.display(),
            failure.kind,
            failure.message
        ));
    }
}
