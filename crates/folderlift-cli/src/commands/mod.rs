//! Subcommands and the wiring they share
//!
//! Every command receives the resolved config path; the helpers here turn
//! it into a loaded [`Config`], an open ledger and an access token.

pub mod completions;
pub mod config;
pub mod ledger;
pub mod upload;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use folderlift_core::config::Config;
use folderlift_ledger::{DatabasePool, SqliteLedger};

/// Environment variable consulted when `--token` is not given
pub const TOKEN_ENV_VAR: &str = "FOLDERLIFT_ACCESS_TOKEN";

/// Loads the configuration, falling back to defaults when the file is absent
///
/// A file that exists but does not parse is an error rather than a silent
/// fallback.
pub fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        info!(config_path = %config_path.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    info!(config_path = %config_path.display(), "Loaded configuration");
    Ok(config)
}

/// Opens (creating if needed) the ledger database named by the config
pub async fn open_ledger(config: &Config) -> Result<Arc<SqliteLedger>> {
    let db_path = &config.ledger.path;
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let pool = DatabasePool::new(db_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", db_path.display()))?;
    Ok(Arc::new(SqliteLedger::new(pool.pool().clone())))
}

/// Picks the access token: flag, then environment, then `remote.token_file`
pub fn resolve_token(flag: Option<&str>, env: Option<String>, config: &Config) -> Result<String> {
    if let Some(token) = flag.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Some(token) = env.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Some(ref file) = config.remote.token_file {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read token file {}", file.display()))?;
        let token = content.trim();
        if token.is_empty() {
            bail!("Token file {} is empty", file.display());
        }
        return Ok(token.to_string());
    }
    bail!("No access token. Pass --token, set {TOKEN_ENV_VAR}, or configure remote.token_file")
}
