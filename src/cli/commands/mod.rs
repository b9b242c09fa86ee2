//! CLI command implementations
//!
//! Each handler takes its argument struct, builds a tokio runtime and blocks
//! on the async work.

pub mod init;
pub mod reset;
pub mod seed;
pub mod stats;
pub mod sync;

use std::path::Path;

use crate::cli::error::CliError;
use crate::database::{DuckDbStore, SyncConfig};
use crate::sync::{EmbeddedScripts, ScriptDirectory, ScriptSource};

/// Load the config file (defaults when absent) with environment overrides
pub fn load_config(path: &Path) -> Result<SyncConfig, CliError> {
    SyncConfig::load(path).map_err(|e| CliError::ConfigError(path.to_path_buf(), e.to_string()))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

pub(crate) fn open_warehouse(config: &SyncConfig) -> Result<DuckDbStore, CliError> {
    tracing::debug!(path = %config.warehouse.path, "Opening DuckDB warehouse");
    Ok(DuckDbStore::from_path(&config.warehouse.path)?)
}

pub(crate) fn script_source(config: &SyncConfig) -> Box<dyn ScriptSource> {
    match &config.sync.scripts_dir {
        Some(dir) => Box::new(ScriptDirectory::new(dir)),
        None => Box::new(EmbeddedScripts),
    }
}
