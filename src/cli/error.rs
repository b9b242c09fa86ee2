//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::sync::SyncError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config file already exists: {0} (use --force to overwrite)")]
    ConfigExists(PathBuf),

    #[error("Failed to load config {0}: {1}")]
    ConfigError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Sync failed: {0}")]
    SyncError(#[from] SyncError),

    #[error("Sync completed with failed tables: {}", .0.join(", "))]
    TablesFailed(Vec<String>),
}
