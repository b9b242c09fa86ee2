//! Source to analytical store synchronization
//!
//! A sync run copies the base tables from the transactional store into the
//! analytical store, either wholesale ([`SyncMode::Full`]) or past the last
//! persisted watermark ([`SyncMode::Incremental`]), and then recomputes the
//! aggregate tables from the freshly loaded base data.
//!
//! ```text
//! Reset (full) → EnsureSchema → LoadWatermarks (incremental)
//!     → CopyBaseTables → RefreshAnalytics → PersistWatermarks (incremental)
//! ```

use serde::{Deserialize, Serialize};

use crate::database::DatabaseError;

pub mod analytics;
pub mod client;
pub mod copier;
pub mod pipeline;
pub mod scripts;
pub mod watermark;

pub use analytics::AnalyticsRefresher;
pub use client::{StoreClient, TruncateReport};
pub use copier::{CopiedRows, TableCopier};
pub use pipeline::{SyncPipeline, SyncReport, TableOutcome, TableStatus};
pub use scripts::{
    EmbeddedScripts, ScriptDirectory, ScriptKind, ScriptMap, ScriptSource, report_queries,
};
pub use watermark::{LoadStatus, LoadedWatermarks, WatermarkStore, Watermarks};

/// Base tables, in the order they are copied
pub const BASE_TABLES: [&str; 4] = ["advertiser", "campaign", "impressions", "clicks"];

/// Derived tables, in the order they are recomputed
pub const ANALYTICS_TABLES: [&str; 3] = ["advertiser_stats", "campaign_stats", "daily_stats"];

/// Every table the analytical store holds: base tables first, then analytics
pub fn target_tables() -> Vec<&'static str> {
    BASE_TABLES.iter().chain(ANALYTICS_TABLES.iter()).copied().collect()
}

/// Sync strategy for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Truncate everything and reload all rows
    #[default]
    Full,
    /// Copy only rows past the persisted watermark
    Incremental,
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            _ => Err(format!(
                "Unknown sync mode: {}. Use 'full' or 'incremental'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Error type for sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Store operation failed
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// No script registered for a table
    #[error("No {kind} script for table '{table}'")]
    ScriptNotFound { kind: ScriptKind, table: String },

    /// Creating a target table failed
    #[error("Failed to create table '{table}': {source}")]
    Schema {
        table: String,
        #[source]
        source: Box<SyncError>,
    },

    /// Recomputing an analytics table failed
    #[error("Failed to refresh analytics table '{table}': {source}")]
    Refresh {
        table: String,
        #[source]
        source: Box<SyncError>,
    },

    /// Copied rows carry no usable `id`
    #[error("Invalid id in table '{table}': {reason}")]
    InvalidId { table: String, reason: String },

    /// Watermark file could not be read or written
    #[error("Watermark file error: {0}")]
    Watermark(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
