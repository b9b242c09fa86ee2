//! Sync run orchestration

use serde::{Deserialize, Serialize};

use super::analytics::AnalyticsRefresher;
use super::client::StoreClient;
use super::copier::TableCopier;
use super::scripts::{EmbeddedScripts, ScriptSource};
use super::watermark::{WatermarkStore, Watermarks};
use super::{BASE_TABLES, SyncMode, SyncResult, target_tables};
use crate::database::{AnalyticalStore, SourceStore};

/// What happened to one base table during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    /// Rows were copied
    Copied { rows: u64, max_id: u64 },
    /// Nothing new in the source
    UpToDate,
    /// Copy failed; the table keeps its previous watermark
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

/// Summary of a completed sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Per base table, in copy order
    pub tables: Vec<TableOutcome>,
    /// Tables whose reset truncate failed (full mode)
    pub truncate_failures: Vec<(String, String)>,
    /// Watermarks on disk after the run (incremental mode)
    pub watermarks: Option<Watermarks>,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            tables: Vec::new(),
            truncate_failures: Vec::new(),
            watermarks: None,
            duration_ms: 0,
        }
    }

    /// True when every base table copied (or was already up to date)
    pub fn is_success(&self) -> bool {
        self.failed_tables().is_empty()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| matches!(t.status, TableStatus::Failed { .. }))
            .map(|t| t.table.as_str())
            .collect()
    }

    /// Total rows copied across all tables
    pub fn rows_copied(&self) -> u64 {
        self.tables
            .iter()
            .map(|t| match t.status {
                TableStatus::Copied { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn status(&self, table: &str) -> Option<&TableStatus> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| &t.status)
    }
}

/// Drives a sync run from a source store into an analytical store
pub struct SyncPipeline<S: SourceStore, A: AnalyticalStore> {
    source: S,
    store: A,
    scripts: Box<dyn ScriptSource>,
    watermarks: WatermarkStore,
}

impl<S: SourceStore, A: AnalyticalStore> SyncPipeline<S, A> {
    /// Create a pipeline using the embedded DuckDB scripts
    pub fn new(source: S, store: A, watermarks: WatermarkStore) -> Self {
        Self {
            source,
            store,
            scripts: Box::new(EmbeddedScripts),
            watermarks,
        }
    }

    /// Replace the schema and refresh scripts
    pub fn with_scripts(mut self, scripts: Box<dyn ScriptSource>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    pub fn watermark_store(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// Client over the analytical store with this pipeline's scripts
    pub fn client(&self) -> StoreClient<'_, A> {
        StoreClient::new(&self.store, self.scripts.as_ref())
    }

    /// Run one sync.
    ///
    /// A failing base table is recorded in the report and skipped. Schema
    /// creation and analytics refresh failures abort the run, in which case
    /// no watermark is written.
    pub async fn run(&self, mode: SyncMode) -> SyncResult<SyncReport> {
        let start = std::time::Instant::now();
        let mut report = SyncReport::new(mode);
        let client = self.client();
        let tables = target_tables();

        tracing::info!(%mode, "Starting sync");

        if mode == SyncMode::Full {
            let truncated = client.truncate(&tables).await;
            report.truncate_failures = truncated.failures;
        }

        client.create_schema(&tables).await?;

        let previous = match mode {
            SyncMode::Incremental => self.watermarks.load()?.watermarks,
            SyncMode::Full => Watermarks::new(),
        };

        let copier = TableCopier::new(&self.source, &client);
        let mut updates = Watermarks::new();
        for table in BASE_TABLES {
            let last_id = previous.get(table);
            let status = match copier.copy(table, mode, last_id).await {
                Ok(Some(copied)) => {
                    let next = last_id.map_or(copied.max_id, |w| w.max(copied.max_id));
                    updates.set(table, next);
                    TableStatus::Copied {
                        rows: copied.rows,
                        max_id: copied.max_id,
                    }
                }
                Ok(None) => TableStatus::UpToDate,
                Err(e) => {
                    tracing::error!(table, "Failed to sync table: {}", e);
                    TableStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.tables.push(TableOutcome {
                table: table.to_string(),
                status,
            });
        }

        AnalyticsRefresher::new(&client).refresh().await?;

        if mode == SyncMode::Incremental {
            let persisted = if updates.is_empty() {
                previous
            } else {
                self.watermarks.save(&updates)?
            };
            report.watermarks = Some(persisted);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            %mode,
            rows = report.rows_copied(),
            failed = report.failed_tables().len(),
            duration_ms = report.duration_ms,
            "Sync finished"
        );
        Ok(report)
    }

    /// Release the analytical store connection
    pub async fn close(&self) -> SyncResult<()> {
        self.client().close().await
    }
}
