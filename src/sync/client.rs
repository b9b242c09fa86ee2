//! Name-based operations on the analytical store
//!
//! [`StoreClient`] pairs an [`AnalyticalStore`] with a [`ScriptSource`] so
//! callers can say "create `campaign`" or "refresh `daily_stats`" without
//! handling SQL themselves.

use serde::{Deserialize, Serialize};

use super::scripts::ScriptSource;
use super::{SyncError, SyncResult};
use crate::database::{AnalyticalStore, QueryResult, RowSet};

/// Outcome of a best-effort truncate over several tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncateReport {
    /// Tables that were truncated (or did not exist)
    pub truncated: Vec<String>,
    /// Tables whose truncate failed, with the error message
    pub failures: Vec<(String, String)>,
}

impl TruncateReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Analytical store plus the scripts that define its tables
pub struct StoreClient<'a, A: AnalyticalStore + ?Sized> {
    store: &'a A,
    scripts: &'a dyn ScriptSource,
}

impl<'a, A: AnalyticalStore + ?Sized> StoreClient<'a, A> {
    pub fn new(store: &'a A, scripts: &'a dyn ScriptSource) -> Self {
        Self { store, scripts }
    }

    pub fn store(&self) -> &A {
        self.store
    }

    /// Truncate each table in turn.
    ///
    /// A failing table is logged and recorded; the remaining tables are
    /// still truncated.
    pub async fn truncate(&self, tables: &[&str]) -> TruncateReport {
        let mut report = TruncateReport::default();
        for table in tables {
            match self.store.truncate_table(table).await {
                Ok(()) => {
                    tracing::debug!(table, "Truncated table");
                    report.truncated.push(table.to_string());
                }
                Err(e) => {
                    tracing::error!(table, "Failed to truncate table: {}", e);
                    report.failures.push((table.to_string(), e.to_string()));
                }
            }
        }
        report
    }

    /// Run the schema script of every table; the first failure is returned
    pub async fn create_schema(&self, tables: &[&str]) -> SyncResult<()> {
        for table in tables {
            self.create_table(table)
                .await
                .map_err(|e| SyncError::Schema {
                    table: table.to_string(),
                    source: Box::new(e),
                })?;
            tracing::debug!(table, "Ensured table exists");
        }
        Ok(())
    }

    async fn create_table(&self, table: &str) -> SyncResult<()> {
        let sql = self.scripts.schema_script(table)?;
        self.store.execute_script(&sql).await?;
        Ok(())
    }

    /// Bulk-load `rows` into `table` in a single transaction
    pub async fn insert(&self, table: &str, rows: &RowSet) -> SyncResult<u64> {
        let inserted = self
            .store
            .insert_rows(table, &rows.columns, &rows.rows)
            .await?;
        Ok(inserted)
    }

    /// Repopulate one analytics table from its recompute script
    pub async fn refresh(&self, table: &str) -> SyncResult<()> {
        let run = async {
            let sql = self.scripts.refresh_script(table)?;
            self.store.execute_script(&sql).await?;
            Ok::<_, SyncError>(())
        };
        run.await.map_err(|e| SyncError::Refresh {
            table: table.to_string(),
            source: Box::new(e),
        })
    }

    pub async fn query(&self, sql: &str) -> SyncResult<QueryResult> {
        Ok(self.store.execute_query(sql).await?)
    }

    pub async fn close(&self) -> SyncResult<()> {
        Ok(self.store.close().await?)
    }
}
