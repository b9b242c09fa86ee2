//! Copy of a single base table from the source into the analytical store

use serde::{Deserialize, Serialize};

use super::client::StoreClient;
use super::{SyncError, SyncMode, SyncResult};
use crate::database::{AnalyticalStore, RowSet, SourceStore, Value};

/// What one [`TableCopier::copy`] call moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiedRows {
    /// Rows inserted into the analytical store
    pub rows: u64,
    /// Highest `id` among the inserted rows
    pub max_id: u64,
}

/// Moves rows of one table at a time from a [`SourceStore`] into the
/// analytical store behind a [`StoreClient`]
pub struct TableCopier<'a, S: SourceStore + ?Sized, A: AnalyticalStore + ?Sized> {
    source: &'a S,
    client: &'a StoreClient<'a, A>,
}

impl<'a, S: SourceStore + ?Sized, A: AnalyticalStore + ?Sized> TableCopier<'a, S, A> {
    pub fn new(source: &'a S, client: &'a StoreClient<'a, A>) -> Self {
        Self { source, client }
    }

    /// Copy `table`.
    ///
    /// In incremental mode with a `last_id`, only rows with `id > last_id`
    /// are read; otherwise the whole table is. Returns `None` when there was
    /// nothing to copy, in which case the store is not touched.
    pub async fn copy(
        &self,
        table: &str,
        mode: SyncMode,
        last_id: Option<u64>,
    ) -> SyncResult<Option<CopiedRows>> {
        let after_id = match (mode, last_id) {
            (SyncMode::Incremental, Some(id)) => {
                Some(i64::try_from(id).map_err(|_| SyncError::InvalidId {
                    table: table.to_string(),
                    reason: format!("watermark {} is out of range", id),
                })?)
            }
            _ => None,
        };

        let rows = self.source.scan(table, after_id).await?;
        if rows.is_empty() {
            tracing::info!(table, %mode, ?after_id, "No new rows");
            return Ok(None);
        }

        let max_id = max_id(table, &rows)?;
        let inserted = self.client.insert(table, &rows).await?;
        tracing::info!(table, %mode, rows = inserted, max_id, "Copied rows");

        Ok(Some(CopiedRows {
            rows: inserted,
            max_id,
        }))
    }
}

/// Highest `id` in `rows`; every row must carry a non-negative integer id
fn max_id(table: &str, rows: &RowSet) -> SyncResult<u64> {
    let invalid = |reason: String| SyncError::InvalidId {
        table: table.to_string(),
        reason,
    };

    let ids = rows
        .column_values("id")
        .ok_or_else(|| invalid("result has no 'id' column".to_string()))?;

    let mut max = 0u64;
    for value in ids {
        let id = match value {
            Value::Int(v) => u64::try_from(*v).map_err(|_| invalid(format!("negative id {}", v)))?,
            Value::Null => return Err(invalid("null id".to_string())),
            other => return Err(invalid(format!("non-integer id {:?}", other))),
        };
        max = max.max(id);
    }
    Ok(max)
}
