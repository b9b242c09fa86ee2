//! DuckDB analytical store implementation
//!
//! Provides the embedded analytical store that base tables are copied into
//! and aggregate tables are recomputed in.

use async_trait::async_trait;
use pg_escape::quote_identifier;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use duckdb::types::{TimeUnit, ToSqlOutput};

use super::{AnalyticalStore, DatabaseError, DatabaseResult, QueryResult, Value};

/// DuckDB analytical store
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDbStore {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDbStore {
    /// Open (or create) a file-based DuckDB database
    pub fn open(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB store
    ///
    /// Useful for testing or throwaway runs where persistence is not needed.
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Open the store described by a warehouse path; `:memory:` selects in-memory mode
    pub fn from_path(path: &str) -> DatabaseResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::open(path)
        }
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|_| DatabaseError::LockPoisoned)
    }

    fn table_exists(conn: &duckdb::Connection, table: &str) -> DatabaseResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Table lookup failed: {}", e)))?;
        Ok(count > 0)
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::ValueRef;

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::HugeInt(i) => match i64::try_from(i) {
                Ok(small) => serde_json::Value::Number(small.into()),
                Err(_) => serde_json::Value::String(i.to_string()),
            },
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => Value::Float(f64::from(f)).to_json(),
            ValueRef::Double(f) => Value::Float(f).to_json(),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Blob(bytes) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueRef::Date32(days) => chrono::NaiveDate::default()
                .checked_add_signed(chrono::Duration::days(i64::from(days)))
                .map(|d| Value::Date(d).to_json())
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Timestamp(unit, raw) => {
                let micros = match unit {
                    TimeUnit::Second => raw.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => raw.saturating_mul(1_000),
                    TimeUnit::Microsecond => raw,
                    TimeUnit::Nanosecond => raw / 1_000,
                };
                chrono::DateTime::from_timestamp_micros(micros)
                    .map(|dt| Value::Timestamp(dt.naive_utc()).to_json())
                    .unwrap_or(serde_json::Value::Null)
            }
            ValueRef::Decimal(d) => d
                .to_string()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
            other => serde_json::Value::String(format!("{:?}", other)),
        }
    }
}

impl duckdb::ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        use duckdb::types::Value as Cell;

        let cell = match self {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Boolean(*b),
            Value::Int(i) => Cell::BigInt(*i),
            Value::Float(f) => Cell::Double(*f),
            Value::Text(s) => Cell::Text(s.clone()),
            Value::Date(d) => Cell::Date32(Value::epoch_days(d)),
            Value::Timestamp(ts) => Cell::Timestamp(TimeUnit::Microsecond, Value::epoch_micros(ts)),
        };
        Ok(ToSqlOutput::Owned(cell))
    }
}

#[async_trait(?Send)]
impl AnalyticalStore for DuckDbStore {
    async fn truncate_table(&self, table: &str) -> DatabaseResult<()> {
        let conn = self.lock()?;

        if !Self::table_exists(&conn, table)? {
            tracing::debug!(table, "Skipping truncate of missing table");
            return Ok(());
        }

        conn.execute_batch(&format!("TRUNCATE {}", quote_identifier(table)))
            .map_err(|e| DatabaseError::QueryFailed(format!("Truncate failed: {}", e)))
    }

    async fn execute_script(&self, sql: &str) -> DatabaseResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> DatabaseResult<u64> {
        if columns.is_empty() {
            return Err(DatabaseError::InvalidInput(format!(
                "No columns given for insert into '{}'",
                table
            )));
        }

        let insert_failed = |e: duckdb::Error| DatabaseError::InsertFailed {
            table: table.to_string(),
            reason: e.to_string(),
        };

        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            column_list,
            placeholders
        );

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(insert_failed)?;
        {
            let mut stmt = tx.prepare(&sql).map_err(insert_failed)?;
            for (n, row) in rows.iter().enumerate() {
                if row.len() != columns.len() {
                    return Err(DatabaseError::InsertFailed {
                        table: table.to_string(),
                        reason: format!(
                            "row {} has {} values for {} columns",
                            n,
                            row.len(),
                            columns.len()
                        ),
                    });
                }
                stmt.execute(duckdb::params_from_iter(row.iter()))
                    .map_err(insert_failed)?;
            }
        }
        tx.commit().map_err(insert_failed)?;

        Ok(rows.len() as u64)
    }

    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, we need to execute the query first, then get columns
        let mut result_rows = stmt
            .query([])
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // Force a checkpoint so file-backed data is flushed before exit
        if !self.is_in_memory() {
            self.execute_script("CHECKPOINT").await?;
        }
        Ok(())
    }
}
