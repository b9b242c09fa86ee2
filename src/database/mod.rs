//! Database backend abstraction for the sync pipeline
//!
//! This module provides the two store seams the pipeline is written against:
//! - [`SourceStore`]: the transactional store rows are read from (PostgreSQL)
//! - [`AnalyticalStore`]: the analytical store rows are loaded into (DuckDB)
//!
//! Rows travel between the two as a [`RowSet`] of dynamically typed
//! [`Value`] cells, so neither side needs to know the other's type system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod config;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod value;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDbStore;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresSource;

pub use config::SyncConfig;
pub use value::{RowSet, Value};

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Bulk insert failed; nothing from the batch was committed
    #[error("Insert into '{table}' failed: {reason}")]
    InsertFailed { table: String, reason: String },

    /// Source table is missing or has no visible columns
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Connection mutex was poisoned by a panicked thread
    #[error("Database connection lock poisoned")]
    LockPoisoned,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file could not be parsed or serialized
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read the first row's value for `column` as an integer.
    ///
    /// Convenience for `SELECT COUNT(*) AS n ...` style queries.
    pub fn scalar_i64(&self, column: &str) -> Option<i64> {
        self.rows.first()?.get(column)?.as_i64()
    }
}

/// Transactional store that base-table rows are read from.
///
/// The pipeline only relies on every base table having a stable integer `id`
/// column that can be filtered with `id > x` and ordered by.
#[async_trait(?Send)]
pub trait SourceStore {
    /// Scan `table` ordered by `id` ascending.
    ///
    /// With `after_id` set only rows whose `id` is strictly greater are
    /// returned; otherwise the whole table is returned.
    async fn scan(&self, table: &str, after_id: Option<i64>) -> DatabaseResult<RowSet>;
}

/// Analytical store that rows are bulk-loaded into.
///
/// These are the primitive operations; the name-based, best-effort
/// behaviour the pipeline needs lives in [`crate::sync::StoreClient`].
#[async_trait(?Send)]
pub trait AnalyticalStore {
    /// Remove every row from `table`.
    ///
    /// Truncating a table that does not exist succeeds without doing anything.
    async fn truncate_table(&self, table: &str) -> DatabaseResult<()>;

    /// Execute one or more SQL statements that don't return rows
    async fn execute_script(&self, sql: &str) -> DatabaseResult<()>;

    /// Insert `rows` into `table`, with cell order matching `columns`.
    ///
    /// Either every row is committed or an error is returned and none are.
    /// Returns the number of rows inserted.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> DatabaseResult<u64>;

    /// Execute a SQL query and return results
    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult>;

    /// Get the database backend type name
    fn backend_type(&self) -> &'static str;

    /// Close the database connection
    async fn close(&self) -> DatabaseResult<()>;
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(row: &QueryRow, column: &str) -> String {
    match row.get(column).unwrap_or(&serde_json::Value::Null) {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Number(n) => match n.as_f64() {
            // Ratios such as CTR read better with a fixed precision
            Some(f) if !n.is_i64() && !n.is_u64() => format!("{:.4}", f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| match row.get(col).unwrap_or(&serde_json::Value::Null) {
                serde_json::Value::String(s) => {
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s.clone()
                    }
                }
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| result.columns.iter().map(|c| cell_text(row, c)).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &cells {
        let values: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{:width$}", s, width = widths[i]))
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}
