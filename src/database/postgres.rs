//! PostgreSQL source store implementation
//!
//! Reads base-table rows from the transactional store. Column types are
//! discovered from `information_schema` so that types without a native
//! mapping can be cast to text in the generated SELECT.

use async_trait::async_trait;
use pg_escape::quote_identifier;
use tokio_postgres::types::Type;

use super::{DatabaseError, DatabaseResult, RowSet, SourceStore, Value};

/// A source column and whether it has to be read back as text
#[derive(Debug, Clone, PartialEq)]
pub struct SourceColumn {
    pub name: String,
    pub data_type: String,
    pub needs_cast: bool,
}

impl SourceColumn {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            needs_cast: !is_native_type(data_type),
        }
    }

    fn select_expr(&self) -> String {
        let ident = quote_identifier(&self.name);
        if self.needs_cast {
            format!("{ident}::text AS {ident}")
        } else {
            ident.to_string()
        }
    }
}

/// Types decoded directly from the wire; everything else is cast to text.
fn is_native_type(data_type: &str) -> bool {
    matches!(
        data_type,
        "smallint"
            | "integer"
            | "bigint"
            | "real"
            | "double precision"
            | "boolean"
            | "text"
            | "character varying"
            | "character"
            | "name"
            | "date"
            | "timestamp without time zone"
            | "timestamp with time zone"
    )
}

/// Build the ordered scan for `table`. `$1` is bound to the watermark (as
/// `bigint`, whatever the width of the `id` column) when
/// `incremental` is set.
pub fn build_scan_query(table: &str, columns: &[SourceColumn], incremental: bool) -> String {
    let col_list = columns
        .iter()
        .map(SourceColumn::select_expr)
        .collect::<Vec<_>>()
        .join(", ");
    let table = quote_identifier(table);

    if incremental {
        format!("SELECT {col_list} FROM {table} WHERE id > $1::bigint ORDER BY id")
    } else {
        format!("SELECT {col_list} FROM {table} ORDER BY id")
    }
}

/// Open a client connection.
///
/// The connection driver is spawned onto the current tokio runtime.
pub async fn connect_client(connection_string: &str) -> DatabaseResult<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
        .await
        .map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to connect to PostgreSQL: {}", e))
        })?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("PostgreSQL connection error: {}", e);
        }
    });

    Ok(client)
}

/// PostgreSQL source store
pub struct PostgresSource {
    client: tokio_postgres::Client,
}

impl PostgresSource {
    /// Connect to PostgreSQL
    pub async fn connect(connection_string: &str) -> DatabaseResult<Self> {
        let client = connect_client(connection_string).await?;
        Ok(Self { client })
    }

    /// Look up the columns of `table` in ordinal order
    pub async fn columns(&self, table: &str) -> DatabaseResult<Vec<SourceColumn>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text, data_type::text \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&table],
            )
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Column discovery failed: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| SourceColumn::new(row.get(0), row.get(1)))
            .collect())
    }

    fn decode(row: &tokio_postgres::Row, idx: usize) -> DatabaseResult<Value> {
        let column = &row.columns()[idx];
        let ty = column.type_();
        let fail = |e: tokio_postgres::Error| {
            DatabaseError::QueryFailed(format!(
                "Failed to decode column '{}' ({}): {}",
                column.name(),
                ty,
                e
            ))
        };

        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx).map_err(fail)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)
                .map_err(fail)?
                .map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)
                .map_err(fail)?
                .map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx).map_err(fail)?.map(Value::Int)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)
                .map_err(fail)?
                .map(|v| Value::Float(f64::from(v)))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx).map_err(fail)?.map(Value::Float)
        } else if *ty == Type::DATE {
            row.try_get::<_, Option<chrono::NaiveDate>>(idx)
                .map_err(fail)?
                .map(Value::Date)
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                .map_err(fail)?
                .map(Value::Timestamp)
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
                .map_err(fail)?
                .map(|v| Value::Timestamp(v.naive_utc()))
        } else {
            row.try_get::<_, Option<String>>(idx).map_err(fail)?.map(Value::Text)
        };

        Ok(value.unwrap_or(Value::Null))
    }
}

#[async_trait(?Send)]
impl SourceStore for PostgresSource {
    async fn scan(&self, table: &str, after_id: Option<i64>) -> DatabaseResult<RowSet> {
        let columns = self.columns(table).await?;
        if columns.is_empty() {
            return Err(DatabaseError::TableNotFound(table.to_string()));
        }

        let sql = build_scan_query(table, &columns, after_id.is_some());
        tracing::debug!(table, sql = %sql, "Scanning source table");

        let rows = match after_id {
            Some(last_id) => self.client.query(&sql, &[&last_id]).await,
            None => self.client.query(&sql, &[]).await,
        }
        .map_err(|e| DatabaseError::QueryFailed(format!("Scan of '{}' failed: {}", table, e)))?;

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let cells = (0..row.len())
                .map(|idx| Self::decode(row, idx))
                .collect::<DatabaseResult<Vec<_>>>()?;
            values.push(cells);
        }

        Ok(RowSet::new(
            columns.into_iter().map(|c| c.name).collect(),
            values,
        ))
    }
}
