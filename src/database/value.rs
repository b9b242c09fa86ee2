//! Row values carried from the source store to the analytical store

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A single cell of a copied row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    /// Timestamp normalized to UTC
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Integer view of this value, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Days since 1970-01-01 for a date value
    pub fn epoch_days(date: &NaiveDate) -> i32 {
        date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
    }

    /// Microseconds since the Unix epoch for a timestamp value
    pub fn epoch_micros(ts: &NaiveDateTime) -> i64 {
        ts.and_utc().timestamp_micros()
    }

    /// JSON rendering used by query results and reports
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Rows read from one table, with cells in `columns` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the column list
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column across all rows
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(move |row| row.get(idx)))
    }
}
