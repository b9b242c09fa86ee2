//! In-memory stores shared by the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use adtech_sync::database::{
    AnalyticalStore, DatabaseError, DatabaseResult, QueryResult, RowSet, SourceStore, Value,
};
use adtech_sync::sync::{ANALYTICS_TABLES, ScriptKind, ScriptMap, target_tables};
use async_trait::async_trait;

/// Source holding one [`RowSet`] per table
#[derive(Default)]
pub struct FakeSource {
    tables: RefCell<BTreeMap<String, RowSet>>,
    failing: RefCell<HashSet<String>>,
    scans: RefCell<Vec<(String, Option<i64>)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows `(id, "<table>-<id>")` to `table`
    pub fn add_ids(&self, table: &str, ids: impl IntoIterator<Item = i64>) {
        let rows = ids
            .into_iter()
            .map(|id| vec![Value::Int(id), Value::Text(format!("{}-{}", table, id))])
            .collect();
        self.add_rows(
            table,
            RowSet::new(vec!["id".to_string(), "label".to_string()], rows),
        );
    }

    pub fn add_rows(&self, table: &str, rows: RowSet) {
        let mut tables = self.tables.borrow_mut();
        match tables.get_mut(table) {
            Some(existing) => existing.rows.extend(rows.rows),
            None => {
                tables.insert(table.to_string(), rows);
            }
        }
    }

    pub fn fail_table(&self, table: &str) {
        self.failing.borrow_mut().insert(table.to_string());
    }

    pub fn heal_table(&self, table: &str) {
        self.failing.borrow_mut().remove(table);
    }

    /// Every scan seen so far, as `(table, after_id)`
    pub fn scans(&self) -> Vec<(String, Option<i64>)> {
        self.scans.borrow().clone()
    }

    pub fn ids(&self, table: &str) -> Vec<i64> {
        self.tables
            .borrow()
            .get(table)
            .map(|set| ids_of(&set.columns, &set.rows))
            .unwrap_or_default()
    }
}

fn ids_of(columns: &[String], rows: &[Vec<Value>]) -> Vec<i64> {
    let Some(idx) = columns.iter().position(|c| c == "id") else {
        return Vec::new();
    };
    rows.iter().filter_map(|row| row[idx].as_i64()).collect()
}

#[async_trait(?Send)]
impl SourceStore for FakeSource {
    async fn scan(&self, table: &str, after_id: Option<i64>) -> DatabaseResult<RowSet> {
        self.scans.borrow_mut().push((table.to_string(), after_id));

        if self.failing.borrow().contains(table) {
            return Err(DatabaseError::QueryFailed(format!(
                "connection reset while reading {}",
                table
            )));
        }

        let tables = self.tables.borrow();
        let Some(set) = tables.get(table) else {
            return Ok(RowSet::new(vec!["id".to_string()], Vec::new()));
        };

        let idx = set.column_index("id");
        let mut rows: Vec<Vec<Value>> = set
            .rows
            .iter()
            .filter(|row| match (idx, after_id) {
                (Some(i), Some(after)) => row[i].as_i64().is_some_and(|id| id > after),
                _ => true,
            })
            .cloned()
            .collect();
        if let Some(i) = idx {
            rows.sort_by_key(|row| row[i].as_i64());
        }

        Ok(RowSet::new(set.columns.clone(), rows))
    }
}

/// Analytical store recording every call
#[derive(Default)]
pub struct FakeStore {
    tables: RefCell<BTreeMap<String, (Vec<String>, Vec<Vec<Value>>)>>,
    inserts: RefCell<Vec<(String, Vec<i64>)>>,
    truncates: RefCell<Vec<String>>,
    scripts: RefCell<Vec<String>>,
    failing_inserts: RefCell<HashSet<String>>,
    failing_truncates: RefCell<HashSet<String>>,
    failing_script: RefCell<Option<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_insert(&self, table: &str) {
        self.failing_inserts.borrow_mut().insert(table.to_string());
    }

    pub fn fail_truncate(&self, table: &str) {
        self.failing_truncates.borrow_mut().insert(table.to_string());
    }

    /// Make any script equal to `sql` fail
    pub fn fail_script(&self, sql: &str) {
        *self.failing_script.borrow_mut() = Some(sql.to_string());
    }

    /// Ids currently held in `table`
    pub fn ids(&self, table: &str) -> Vec<i64> {
        self.tables
            .borrow()
            .get(table)
            .map(|(columns, rows)| ids_of(columns, rows))
            .unwrap_or_default()
    }

    /// Insert calls so far, as `(table, ids inserted)`
    pub fn inserts(&self) -> Vec<(String, Vec<i64>)> {
        self.inserts.borrow().clone()
    }

    pub fn inserts_into(&self, table: &str) -> Vec<Vec<i64>> {
        self.inserts()
            .into_iter()
            .filter(|(t, _)| t == table)
            .map(|(_, ids)| ids)
            .collect()
    }

    pub fn truncates(&self) -> Vec<String> {
        self.truncates.borrow().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.inserts.borrow_mut().clear();
        self.truncates.borrow_mut().clear();
        self.scripts.borrow_mut().clear();
    }
}

#[async_trait(?Send)]
impl AnalyticalStore for FakeStore {
    async fn truncate_table(&self, table: &str) -> DatabaseResult<()> {
        if self.failing_truncates.borrow().contains(table) {
            return Err(DatabaseError::QueryFailed(format!("cannot truncate {}", table)));
        }
        self.truncates.borrow_mut().push(table.to_string());
        if let Some((_, rows)) = self.tables.borrow_mut().get_mut(table) {
            rows.clear();
        }
        Ok(())
    }

    async fn execute_script(&self, sql: &str) -> DatabaseResult<()> {
        if self.failing_script.borrow().as_deref() == Some(sql) {
            return Err(DatabaseError::QueryFailed(format!("script failed: {}", sql)));
        }
        self.scripts.borrow_mut().push(sql.to_string());
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> DatabaseResult<u64> {
        if self.failing_inserts.borrow().contains(table) {
            return Err(DatabaseError::InsertFailed {
                table: table.to_string(),
                reason: "disk full".to_string(),
            });
        }

        self.inserts
            .borrow_mut()
            .push((table.to_string(), ids_of(columns, rows)));
        let mut tables = self.tables.borrow_mut();
        let entry = tables
            .entry(table.to_string())
            .or_insert_with(|| (columns.to_vec(), Vec::new()));
        entry.1.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn execute_query(&self, _sql: &str) -> DatabaseResult<QueryResult> {
        Ok(QueryResult::empty())
    }

    fn backend_type(&self) -> &'static str {
        "fake"
    }

    async fn close(&self) -> DatabaseResult<()> {
        Ok(())
    }
}

/// Schema script `CREATE <table>` for every target table and refresh script
/// `REFRESH <table>` for every analytics table
pub fn fake_scripts() -> ScriptMap {
    let mut scripts = ScriptMap::new();
    for table in target_tables() {
        scripts.insert(ScriptKind::Schema, table, format!("CREATE {}", table));
    }
    for table in ANALYTICS_TABLES {
        scripts.insert(ScriptKind::Refresh, table, format!("REFRESH {}", table));
    }
    scripts
}
