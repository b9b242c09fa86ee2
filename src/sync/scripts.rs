//! Lookup of the SQL scripts that create and recompute target tables
//!
//! The pipeline never knows where scripts come from: it asks a
//! [`ScriptSource`] for "the schema script of `campaign`" or "the refresh
//! script of `daily_stats`". Three sources are provided:
//! - [`EmbeddedScripts`]: DuckDB scripts compiled into the binary
//! - [`ScriptDirectory`]: `<dir>/<table>.sql` and `<dir>/<table>_init.sql`
//! - [`ScriptMap`]: an in-memory map

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{SyncError, SyncResult};

/// Which script of a table is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Idempotent table creation
    Schema,
    /// Full repopulation of an analytics table
    Refresh,
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptKind::Schema => write!(f, "schema"),
            ScriptKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Lookup of table scripts by name
pub trait ScriptSource {
    /// Return the script of `kind` for `table`.
    ///
    /// Returns [`SyncError::ScriptNotFound`] when there is none.
    fn script(&self, kind: ScriptKind, table: &str) -> SyncResult<String>;

    fn schema_script(&self, table: &str) -> SyncResult<String> {
        self.script(ScriptKind::Schema, table)
    }

    fn refresh_script(&self, table: &str) -> SyncResult<String> {
        self.script(ScriptKind::Refresh, table)
    }
}

fn not_found(kind: ScriptKind, table: &str) -> SyncError {
    SyncError::ScriptNotFound {
        kind,
        table: table.to_string(),
    }
}

/// DuckDB scripts shipped with the crate (`sql/init/`)
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedScripts;

impl EmbeddedScripts {
    fn lookup(kind: ScriptKind, table: &str) -> Option<&'static str> {
        let sql = match (kind, table) {
            (ScriptKind::Schema, "advertiser") => include_str!("../../sql/init/advertiser.sql"),
            (ScriptKind::Schema, "campaign") => include_str!("../../sql/init/campaign.sql"),
            (ScriptKind::Schema, "impressions") => include_str!("../../sql/init/impressions.sql"),
            (ScriptKind::Schema, "clicks") => include_str!("../../sql/init/clicks.sql"),
            (ScriptKind::Schema, "advertiser_stats") => {
                include_str!("../../sql/init/advertiser_stats.sql")
            }
            (ScriptKind::Schema, "campaign_stats") => {
                include_str!("../../sql/init/campaign_stats.sql")
            }
            (ScriptKind::Schema, "daily_stats") => include_str!("../../sql/init/daily_stats.sql"),
            (ScriptKind::Refresh, "advertiser_stats") => {
                include_str!("../../sql/init/advertiser_stats_init.sql")
            }
            (ScriptKind::Refresh, "campaign_stats") => {
                include_str!("../../sql/init/campaign_stats_init.sql")
            }
            (ScriptKind::Refresh, "daily_stats") => {
                include_str!("../../sql/init/daily_stats_init.sql")
            }
            _ => return None,
        };
        Some(sql)
    }
}

impl ScriptSource for EmbeddedScripts {
    fn script(&self, kind: ScriptKind, table: &str) -> SyncResult<String> {
        Self::lookup(kind, table)
            .map(str::to_string)
            .ok_or_else(|| not_found(kind, table))
    }
}

/// Read-only report queries over the analytics tables (`sql/analytics/`),
/// in display order
pub fn report_queries() -> [(&'static str, &'static str); 3] {
    [
        (
            "Advertiser CTR",
            include_str!("../../sql/analytics/advertiser_ctr.sql"),
        ),
        ("Campaign CTR", include_str!("../../sql/analytics/campaign_ctr.sql")),
        (
            "Daily metrics",
            include_str!("../../sql/analytics/daily_metrics.sql"),
        ),
    ]
}

/// Scripts read from a directory on every lookup
#[derive(Debug, Clone)]
pub struct ScriptDirectory {
    dir: PathBuf,
}

impl ScriptDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the script of `kind` for `table`
    pub fn script_path(&self, kind: ScriptKind, table: &str) -> PathBuf {
        match kind {
            ScriptKind::Schema => self.dir.join(format!("{}.sql", table)),
            ScriptKind::Refresh => self.dir.join(format!("{}_init.sql", table)),
        }
    }
}

impl ScriptSource for ScriptDirectory {
    fn script(&self, kind: ScriptKind, table: &str) -> SyncResult<String> {
        let path = self.script_path(kind, table);
        match std::fs::read_to_string(&path) {
            Ok(sql) => Ok(sql),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(kind, table)),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}

/// Scripts held in memory
#[derive(Debug, Clone, Default)]
pub struct ScriptMap {
    scripts: HashMap<(ScriptKind, String), String>,
}

impl ScriptMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ScriptKind, table: &str, sql: impl Into<String>) -> Self {
        self.insert(kind, table, sql);
        self
    }

    pub fn insert(&mut self, kind: ScriptKind, table: &str, sql: impl Into<String>) {
        self.scripts.insert((kind, table.to_string()), sql.into());
    }
}

impl ScriptSource for ScriptMap {
    fn script(&self, kind: ScriptKind, table: &str) -> SyncResult<String> {
        self.scripts
            .get(&(kind, table.to_string()))
            .cloned()
            .ok_or_else(|| not_found(kind, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ANALYTICS_TABLES, target_tables};
    use tempfile::tempdir;

    #[test]
    fn test_embedded_scripts_cover_every_table() {
        let scripts = EmbeddedScripts;
        for table in target_tables() {
            let sql = scripts.schema_script(table).unwrap();
            assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)));
        }
        for table in ANALYTICS_TABLES {
            let sql = scripts.refresh_script(table).unwrap();
            assert!(sql.contains(&format!("INSERT INTO {} (", table)));
        }
    }

    #[test]
    fn test_embedded_scripts_have_no_refresh_for_base_tables() {
        let err = EmbeddedScripts.refresh_script("campaign").unwrap_err();
        assert!(matches!(
            err,
            SyncError::ScriptNotFound {
                kind: ScriptKind::Refresh,
                ..
            }
        ));
    }

    #[test]
    fn test_script_directory_layout() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("clicks.sql"), "CREATE TABLE clicks (id BIGINT)").unwrap();
        std::fs::write(
            dir.path().join("daily_stats_init.sql"),
            "INSERT INTO daily_stats SELECT 1",
        )
        .unwrap();

        let scripts = ScriptDirectory::new(dir.path());
        assert_eq!(
            scripts.schema_script("clicks").unwrap(),
            "CREATE TABLE clicks (id BIGINT)"
        );
        assert_eq!(
            scripts.refresh_script("daily_stats").unwrap(),
            "INSERT INTO daily_stats SELECT 1"
        );
        assert!(matches!(
            scripts.schema_script("campaign"),
            Err(SyncError::ScriptNotFound { .. })
        ));
    }

    #[test]
    fn test_report_queries_read_analytics_tables() {
        let tables = ["advertiser_stats", "campaign_stats", "daily_stats"];
        for ((_, sql), table) in report_queries().iter().zip(tables) {
            assert!(sql.starts_with("SELECT"));
            assert!(sql.contains(&format!("FROM {}", table)));
        }
    }

    #[test]
    fn test_script_map() {
        let scripts = ScriptMap::new()
            .with(ScriptKind::Schema, "t", "CREATE TABLE t (id BIGINT)")
            .with(ScriptKind::Refresh, "t", "INSERT INTO t VALUES (1)");
        assert_eq!(scripts.schema_script("t").unwrap(), "CREATE TABLE t (id BIGINT)");
        assert_eq!(scripts.refresh_script("t").unwrap(), "INSERT INTO t VALUES (1)");
        assert!(scripts.schema_script("u").is_err());
    }
}
