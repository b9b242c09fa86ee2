//! Durable per-table sync progress
//!
//! The watermark file maps each base table to the highest `id` that has been
//! copied into the analytical store, e.g.
//!
//! ```json
//! {
//!   "advertiser": 2,
//!   "campaign": 8
//! }
//! ```
//!
//! A missing or unreadable file is never fatal: it just means the next
//! incremental run starts from scratch for every table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{SyncError, SyncResult};

/// Default watermark filename
pub const DEFAULT_WATERMARK_FILENAME: &str = "last_synced_ids.json";

/// Mapping from table name to last synced id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermarks(BTreeMap<String, u64>);

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<u64> {
        self.0.get(table).copied()
    }

    pub fn set(&mut self, table: impl Into<String>, id: u64) {
        self.0.insert(table.into(), id);
    }

    /// Overlay `updates`; tables absent from `updates` keep their value
    pub fn merge(&mut self, updates: &Watermarks) {
        for (table, id) in &updates.0 {
            self.0.insert(table.clone(), *id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for Watermarks {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// How the watermark file looked when it was loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// File existed and parsed
    Loaded,
    /// No file yet
    NotFound,
    /// File existed but could not be parsed; treated as empty
    Corrupt(String),
}

/// Result of [`WatermarkStore::load`]
#[derive(Debug, Clone)]
pub struct LoadedWatermarks {
    pub watermarks: Watermarks,
    pub status: LoadStatus,
}

/// File-backed watermark persistence
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted watermarks.
    ///
    /// A missing or corrupt file yields an empty mapping and the matching
    /// [`LoadStatus`]; any other I/O failure is returned as an error.
    pub fn load(&self) -> SyncResult<LoadedWatermarks> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Watermark file not found");
                return Ok(LoadedWatermarks {
                    watermarks: Watermarks::new(),
                    status: LoadStatus::NotFound,
                });
            }
            Err(e) => return Err(SyncError::Io(e)),
        };

        match serde_json::from_str::<Watermarks>(&content) {
            Ok(watermarks) => Ok(LoadedWatermarks {
                watermarks,
                status: LoadStatus::Loaded,
            }),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Watermark file is corrupt, starting from zero: {}",
                    e
                );
                Ok(LoadedWatermarks {
                    watermarks: Watermarks::new(),
                    status: LoadStatus::Corrupt(e.to_string()),
                })
            }
        }
    }

    /// Merge `updates` into the persisted watermarks and rewrite the file.
    ///
    /// Returns the merged mapping that was written.
    pub fn save(&self, updates: &Watermarks) -> SyncResult<Watermarks> {
        let mut merged = self.load()?.watermarks;
        merged.merge(updates);

        let content = serde_json::to_string_pretty(&merged)
            .map_err(|e| SyncError::Watermark(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Write beside the target, then rename over it
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::info!(path = %self.path.display(), tables = merged.len(), "Saved watermarks");
        Ok(merged)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_WATERMARK_FILENAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for WatermarkStore {
    fn default() -> Self {
        Self::new(DEFAULT_WATERMARK_FILENAME)
    }
}
