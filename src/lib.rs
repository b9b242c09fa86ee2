//! adtech-sync - ad-tech test data generation and warehouse sync
//!
//! Provides:
//! - Random advertisers, campaigns, impressions and clicks for a PostgreSQL
//!   source database ([`seed`])
//! - A full or incremental (watermark based) copy of the base tables into an
//!   analytical store, followed by a recompute of the aggregate tables
//!   ([`sync`])
//! - Store backends and configuration ([`database`])

#[cfg(feature = "cli")]
pub mod cli;
pub mod database;
pub mod seed;
pub mod sync;

pub use database::{
    AnalyticalStore, DatabaseError, DatabaseResult, QueryResult, RowSet, SourceStore, SyncConfig,
    Value,
};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDbStore;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresSource;
pub use seed::SeedPlan;
pub use sync::{
    SyncError, SyncMode, SyncPipeline, SyncReport, SyncResult, TableStatus, WatermarkStore,
    Watermarks,
};
