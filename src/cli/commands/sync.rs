//! `sync` command: copy the source into the warehouse

use std::path::PathBuf;

use super::{load_config, open_warehouse, runtime, script_source};
use crate::cli::error::CliError;
use crate::database::PostgresSource;
use crate::sync::{SyncMode, SyncPipeline, SyncReport, TableStatus, WatermarkStore};

#[derive(Debug, Clone)]
pub struct SyncArgs {
    pub config: PathBuf,
    /// Overrides `[sync] mode` from the config
    pub mode: Option<SyncMode>,
    /// Fail when any table could not be copied
    pub strict: bool,
}

pub fn handle_sync(args: &SyncArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let mode = args.mode.unwrap_or(config.sync.mode);

    let rt = runtime()?;
    let report = rt.block_on(async {
        let source = PostgresSource::connect(&config.postgres_connection_string()).await?;
        let store = open_warehouse(&config)?;
        let pipeline = SyncPipeline::new(
            source,
            store,
            WatermarkStore::new(&config.sync.watermark_path),
        )
        .with_scripts(script_source(&config));

        let report = pipeline.run(mode).await;
        pipeline.close().await?;
        Ok::<_, CliError>(report?)
    })?;

    print!("{}", render_report(&report));

    let failed = report.failed_tables();
    if args.strict && !failed.is_empty() {
        return Err(CliError::TablesFailed(
            failed.into_iter().map(str::to_string).collect(),
        ));
    }
    Ok(())
}

/// Human-readable summary of a run
pub fn render_report(report: &SyncReport) -> String {
    let mut out = format!("=== Sync ({}) ===\n", report.mode);
    for outcome in &report.tables {
        let line = match &outcome.status {
            TableStatus::Copied { rows, max_id } => {
                format!("copied {} rows (max id {})", rows, max_id)
            }
            TableStatus::UpToDate => "up to date".to_string(),
            TableStatus::Failed { error } => format!("FAILED: {}", error),
        };
        out.push_str(&format!("{:<12} {}\n", outcome.table, line));
    }

    for (table, error) in &report.truncate_failures {
        out.push_str(&format!("truncate of {} failed: {}\n", table, error));
    }

    if let Some(watermarks) = &report.watermarks {
        let marks: Vec<String> = watermarks
            .iter()
            .map(|(table, id)| format!("{}={}", table, id))
            .collect();
        out.push_str(&format!("Watermarks: {}\n", marks.join(", ")));
    }

    out.push_str(&format!(
        "{} rows copied in {}ms\n",
        report.rows_copied(),
        report.duration_ms
    ));
    out
}
