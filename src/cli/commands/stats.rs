//! `stats` and `report` commands

use std::path::PathBuf;

use super::{load_config, open_warehouse, runtime};
use crate::cli::error::CliError;
use crate::database::{AnalyticalStore, OutputFormat, format_query_result};
use crate::seed::{Seeder, SourceStats};
use crate::sync::report_queries;

#[derive(Debug, Clone)]
pub struct StatsArgs {
    pub config: PathBuf,
    pub format: OutputFormat,
}

/// Row counts and campaign figures of the source database
pub fn handle_stats(args: &StatsArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    let rt = runtime()?;
    let stats = rt.block_on(async {
        let seeder = Seeder::connect(&config.postgres_connection_string()).await?;
        Ok::<_, CliError>(seeder.stats().await?)
    })?;

    if args.format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|e| CliError::IoError(format!("Failed to serialize stats: {}", e)))?;
        println!("{}", json);
    } else {
        print!("{}", render_stats(&stats, args.format));
    }
    Ok(())
}

pub fn render_stats(stats: &SourceStats, format: OutputFormat) -> String {
    let mut out = String::from("=== Database Statistics ===\n");
    out.push_str(&format!("Advertisers: {}\n", stats.advertisers));
    out.push_str(&format!("Campaigns: {}\n", stats.campaigns));
    out.push_str(&format!("Impressions: {}\n", stats.impressions));
    out.push_str(&format!("Clicks: {}\n", stats.clicks));
    if let Some(ctr) = stats.overall_ctr_percent() {
        out.push_str(&format!("Overall CTR: {:.2}%\n", ctr));
    }

    out.push_str("\n=== Campaign Details ===\n");
    out.push_str(&format_query_result(&stats.details_result(), format));
    out.push('\n');
    out
}

#[derive(Debug, Clone)]
pub struct ReportArgs {
    pub config: PathBuf,
    pub format: OutputFormat,
}

/// Print the analytics tables of the warehouse
pub fn handle_report(args: &ReportArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let store = open_warehouse(&config)?;

    let rt = runtime()?;
    rt.block_on(async {
        for (title, sql) in report_queries() {
            let result = store.execute_query(sql).await?;
            println!("=== {} ===", title);
            println!("{}", format_query_result(&result, args.format));
            println!();
        }
        store.close().await?;
        Ok::<_, CliError>(())
    })
}
