//! `reset` command: wipe the source tables and the warehouse

use std::io::{BufRead, Write};
use std::path::PathBuf;

use super::{load_config, open_warehouse, runtime, script_source};
use crate::cli::error::CliError;
use crate::seed::Seeder;
use crate::sync::{StoreClient, target_tables};

#[derive(Debug, Clone)]
pub struct ResetArgs {
    pub config: PathBuf,
    /// Skip the confirmation prompt
    pub yes: bool,
}

/// Accepts only an explicit "yes", case-insensitively
pub fn is_confirmation(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

fn confirm() -> Result<bool, CliError> {
    print!("This will DELETE ALL DATA. Type 'yes' to confirm: ");
    std::io::stdout()
        .flush()
        .map_err(|e| CliError::IoError(e.to_string()))?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| CliError::IoError(e.to_string()))?;
    Ok(is_confirmation(&answer))
}

pub fn handle_reset(args: &ResetArgs) -> Result<(), CliError> {
    if !args.yes && !confirm()? {
        println!("Operation cancelled.");
        return Ok(());
    }

    let config = load_config(&args.config)?;
    let store = open_warehouse(&config)?;
    let scripts = script_source(&config);

    let rt = runtime()?;
    rt.block_on(async {
        let mut seeder = Seeder::connect(&config.postgres_connection_string()).await?;
        let deleted = seeder.reset().await?;
        println!("All data has been deleted ({} rows).", deleted);

        let client = StoreClient::new(&store, scripts.as_ref());
        let report = client.truncate(&target_tables()).await;
        for (table, error) in &report.failures {
            eprintln!("Failed to truncate {}: {}", table, error);
        }
        client.close().await?;
        Ok::<_, CliError>(())
    })
}
