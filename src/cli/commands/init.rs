//! `init` command: write a starter config file

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::database::SyncConfig;
use crate::database::config::sample_config;

#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config: PathBuf,
    pub force: bool,
    /// Write defaults plus environment overrides instead of the sample
    pub from_env: bool,
}

pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    if args.config.exists() && !args.force {
        return Err(CliError::ConfigExists(args.config.clone()));
    }

    if args.from_env {
        let mut config = SyncConfig::new();
        config.apply_env_overrides();
        config.save(&args.config)?;
    } else {
        std::fs::write(&args.config, sample_config()).map_err(|e| {
            CliError::IoError(format!(
                "Failed to write {}: {}",
                args.config.display(),
                e
            ))
        })?;
    }

    println!("Wrote {}", args.config.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_parseable_config() {
        let dir = tempdir().unwrap();
        let args = InitArgs {
            config: dir.path().join("adtech-sync.toml"),
            force: false,
            from_env: false,
        };

        handle_init(&args).unwrap();
        let content = std::fs::read_to_string(&args.config).unwrap();
        assert!(SyncConfig::parse(&content).is_ok());

        assert!(matches!(handle_init(&args), Err(CliError::ConfigExists(_))));
    }

    #[test]
    fn test_init_from_env_round_trips() {
        let dir = tempdir().unwrap();
        let args = InitArgs {
            config: dir.path().join("adtech-sync.toml"),
            force: true,
            from_env: true,
        };

        handle_init(&args).unwrap();
        let content = std::fs::read_to_string(&args.config).unwrap();
        let config = SyncConfig::parse(&content).unwrap();
        assert!(!config.warehouse.path.is_empty());
    }
}
