//! CLI binary entry point for adtech-sync

#[cfg(feature = "cli")]
use adtech_sync::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use adtech_sync::cli::commands::reset::{ResetArgs, handle_reset};
#[cfg(feature = "cli")]
use adtech_sync::cli::commands::seed::{
    AdvertisersArgs, CampaignsArgs, ClicksArgs, ImpressionsArgs, SeedArgs, handle_advertisers,
    handle_campaigns, handle_clicks, handle_impressions, handle_seed,
};
#[cfg(feature = "cli")]
use adtech_sync::cli::commands::stats::{ReportArgs, StatsArgs, handle_report, handle_stats};
#[cfg(feature = "cli")]
use adtech_sync::cli::commands::sync::{SyncArgs, handle_sync};
#[cfg(feature = "cli")]
use adtech_sync::cli::logging;
#[cfg(feature = "cli")]
use adtech_sync::database::OutputFormat;
#[cfg(feature = "cli")]
use adtech_sync::seed::SeedPlan;
#[cfg(feature = "cli")]
use adtech_sync::sync::SyncMode;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "adtech-sync")]
#[command(about = "Ad-tech test data generator and PostgreSQL to DuckDB sync")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "adtech-sync.toml")]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Write a sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
        /// Write defaults plus environment overrides instead of the sample
        #[arg(long)]
        from_env: bool,
    },
    /// Sync data from PostgreSQL into the warehouse
    Sync {
        /// Sync mode (defaults to the config file setting)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Exit with an error if any table failed to copy
        #[arg(long)]
        strict: bool,
    },
    /// Generate a batch of test data
    Seed {
        /// Number of advertisers
        #[arg(long, default_value_t = 2)]
        advertisers: usize,
        /// Campaigns per advertiser
        #[arg(long, default_value_t = 3)]
        campaigns: usize,
        /// Impressions per campaign
        #[arg(long, default_value_t = 100)]
        impressions: usize,
        /// Click-through rate (0.0-1.0)
        #[arg(long, default_value_t = 0.1)]
        ctr: f64,
    },
    /// Create advertisers
    Advertisers {
        /// Number of advertisers to create
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Create campaigns
    Campaigns {
        /// Advertiser ID to create campaigns for
        #[arg(long)]
        advertiser_id: i64,
        /// Number of campaigns to create
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Create impressions
    Impressions {
        /// Campaign ID to create impressions for
        #[arg(long)]
        campaign_id: i64,
        /// Number of impressions to create
        #[arg(long, default_value_t = 100)]
        count: usize,
    },
    /// Create clicks
    Clicks {
        /// Campaign ID to create clicks for
        #[arg(long)]
        campaign_id: i64,
        /// Click ratio (0.0-1.0)
        #[arg(long, default_value_t = 0.1)]
        ratio: f64,
    },
    /// Show source database statistics
    Stats {
        #[arg(short, long, value_enum, default_value = "table")]
        format: FormatArg,
    },
    /// Show the analytics tables of the warehouse
    Report {
        #[arg(short, long, value_enum, default_value = "table")]
        format: FormatArg,
    },
    /// Delete all data (USE WITH CAUTION)
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Incremental,
}

#[cfg(feature = "cli")]
impl From<ModeArg> for SyncMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Full => SyncMode::Full,
            ModeArg::Incremental => SyncMode::Incremental,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Table,
    Json,
    Csv,
}

#[cfg(feature = "cli")]
impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = cli.config;
    let result = match cli.command {
        Commands::Init { force, from_env } => handle_init(&InitArgs {
            config,
            force,
            from_env,
        }),
        Commands::Sync { mode, strict } => handle_sync(&SyncArgs {
            config,
            mode: mode.map(SyncMode::from),
            strict,
        }),
        Commands::Seed {
            advertisers,
            campaigns,
            impressions,
            ctr,
        } => handle_seed(&SeedArgs {
            config,
            plan: SeedPlan {
                advertisers,
                campaigns_per_advertiser: campaigns,
                impressions_per_campaign: impressions,
                click_ratio: ctr,
            },
        }),
        Commands::Advertisers { count } => handle_advertisers(&AdvertisersArgs { config, count }),
        Commands::Campaigns {
            advertiser_id,
            count,
        } => handle_campaigns(&CampaignsArgs {
            config,
            advertiser_id,
            count,
        }),
        Commands::Impressions { campaign_id, count } => handle_impressions(&ImpressionsArgs {
            config,
            campaign_id,
            count,
        }),
        Commands::Clicks { campaign_id, ratio } => handle_clicks(&ClicksArgs {
            config,
            campaign_id,
            ratio,
        }),
        Commands::Stats { format } => handle_stats(&StatsArgs {
            config,
            format: format.into(),
        }),
        Commands::Report { format } => handle_report(&ReportArgs {
            config,
            format: format.into(),
        }),
        Commands::Reset { yes } => handle_reset(&ResetArgs { config, yes }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
