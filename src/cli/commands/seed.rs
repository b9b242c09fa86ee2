//! Test-data generation commands

use std::path::{Path, PathBuf};

use super::{load_config, runtime};
use crate::cli::error::CliError;
use crate::seed::{SeedPlan, Seeder, validate_ratio};

/// Connect a seeder using the source settings of `config`
async fn seeder(config: &Path) -> Result<Seeder, CliError> {
    let config = load_config(config)?;
    Ok(Seeder::connect(&config.postgres_connection_string()).await?)
}

#[derive(Debug, Clone)]
pub struct SeedArgs {
    pub config: PathBuf,
    pub plan: SeedPlan,
}

/// Generate a full batch of advertisers, campaigns, impressions and clicks
pub fn handle_seed(args: &SeedArgs) -> Result<(), CliError> {
    args.plan
        .validate()
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let rt = runtime()?;
    let summary = rt.block_on(async {
        let mut seeder = seeder(&args.config).await?;
        let mut rng = rand::thread_rng();
        Ok::<_, CliError>(seeder.seed(&mut rng, &args.plan).await?)
    })?;

    println!("Seeding complete!");
    println!(
        "Created {} advertisers with {} campaigns total.",
        summary.advertiser_ids.len(),
        summary.campaign_ids.len()
    );
    println!(
        "Generated {} impressions and {} clicks.",
        summary.impressions, summary.clicks
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct AdvertisersArgs {
    pub config: PathBuf,
    pub count: usize,
}

pub fn handle_advertisers(args: &AdvertisersArgs) -> Result<(), CliError> {
    let rt = runtime()?;
    let ids = rt.block_on(async {
        let mut seeder = seeder(&args.config).await?;
        Ok::<_, CliError>(seeder.create_advertisers(args.count).await?)
    })?;

    println!("Created {} advertisers. IDs: {:?}", ids.len(), ids);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CampaignsArgs {
    pub config: PathBuf,
    pub advertiser_id: i64,
    pub count: usize,
}

pub fn handle_campaigns(args: &CampaignsArgs) -> Result<(), CliError> {
    let rt = runtime()?;
    let ids = rt.block_on(async {
        let mut seeder = seeder(&args.config).await?;
        let mut rng = rand::thread_rng();
        Ok::<_, CliError>(
            seeder
                .create_campaigns(&mut rng, &[args.advertiser_id], args.count)
                .await?,
        )
    })?;

    println!(
        "Created {} campaigns for advertiser #{}. IDs: {:?}",
        ids.len(),
        args.advertiser_id,
        ids
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ImpressionsArgs {
    pub config: PathBuf,
    pub campaign_id: i64,
    pub count: usize,
}

pub fn handle_impressions(args: &ImpressionsArgs) -> Result<(), CliError> {
    let rt = runtime()?;
    let inserted = rt.block_on(async {
        let mut seeder = seeder(&args.config).await?;
        let mut rng = rand::thread_rng();
        Ok::<_, CliError>(
            seeder
                .create_impressions(&mut rng, &[args.campaign_id], args.count)
                .await?,
        )
    })?;

    println!(
        "Created {} impressions for campaign #{}",
        inserted, args.campaign_id
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ClicksArgs {
    pub config: PathBuf,
    pub campaign_id: i64,
    pub ratio: f64,
}

/// Create clicks for an existing campaign; refuses when it has no impressions
pub fn handle_clicks(args: &ClicksArgs) -> Result<(), CliError> {
    validate_ratio(args.ratio).map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let rt = runtime()?;
    let inserted = rt.block_on(async {
        let mut seeder = seeder(&args.config).await?;
        if seeder.impression_count(args.campaign_id).await? == 0 {
            return Err(CliError::InvalidArgument(format!(
                "No impressions found for campaign #{}. Creating clicks requires impressions.",
                args.campaign_id
            )));
        }
        let mut rng = rand::thread_rng();
        Ok::<_, CliError>(
            seeder
                .create_clicks(&mut rng, &[args.campaign_id], args.ratio)
                .await?,
        )
    })?;

    println!(
        "Created {} clicks for campaign #{} with {:.1}% CTR",
        inserted,
        args.campaign_id,
        args.ratio * 100.0
    );
    Ok(())
}
