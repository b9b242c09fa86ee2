//! Random ad-tech test data
//!
//! The generators here are pure: they take an injected [`rand::Rng`] and the
//! current date/time and return rows ready to insert. Writing them to
//! PostgreSQL is the job of [`Seeder`] (`postgres-backend` feature).

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::database::{DatabaseError, DatabaseResult};

#[cfg(feature = "postgres-backend")]
pub mod postgres;

#[cfg(feature = "postgres-backend")]
pub use postgres::{CampaignDetail, SeedSummary, Seeder, SourceStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAdvertiser {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub bid: f64,
    pub budget: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub advertiser_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImpression {
    pub campaign_id: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClick {
    pub campaign_id: i64,
    pub created_at: NaiveDateTime,
}

/// An impression already stored in the source, as needed to derive clicks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredImpression {
    pub id: i64,
    pub created_at: NaiveDateTime,
}

/// Parameters of a batch seed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedPlan {
    pub advertisers: usize,
    pub campaigns_per_advertiser: usize,
    pub impressions_per_campaign: usize,
    /// Fraction of impressions that get a click
    pub click_ratio: f64,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            advertisers: 2,
            campaigns_per_advertiser: 3,
            impressions_per_campaign: 100,
            click_ratio: 0.1,
        }
    }
}

impl SeedPlan {
    pub fn validate(&self) -> DatabaseResult<()> {
        validate_ratio(self.click_ratio)
    }

    /// Impressions the plan will create
    pub fn expected_impressions(&self) -> usize {
        self.advertisers * self.campaigns_per_advertiser * self.impressions_per_campaign
    }

    /// Clicks the plan will create
    pub fn expected_clicks(&self) -> usize {
        self.advertisers * self.campaigns_per_advertiser * clicks_for(self.impressions_per_campaign, self.click_ratio)
    }
}

/// Reject click ratios outside `[0, 1]`
pub fn validate_ratio(ratio: f64) -> DatabaseResult<()> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidInput(format!(
            "Click ratio must be between 0.0 and 1.0, got {}",
            ratio
        )))
    }
}

/// Number of clicks drawn from `impressions` at `ratio`
pub fn clicks_for(impressions: usize, ratio: f64) -> usize {
    ((impressions as f64) * ratio).floor() as usize
}

/// `Advertiser A` for 1 through `Advertiser Z` for 26, then `Advertiser 27`, ...
pub fn advertiser_name(index: usize) -> String {
    match index {
        1..=26 => format!("Advertiser {}", char::from(b'A' + (index - 1) as u8)),
        _ => format!("Advertiser {}", index),
    }
}

pub fn generate_advertisers(count: usize) -> Vec<NewAdvertiser> {
    (1..=count)
        .map(|i| NewAdvertiser {
            name: advertiser_name(i),
        })
        .collect()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Campaigns for one advertiser, all starting `today`
pub fn generate_campaigns<R: Rng + ?Sized>(
    rng: &mut R,
    advertiser_id: i64,
    count: usize,
    today: NaiveDate,
) -> Vec<NewCampaign> {
    (1..=count)
        .map(|i| NewCampaign {
            name: format!("Campaign_{}_{}", advertiser_id, i),
            bid: round_cents(rng.gen_range(0.5..=5.0)),
            budget: round_cents(rng.gen_range(50.0..=500.0)),
            start_date: today,
            end_date: today + Duration::days(rng.gen_range(7..=30)),
            advertiser_id,
        })
        .collect()
}

/// Impressions spread over the week before `now`
pub fn generate_impressions<R: Rng + ?Sized>(
    rng: &mut R,
    campaign_id: i64,
    count: usize,
    now: NaiveDateTime,
) -> Vec<NewImpression> {
    (0..count)
        .map(|_| {
            let age = Duration::days(rng.gen_range(0..=7))
                + Duration::hours(rng.gen_range(0..=23))
                + Duration::minutes(rng.gen_range(0..=59));
            NewImpression {
                campaign_id,
                created_at: now - age,
            }
        })
        .collect()
}

/// Clicks on a random sample of `impressions`, each shortly after the
/// impression it belongs to
pub fn generate_clicks<R: Rng + ?Sized>(
    rng: &mut R,
    campaign_id: i64,
    impressions: &[StoredImpression],
    ratio: f64,
) -> Vec<NewClick> {
    let amount = clicks_for(impressions.len(), ratio);
    let sampled: Vec<StoredImpression> = impressions.choose_multiple(rng, amount).copied().collect();
    sampled
        .into_iter()
        .map(|imp| NewClick {
            campaign_id,
            created_at: imp.created_at + Duration::seconds(rng.gen_range(1..=120)),
        })
        .collect()
}
