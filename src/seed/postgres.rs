//! Writes generated test data into the PostgreSQL source

use chrono::{Local, NaiveDateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_postgres::GenericClient;

use super::{
    SeedPlan, StoredImpression, generate_advertisers, generate_campaigns, generate_clicks,
    generate_impressions, validate_ratio,
};
use crate::database::postgres::connect_client;
use crate::database::{DatabaseError, DatabaseResult, QueryResult};

/// What a batch seed created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub advertiser_ids: Vec<i64>,
    pub campaign_ids: Vec<i64>,
    pub impressions: u64,
    pub clicks: u64,
}

/// Per-campaign figures shown by `stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDetail {
    pub id: i64,
    pub name: String,
    pub advertiser: String,
    pub impressions: i64,
    pub clicks: i64,
}

impl CampaignDetail {
    /// Clicks per impression as a percentage
    pub fn ctr_percent(&self) -> f64 {
        if self.impressions > 0 {
            self.clicks as f64 / self.impressions as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Row counts and campaign details of the source database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub advertisers: i64,
    pub campaigns: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub campaign_details: Vec<CampaignDetail>,
}

impl SourceStats {
    /// Overall CTR as a percentage; `None` without impressions
    pub fn overall_ctr_percent(&self) -> Option<f64> {
        (self.impressions > 0).then(|| self.clicks as f64 / self.impressions as f64 * 100.0)
    }

    /// Campaign details in a shape `format_query_result` can render
    pub fn details_result(&self) -> QueryResult {
        let columns = ["id", "name", "advertiser", "impressions", "clicks", "ctr_percent"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = self
            .campaign_details
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "name": d.name,
                    "advertiser": d.advertiser,
                    "impressions": d.impressions,
                    "clicks": d.clicks,
                    "ctr_percent": d.ctr_percent(),
                })
            })
            .collect();
        QueryResult::new(columns, rows)
    }
}

fn query_error(context: &str) -> impl Fn(tokio_postgres::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::QueryFailed(format!("{}: {}", context, e))
}

fn insert_error(table: &str) -> impl Fn(tokio_postgres::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::InsertFailed {
        table: table.to_string(),
        reason: e.to_string(),
    }
}

async fn insert_advertisers<C: GenericClient>(client: &C, count: usize) -> DatabaseResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(count);
    for advertiser in generate_advertisers(count) {
        let row = client
            .query_one(
                "INSERT INTO advertiser (name, updated_at) VALUES ($1, NOW()) RETURNING id::bigint",
                &[&advertiser.name],
            )
            .await
            .map_err(insert_error("advertiser"))?;
        ids.push(row.get(0));
    }
    Ok(ids)
}

async fn insert_campaigns<C: GenericClient, R: Rng + ?Sized>(
    client: &C,
    rng: &mut R,
    advertiser_ids: &[i64],
    per_advertiser: usize,
) -> DatabaseResult<Vec<i64>> {
    let today = Local::now().date_naive();
    let mut ids = Vec::with_capacity(advertiser_ids.len() * per_advertiser);
    for advertiser_id in advertiser_ids {
        for campaign in generate_campaigns(rng, *advertiser_id, per_advertiser, today) {
            let row = client
                .query_one(
                    "INSERT INTO campaign \
                     (name, bid, budget, start_date, end_date, advertiser_id, updated_at) \
                     VALUES ($1, $2::float8, $3::float8, $4::date, $5::date, $6::bigint, NOW()) \
                     RETURNING id::bigint",
                    &[
                        &campaign.name,
                        &campaign.bid,
                        &campaign.budget,
                        &campaign.start_date,
                        &campaign.end_date,
                        &campaign.advertiser_id,
                    ],
                )
                .await
                .map_err(insert_error("campaign"))?;
            ids.push(row.get(0));
        }
    }
    Ok(ids)
}

async fn insert_impressions<C: GenericClient, R: Rng + ?Sized>(
    client: &C,
    rng: &mut R,
    campaign_ids: &[i64],
    per_campaign: usize,
) -> DatabaseResult<u64> {
    let now = Local::now().naive_local();
    let statement = client
        .prepare("INSERT INTO impressions (campaign_id, created_at) VALUES ($1::bigint, $2::timestamp)")
        .await
        .map_err(insert_error("impressions"))?;

    let mut inserted = 0;
    for campaign_id in campaign_ids {
        for impression in generate_impressions(rng, *campaign_id, per_campaign, now) {
            inserted += client
                .execute(&statement, &[&impression.campaign_id, &impression.created_at])
                .await
                .map_err(insert_error("impressions"))?;
        }
    }
    Ok(inserted)
}

async fn insert_clicks<C: GenericClient, R: Rng + ?Sized>(
    client: &C,
    rng: &mut R,
    campaign_ids: &[i64],
    ratio: f64,
) -> DatabaseResult<u64> {
    let statement = client
        .prepare("INSERT INTO clicks (campaign_id, created_at) VALUES ($1::bigint, $2::timestamp)")
        .await
        .map_err(insert_error("clicks"))?;

    let mut inserted = 0;
    for campaign_id in campaign_ids {
        let impressions: Vec<StoredImpression> = client
            .query(
                "SELECT id::bigint, created_at::timestamp FROM impressions \
                 WHERE campaign_id = $1::bigint AND created_at IS NOT NULL ORDER BY id",
                &[campaign_id],
            )
            .await
            .map_err(query_error("Failed to read impressions"))?
            .iter()
            .map(|row| StoredImpression {
                id: row.get(0),
                created_at: row.get::<_, NaiveDateTime>(1),
            })
            .collect();

        for click in generate_clicks(rng, *campaign_id, &impressions, ratio) {
            inserted += client
                .execute(&statement, &[&click.campaign_id, &click.created_at])
                .await
                .map_err(insert_error("clicks"))?;
        }
    }
    Ok(inserted)
}

async fn count<C: GenericClient>(client: &C, sql: &str) -> DatabaseResult<i64> {
    let row = client
        .query_one(sql, &[])
        .await
        .map_err(query_error("Count failed"))?;
    Ok(row.get(0))
}

/// Inserts generated rows into the source tables.
///
/// Every public operation runs in its own transaction, so a failure leaves
/// the source unchanged.
pub struct Seeder {
    client: tokio_postgres::Client,
}

impl Seeder {
    pub async fn connect(connection_string: &str) -> DatabaseResult<Self> {
        Ok(Self::new(connect_client(connection_string).await?))
    }

    pub fn new(client: tokio_postgres::Client) -> Self {
        Self { client }
    }

    async fn begin(&mut self) -> DatabaseResult<tokio_postgres::Transaction<'_>> {
        self.client
            .transaction()
            .await
            .map_err(query_error("Failed to begin transaction"))
    }

    /// Create `count` advertisers, returning their ids
    pub async fn create_advertisers(&mut self, count: usize) -> DatabaseResult<Vec<i64>> {
        let tx = self.begin().await?;
        let ids = insert_advertisers(&tx, count).await?;
        tx.commit().await.map_err(query_error("Commit failed"))?;
        tracing::info!(count = ids.len(), "Created advertisers");
        Ok(ids)
    }

    /// Create `per_advertiser` campaigns for each advertiser
    pub async fn create_campaigns<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        advertiser_ids: &[i64],
        per_advertiser: usize,
    ) -> DatabaseResult<Vec<i64>> {
        let tx = self.begin().await?;
        let ids = insert_campaigns(&tx, rng, advertiser_ids, per_advertiser).await?;
        tx.commit().await.map_err(query_error("Commit failed"))?;
        tracing::info!(count = ids.len(), "Created campaigns");
        Ok(ids)
    }

    pub async fn create_impressions<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        campaign_ids: &[i64],
        per_campaign: usize,
    ) -> DatabaseResult<u64> {
        let tx = self.begin().await?;
        let inserted = insert_impressions(&tx, rng, campaign_ids, per_campaign).await?;
        tx.commit().await.map_err(query_error("Commit failed"))?;
        tracing::info!(count = inserted, "Created impressions");
        Ok(inserted)
    }

    /// Create clicks for a sample of each campaign's stored impressions
    pub async fn create_clicks<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        campaign_ids: &[i64],
        ratio: f64,
    ) -> DatabaseResult<u64> {
        validate_ratio(ratio)?;
        let tx = self.begin().await?;
        let inserted = insert_clicks(&tx, rng, campaign_ids, ratio).await?;
        tx.commit().await.map_err(query_error("Commit failed"))?;
        tracing::info!(count = inserted, "Created clicks");
        Ok(inserted)
    }

    /// Number of stored impressions of one campaign
    pub async fn impression_count(&self, campaign_id: i64) -> DatabaseResult<i64> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*) FROM impressions WHERE campaign_id = $1::bigint",
                &[&campaign_id],
            )
            .await
            .map_err(query_error("Count failed"))?;
        Ok(row.get(0))
    }

    /// Run a whole [`SeedPlan`] in a single transaction
    pub async fn seed<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        plan: &SeedPlan,
    ) -> DatabaseResult<SeedSummary> {
        plan.validate()?;
        let tx = self.begin().await?;

        let advertiser_ids = insert_advertisers(&tx, plan.advertisers).await?;
        let campaign_ids =
            insert_campaigns(&tx, rng, &advertiser_ids, plan.campaigns_per_advertiser).await?;
        let impressions =
            insert_impressions(&tx, rng, &campaign_ids, plan.impressions_per_campaign).await?;
        let clicks = insert_clicks(&tx, rng, &campaign_ids, plan.click_ratio).await?;

        tx.commit().await.map_err(query_error("Commit failed"))?;

        let summary = SeedSummary {
            advertiser_ids,
            campaign_ids,
            impressions,
            clicks,
        };
        tracing::info!(
            advertisers = summary.advertiser_ids.len(),
            campaigns = summary.campaign_ids.len(),
            impressions = summary.impressions,
            clicks = summary.clicks,
            "Seeding complete"
        );
        Ok(summary)
    }

    /// Row counts and per-campaign figures
    pub async fn stats(&self) -> DatabaseResult<SourceStats> {
        let advertisers = count(&self.client, "SELECT COUNT(*) FROM advertiser").await?;
        let campaigns = count(&self.client, "SELECT COUNT(*) FROM campaign").await?;
        let impressions = count(&self.client, "SELECT COUNT(*) FROM impressions").await?;
        let clicks = count(&self.client, "SELECT COUNT(*) FROM clicks").await?;

        let rows = self
            .client
            .query(
                "SELECT c.id::bigint, c.name::text, a.name::text, \
                        COUNT(DISTINCT i.id), COUNT(DISTINCT cl.id) \
                 FROM campaign c \
                 JOIN advertiser a ON c.advertiser_id = a.id \
                 LEFT JOIN impressions i ON c.id = i.campaign_id \
                 LEFT JOIN clicks cl ON c.id = cl.campaign_id \
                 GROUP BY c.id, c.name, a.name \
                 ORDER BY c.id",
                &[],
            )
            .await
            .map_err(query_error("Campaign details failed"))?;

        let campaign_details = rows
            .iter()
            .map(|row| CampaignDetail {
                id: row.get(0),
                name: row.get::<_, Option<String>>(1).unwrap_or_default(),
                advertiser: row.get::<_, Option<String>>(2).unwrap_or_default(),
                impressions: row.get(3),
                clicks: row.get(4),
            })
            .collect();

        Ok(SourceStats {
            advertisers,
            campaigns,
            impressions,
            clicks,
            campaign_details,
        })
    }

    /// Delete every row of the base tables, children first.
    ///
    /// Returns the number of rows deleted.
    pub async fn reset(&mut self) -> DatabaseResult<u64> {
        let tx = self.begin().await?;
        let mut deleted = 0;
        for table in ["clicks", "impressions", "campaign", "advertiser"] {
            let sql = format!("DELETE FROM {}", table);
            let n = tx
                .execute(sql.as_str(), &[])
                .await
                .map_err(query_error("Delete failed"))?;
            tracing::debug!(table, rows = n, "Deleted rows");
            deleted += n;
        }
        tx.commit().await.map_err(query_error("Commit failed"))?;
        tracing::info!(rows = deleted, "Source data deleted");
        Ok(deleted)
    }
}
