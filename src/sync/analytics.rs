//! Recompute of the aggregate tables

use super::client::StoreClient;
use super::{ANALYTICS_TABLES, SyncResult};
use crate::database::AnalyticalStore;

/// Rebuilds every analytics table from the base tables currently loaded
pub struct AnalyticsRefresher<'a, A: AnalyticalStore + ?Sized> {
    client: &'a StoreClient<'a, A>,
    tables: Vec<&'a str>,
}

impl<'a, A: AnalyticalStore + ?Sized> AnalyticsRefresher<'a, A> {
    pub fn new(client: &'a StoreClient<'a, A>) -> Self {
        Self {
            client,
            tables: ANALYTICS_TABLES.to_vec(),
        }
    }

    /// Refresh `tables` instead of the default set, in the given order
    pub fn with_tables(mut self, tables: &[&'a str]) -> Self {
        self.tables = tables.to_vec();
        self
    }

    /// Truncate the analytics tables, then run each refresh script in order.
    ///
    /// Until this returns `Ok` the tables may be empty or partially filled.
    pub async fn refresh(&self) -> SyncResult<()> {
        let report = self.client.truncate(&self.tables).await;
        if !report.is_success() {
            tracing::warn!(
                failed = report.failures.len(),
                "Some analytics tables could not be truncated"
            );
        }

        for table in &self.tables {
            self.client.refresh(table).await?;
            tracing::info!(table, "Refreshed analytics table");
        }
        Ok(())
    }
}
