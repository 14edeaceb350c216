//! Daily portfolio value history.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::models::PortfolioSnapshot;
use crate::portfolio::{PriceStatus, Valuation};
use crate::storage::Storage;

/// One row per calendar day in the reference zone; recording again the same day
/// replaces the value.
pub struct SnapshotRecorder {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl SnapshotRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            tz: chrono_tz::Asia::Tokyo,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub async fn record(&self, total_value_jpy: Decimal) -> Result<PortfolioSnapshot> {
        let snapshot = PortfolioSnapshot {
            date: self.clock.today_in(self.tz),
            total_value_jpy,
            recorded_at: self.clock.now(),
        };
        self.storage
            .upsert_snapshot(&snapshot)
            .await
            .context("Failed to record portfolio snapshot")?;
        info!(date = %snapshot.date, value = %total_value_jpy, "snapshot recorded");
        Ok(snapshot)
    }

    /// Records a JPY valuation, refusing one that has nothing priced so a feed
    /// outage never replaces today's value with zero.
    pub async fn record_valuation(&self, valuation: &Valuation) -> Result<PortfolioSnapshot> {
        if valuation.vs_currency != "jpy" {
            bail!(
                "Snapshots are recorded in JPY, got a valuation in {}",
                valuation.vs_currency
            );
        }
        if valuation.rows.is_empty() {
            warn!("no holdings; snapshot not recorded");
            bail!("No holdings to record");
        }
        if valuation
            .rows
            .iter()
            .all(|row| row.price_status == PriceStatus::Missing)
        {
            warn!(
                holdings = valuation.rows.len(),
                "no prices available; snapshot not recorded"
            );
            bail!("Could not get prices for any holding; snapshot not recorded");
        }
        self.record(valuation.total_value).await
    }

    /// The `days` most recent snapshots, oldest first.
    pub async fn history(&self, days: usize) -> Result<Vec<PortfolioSnapshot>> {
        let mut snapshots = self.storage.list_snapshots().await?;
        let skip = snapshots.len().saturating_sub(days);
        Ok(snapshots.split_off(skip))
    }

    pub async fn latest(&self) -> Result<Option<PortfolioSnapshot>> {
        Ok(self.storage.list_snapshots().await?.pop())
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.storage.list_snapshots().await?.len())
    }
}
