use std::sync::Arc;

use anyhow::Result;
use chrono::Datelike;
use chrono_tz::Tz;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::market_data::{HistoricalPrice, MarketDataService};
use crate::models::{Asset, Transaction, TypeFilter};
use crate::storage::Storage;

use super::{
    aggregate, compose, compute_cost_basis, headline_pl, portfolio_holdings, DateRange, Holding,
    PeriodStats, PortfolioReport, Valuation,
};

/// Loads the ledger from storage and runs the folds over it.
pub struct PortfolioService {
    storage: Arc<dyn Storage>,
    market_data: Arc<MarketDataService>,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl PortfolioService {
    pub fn new(storage: Arc<dyn Storage>, market_data: Arc<MarketDataService>) -> Self {
        Self {
            storage,
            market_data,
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

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    async fn load(&self) -> Result<(Vec<Asset>, Vec<Transaction>)> {
        let assets = self.storage.list_assets().await?;
        let transactions = self.storage.list_transactions(TypeFilter::All).await?;
        Ok((assets, transactions))
    }

    pub async fn holdings(&self) -> Result<Vec<Holding>> {
        let (assets, transactions) = self.load().await?;
        Ok(portfolio_holdings(&assets, &transactions))
    }

    pub async fn statistics(&self, range: &DateRange) -> Result<PeriodStats> {
        let (assets, transactions) = self.load().await?;
        Ok(aggregate(&assets, &transactions, range))
    }

    /// Current holdings valued in `vs_currency`. Price problems never fail this.
    pub async fn valuation(&self, vs_currency: &str) -> Result<Valuation> {
        let (assets, transactions) = self.load().await?;
        Ok(self.value(&assets, &transactions, vs_currency).await)
    }

    async fn value(
        &self,
        assets: &[Asset],
        transactions: &[Transaction],
        vs_currency: &str,
    ) -> Valuation {
        let holdings = portfolio_holdings(assets, transactions);
        let feed_ids: Vec<String> = holdings.iter().map(|h| h.price_feed_id.clone()).collect();
        let prices = self.market_data.current_prices(&feed_ids, vs_currency).await;
        compose(&holdings, &compute_cost_basis(transactions), &prices)
    }

    /// Valuation, this calendar year's flows (in the reference zone) and the
    /// headline P/L against them.
    pub async fn report(&self, vs_currency: &str) -> Result<PortfolioReport> {
        let (assets, transactions) = self.load().await?;
        let as_of = self.clock.now();
        let today = self.clock.today_in(self.tz);
        let this_year_range = DateRange::year(today.year(), self.tz).unwrap_or_else(DateRange::all);

        let valuation = self.value(&assets, &transactions, vs_currency).await;
        let this_year = aggregate(&assets, &transactions, &this_year_range);
        let headline = headline_pl(
            valuation.total_value_usd,
            this_year.total_investment,
            this_year.total_sales,
        );
        debug!(
            assets = assets.len(),
            transactions = transactions.len(),
            total_value = %valuation.total_value,
            fallback = valuation.uses_fallback_data,
            "portfolio report computed"
        );

        Ok(PortfolioReport {
            as_of,
            as_of_date: today,
            asset_count: assets.len(),
            transaction_count: transactions.len(),
            valuation,
            this_year,
            headline,
        })
    }

    pub async fn price_history(
        &self,
        feed_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>> {
        self.market_data
            .historical_series(feed_id, vs_currency, days)
            .await
    }
}
