use anyhow::Result;

use super::{HistoricalPrice, PriceMap};

/// External market-data provider.
#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current USD and `vs_currency` prices with 24h change.
    ///
    /// May return fewer ids than requested (unknown ids, partial rate limiting).
    async fn current_prices(&self, feed_ids: &[String], vs_currency: &str) -> Result<PriceMap>;

    async fn historical_series(
        &self,
        feed_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>>;

    fn name(&self) -> &str;
}

/// Feed that knows no prices. Used offline and in tests.
pub struct NoopPriceFeed;

#[async_trait::async_trait]
impl PriceFeed for NoopPriceFeed {
    async fn current_prices(&self, _feed_ids: &[String], vs_currency: &str) -> Result<PriceMap> {
        Ok(PriceMap::new(vs_currency))
    }

    async fn historical_series(
        &self,
        _feed_id: &str,
        _vs_currency: &str,
        _days: u32,
    ) -> Result<Vec<HistoricalPrice>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
