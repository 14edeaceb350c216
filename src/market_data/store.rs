use std::collections::HashMap;

use anyhow::Result;

use super::CachedPrice;

/// Persisted last-known prices, read when the live feed cannot answer.
#[async_trait::async_trait]
pub trait PriceCacheStore: Send + Sync {
    async fn get_cached_prices(&self, feed_ids: &[String]) -> Result<Vec<CachedPrice>>;

    /// Upsert by `feed_id`.
    async fn put_cached_prices(&self, prices: &[CachedPrice]) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryPriceCacheStore {
    prices: tokio::sync::Mutex<HashMap<String, CachedPrice>>,
}

impl MemoryPriceCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PriceCacheStore for MemoryPriceCacheStore {
    async fn get_cached_prices(&self, feed_ids: &[String]) -> Result<Vec<CachedPrice>> {
        let prices = self.prices.lock().await;
        Ok(feed_ids
            .iter()
            .filter_map(|id| prices.get(id).cloned())
            .collect())
    }

    async fn put_cached_prices(&self, new_prices: &[CachedPrice]) -> Result<()> {
        if new_prices.is_empty() {
            return Ok(());
        }
        let mut prices = self.prices.lock().await;
        for price in new_prices {
            prices.insert(price.feed_id.clone(), price.clone());
        }
        Ok(())
    }
}
