use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

use super::models::normalize_vs_currency;
use super::{
    CachedPrice, Freshness, HistoricalPrice, PriceCacheStore, PriceFeed, PriceMap, PriceQuote,
    TtlCache,
};

const DEFAULT_TTL_MINUTES: i64 = 30;

type QuoteKey = (String, String);

/// Current prices with three tiers: in-memory TTL cache, the live feed, then the
/// persisted last-known prices for whatever the feed could not answer.
pub struct MarketDataService {
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn PriceCacheStore>,
    clock: Arc<dyn Clock>,
    cache: Mutex<TtlCache<QuoteKey, PriceQuote>>,
}

impl MarketDataService {
    /// Pass [`NoopPriceFeed`](super::NoopPriceFeed) to work from stored prices only.
    pub fn new(store: Arc<dyn PriceCacheStore>, feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            feed,
            store,
            clock: Arc::new(SystemClock),
            cache: Mutex::new(TtlCache::new(Duration::minutes(DEFAULT_TTL_MINUTES))),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Mutex::new(TtlCache::new(ttl));
        self
    }

    /// Never fails. Ids nobody knows a price for are absent from the returned map.
    pub async fn current_prices(&self, feed_ids: &[String], vs_currency: &str) -> PriceMap {
        let vs = normalize_vs_currency(vs_currency);
        let ids = dedupe(feed_ids);
        let mut prices = PriceMap::new(&vs);
        if ids.is_empty() {
            return prices;
        }

        let now = self.clock.now();
        let mut missing = Vec::new();
        {
            let cache = self.cache.lock().await;
            for id in &ids {
                match cache.get(&(id.clone(), vs.clone()), now) {
                    Some(quote) => {
                        prices.quotes.insert(id.clone(), *quote);
                    }
                    None => missing.push(id.clone()),
                }
            }
        }
        if missing.is_empty() {
            debug!(count = ids.len(), vs = %vs, "all prices served from cache");
            return prices;
        }

        let feed = &self.feed;
        match feed.current_prices(&missing, &vs).await {
            Ok(fetched) => {
                self.remember(&vs, &fetched).await;
                info!(
                    feed = feed.name(),
                    requested = missing.len(),
                    received = fetched.quotes.len(),
                    vs = %vs,
                    "fetched current prices"
                );
                prices.quotes.extend(fetched.quotes);
            }
            Err(e) => {
                warn!(
                    feed = feed.name(),
                    error = %e,
                    requested = missing.len(),
                    "price feed failed; falling back to last known prices"
                );
            }
        }

        let unresolved: Vec<String> = missing
            .into_iter()
            .filter(|id| !prices.quotes.contains_key(id))
            .collect();
        if !unresolved.is_empty() {
            self.fill_from_store(&mut prices, &unresolved, &vs).await;
        }
        prices
    }

    pub async fn historical_series(
        &self,
        feed_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>> {
        let vs = normalize_vs_currency(vs_currency);
        debug!(feed_id, vs = %vs, days, "fetching historical series");
        self.feed.historical_series(feed_id, &vs, days).await
    }

    /// Cache live quotes in memory and persist them as last-known prices.
    async fn remember(&self, vs: &str, fetched: &PriceMap) {
        let now = self.clock.now();
        let live: Vec<(&String, &PriceQuote)> = fetched
            .quotes
            .iter()
            .filter(|(_, quote)| quote.freshness == Freshness::Live)
            .collect();
        if live.is_empty() {
            return;
        }

        {
            let mut cache = self.cache.lock().await;
            cache.purge_expired(now);
            for (id, quote) in &live {
                cache.insert(((*id).clone(), vs.to_string()), **quote, now);
            }
        }

        let rows: Vec<CachedPrice> = live
            .iter()
            .map(|(id, quote)| CachedPrice::from_quote(id.as_str(), vs, quote, now))
            .collect();
        if let Err(e) = self.store.put_cached_prices(&rows).await {
            warn!(error = %e, count = rows.len(), "failed to persist last known prices");
        }
    }

    async fn fill_from_store(&self, prices: &mut PriceMap, ids: &[String], vs: &str) {
        match self.store.get_cached_prices(ids).await {
            Ok(rows) => {
                debug!(
                    requested = ids.len(),
                    found = rows.len(),
                    "using last known prices"
                );
                for row in rows {
                    prices.quotes.insert(row.feed_id.clone(), row.to_quote(vs));
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read last known prices");
            }
        }
    }
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}
