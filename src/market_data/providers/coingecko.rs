//! CoinGecko price feed.
//!
//! Uses the free public API: `/simple/price` for current quotes and
//! `/coins/{id}/market_chart` for historical series. No API key is required,
//! but the free tier rate limits aggressively, so 429 responses are retried with
//! exponential backoff.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::market_data::{Freshness, HistoricalPrice, PriceFeed, PriceMap, PriceQuote};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const USER_AGENT: &str = concat!("coinledger/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
/// Ids per `/simple/price` request.
const DEFAULT_BATCH_SIZE: usize = 250;

/// `/simple/price` body: `{ "bitcoin": { "usd": 1.0, "usd_24h_change": 0.5, ... } }`.
/// Values can be `null` for thinly traded coins.
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<(f64, f64)>,
}

pub struct CoinGeckoFeed {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
    batch_size: usize,
}

impl CoinGeckoFeed {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build CoinGecko HTTP client")?;
        Ok(Self {
            client,
            base_url: COINGECKO_API_BASE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the first retry; doubled on each subsequent attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Split larger id lists into several `/simple/price` requests.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut attempt = 0;

        loop {
            let result = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .query(query)
                .send()
                .await;

            let retryable_error = match result {
                Ok(response) if response.status().is_success() => {
                    let body = response
                        .text()
                        .await
                        .context("Failed to read CoinGecko response body")?;
                    return serde_json::from_str(&body)
                        .with_context(|| format!("Failed to parse CoinGecko response from {path}"));
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    anyhow!("CoinGecko rate limit exceeded")
                }
                Ok(response) if response.status().is_server_error() => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    anyhow!("CoinGecko API error: {status} - {body}")
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(anyhow!("CoinGecko API error: {status} - {body}"));
                }
                Err(e) => anyhow::Error::new(e).context("CoinGecko HTTP request failed"),
            };

            if attempt >= self.max_retries {
                return Err(retryable_error);
            }
            let delay = self.backoff * 2u32.saturating_pow(attempt);
            attempt += 1;
            warn!(
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %retryable_error,
                "retrying CoinGecko request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn simple_price(&self, ids: &[String], vs: &str) -> Result<HashMap<String, PriceQuote>> {
        let vs_currencies = if vs == "usd" {
            "usd".to_string()
        } else {
            format!("usd,{vs}")
        };

        let data: SimplePriceResponse = self
            .get_json(
                "/simple/price",
                &[
                    ("ids", ids.join(",")),
                    ("vs_currencies", vs_currencies),
                    ("include_24hr_change", "true".to_string()),
                ],
            )
            .await?;

        let mut quotes = HashMap::new();
        for (id, fields) in data {
            let field = |key: &str| fields.get(key).copied().flatten().and_then(to_decimal);
            let Some(usd) = field("usd") else {
                debug!(feed_id = %id, "no usd price in CoinGecko response");
                continue;
            };
            let usd_24h_change = field("usd_24h_change").unwrap_or(Decimal::ZERO);
            let (vs_price, vs_24h_change) = if vs == "usd" {
                (usd, usd_24h_change)
            } else {
                (
                    field(vs).unwrap_or(Decimal::ZERO),
                    field(format!("{vs}_24h_change").as_str()).unwrap_or(Decimal::ZERO),
                )
            };
            quotes.insert(
                id,
                PriceQuote {
                    usd,
                    vs: vs_price,
                    usd_24h_change,
                    vs_24h_change,
                    freshness: Freshness::Live,
                },
            );
        }
        Ok(quotes)
    }
}

#[async_trait::async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn current_prices(&self, feed_ids: &[String], vs_currency: &str) -> Result<PriceMap> {
        let mut prices = PriceMap::new(vs_currency);
        let vs = prices.vs_currency.clone();
        let mut last_error = None;

        for batch in feed_ids.chunks(self.batch_size) {
            match self.simple_price(batch, &vs).await {
                Ok(quotes) => prices.quotes.extend(quotes),
                Err(e) => {
                    warn!(ids = batch.len(), error = %e, "CoinGecko price batch failed");
                    last_error = Some(e);
                }
            }
        }

        // Partial answers are fine; only a total failure is an error.
        match last_error {
            Some(e) if prices.is_empty() => Err(e),
            _ => Ok(prices),
        }
    }

    async fn historical_series(
        &self,
        feed_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<HistoricalPrice>> {
        let chart: MarketChartResponse = self
            .get_json(
                &format!("/coins/{feed_id}/market_chart"),
                &[
                    ("vs_currency", vs_currency.to_lowercase()),
                    ("days", days.max(1).to_string()),
                ],
            )
            .await?;

        Ok(chart
            .prices
            .into_iter()
            .filter_map(|(millis, price)| {
                let timestamp = DateTime::<Utc>::from_timestamp_millis(millis as i64)?;
                Some(HistoricalPrice {
                    timestamp,
                    price: to_decimal(price)?,
                })
            })
            .collect())
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok().map(|d| d.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn to_decimal_rejects_non_finite() {
        assert_eq!(to_decimal(42000.5), Some(dec!(42000.5)));
        assert_eq!(to_decimal(f64::NAN), None);
        assert_eq!(to_decimal(f64::INFINITY), None);
    }

    #[test]
    fn market_chart_parses_pairs() {
        let body = r#"{"prices": [[1704067200000, 42000.0], [1704153600000, 43000.5]]}"#;
        let chart: MarketChartResponse = serde_json::from_str(body).unwrap();
        assert_eq!(chart.prices.len(), 2);
        assert_eq!(chart.prices[1].1, 43000.5);
    }
}
