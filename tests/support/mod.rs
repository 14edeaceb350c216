#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use coinledger::market_data::{Freshness, HistoricalPrice, PriceFeed, PriceMap, PriceQuote};
use coinledger::models::{Id, Transaction, TransactionType};
use rust_decimal::Decimal;

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn txn(
    id: &str,
    asset: &str,
    kind: TransactionType,
    quantity: Decimal,
    unit_price: Decimal,
    date: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: Id::from(id),
        date,
        kind,
        asset_id: Id::from(asset),
        quantity,
        unit_price,
        total_amount: quantity * unit_price,
        notes: String::new(),
    }
}

pub fn live_quote(usd: Decimal, vs: Decimal, change: Decimal) -> PriceQuote {
    PriceQuote {
        usd,
        vs,
        usd_24h_change: change,
        vs_24h_change: change,
        freshness: Freshness::Live,
    }
}

/// Feed with canned quotes. Can be switched to failing mid-test.
#[derive(Default)]
pub struct MockPriceFeed {
    quotes: HashMap<String, PriceQuote>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, feed_id: &str, quote: PriceQuote) -> Self {
        self.quotes.insert(feed_id.to_string(), quote);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn current_prices(&self, feed_ids: &[String], vs_currency: &str) -> Result<PriceMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            anyhow::bail!("mock feed unavailable");
        }
        let mut map = PriceMap::new(vs_currency);
        for id in feed_ids {
            if let Some(quote) = self.quotes.get(id) {
                map.quotes.insert(id.clone(), *quote);
            }
        }
        Ok(map)
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
        "mock"
    }
}
