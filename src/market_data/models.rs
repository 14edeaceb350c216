use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Freshness {
    Live,
    /// Last-known value from the persisted cache.
    Stale { as_of: DateTime<Utc> },
}

/// Current price of one feed id in USD and in the display currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub usd: Decimal,
    pub vs: Decimal,
    /// 24h change, percent.
    pub usd_24h_change: Decimal,
    pub vs_24h_change: Decimal,
    pub freshness: Freshness,
}

/// Quotes keyed by feed id. Ids the provider did not answer for are simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMap {
    /// Lowercase display currency code, e.g. `jpy`.
    pub vs_currency: String,
    pub quotes: HashMap<String, PriceQuote>,
}

impl PriceMap {
    pub fn new(vs_currency: impl Into<String>) -> Self {
        Self {
            vs_currency: normalize_vs_currency(&vs_currency.into()),
            quotes: HashMap::new(),
        }
    }

    pub fn with_quote(mut self, feed_id: impl Into<String>, quote: PriceQuote) -> Self {
        self.quotes.insert(feed_id.into(), quote);
        self
    }

    pub fn get(&self, feed_id: &str) -> Option<&PriceQuote> {
        self.quotes.get(feed_id)
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Row of the persisted last-known price table, unique on `feed_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPrice {
    pub feed_id: String,
    pub price_usd: Decimal,
    pub price_vs: Decimal,
    pub vs_currency: String,
    pub change_24h: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl CachedPrice {
    pub fn from_quote(
        feed_id: impl Into<String>,
        vs_currency: &str,
        quote: &PriceQuote,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            price_usd: quote.usd,
            price_vs: quote.vs,
            vs_currency: normalize_vs_currency(vs_currency),
            change_24h: quote.vs_24h_change,
            updated_at,
        }
    }

    /// Rebuild a stale quote for `vs_currency`.
    ///
    /// Display-currency fields are only trusted when the cached row was written for the
    /// same currency; otherwise they fall back to zero while the USD price is kept.
    pub fn to_quote(&self, vs_currency: &str) -> PriceQuote {
        let vs_currency = normalize_vs_currency(vs_currency);
        let same_currency = self.vs_currency == vs_currency;
        let (vs, vs_24h_change) = if same_currency {
            (self.price_vs, self.change_24h)
        } else if vs_currency == "usd" {
            (self.price_usd, Decimal::ZERO)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };
        PriceQuote {
            usd: self.price_usd,
            vs,
            usd_24h_change: if self.vs_currency == "usd" {
                self.change_24h
            } else {
                Decimal::ZERO
            },
            vs_24h_change,
            freshness: Freshness::Stale {
                as_of: self.updated_at,
            },
        }
    }
}

/// One point of a historical price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalPrice {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

pub(crate) fn normalize_vs_currency(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn cached(vs: &str) -> CachedPrice {
        CachedPrice {
            feed_id: "bitcoin".to_string(),
            price_usd: dec!(60000),
            price_vs: dec!(9000000),
            vs_currency: vs.to_string(),
            change_24h: dec!(1.5),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn cached_price_in_same_currency_restores_everything() {
        let quote = cached("jpy").to_quote("JPY");
        assert_eq!(quote.vs, dec!(9000000));
        assert_eq!(quote.vs_24h_change, dec!(1.5));
        assert_eq!(quote.usd, dec!(60000));
        assert!(matches!(quote.freshness, Freshness::Stale { .. }));
    }

    #[test]
    fn cached_price_for_other_currency_keeps_only_usd() {
        let quote = cached("jpy").to_quote("eur");
        assert_eq!(quote.usd, dec!(60000));
        assert_eq!(quote.vs, Decimal::ZERO);

        let as_usd = cached("jpy").to_quote("usd");
        assert_eq!(as_usd.vs, dec!(60000));
    }
}
