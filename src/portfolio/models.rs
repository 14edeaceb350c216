use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Asset, Id};

/// Net quantity of one asset joined with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub asset_id: Id,
    pub symbol: String,
    pub name: String,
    pub price_feed_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub location: String,
    pub quantity: Decimal,
}

impl Holding {
    pub fn from_asset(asset: &Asset, quantity: Decimal) -> Self {
        Self {
            asset_id: asset.id.clone(),
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            price_feed_id: asset.price_feed_id.clone(),
            icon: asset.icon.clone(),
            location: asset.location.clone(),
            quantity,
        }
    }
}

/// Weighted-average acquisition cost of one asset.
///
/// `holdings` here is the Buy/Sell-only net. It ignores rewards and transfers and may be
/// negative; it is not the same figure as [`Holding::quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasis {
    pub avg_cost: Decimal,
    pub holdings: Decimal,
    pub total_cost: Decimal,
}

/// Investment/sales totals for a date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub total_investment: Decimal,
    pub total_sales: Decimal,
    pub transaction_count: usize,
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    Live,
    /// Served from the last-known price cache.
    Stale,
    /// No price at all; monetary fields are zero.
    Missing,
}

/// One display row of the valued portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationRow {
    pub asset_id: Id,
    pub symbol: String,
    pub name: String,
    pub price_feed_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub location: String,
    pub holdings: Decimal,
    /// Price in the display currency.
    pub price: Decimal,
    pub price_usd: Decimal,
    /// Value in the display currency.
    pub value: Decimal,
    pub value_usd: Decimal,
    /// 24h change percent in the display currency.
    pub change_24h: Decimal,
    pub avg_cost: Decimal,
    pub unrealized_pl: Decimal,
    pub pl_percent: Decimal,
    pub price_status: PriceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performer {
    pub asset_id: Id,
    pub symbol: String,
    pub change_24h: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub vs_currency: String,
    pub rows: Vec<ValuationRow>,
    pub total_value: Decimal,
    pub total_value_usd: Decimal,
    pub total_24h_change: Decimal,
    pub total_24h_percent: Decimal,
    pub top_performer: Option<Performer>,
    pub worst_performer: Option<Performer>,
    /// True when any row used cached or zero-filled prices.
    pub uses_fallback_data: bool,
}

/// Headline P/L measured against this year's net cash deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlinePl {
    pub net_investment: Decimal,
    pub total_pl: Decimal,
    pub total_pl_percent: Decimal,
}

/// Everything a dashboard needs in one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub as_of: DateTime<Utc>,
    pub as_of_date: NaiveDate,
    pub asset_count: usize,
    pub transaction_count: usize,
    pub valuation: Valuation,
    pub this_year: PeriodStats,
    pub headline: HeadlinePl,
}
