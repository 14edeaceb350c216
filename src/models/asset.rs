use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// One tradable instrument tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Id,
    /// Uppercase ticker, unique across the ledger.
    pub symbol: String,
    pub name: String,
    /// Key used to query the price feed (e.g. a CoinGecko coin id).
    pub price_feed_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Wallet or exchange where the asset is kept.
    #[serde(default)]
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(
        id: Id,
        symbol: impl Into<String>,
        name: impl Into<String>,
        price_feed_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            name: name.into(),
            price_feed_id: price_feed_id.into(),
            icon: None,
            location: String::new(),
            created_at,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}
