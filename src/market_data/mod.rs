//! Price feed plumbing. Nothing in the accounting core depends on this module
//! except the plain quote types in `models`.

mod cache;
mod json_store;
mod models;
mod provider;
#[cfg(feature = "market_data")]
pub mod providers;
mod service;
mod store;

pub use cache::TtlCache;
pub use json_store::JsonPriceCacheStore;
pub use models::{CachedPrice, Freshness, HistoricalPrice, PriceMap, PriceQuote};
pub use provider::{NoopPriceFeed, PriceFeed};
pub use service::MarketDataService;
pub use store::{MemoryPriceCacheStore, PriceCacheStore};
