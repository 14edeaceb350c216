pub mod clock;
pub mod config;
pub mod duration;
pub mod ledger;
pub mod market_data;
pub mod models;
pub mod portfolio;
pub mod snapshot;
pub mod storage;
pub mod validation;
