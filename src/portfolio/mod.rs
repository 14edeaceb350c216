//! The accounting core: pure folds over the transaction ledger, plus the
//! service that feeds them from storage and the price feed.

mod cost_basis;
mod holdings;
mod models;
mod period;
mod service;
mod valuation;

pub use cost_basis::*;
pub use holdings::*;
pub use models::*;
pub use period::*;
pub use service::*;
pub use valuation::*;
