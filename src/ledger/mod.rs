//! Validated writes to the ledger: assets and transactions.

mod error;
mod service;

pub use error::LedgerError;
pub use service::{LedgerService, NewAsset, NewTransaction, RecordedTransaction};
