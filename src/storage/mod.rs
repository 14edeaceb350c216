mod json_file;
mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use crate::models::{Asset, Id, PortfolioSnapshot, Transaction, TypeFilter};

/// Storage trait for persisting the ledger.
///
/// Writes are last-write-wins; implementations serialize their own writers but do
/// not coordinate across processes.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Assets
    async fn list_assets(&self) -> Result<Vec<Asset>>;
    async fn get_asset(&self, id: &Id) -> Result<Option<Asset>>;
    async fn save_asset(&self, asset: &Asset) -> Result<()>;
    /// Returns `false` when no asset had that id.
    async fn delete_asset(&self, id: &Id) -> Result<bool>;

    // Transactions
    /// Newest first.
    async fn list_transactions(&self, filter: TypeFilter) -> Result<Vec<Transaction>>;
    async fn get_transaction(&self, id: &Id) -> Result<Option<Transaction>>;
    async fn save_transaction(&self, txn: &Transaction) -> Result<()>;
    async fn delete_transaction(&self, id: &Id) -> Result<bool>;
    async fn count_transactions_for_asset(&self, asset_id: &Id) -> Result<usize>;

    // Snapshots
    /// Insert or replace the snapshot for `snapshot.date`.
    async fn upsert_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<()>;
    /// Oldest first.
    async fn list_snapshots(&self) -> Result<Vec<PortfolioSnapshot>>;
}

/// Assets are listed by symbol so output is stable across backends.
pub(crate) fn sort_assets(assets: &mut [Asset]) {
    assets.sort_by(|a, b| a.symbol.cmp(&b.symbol).then_with(|| a.id.cmp(&b.id)));
}

/// Newest first; ties broken by id so equal timestamps stay deterministic.
pub(crate) fn sort_newest_first(txns: &mut [Transaction]) {
    txns.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
}

pub(crate) fn filter_transactions(txns: Vec<Transaction>, filter: TypeFilter) -> Vec<Transaction> {
    let mut txns: Vec<Transaction> = txns
        .into_iter()
        .filter(|t| filter.matches(t.kind))
        .collect();
    sort_newest_first(&mut txns);
    txns
}
