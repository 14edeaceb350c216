//! In-memory storage implementation for testing.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::models::{Asset, Id, PortfolioSnapshot, Transaction, TypeFilter};

use super::{filter_transactions, sort_assets, Storage};

/// In-memory storage for testing purposes.
pub struct MemoryStorage {
    assets: Mutex<HashMap<Id, Asset>>,
    transactions: Mutex<HashMap<Id, Transaction>>,
    snapshots: Mutex<BTreeMap<NaiveDate, PortfolioSnapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            assets: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let assets = self.assets.lock().await;
        let mut list: Vec<Asset> = assets.values().cloned().collect();
        sort_assets(&mut list);
        Ok(list)
    }

    async fn get_asset(&self, id: &Id) -> Result<Option<Asset>> {
        let assets = self.assets.lock().await;
        Ok(assets.get(id).cloned())
    }

    async fn save_asset(&self, asset: &Asset) -> Result<()> {
        let mut assets = self.assets.lock().await;
        assets.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    async fn delete_asset(&self, id: &Id) -> Result<bool> {
        let mut assets = self.assets.lock().await;
        Ok(assets.remove(id).is_some())
    }

    async fn list_transactions(&self, filter: TypeFilter) -> Result<Vec<Transaction>> {
        let txns = self.transactions.lock().await;
        Ok(filter_transactions(txns.values().cloned().collect(), filter))
    }

    async fn get_transaction(&self, id: &Id) -> Result<Option<Transaction>> {
        let txns = self.transactions.lock().await;
        Ok(txns.get(id).cloned())
    }

    async fn save_transaction(&self, txn: &Transaction) -> Result<()> {
        let mut txns = self.transactions.lock().await;
        txns.insert(txn.id.clone(), txn.clone());
        Ok(())
    }

    async fn delete_transaction(&self, id: &Id) -> Result<bool> {
        let mut txns = self.transactions.lock().await;
        Ok(txns.remove(id).is_some())
    }

    async fn count_transactions_for_asset(&self, asset_id: &Id) -> Result<usize> {
        let txns = self.transactions.lock().await;
        Ok(txns.values().filter(|t| &t.asset_id == asset_id).count())
    }

    async fn upsert_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert(snapshot.date, snapshot.clone());
        Ok(())
    }

    async fn list_snapshots(&self) -> Result<Vec<PortfolioSnapshot>> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.values().cloned().collect())
    }
}
