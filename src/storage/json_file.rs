use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::sync::Mutex;

use super::{filter_transactions, sort_assets, Storage};
use crate::models::{Asset, Id, PortfolioSnapshot, Transaction, TypeFilter};

/// JSON file-based storage implementation.
///
/// Directory structure:
/// ```text
/// data/
///   assets.json
///   transactions.json
///   snapshots.json
/// ```
///
/// Each file holds a single pretty-printed JSON array and is rewritten whole on
/// every change.
pub struct JsonFileStorage {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn assets_file(&self) -> PathBuf {
        self.base_path.join("assets.json")
    }

    fn transactions_file(&self) -> PathBuf {
        self.base_path.join("transactions.json")
    }

    fn snapshots_file(&self) -> PathBuf {
        self.base_path.join("snapshots.json")
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create directory")?;
        }
        Ok(())
    }

    /// A missing file reads as an empty list.
    async fn read_list<T: for<'de> serde::Deserialize<'de>>(&self, path: &Path) -> Result<Vec<T>> {
        match fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from {:?}", path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    async fn write_list<T: serde::Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        self.ensure_dir(path).await?;
        let content = serde_json::to_string_pretty(items).context("Failed to serialize JSON")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Read-modify-write under the store's write lock.
    async fn update_list<T, F, R>(&self, path: &Path, f: F) -> Result<R>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de>,
        F: FnOnce(&mut Vec<T>) -> R + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.read_list(path).await?;
        let result = f(&mut items);
        self.write_list(path, &items).await?;
        Ok(result)
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStorage {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let mut assets: Vec<Asset> = self.read_list(&self.assets_file()).await?;
        sort_assets(&mut assets);
        Ok(assets)
    }

    async fn get_asset(&self, id: &Id) -> Result<Option<Asset>> {
        let assets: Vec<Asset> = self.read_list(&self.assets_file()).await?;
        Ok(assets.into_iter().find(|a| &a.id == id))
    }

    async fn save_asset(&self, asset: &Asset) -> Result<()> {
        self.update_list(&self.assets_file(), |assets: &mut Vec<Asset>| {
            match assets.iter_mut().find(|a| a.id == asset.id) {
                Some(existing) => *existing = asset.clone(),
                None => assets.push(asset.clone()),
            }
        })
        .await
    }

    async fn delete_asset(&self, id: &Id) -> Result<bool> {
        self.update_list(&self.assets_file(), |assets: &mut Vec<Asset>| {
            let before = assets.len();
            assets.retain(|a| &a.id != id);
            assets.len() != before
        })
        .await
    }

    async fn list_transactions(&self, filter: TypeFilter) -> Result<Vec<Transaction>> {
        let txns: Vec<Transaction> = self.read_list(&self.transactions_file()).await?;
        Ok(filter_transactions(txns, filter))
    }

    async fn get_transaction(&self, id: &Id) -> Result<Option<Transaction>> {
        let txns: Vec<Transaction> = self.read_list(&self.transactions_file()).await?;
        Ok(txns.into_iter().find(|t| &t.id == id))
    }

    async fn save_transaction(&self, txn: &Transaction) -> Result<()> {
        self.update_list(&self.transactions_file(), |txns: &mut Vec<Transaction>| {
            match txns.iter_mut().find(|t| t.id == txn.id) {
                Some(existing) => *existing = txn.clone(),
                None => txns.push(txn.clone()),
            }
        })
        .await
    }

    async fn delete_transaction(&self, id: &Id) -> Result<bool> {
        self.update_list(&self.transactions_file(), |txns: &mut Vec<Transaction>| {
            let before = txns.len();
            txns.retain(|t| &t.id != id);
            txns.len() != before
        })
        .await
    }

    async fn count_transactions_for_asset(&self, asset_id: &Id) -> Result<usize> {
        let txns: Vec<Transaction> = self.read_list(&self.transactions_file()).await?;
        Ok(txns.iter().filter(|t| &t.asset_id == asset_id).count())
    }

    async fn upsert_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        self.update_list(
            &self.snapshots_file(),
            |snapshots: &mut Vec<PortfolioSnapshot>| {
                match snapshots.iter_mut().find(|s| s.date == snapshot.date) {
                    Some(existing) => *existing = snapshot.clone(),
                    None => snapshots.push(snapshot.clone()),
                }
                snapshots.sort_by_key(|s| s.date);
            },
        )
        .await
    }

    async fn list_snapshots(&self) -> Result<Vec<PortfolioSnapshot>> {
        let mut snapshots: Vec<PortfolioSnapshot> = self.read_list(&self.snapshots_file()).await?;
        snapshots.sort_by_key(|s| s.date);
        Ok(snapshots)
    }
}
