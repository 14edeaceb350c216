use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::sync::Mutex;

use super::{CachedPrice, PriceCacheStore};

const PRICE_CACHE_FILE: &str = "price_cache.json";

/// Last-known prices persisted as a single JSON array under the data directory.
pub struct JsonPriceCacheStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonPriceCacheStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(PRICE_CACHE_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, CachedPrice>> {
        let rows: Vec<CachedPrice> = match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from {:?}", self.path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).context("Failed to read price cache"),
        };
        Ok(rows
            .into_iter()
            .map(|row| (row.feed_id.clone(), row))
            .collect())
    }

    async fn save(&self, rows: &BTreeMap<String, CachedPrice>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create directory")?;
        }
        let rows: Vec<&CachedPrice> = rows.values().collect();
        let content = serde_json::to_string_pretty(&rows).context("Failed to serialize JSON")?;
        fs::write(&self.path, content)
            .await
            .context("Failed to write price cache")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PriceCacheStore for JsonPriceCacheStore {
    async fn get_cached_prices(&self, feed_ids: &[String]) -> Result<Vec<CachedPrice>> {
        let rows = self.load().await?;
        Ok(feed_ids
            .iter()
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn put_cached_prices(&self, prices: &[CachedPrice]) -> Result<()> {
        if prices.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;
        for price in prices {
            rows.insert(price.feed_id.clone(), price.clone());
        }
        self.save(&rows).await
    }
}
