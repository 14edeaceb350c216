use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::LedgerError;
use crate::clock::{Clock, SystemClock};
use crate::models::{
    Asset, Id, IdGenerator, Transaction, TransactionType, TypeFilter, UuidIdGenerator,
};
use crate::storage::Storage;
use crate::validation::{
    sanitize_symbol, validate_feed_id, validate_name, validate_quantity, validate_total_amount,
    validate_unit_price,
};

const DEFAULT_DUPLICATE_TOLERANCE_MINUTES: i64 = 5;

/// Asset fields as entered by the user, before sanitizing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub symbol: String,
    pub name: String,
    pub price_feed_id: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub asset_id: Id,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Defaults to `quantity * unit_price`.
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
}

/// A stored transaction plus any existing entries that look like the same trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub similar: Vec<Transaction>,
}

pub struct LedgerService {
    storage: Arc<dyn Storage>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    duplicate_tolerance: Duration,
}

impl LedgerService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            ids: Arc::new(UuidIdGenerator),
            clock: Arc::new(SystemClock),
            duplicate_tolerance: Duration::minutes(DEFAULT_DUPLICATE_TOLERANCE_MINUTES),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_duplicate_tolerance(mut self, tolerance: Duration) -> Self {
        self.duplicate_tolerance = tolerance;
        self
    }

    pub async fn list_assets(&self) -> Result<Vec<Asset>, LedgerError> {
        Ok(self.storage.list_assets().await?)
    }

    pub async fn add_asset(&self, input: NewAsset) -> Result<Asset, LedgerError> {
        let (symbol, name, feed_id) = clean_asset_fields(&input)?;
        self.ensure_symbol_free(&symbol, None).await?;

        let mut asset = Asset::new(self.ids.new_id(), symbol, name, feed_id, self.clock.now())
            .with_location(input.location.trim());
        asset.icon = clean_icon(input.icon);

        self.storage.save_asset(&asset).await?;
        info!(asset_id = %asset.id, symbol = %asset.symbol, "asset added");
        Ok(asset)
    }

    pub async fn update_asset(&self, id: &Id, input: NewAsset) -> Result<Asset, LedgerError> {
        let existing = self
            .storage
            .get_asset(id)
            .await?
            .ok_or_else(|| LedgerError::AssetNotFound(id.clone()))?;
        let (symbol, name, feed_id) = clean_asset_fields(&input)?;
        self.ensure_symbol_free(&symbol, Some(id)).await?;

        let asset = Asset {
            id: existing.id,
            symbol,
            name,
            price_feed_id: feed_id,
            icon: clean_icon(input.icon),
            location: input.location.trim().to_string(),
            created_at: existing.created_at,
        };
        self.storage.save_asset(&asset).await?;
        info!(asset_id = %asset.id, symbol = %asset.symbol, "asset updated");
        Ok(asset)
    }

    /// Refuses while any transaction still references the asset.
    pub async fn delete_asset(&self, id: &Id) -> Result<(), LedgerError> {
        if self.storage.get_asset(id).await?.is_none() {
            return Err(LedgerError::AssetNotFound(id.clone()));
        }
        let count = self.storage.count_transactions_for_asset(id).await?;
        if count > 0 {
            return Err(LedgerError::AssetInUse {
                asset_id: id.clone(),
                count,
            });
        }
        self.storage.delete_asset(id).await?;
        info!(asset_id = %id, "asset deleted");
        Ok(())
    }

    pub async fn list_transactions(
        &self,
        filter: TypeFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.storage.list_transactions(filter).await?)
    }

    /// Stores the transaction even when similar ones exist; those are only reported.
    pub async fn add_transaction(
        &self,
        input: NewTransaction,
    ) -> Result<RecordedTransaction, LedgerError> {
        let total_amount = self.check_transaction(&input).await?;
        let similar = self.find_similar(&input).await?;
        if !similar.is_empty() {
            warn!(
                asset_id = %input.asset_id,
                quantity = %input.quantity,
                similar = similar.len(),
                "possible duplicate transaction"
            );
        }

        let transaction = Transaction {
            id: self.ids.new_id(),
            date: input.date,
            kind: input.kind,
            asset_id: input.asset_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_amount,
            notes: input.notes.trim().to_string(),
        };
        self.storage.save_transaction(&transaction).await?;
        info!(
            transaction_id = %transaction.id,
            asset_id = %transaction.asset_id,
            kind = %transaction.kind,
            "transaction added"
        );
        Ok(RecordedTransaction {
            transaction,
            similar,
        })
    }

    pub async fn update_transaction(
        &self,
        id: &Id,
        input: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        if self.storage.get_transaction(id).await?.is_none() {
            return Err(LedgerError::TransactionNotFound(id.clone()));
        }
        let total_amount = self.check_transaction(&input).await?;

        let transaction = Transaction {
            id: id.clone(),
            date: input.date,
            kind: input.kind,
            asset_id: input.asset_id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_amount,
            notes: input.notes.trim().to_string(),
        };
        self.storage.save_transaction(&transaction).await?;
        info!(transaction_id = %id, "transaction updated");
        Ok(transaction)
    }

    pub async fn delete_transaction(&self, id: &Id) -> Result<(), LedgerError> {
        if !self.storage.delete_transaction(id).await? {
            return Err(LedgerError::TransactionNotFound(id.clone()));
        }
        info!(transaction_id = %id, "transaction deleted");
        Ok(())
    }

    /// Validates amounts and the asset reference. Returns the total to store.
    async fn check_transaction(&self, input: &NewTransaction) -> Result<Decimal, LedgerError> {
        validate_quantity(input.quantity)?;
        validate_unit_price(input.unit_price)?;
        let total = match input.total_amount {
            Some(total) => {
                validate_total_amount(total)?;
                total
            }
            None => input.quantity * input.unit_price,
        };
        if self.storage.get_asset(&input.asset_id).await?.is_none() {
            return Err(LedgerError::AssetNotFound(input.asset_id.clone()));
        }
        Ok(total)
    }

    /// Same asset and quantity within the duplicate tolerance.
    async fn find_similar(&self, input: &NewTransaction) -> Result<Vec<Transaction>, LedgerError> {
        let txns = self.storage.list_transactions(TypeFilter::All).await?;
        Ok(txns
            .into_iter()
            .filter(|t| t.asset_id == input.asset_id && t.quantity == input.quantity)
            .filter(|t| (t.date - input.date).abs() <= self.duplicate_tolerance)
            .collect())
    }

    async fn ensure_symbol_free(&self, symbol: &str, exclude: Option<&Id>) -> Result<(), LedgerError> {
        let clash = self
            .storage
            .list_assets()
            .await?
            .into_iter()
            .any(|a| Some(&a.id) != exclude && a.symbol.eq_ignore_ascii_case(symbol));
        if clash {
            debug!(symbol, "rejecting duplicate symbol");
            return Err(LedgerError::DuplicateSymbol(symbol.to_string()));
        }
        Ok(())
    }
}

fn clean_asset_fields(input: &NewAsset) -> Result<(String, String, String), LedgerError> {
    Ok((
        sanitize_symbol(&input.symbol)?,
        validate_name(&input.name)?,
        validate_feed_id(&input.price_feed_id)?,
    ))
}

fn clean_icon(icon: Option<String>) -> Option<String> {
    icon.map(|i| i.trim().to_string()).filter(|i| !i.is_empty())
}
