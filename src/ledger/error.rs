use crate::models::Id;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("An asset with symbol {0} already exists")]
    DuplicateSymbol(String),
    #[error("Asset {asset_id} still has {count} transaction(s); delete them first")]
    AssetInUse { asset_id: Id, count: usize },
    #[error("Asset {0} not found")]
    AssetNotFound(Id),
    #[error("Transaction {0} not found")]
    TransactionNotFound(Id),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// True for errors caused by the request rather than by storage.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, LedgerError::Storage(_))
    }
}
