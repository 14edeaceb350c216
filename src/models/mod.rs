mod asset;
mod id;
mod id_generator;
mod snapshot;
mod transaction;

pub use asset::Asset;
pub use id::{Id, IdError};
pub use id_generator::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use snapshot::PortfolioSnapshot;
pub use transaction::{Flow, Transaction, TransactionType, TypeFilter, TypeInfo};
