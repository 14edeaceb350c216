use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// The closed set of ledger entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Buy,
    Sell,
    Transfer,
    Airdrop,
    #[serde(rename = "Staking Reward")]
    StakingReward,
    Interest,
    Gift,
}

/// Direction in which a transaction moves the held quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Inflow,
    Outflow,
}

/// Static per-type metadata used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub label: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: &'static str,
    /// Cost-free types change holdings without touching the average cost.
    pub cost_free: bool,
    pub flow: Flow,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        TransactionType::Buy,
        TransactionType::Sell,
        TransactionType::Transfer,
        TransactionType::Airdrop,
        TransactionType::StakingReward,
        TransactionType::Interest,
        TransactionType::Gift,
    ];

    pub const fn info(self) -> TypeInfo {
        match self {
            TransactionType::Buy => TypeInfo {
                label: "Buy",
                icon: "🟢",
                color: "#4CAF50",
                description: "Purchase of a crypto asset",
                cost_free: false,
                flow: Flow::Inflow,
            },
            TransactionType::Sell => TypeInfo {
                label: "Sell",
                icon: "🔴",
                color: "#F44336",
                description: "Sale of a crypto asset",
                cost_free: false,
                flow: Flow::Outflow,
            },
            TransactionType::Transfer => TypeInfo {
                label: "Transfer",
                icon: "📤",
                color: "#607D8B",
                description: "Moved to a wallet or exchange outside the portfolio",
                cost_free: true,
                flow: Flow::Outflow,
            },
            TransactionType::Airdrop => TypeInfo {
                label: "Airdrop",
                icon: "🎁",
                color: "#9C27B0",
                description: "Free distribution from a project",
                cost_free: true,
                flow: Flow::Inflow,
            },
            TransactionType::StakingReward => TypeInfo {
                label: "Staking Reward",
                icon: "💰",
                color: "#FF9800",
                description: "Reward earned by staking",
                cost_free: true,
                flow: Flow::Inflow,
            },
            TransactionType::Interest => TypeInfo {
                label: "Interest",
                icon: "📈",
                color: "#03A9F4",
                description: "Interest from lending or DeFi protocols",
                cost_free: true,
                flow: Flow::Inflow,
            },
            TransactionType::Gift => TypeInfo {
                label: "Gift",
                icon: "🎀",
                color: "#E91E63",
                description: "Received as a gift",
                cost_free: true,
                flow: Flow::Inflow,
            },
        }
    }

    pub const fn is_cost_free(self) -> bool {
        self.info().cost_free
    }

    pub const fn flow(self) -> Flow {
        self.info().flow
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().label)
    }
}

impl FromStr for TransactionType {
    type Err = String;

    /// Accepts labels case-insensitively, ignoring spaces, `_` and `-`
    /// (so `staking-reward`, `StakingReward` and `Staking Reward` all parse).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        TransactionType::ALL
            .into_iter()
            .find(|t| {
                t.info()
                    .label
                    .chars()
                    .filter(|c| *c != ' ')
                    .flat_map(char::to_lowercase)
                    .eq(wanted.chars())
            })
            .ok_or_else(|| format!("Unknown transaction type: {s}"))
    }
}

/// Partition of the ledger by the static cost classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFilter {
    #[default]
    All,
    CostBased,
    CostFree,
}

impl TypeFilter {
    pub fn matches(self, kind: TransactionType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::CostBased => !kind.is_cost_free(),
            TypeFilter::CostFree => kind.is_cost_free(),
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Id,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub asset_id: Id,
    pub quantity: Decimal,
    /// Always USD, regardless of display currency.
    pub unit_price: Decimal,
    /// Stored at insertion time and used as-is for cost aggregation.
    pub total_amount: Decimal,
    #[serde(default)]
    pub notes: String,
}

impl Transaction {
    /// Quantity with the sign of the type's flow.
    pub fn signed_quantity(&self) -> Decimal {
        match self.kind.flow() {
            Flow::Inflow => self.quantity,
            Flow::Outflow => -self.quantity,
        }
    }
}
