use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::warn;

use super::CostBasis;
use crate::models::{Id, Transaction, TransactionType};

#[derive(Default)]
struct BuySellTotals {
    bought_qty: Decimal,
    bought_cost: Decimal,
    sold_qty: Decimal,
    overflowed: bool,
}

impl BuySellTotals {
    fn add_buy(&mut self, quantity: Decimal, total: Decimal) {
        match (
            self.bought_qty.checked_add(quantity),
            self.bought_cost.checked_add(total),
        ) {
            (Some(qty), Some(cost)) => {
                self.bought_qty = qty;
                self.bought_cost = cost;
            }
            _ => self.overflowed = true,
        }
    }

    fn add_sell(&mut self, quantity: Decimal) {
        match self.sold_qty.checked_add(quantity) {
            Some(qty) => self.sold_qty = qty,
            None => self.overflowed = true,
        }
    }

    fn basis(&self) -> Option<CostBasis> {
        if self.overflowed {
            return None;
        }
        let avg_cost = self.bought_cost.checked_div(self.bought_qty)?;
        // Not clamped: more sells than buys yields a negative position.
        let holdings = self.bought_qty.checked_sub(self.sold_qty)?;
        Some(CostBasis {
            avg_cost,
            holdings,
            total_cost: avg_cost.checked_mul(holdings)?,
        })
    }
}

/// Average cost per asset over its entire Buy history.
///
/// Sells lower the remaining quantity but never the average. Cost-free types are
/// ignored. Assets without any Buy get no entry, and neither do assets whose
/// totals do not fit in a `Decimal`.
pub fn compute_cost_basis(transactions: &[Transaction]) -> HashMap<Id, CostBasis> {
    let mut totals: HashMap<Id, BuySellTotals> = HashMap::new();

    for txn in transactions {
        match txn.kind {
            TransactionType::Buy => totals
                .entry(txn.asset_id.clone())
                .or_default()
                .add_buy(txn.quantity, txn.total_amount),
            TransactionType::Sell => totals
                .entry(txn.asset_id.clone())
                .or_default()
                .add_sell(txn.quantity),
            TransactionType::Transfer
            | TransactionType::Airdrop
            | TransactionType::StakingReward
            | TransactionType::Interest
            | TransactionType::Gift => {}
        }
    }

    totals
        .into_iter()
        .filter(|(_, t)| t.bought_qty > Decimal::ZERO)
        .filter_map(|(asset_id, t)| match t.basis() {
            Some(basis) => Some((asset_id, basis)),
            None => {
                warn!(asset_id = %asset_id, "cost basis overflowed; asset has no average cost");
                None
            }
        })
        .collect()
}
