use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::warn;

use super::Holding;
use crate::models::{Asset, Id, Transaction};

/// Quantities at or below this (1e-8) are treated as an empty position.
pub const DUST_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// Net quantity per asset over the full ledger.
///
/// Inflows are Buy and the reward types; outflows are Sell and Transfer. Dust
/// positions are dropped.
pub fn compute_holdings(transactions: &[Transaction]) -> HashMap<Id, Decimal> {
    let mut net = net_quantities(transactions.iter());
    net.retain(|_, qty| *qty > DUST_THRESHOLD);
    net
}

/// Signed sum per asset without any dust filtering. Assets whose sum
/// overflows are left out.
pub fn net_quantities<'a>(
    transactions: impl Iterator<Item = &'a Transaction>,
) -> HashMap<Id, Decimal> {
    let mut net: HashMap<Id, Option<Decimal>> = HashMap::new();
    for txn in transactions {
        let entry = net.entry(txn.asset_id.clone()).or_insert(Some(Decimal::ZERO));
        *entry = entry.and_then(|sum| sum.checked_add(txn.signed_quantity()));
    }
    net.into_iter()
        .filter_map(|(asset_id, sum)| match sum {
            Some(sum) => Some((asset_id, sum)),
            None => {
                warn!(asset_id = %asset_id, "net quantity overflowed; asset skipped");
                None
            }
        })
        .collect()
}

/// Join a quantity map with asset metadata, largest position first.
///
/// Quantities for assets missing from `assets` are skipped.
pub fn join_holdings(assets: &[Asset], quantities: &HashMap<Id, Decimal>) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = assets
        .iter()
        .filter_map(|asset| {
            quantities
                .get(&asset.id)
                .map(|qty| Holding::from_asset(asset, *qty))
        })
        .collect();
    holdings.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    holdings
}

/// Current portfolio: [`compute_holdings`] joined with asset metadata.
pub fn portfolio_holdings(assets: &[Asset], transactions: &[Transaction]) -> Vec<Holding> {
    join_holdings(assets, &compute_holdings(transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn txn(asset: &str, kind: TransactionType, qty: Decimal) -> Transaction {
        Transaction {
            id: Id::new(),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            kind,
            asset_id: Id::from(asset),
            quantity: qty,
            unit_price: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            notes: String::new(),
        }
    }

    #[test]
    fn empty_ledger_has_no_holdings() {
        assert!(compute_holdings(&[]).is_empty());
    }

    #[test]
    fn rewards_add_and_transfers_subtract() {
        let txns = vec![
            txn("eth", TransactionType::Buy, dec!(2)),
            txn("eth", TransactionType::StakingReward, dec!(0.1)),
            txn("eth", TransactionType::Interest, dec!(0.05)),
            txn("eth", TransactionType::Gift, dec!(0.05)),
            txn("eth", TransactionType::Airdrop, dec!(0.3)),
            txn("eth", TransactionType::Transfer, dec!(0.5)),
            txn("eth", TransactionType::Sell, dec!(1)),
        ];
        let holdings = compute_holdings(&txns);
        assert_eq!(holdings[&Id::from("eth")], dec!(1.0));
    }

    #[test]
    fn dust_and_negative_positions_are_dropped() {
        let txns = vec![
            txn("dust", TransactionType::Airdrop, dec!(0.0000000001)),
            txn("small", TransactionType::Airdrop, dec!(0.001)),
            txn("edge", TransactionType::Airdrop, DUST_THRESHOLD),
            txn("short", TransactionType::Sell, dec!(1)),
        ];
        let holdings = compute_holdings(&txns);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[&Id::from("small")], dec!(0.001));
    }

    #[test]
    fn fully_sold_position_disappears() {
        let txns = vec![
            txn("sol", TransactionType::Buy, dec!(3.3)),
            txn("sol", TransactionType::Sell, dec!(1.1)),
            txn("sol", TransactionType::Sell, dec!(2.2)),
        ];
        assert!(compute_holdings(&txns).is_empty());
    }

    #[test]
    fn join_sorts_by_quantity_and_skips_unknown_assets() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let assets = vec![
            Asset::new(Id::from("btc"), "BTC", "Bitcoin", "bitcoin", created),
            Asset::new(Id::from("doge"), "DOGE", "Dogecoin", "dogecoin", created),
        ];
        let txns = vec![
            txn("btc", TransactionType::Buy, dec!(0.5)),
            txn("doge", TransactionType::Buy, dec!(1000)),
            txn("ghost", TransactionType::Buy, dec!(5)),
        ];

        let holdings = portfolio_holdings(&assets, &txns);
        let symbols: Vec<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["DOGE", "BTC"]);
    }
}
