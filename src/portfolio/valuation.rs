use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::warn;

use super::{CostBasis, HeadlinePl, Holding, Performer, PriceStatus, Valuation, ValuationRow};
use crate::market_data::{Freshness, PriceMap};
use crate::models::Id;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Value each holding at the current prices and roll the rows up.
///
/// A holding with no quote is still listed, with every monetary field zero.
pub fn compose(
    holdings: &[Holding],
    cost_basis: &HashMap<Id, CostBasis>,
    prices: &PriceMap,
) -> Valuation {
    let rows: Vec<ValuationRow> = holdings
        .iter()
        .map(|holding| value_row(holding, cost_basis.get(&holding.asset_id), prices))
        .collect();

    let total_value = or_zero(checked_sum(rows.iter().map(|r| Some(r.value))), "total_value");
    let total_value_usd = or_zero(
        checked_sum(rows.iter().map(|r| Some(r.value_usd))),
        "total_value_usd",
    );
    let total_24h_change = or_zero(
        checked_sum(rows.iter().map(|r| percent_of(r.value, r.change_24h))),
        "total_24h_change",
    );
    let total_24h_percent = if total_value.is_zero() {
        Decimal::ZERO
    } else {
        or_zero(ratio_percent(total_24h_change, total_value), "total_24h_percent")
    };

    Valuation {
        vs_currency: prices.vs_currency.clone(),
        top_performer: pick_performer(&rows, |candidate, best| candidate > best),
        worst_performer: pick_performer(&rows, |candidate, best| candidate < best),
        uses_fallback_data: rows.iter().any(|r| r.price_status != PriceStatus::Live),
        rows,
        total_value,
        total_value_usd,
        total_24h_change,
        total_24h_percent,
    }
}

fn value_row(holding: &Holding, basis: Option<&CostBasis>, prices: &PriceMap) -> ValuationRow {
    let quote = prices.get(&holding.price_feed_id);
    let (price, price_usd, change_24h, price_status) = match quote {
        Some(q) => (
            q.vs,
            q.usd,
            q.vs_24h_change,
            match q.freshness {
                Freshness::Live => PriceStatus::Live,
                Freshness::Stale { .. } => PriceStatus::Stale,
            },
        ),
        None => (
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            PriceStatus::Missing,
        ),
    };

    let value = or_zero(holding.quantity.checked_mul(price), "value");
    let value_usd = or_zero(holding.quantity.checked_mul(price_usd), "value_usd");
    let avg_cost = basis.map(|b| b.avg_cost).unwrap_or(Decimal::ZERO);

    let (unrealized_pl, pl_percent) = match basis {
        Some(b) if b.avg_cost > Decimal::ZERO && quote.is_some() => (
            or_zero(value_usd.checked_sub(b.total_cost), "unrealized_pl"),
            or_zero(
                price_usd
                    .checked_sub(b.avg_cost)
                    .and_then(|gain| ratio_percent(gain, b.avg_cost)),
                "pl_percent",
            ),
        ),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };

    ValuationRow {
        asset_id: holding.asset_id.clone(),
        symbol: holding.symbol.clone(),
        name: holding.name.clone(),
        price_feed_id: holding.price_feed_id.clone(),
        icon: holding.icon.clone(),
        location: holding.location.clone(),
        holdings: holding.quantity,
        price,
        price_usd,
        value,
        value_usd,
        change_24h,
        avg_cost,
        unrealized_pl,
        pl_percent,
        price_status,
    }
}

/// First row wins ties since only a strictly better candidate replaces it.
fn pick_performer(
    rows: &[ValuationRow],
    better: impl Fn(Decimal, Decimal) -> bool,
) -> Option<Performer> {
    let mut best: Option<&ValuationRow> = None;
    for row in rows {
        match best {
            Some(current) if !better(row.change_24h, current.change_24h) => {}
            _ => best = Some(row),
        }
    }
    best.map(|row| Performer {
        asset_id: row.asset_id.clone(),
        symbol: row.symbol.clone(),
        change_24h: row.change_24h,
    })
}

/// Gain of the current holdings over this year's net cash deployed
/// (`investment - sales`). The percentage is zero unless that net is positive.
pub fn headline_pl(current_value_usd: Decimal, investment: Decimal, sales: Decimal) -> HeadlinePl {
    let net_investment = or_zero(investment.checked_sub(sales), "net_investment");
    let total_pl = or_zero(current_value_usd.checked_sub(net_investment), "total_pl");
    let total_pl_percent = if net_investment > Decimal::ZERO {
        or_zero(ratio_percent(total_pl, net_investment), "total_pl_percent")
    } else {
        Decimal::ZERO
    };
    HeadlinePl {
        net_investment,
        total_pl,
        total_pl_percent,
    }
}

/// Sum that gives up on overflow, or on any missing term.
pub(crate) fn checked_sum(values: impl IntoIterator<Item = Option<Decimal>>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value?))
}

/// Overflowed figures are reported as zero.
pub(crate) fn or_zero(value: Option<Decimal>, field: &'static str) -> Decimal {
    value.unwrap_or_else(|| {
        warn!(field, "decimal overflow; reporting zero");
        Decimal::ZERO
    })
}

/// `amount * percent / 100`
fn percent_of(amount: Decimal, percent: Decimal) -> Option<Decimal> {
    amount.checked_mul(percent)?.checked_div(HUNDRED)
}

/// `part / whole * 100`
fn ratio_percent(part: Decimal, whole: Decimal) -> Option<Decimal> {
    part.checked_div(whole)?.checked_mul(HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceQuote;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn holding(id: &str, symbol: &str, feed: &str, qty: Decimal) -> Holding {
        Holding {
            asset_id: Id::from(id),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price_feed_id: feed.to_string(),
            icon: None,
            location: String::new(),
            quantity: qty,
        }
    }

    fn live(usd: Decimal, vs: Decimal, change: Decimal) -> PriceQuote {
        PriceQuote {
            usd,
            vs,
            usd_24h_change: change,
            vs_24h_change: change,
            freshness: Freshness::Live,
        }
    }

    #[test]
    fn rows_use_usd_for_pl_and_display_currency_for_value() {
        let holdings = vec![holding("btc", "BTC", "bitcoin", dec!(1.5))];
        let basis = HashMap::from([(
            Id::from("btc"),
            CostBasis {
                avg_cost: dec!(11000),
                holdings: dec!(1.5),
                total_cost: dec!(16500),
            },
        )]);
        let prices = PriceMap::new("jpy").with_quote(
            "bitcoin",
            live(dec!(22000), dec!(3300000), dec!(2)),
        );

        let valuation = compose(&holdings, &basis, &prices);
        let row = &valuation.rows[0];
        assert_eq!(row.value, dec!(4950000));
        assert_eq!(row.value_usd, dec!(33000));
        assert_eq!(row.unrealized_pl, dec!(16500));
        assert_eq!(row.pl_percent, dec!(100));
        assert_eq!(valuation.total_24h_change, dec!(99000));
        assert_eq!(valuation.total_24h_percent, dec!(2));
        assert!(!valuation.uses_fallback_data);
    }

    #[test]
    fn missing_price_zero_fills_but_keeps_row() {
        let holdings = vec![holding("xyz", "XYZ", "unknown-coin", dec!(10))];
        let basis = HashMap::from([(
            Id::from("xyz"),
            CostBasis {
                avg_cost: dec!(5),
                holdings: dec!(10),
                total_cost: dec!(50),
            },
        )]);

        let valuation = compose(&holdings, &basis, &PriceMap::new("usd"));
        let row = &valuation.rows[0];
        assert_eq!(row.holdings, dec!(10));
        assert_eq!(row.value, Decimal::ZERO);
        assert_eq!(row.unrealized_pl, Decimal::ZERO);
        assert_eq!(row.pl_percent, Decimal::ZERO);
        assert_eq!(row.price_status, PriceStatus::Missing);
        assert_eq!(valuation.total_24h_percent, Decimal::ZERO);
        assert!(valuation.uses_fallback_data);
    }

    #[test]
    fn reward_only_asset_has_zero_pl() {
        let holdings = vec![holding("dot", "DOT", "polkadot", dec!(4))];
        let prices = PriceMap::new("usd").with_quote("polkadot", live(dec!(7), dec!(7), dec!(0)));

        let row = &compose(&holdings, &HashMap::new(), &prices).rows[0];
        assert_eq!(row.value_usd, dec!(28));
        assert_eq!(row.avg_cost, Decimal::ZERO);
        assert_eq!(row.unrealized_pl, Decimal::ZERO);
    }

    #[test]
    fn stale_quotes_are_flagged() {
        let holdings = vec![holding("btc", "BTC", "bitcoin", dec!(1))];
        let mut quote = live(dec!(100), dec!(100), dec!(0));
        quote.freshness = Freshness::Stale {
            as_of: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let prices = PriceMap::new("usd").with_quote("bitcoin", quote);

        let valuation = compose(&holdings, &HashMap::new(), &prices);
        assert_eq!(valuation.rows[0].price_status, PriceStatus::Stale);
        assert_eq!(valuation.total_value, dec!(100));
        assert!(valuation.uses_fallback_data);
    }

    #[test]
    fn performers_break_ties_by_first_row() {
        let holdings = vec![
            holding("a", "AAA", "a", dec!(1)),
            holding("b", "BBB", "b", dec!(1)),
            holding("c", "CCC", "c", dec!(1)),
        ];
        let prices = PriceMap::new("usd")
            .with_quote("a", live(dec!(1), dec!(1), dec!(5)))
            .with_quote("b", live(dec!(1), dec!(1), dec!(5)))
            .with_quote("c", live(dec!(1), dec!(1), dec!(-3)));

        let valuation = compose(&holdings, &HashMap::new(), &prices);
        assert_eq!(valuation.top_performer.unwrap().symbol, "AAA");
        assert_eq!(valuation.worst_performer.unwrap().symbol, "CCC");
    }

    #[test]
    fn empty_portfolio_has_no_performers() {
        let valuation = compose(&[], &HashMap::new(), &PriceMap::new("usd"));
        assert!(valuation.top_performer.is_none());
        assert!(valuation.worst_performer.is_none());
        assert_eq!(valuation.total_value, Decimal::ZERO);
    }

    #[test]
    fn headline_pl_uses_net_investment() {
        let pl = headline_pl(dec!(15000), dec!(12000), dec!(2000));
        assert_eq!(pl.net_investment, dec!(10000));
        assert_eq!(pl.total_pl, dec!(5000));
        assert_eq!(pl.total_pl_percent, dec!(50));
    }

    #[test]
    fn headline_pl_percent_is_zero_without_net_investment() {
        let pl = headline_pl(dec!(500), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(pl.total_pl, dec!(500));
        assert_eq!(pl.total_pl_percent, Decimal::ZERO);

        let net_negative = headline_pl(dec!(500), dec!(100), dec!(300));
        assert_eq!(net_negative.total_pl_percent, Decimal::ZERO);
    }

    #[test]
    fn overflowing_value_is_reported_as_zero() {
        let holdings = vec![
            holding("big", "BIG", "big", dec!(1000000000000000)),
            holding("eth", "ETH", "ethereum", dec!(2)),
        ];
        let prices = PriceMap::new("jpy")
            .with_quote("big", live(dec!(1), dec!(10000000000000000), dec!(1)))
            .with_quote("ethereum", live(dec!(3000), dec!(450000), dec!(0)));

        let valuation = compose(&holdings, &HashMap::new(), &prices);
        let big = valuation.rows.iter().find(|r| r.symbol == "BIG").unwrap();
        assert_eq!(big.value, Decimal::ZERO);
        assert_eq!(big.value_usd, dec!(1000000000000000));
        assert_eq!(valuation.total_value, dec!(900000));
    }
}
