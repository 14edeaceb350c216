use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use super::holdings::{join_holdings, net_quantities, DUST_THRESHOLD};
use super::valuation::{checked_sum, or_zero};
use super::PeriodStats;
use crate::models::{Asset, Transaction, TransactionType};

/// A caller-supplied range bound, with or without zone information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// Wall-clock time, read in the reference zone.
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl DateBound {
    /// Accepts RFC 3339 (zoned), `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]` or a
    /// bare `YYYY-MM-DD`. A bare date means its first microsecond, or its last one when
    /// `end_of_day` is set.
    pub fn parse(input: &str, end_of_day: bool) -> Option<Self> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(DateBound::Zoned(dt));
        }
        for format in [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                return Some(DateBound::Naive(naive));
            }
        }
        let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
        let naive = if end_of_day {
            date.and_hms_micro_opt(23, 59, 59, 999_999)?
        } else {
            date.and_hms_opt(0, 0, 0)?
        };
        Some(DateBound::Naive(naive))
    }

    pub fn to_utc(self, tz: Tz) -> DateTime<Utc> {
        match self {
            DateBound::Naive(naive) => local_to_utc(naive, tz),
            DateBound::Zoned(dt) => dt.with_timezone(&Utc),
        }
    }
}

impl From<NaiveDateTime> for DateBound {
    fn from(value: NaiveDateTime) -> Self {
        DateBound::Naive(value)
    }
}

impl From<DateTime<FixedOffset>> for DateBound {
    fn from(value: DateTime<FixedOffset>) -> Self {
        DateBound::Zoned(value)
    }
}

impl From<DateTime<Utc>> for DateBound {
    fn from(value: DateTime<Utc>) -> Self {
        DateBound::Zoned(value.fixed_offset())
    }
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    let hour = Duration::hours(1);
    tz.from_local_datetime(&naive)
        .earliest()
        // Wall time skipped by a DST jump: use the offset in force just before
        // the gap, which lands on or just after the transition.
        .or_else(|| {
            tz.from_local_datetime(&(naive - hour))
                .earliest()
                .map(|before| before + hour)
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    Some(local_to_utc(date.and_hms_opt(0, 0, 0)?, tz))
}

/// Inclusive time window, normalized to UTC. A missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: Option<DateBound>, end: Option<DateBound>, tz: Tz) -> Self {
        Self {
            start: start.map(|b| b.to_utc(tz)),
            end: end.map(|b| b.to_utc(tz)),
        }
    }

    /// Calendar year in `tz`, ending on its last microsecond.
    pub fn year(year: i32, tz: Tz) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Self::from_dates(first, next, tz)
    }

    /// Calendar month in `tz`, ending on its last microsecond.
    pub fn month(year: i32, month: u32, tz: Tz) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Self::from_dates(first, next, tz)
    }

    fn from_dates(first: NaiveDate, next: NaiveDate, tz: Tz) -> Option<Self> {
        Some(Self {
            start: Some(local_midnight(first, tz)?),
            end: Some(local_midnight(next, tz)? - Duration::microseconds(1)),
        })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *at >= start) && self.end.map_or(true, |end| *at <= end)
    }
}

/// Buy and Sell cash totals inside `range`.
pub fn investment_and_sales(transactions: &[Transaction], range: &DateRange) -> (Decimal, Decimal) {
    let total_of = |kind: TransactionType| {
        checked_sum(
            transactions
                .iter()
                .filter(|t| t.kind == kind && range.contains(&t.date))
                .map(|t| Some(t.total_amount)),
        )
    };
    (
        or_zero(total_of(TransactionType::Buy), "total_investment"),
        or_zero(total_of(TransactionType::Sell), "total_sales"),
    )
}

/// Totals and net holdings for the transactions that fall in `range`.
pub fn aggregate(assets: &[Asset], transactions: &[Transaction], range: &DateRange) -> PeriodStats {
    let in_range: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| range.contains(&t.date))
        .collect();

    let (total_investment, total_sales) = investment_and_sales(transactions, range);

    let mut quantities = net_quantities(in_range.iter().copied());
    quantities.retain(|_, qty| *qty > DUST_THRESHOLD);

    PeriodStats {
        start: range.start,
        end: range.end,
        total_investment,
        total_sales,
        transaction_count: in_range.len(),
        holdings: join_holdings(assets, &quantities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Id;
    use chrono_tz::Asia::Tokyo;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_bounds() {
        let zoned = DateBound::parse("2024-01-01T00:00:00+09:00", false).unwrap();
        assert_eq!(
            zoned.to_utc(Tokyo),
            Utc.with_ymd_and_hms(2023, 12, 31, 15, 0, 0).unwrap()
        );

        let naive = DateBound::parse("2024-01-01 09:30", false).unwrap();
        assert_eq!(
            naive.to_utc(Tokyo),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap()
        );

        let end = DateBound::parse("2024-01-31", true).unwrap().to_utc(Tokyo);
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2024, 1, 31, 14, 59, 59).unwrap() + Duration::microseconds(999_999)
        );
        assert!(DateBound::parse("last tuesday", false).is_none());
    }

    fn txn_at(date: DateTime<Utc>, kind: TransactionType, qty: Decimal, total: Decimal) -> Transaction {
        Transaction {
            id: Id::new(),
            date,
            kind,
            asset_id: Id::from("btc"),
            quantity: qty,
            unit_price: Decimal::ZERO,
            total_amount: total,
            notes: String::new(),
        }
    }

    fn assets() -> Vec<Asset> {
        vec![Asset::new(
            Id::from("btc"),
            "BTC",
            "Bitcoin",
            "bitcoin",
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        )]
    }

    #[test]
    fn end_bound_is_inclusive_to_the_microsecond() {
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
        let range = DateRange::between(None, Some(end.into()), Tokyo);

        assert!(range.contains(&end));
        assert!(!range.contains(&(end + Duration::microseconds(1))));
    }

    #[test]
    fn naive_and_zoned_bounds_agree() {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let zoned = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .unwrap();

        let a = DateRange::between(Some(naive.into()), None, Tokyo);
        let b = DateRange::between(Some(zoned.into()), None, Tokyo);
        assert_eq!(a, b);
        assert_eq!(a.start, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn year_range_follows_reference_zone() {
        let range = DateRange::year(2024, Tokyo).unwrap();
        // New Year's Eve 15:00 UTC is already 2025 in Tokyo.
        assert!(range.contains(&Utc.with_ymd_and_hms(2024, 12, 31, 14, 59, 59).unwrap()));
        assert!(!range.contains(&Utc.with_ymd_and_hms(2024, 12, 31, 15, 0, 0).unwrap()));
        assert!(range.contains(&Utc.with_ymd_and_hms(2023, 12, 31, 15, 0, 0).unwrap()));
    }

    #[test]
    fn midnight_skipped_by_dst_moves_to_the_transition() {
        // Santiago jumps from 00:00 (-04) to 01:00 (-03) on 2024-09-08.
        let santiago = chrono_tz::America::Santiago;
        let bound = DateBound::parse("2024-09-08", false).unwrap();
        assert_eq!(
            bound.to_utc(santiago),
            Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap()
        );

        let day_before = DateBound::parse("2024-09-07", true).unwrap().to_utc(santiago);
        assert!(day_before < bound.to_utc(santiago));
    }

    #[test]
    fn december_month_rolls_into_next_year() {
        let range = DateRange::month(2023, 12, chrono_tz::UTC).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap()));
        assert_eq!(
            range.end,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() - Duration::microseconds(1))
        );
        assert!(DateRange::month(2023, 13, chrono_tz::UTC).is_none());
    }

    #[test]
    fn aggregate_sums_buys_and_sells_in_range() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let txns = vec![
            txn_at(jan, TransactionType::Buy, dec!(1), dec!(40000)),
            txn_at(feb, TransactionType::Buy, dec!(1), dec!(45000)),
            txn_at(feb, TransactionType::Sell, dec!(0.5), dec!(25000)),
            txn_at(feb, TransactionType::StakingReward, dec!(0.01), dec!(0)),
        ];

        let all = aggregate(&assets(), &txns, &DateRange::all());
        assert_eq!(all.total_investment, dec!(85000));
        assert_eq!(all.total_sales, dec!(25000));
        assert_eq!(all.transaction_count, 4);
        assert_eq!(all.holdings[0].quantity, dec!(1.51));

        let feb_only = aggregate(
            &assets(),
            &txns,
            &DateRange::month(2024, 2, chrono_tz::UTC).unwrap(),
        );
        assert_eq!(feb_only.total_investment, dec!(45000));
        assert_eq!(feb_only.transaction_count, 3);
        assert_eq!(feb_only.holdings[0].quantity, dec!(0.51));
    }

    #[test]
    fn period_holdings_exclude_net_outflows() {
        let feb = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let txns = vec![txn_at(feb, TransactionType::Sell, dec!(1), dec!(50000))];

        let stats = aggregate(&assets(), &txns, &DateRange::all());
        assert!(stats.holdings.is_empty());
        assert_eq!(stats.total_sales, dec!(50000));
    }

    #[test]
    fn investment_and_sales_matches_aggregate() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let txns = vec![
            txn_at(jan, TransactionType::Buy, dec!(1), dec!(100)),
            txn_at(jan, TransactionType::Sell, dec!(1), dec!(80)),
        ];
        let range = DateRange::year(2024, Tokyo).unwrap();
        assert_eq!(investment_and_sales(&txns, &range), (dec!(100), dec!(80)));
        assert_eq!(
            investment_and_sales(&txns, &DateRange::year(2023, Tokyo).unwrap()),
            (Decimal::ZERO, Decimal::ZERO)
        );
    }
}
