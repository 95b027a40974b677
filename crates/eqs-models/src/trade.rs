use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Micros;

/// A closed round trip: one entry (possibly averaged-in) and one full exit.
///
/// Immutable once created; `pnl` and `pnl_bps` are computed at close time
/// and never re-derived, so later re-marks cannot alter history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: Micros,
    pub exit_price: Micros,
    pub shares: i64,
    /// Exit proceeds minus entry cost basis (commission and slippage in).
    pub pnl: Micros,
    /// Unrealized percentage marked just before the exit, in basis points.
    pub pnl_bps: i64,
    /// Whole days between entry and exit; >= 0.
    pub holding_days: i64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl.is_positive()
    }

    pub fn is_loser(&self) -> bool {
        self.pnl.is_negative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn trade(pnl_dollars: i64) -> Trade {
        Trade {
            symbol: "NVDA".into(),
            entry_date: d(2024, 6, 4),
            exit_date: d(2024, 6, 6),
            entry_price: Micros::from_dollars(102),
            exit_price: Micros::from_dollars(110),
            shares: 98,
            pnl: Micros::from_dollars(pnl_dollars),
            pnl_bps: 784,
            holding_days: 2,
        }
    }

    #[test]
    fn winner_loser_buckets_exclude_flat() {
        assert!(trade(784).is_winner());
        assert!(trade(-50).is_loser());
        let flat = trade(0);
        assert!(!flat.is_winner());
        assert!(!flat.is_loser());
    }

    #[test]
    fn serializes_money_as_decimal_strings() {
        let json = serde_json::to_value(trade(784)).unwrap();
        assert_eq!(json["pnl"], "784");
        assert_eq!(json["entry_price"], "102");
        assert_eq!(json["holding_days"], 2);
    }
}
