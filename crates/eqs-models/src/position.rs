use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::{ratio_bps, Micros};

/// An open holding in exactly one symbol.
///
/// A `Position` is an immutable value: price marks and averaging-in
/// produce a new `Position` via [`Position::with_price`] /
/// [`Position::averaged_in`] rather than mutating in place, so any holder
/// of an old snapshot keeps seeing consistent state.
///
/// Invariants (enforced by the owning portfolio, asserted here in debug):
/// `shares > 0`, `entry_price > 0`. `entry_date` is the earliest
/// acquisition date and survives averaging-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: i64,
    /// Cost-basis-weighted average entry price.
    pub entry_price: Micros,
    pub entry_date: NaiveDate,
    /// Last marked price; `None` until the first mark.
    pub current_price: Option<Micros>,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        shares: i64,
        entry_price: Micros,
        entry_date: NaiveDate,
        current_price: Option<Micros>,
    ) -> Self {
        debug_assert!(shares > 0, "Position.shares must be > 0");
        debug_assert!(entry_price.is_positive(), "Position.entry_price must be > 0");
        Self {
            symbol: symbol.into(),
            shares,
            entry_price,
            entry_date,
            current_price,
        }
    }

    /// Total capital committed: `entry_price * shares`.
    pub fn cost_basis(&self) -> Micros {
        self.entry_price.mul_qty(self.shares)
    }

    /// Marked value; falls back to entry price before the first mark.
    pub fn current_value(&self) -> Micros {
        self.current_price
            .unwrap_or(self.entry_price)
            .mul_qty(self.shares)
    }

    pub fn unrealized_pnl(&self) -> Micros {
        self.current_value() - self.cost_basis()
    }

    /// Unrealized PnL as basis points of cost basis (0 if basis is 0).
    pub fn unrealized_pnl_bps(&self) -> i64 {
        ratio_bps(self.unrealized_pnl(), self.cost_basis())
    }

    /// Whole days held as of `date` (negative never occurs in a forward
    /// simulation; callers treat the value as `>= 0`).
    pub fn holding_days(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }

    /// New position with a refreshed mark; everything else unchanged.
    pub fn with_price(&self, price: Micros) -> Position {
        Position {
            current_price: Some(price),
            ..self.clone()
        }
    }

    /// New position after buying `added_shares` more at a total cost of
    /// `added_cost`. The entry price becomes the cost-basis-weighted
    /// average; the original `entry_date` is preserved.
    pub fn averaged_in(&self, added_shares: i64, added_cost: Micros, mark: Micros) -> Position {
        debug_assert!(added_shares > 0);
        let total_shares = self.shares + added_shares;
        let total_cost = self.cost_basis().saturating_add(added_cost);
        let avg_price = Micros::new(total_cost.raw() / total_shares);
        Position {
            symbol: self.symbol.clone(),
            shares: total_shares,
            entry_price: avg_price,
            entry_date: self.entry_date,
            current_price: Some(mark),
        }
    }
}
