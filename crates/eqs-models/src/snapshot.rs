use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Micros;
use crate::position::Position;

/// Immutable capture of portfolio state at the end of one simulated day.
///
/// The ordered snapshot sequence (one per calendar day, strictly
/// increasing timestamps) is the equity curve every metric derives from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: NaiveDate,
    pub cash: Micros,
    /// Sum of `current_value` over the open positions below.
    pub positions_value: Micros,
    /// `cash + positions_value`.
    pub total_value: Micros,
    pub positions: Vec<Position>,
}

impl PortfolioSnapshot {
    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }
}
