//! eqs-models
//!
//! Value types shared by the whole simulator:
//! - `Micros` fixed-point money (1 USD = 1_000_000) with exact integer
//!   arithmetic — no binary floating point in any cash/price/PnL path
//! - `Position`, `Trade`, `PortfolioSnapshot` immutable records
//! - Pure deterministic logic (no IO, no clocks)

mod money;
mod position;
mod snapshot;
mod trade;

pub use money::{parse_micros, ratio_bps, Micros, ParseMoneyError, BPS_SCALE, MICROS_SCALE};
pub use position::Position;
pub use snapshot::PortfolioSnapshot;
pub use trade::Trade;

use serde::{Deserialize, Serialize};

/// BUY or SELL for executed orders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}
