use eqs_models::{Micros, BPS_SCALE};

/// Trading frictions and the single-position size cap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TradingCosts {
    /// Execution-price deviation in bps. Added to the quote on buys,
    /// subtracted on sells (always unfavorable).
    pub slippage_bps: i64,
    /// Flat fee per executed order.
    pub commission: Micros,
    /// Cap on one position's notional as bps of total portfolio value,
    /// evaluated against the pre-trade value. 10_000 = uncapped.
    pub max_position_size_bps: i64,
}

impl TradingCosts {
    /// Zero slippage, zero commission, no position cap. The baseline for
    /// accounting tests where exact round-trip arithmetic matters.
    pub fn frictionless() -> Self {
        Self {
            slippage_bps: 0,
            commission: Micros::ZERO,
            max_position_size_bps: BPS_SCALE,
        }
    }
}

impl Default for TradingCosts {
    fn default() -> Self {
        Self::frictionless()
    }
}
