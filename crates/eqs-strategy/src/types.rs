use std::collections::BTreeMap;

use chrono::NaiveDate;

use eqs_models::{Micros, Position};

/// A proposed entry: how many shares of what. Sizing happens at signal
/// time from that day's closing data; the engine re-clamps at execution
/// against the actual fill price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntrySignal {
    pub symbol: String,
    pub shares: i64,
}

/// Why an exit fired. Reasons only differentiate logging; the trading
/// outcome of every reason is the same full-position sell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    GainTarget,
    StopLoss,
    MaxHold,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::GainTarget => "gain_target",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::MaxHold => "max_hold",
        }
    }
}

/// What the engine asks of a strategy, once per simulated day.
///
/// Object-safe so the engine can hold `Box<dyn Strategy>`. Implementations
/// must not propose symbols already held and must respect the position
/// budget (at most `max_positions - current_positions.len()` proposals).
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Propose new entries for `date`, in priority order.
    fn generate_signals(
        &self,
        date: NaiveDate,
        cash_available: Micros,
        current_positions: &BTreeMap<String, Position>,
        max_positions: usize,
    ) -> Vec<EntrySignal>;

    /// Exit decision for one open position, evaluated independently per
    /// symbol per day. `None` means hold.
    fn evaluate_exit(&self, position: &Position, date: NaiveDate) -> Option<ExitReason>;

    /// Binary form of [`Strategy::evaluate_exit`].
    fn should_sell(&self, position: &Position, date: NaiveDate) -> bool {
        self.evaluate_exit(position, date).is_some()
    }
}
