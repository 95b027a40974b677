//! eqs-testkit
//!
//! Shared fixtures for the scenario tests: compact price-table builders,
//! a fully scripted strategy, and frictionless config constructors.
//! Test-only; never a dependency of production crates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use eqs_config::BacktestConfig;
use eqs_data::{DailyBar, PriceTable};
use eqs_models::{Micros, Position, BPS_SCALE};
use eqs_strategy::{EntrySignal, ExitReason, Strategy};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn bar(open: i64, close: i64) -> DailyBar {
    DailyBar {
        open: Micros::from_dollars(open),
        close: Micros::from_dollars(close),
        volume: 1_000_000,
    }
}

/// Build a table from `(symbol, date, open, close)` rows in whole dollars.
pub fn table_from(rows: &[(&str, NaiveDate, i64, i64)]) -> PriceTable {
    let mut t = PriceTable::new();
    for (symbol, d, open, close) in rows {
        t.insert(*symbol, *d, bar(*open, *close));
    }
    t
}

/// Config with zero slippage, zero commission, no position cap.
pub fn frictionless_config(
    start: NaiveDate,
    end: NaiveDate,
    capital_dollars: i64,
) -> BacktestConfig {
    let mut cfg = BacktestConfig::test_defaults();
    cfg.start_date = start;
    cfg.end_date = end;
    cfg.initial_capital = Micros::from_dollars(capital_dollars);
    cfg.max_position_size_bps = BPS_SCALE;
    cfg.commission = Micros::ZERO;
    cfg.slippage_bps = 0;
    cfg
}

/// A strategy that follows a script instead of market data: entries fire
/// on their given dates, exits fire for every held symbol on the listed
/// dates. Deterministic by construction.
#[derive(Default)]
pub struct ScriptedStrategy {
    entries: BTreeMap<NaiveDate, Vec<EntrySignal>>,
    exit_dates: BTreeSet<NaiveDate>,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_on(mut self, d: NaiveDate, symbol: &str, shares: i64) -> Self {
        self.entries.entry(d).or_default().push(EntrySignal {
            symbol: symbol.to_string(),
            shares,
        });
        self
    }

    pub fn exit_on(mut self, d: NaiveDate) -> Self {
        self.exit_dates.insert(d);
        self
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_signals(
        &self,
        d: NaiveDate,
        _cash: Micros,
        positions: &BTreeMap<String, Position>,
        max_positions: usize,
    ) -> Vec<EntrySignal> {
        let budget = max_positions.saturating_sub(positions.len());
        self.entries
            .get(&d)
            .map(|signals| {
                signals
                    .iter()
                    .filter(|s| !positions.contains_key(&s.symbol))
                    .take(budget)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn evaluate_exit(&self, _position: &Position, d: NaiveDate) -> Option<ExitReason> {
        self.exit_dates.contains(&d).then_some(ExitReason::GainTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_strategy_respects_budget_and_held_symbols() {
        let s = ScriptedStrategy::new()
            .enter_on(date(2024, 6, 3), "NVDA", 10)
            .enter_on(date(2024, 6, 3), "AAPL", 5)
            .enter_on(date(2024, 6, 3), "MSFT", 2);

        let mut held = BTreeMap::new();
        held.insert(
            "NVDA".to_string(),
            Position::new("NVDA", 10, Micros::from_dollars(100), date(2024, 6, 1), None),
        );

        // Budget of one slot; NVDA filtered as already held.
        let signals = s.generate_signals(date(2024, 6, 3), Micros::from_dollars(1_000), &held, 2);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "AAPL");

        // No script for other days.
        assert!(s
            .generate_signals(date(2024, 6, 4), Micros::from_dollars(1_000), &held, 10)
            .is_empty());
    }

    #[test]
    fn scripted_exits_fire_on_listed_dates_only() {
        let s = ScriptedStrategy::new().exit_on(date(2024, 6, 5));
        let pos = Position::new("NVDA", 1, Micros::from_dollars(100), date(2024, 6, 3), None);
        assert!(!s.should_sell(&pos, date(2024, 6, 4)));
        assert!(s.should_sell(&pos, date(2024, 6, 5)));
    }
}
