use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::debug;

use eqs_config::StrategyConfig;
use eqs_data::{DataSource, PriceKind};
use eqs_models::{ratio_bps, Micros, Position};

use crate::types::{EntrySignal, ExitReason, Strategy};

/// Momentum chaser: each day it ranks the universe by trailing gain over
/// the lookback window and buys the top movers with an even cash split.
///
/// Exits in priority order: gain target, stop loss, max holding period.
pub struct HighestGainerStrategy {
    config: StrategyConfig,
    source: Arc<dyn DataSource>,
}

struct Candidate {
    symbol: String,
    close: Micros,
    gain_bps: i64,
}

impl HighestGainerStrategy {
    pub fn new(config: StrategyConfig, source: Arc<dyn DataSource>) -> Self {
        Self { config, source }
    }

    /// Filter one symbol into a ranked candidate, or out.
    fn candidate(&self, symbol: &str, date: NaiveDate) -> Option<Candidate> {
        let close = self.source.price_at(symbol, date, PriceKind::Close)?;
        if close < self.config.min_price {
            return None;
        }
        if let Some(max) = self.config.max_price {
            if close > max {
                return None;
            }
        }
        if let Some(min_volume) = self.config.min_volume {
            let volume = self.source.volume_at(symbol, date)?;
            if volume < min_volume {
                return None;
            }
        }

        let lookback_date = date.checked_sub_days(Days::new(self.config.lookback_days))?;
        let prior = self.source.price_at(symbol, lookback_date, PriceKind::Close)?;
        if !prior.is_positive() {
            return None;
        }
        let gain_bps = ratio_bps(close - prior, prior);

        Some(Candidate {
            symbol: symbol.to_string(),
            close,
            gain_bps,
        })
    }
}

impl Strategy for HighestGainerStrategy {
    fn name(&self) -> &str {
        "highest_gainer"
    }

    fn generate_signals(
        &self,
        date: NaiveDate,
        cash_available: Micros,
        current_positions: &BTreeMap<String, Position>,
        max_positions: usize,
    ) -> Vec<EntrySignal> {
        let slots = max_positions.saturating_sub(current_positions.len());
        if slots == 0 || !cash_available.is_positive() {
            return Vec::new();
        }

        let mut candidates: Vec<Candidate> = self
            .source
            .symbols()
            .iter()
            .filter(|s| !current_positions.contains_key(s.as_str()))
            .filter_map(|s| self.candidate(s, date))
            .collect();

        // Best gainer first; symbol order breaks ties deterministically.
        candidates.sort_by(|a, b| {
            b.gain_bps
                .cmp(&a.gain_bps)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        let take = self
            .config
            .stocks_per_day
            .min(slots)
            .min(candidates.len());
        if take == 0 {
            return Vec::new();
        }

        // Even cash split across the selected candidates.
        let cash_per = Micros::new(cash_available.raw() / take as i64);

        let mut signals = Vec::with_capacity(take);
        for c in candidates.into_iter().take(take) {
            let shares = cash_per.div_price(c.close);
            if shares <= 0 {
                debug!(symbol = %c.symbol, "candidate skipped: sizing yields zero shares");
                continue;
            }
            debug!(
                symbol = %c.symbol,
                gain_bps = c.gain_bps,
                shares,
                "entry signal"
            );
            signals.push(EntrySignal {
                symbol: c.symbol,
                shares,
            });
        }
        signals
    }

    fn evaluate_exit(&self, position: &Position, date: NaiveDate) -> Option<ExitReason> {
        // No resolvable price means no decision: hold and re-evaluate on
        // a later day rather than exiting on a stale mark.
        let Some(price) = self
            .source
            .price_at(&position.symbol, date, PriceKind::Close)
        else {
            return None;
        };
        let marked = position.with_price(price);

        let pnl_bps = marked.unrealized_pnl_bps();
        if pnl_bps >= self.config.gain_threshold_bps {
            return Some(ExitReason::GainTarget);
        }
        if let Some(stop_bps) = self.config.stop_loss_bps {
            if pnl_bps <= -stop_bps {
                return Some(ExitReason::StopLoss);
            }
        }
        if let Some(max_days) = self.config.max_holding_days {
            if marked.holding_days(date) >= max_days {
                return Some(ExitReason::MaxHold);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eqs_data::{DailyBar, PriceTable};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(open: i64, close: i64, volume: i64) -> DailyBar {
        DailyBar {
            open: Micros::from_dollars(open),
            close: Micros::from_dollars(close),
            volume,
        }
    }

    fn source() -> Arc<PriceTable> {
        let mut t = PriceTable::new();
        // NVDA: +10% over one day, AAPL: +2%, PENNY: big gain but cheap.
        t.insert("NVDA", d(2024, 6, 3), bar(100, 100, 1_000_000));
        t.insert("NVDA", d(2024, 6, 4), bar(102, 110, 1_000_000));
        t.insert("AAPL", d(2024, 6, 3), bar(200, 200, 1_000_000));
        t.insert("AAPL", d(2024, 6, 4), bar(201, 204, 1_000_000));
        t.insert("PENNY", d(2024, 6, 3), bar(1, 1, 1_000_000));
        t.insert("PENNY", d(2024, 6, 4), bar(1, 2, 1_000_000));
        Arc::new(t)
    }

    fn strategy(config: StrategyConfig) -> HighestGainerStrategy {
        HighestGainerStrategy::new(config, source())
    }

    fn no_positions() -> BTreeMap<String, Position> {
        BTreeMap::new()
    }

    #[test]
    fn picks_the_top_gainer_above_min_price() {
        let s = strategy(StrategyConfig::test_defaults());
        let signals = s.generate_signals(
            d(2024, 6, 4),
            Micros::from_dollars(10_000),
            &no_positions(),
            10,
        );
        // PENNY gained most but is under the $5 floor.
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "NVDA");
        assert_eq!(signals[0].shares, 90); // floor(10_000 / 110)
    }

    #[test]
    fn splits_cash_across_multiple_picks() {
        let mut cfg = StrategyConfig::test_defaults();
        cfg.stocks_per_day = 2;
        let s = strategy(cfg);
        let signals = s.generate_signals(
            d(2024, 6, 4),
            Micros::from_dollars(10_000),
            &no_positions(),
            10,
        );
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].symbol, "NVDA");
        assert_eq!(signals[0].shares, 45); // floor(5_000 / 110)
        assert_eq!(signals[1].symbol, "AAPL");
        assert_eq!(signals[1].shares, 24); // floor(5_000 / 204)
    }

    #[test]
    fn held_symbols_are_excluded() {
        let s = strategy(StrategyConfig::test_defaults());
        let mut held = BTreeMap::new();
        held.insert(
            "NVDA".to_string(),
            Position::new("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3), None),
        );
        let signals =
            s.generate_signals(d(2024, 6, 4), Micros::from_dollars(10_000), &held, 10);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "AAPL");
    }

    #[test]
    fn no_slots_means_no_signals() {
        let s = strategy(StrategyConfig::test_defaults());
        let mut held = BTreeMap::new();
        held.insert(
            "MSFT".to_string(),
            Position::new("MSFT", 1, Micros::from_dollars(400), d(2024, 6, 3), None),
        );
        assert!(s
            .generate_signals(d(2024, 6, 4), Micros::from_dollars(10_000), &held, 1)
            .is_empty());
    }

    #[test]
    fn no_lookback_data_means_no_candidate() {
        let s = strategy(StrategyConfig::test_defaults());
        // On the first data day there is no prior close to rank against.
        assert!(s
            .generate_signals(
                d(2024, 6, 3),
                Micros::from_dollars(10_000),
                &no_positions(),
                10
            )
            .is_empty());
    }

    #[test]
    fn volume_filter_drops_thin_names() {
        let mut cfg = StrategyConfig::test_defaults();
        cfg.min_volume = Some(2_000_000);
        let s = strategy(cfg);
        assert!(s
            .generate_signals(
                d(2024, 6, 4),
                Micros::from_dollars(10_000),
                &no_positions(),
                10
            )
            .is_empty());
    }

    #[test]
    fn exit_on_gain_target() {
        let s = strategy(StrategyConfig::test_defaults()); // +5% target
        let pos = Position::new("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3), None);
        // Close on 6/4 is 110: +10% >= +5%.
        assert_eq!(
            s.evaluate_exit(&pos, d(2024, 6, 4)),
            Some(ExitReason::GainTarget)
        );
        assert!(s.should_sell(&pos, d(2024, 6, 4)));
    }

    #[test]
    fn exit_on_stop_loss() {
        let mut cfg = StrategyConfig::test_defaults();
        cfg.stop_loss_bps = Some(300);
        let s = strategy(cfg);
        let pos = Position::new("NVDA", 10, Micros::from_dollars(120), d(2024, 6, 3), None);
        // Marked to 110: -8.3% <= -3%.
        assert_eq!(
            s.evaluate_exit(&pos, d(2024, 6, 4)),
            Some(ExitReason::StopLoss)
        );
    }

    #[test]
    fn exit_on_max_holding_days() {
        let mut cfg = StrategyConfig::test_defaults();
        cfg.gain_threshold_bps = 100_000; // out of reach
        cfg.max_holding_days = Some(1);
        let s = strategy(cfg);
        let pos = Position::new("NVDA", 10, Micros::from_dollars(110), d(2024, 6, 3), None);
        assert_eq!(s.evaluate_exit(&pos, d(2024, 6, 3)), None);
        assert_eq!(
            s.evaluate_exit(&pos, d(2024, 6, 4)),
            Some(ExitReason::MaxHold)
        );
    }

    #[test]
    fn holds_when_no_price_is_resolvable() {
        // The only bar is 17 days old: outside the staleness window, so
        // no close resolves on the evaluation date.
        let mut t = PriceTable::new();
        t.insert("NVDA", d(2024, 6, 3), bar(100, 100, 1_000_000));

        let mut cfg = StrategyConfig::test_defaults();
        cfg.max_holding_days = Some(5);
        let s = HighestGainerStrategy::new(cfg, Arc::new(t));

        let pos = Position::new("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3), None);
        // Well past the holding limit, but with no price the position is
        // held, not exited on a stale mark.
        assert_eq!(s.evaluate_exit(&pos, d(2024, 6, 20)), None);
        assert!(!s.should_sell(&pos, d(2024, 6, 20)));
    }

    #[test]
    fn hold_when_nothing_triggers() {
        let s = strategy(StrategyConfig::test_defaults());
        let pos = Position::new("AAPL", 10, Micros::from_dollars(200), d(2024, 6, 3), None);
        // Close 204: +2% < +5% target, no stop, no max hold.
        assert_eq!(s.evaluate_exit(&pos, d(2024, 6, 4)), None);
    }
}
