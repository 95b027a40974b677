//! eqs-backtest
//!
//! The daily state machine. One engine owns one portfolio for one run
//! and steps a calendar day at a time, start to end inclusive. Days with
//! no market data are still stepped: every operation degrades to a no-op
//! for the affected symbols and the snapshot is still taken.
//!
//! Entries are deferred by one day: a signal computed from day N closing
//! data executes at day N+1's open. Same-day closing prices are not
//! tradable information at that day's open, so filling on them would
//! bias returns upward. Exits carry no such delay.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use eqs_config::{BacktestConfig, ConfigError};
use eqs_data::{DataSource, PriceKind};
use eqs_metrics::{compute_metrics, PerformanceMetrics};
use eqs_models::{PortfolioSnapshot, Trade};
use eqs_portfolio::{Portfolio, TradingCosts};
use eqs_strategy::Strategy;
use eqs_txlog::{TransactionLog, TxEvent};

/// A buy signal waiting for the next day's open.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingOrder {
    symbol: String,
    shares: i64,
    signal_date: NaiveDate,
}

/// Everything a finished run produces. The transaction log (when one
/// was attached) rides along for inspection and export.
#[derive(Debug)]
pub struct BacktestReport {
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub txlog: Option<TransactionLog>,
}

/// Single-threaded daily simulation loop.
pub struct BacktestEngine {
    config: BacktestConfig,
    portfolio: Portfolio,
    strategy: Box<dyn Strategy>,
    source: Arc<dyn DataSource>,
    pending: Vec<PendingOrder>,
}

impl BacktestEngine {
    /// Validates the configuration up front; an invalid config is the
    /// only fatal error in the system and surfaces before any day runs.
    pub fn new(
        config: BacktestConfig,
        strategy: Box<dyn Strategy>,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let costs = TradingCosts {
            slippage_bps: config.slippage_bps,
            commission: config.commission,
            max_position_size_bps: config.max_position_size_bps,
        };
        let portfolio = Portfolio::new(config.initial_capital, costs);
        Ok(Self {
            config,
            portfolio,
            strategy,
            source,
            pending: Vec::new(),
        })
    }

    /// Attach a transaction log; the engine and portfolio share it.
    pub fn attach_txlog(&mut self, log: TransactionLog) {
        self.portfolio.attach_txlog(log);
    }

    /// Run the whole simulation and assemble the report.
    pub fn run(mut self) -> BacktestReport {
        info!(
            strategy = self.strategy.name(),
            start = %self.config.start_date,
            end = %self.config.end_date,
            capital = %self.config.initial_capital,
            "backtest starting"
        );
        self.tx_record(TxEvent::BacktestInit {
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            initial_capital: self.config.initial_capital,
        });

        let mut date = self.config.start_date;
        while date <= self.config.end_date {
            self.step_day(date);
            // 6. Advance to the next calendar day.
            match date.succ_opt() {
                Some(next) => date = next,
                None => break, // end of representable time
            }
        }

        self.tx_record(TxEvent::BacktestComplete {
            final_value: self.portfolio.total_value(),
            num_trades: self.portfolio.trades().len(),
        });

        let metrics = compute_metrics(
            self.portfolio.snapshots(),
            self.portfolio.trades(),
            self.config.initial_capital,
            self.config.risk_free_rate_bps,
        );
        info!(
            final_value = %self.portfolio.total_value(),
            trades = self.portfolio.trades().len(),
            "backtest complete"
        );

        BacktestReport {
            metrics,
            trades: self.portfolio.trades().to_vec(),
            snapshots: self.portfolio.snapshots().to_vec(),
            txlog: self.portfolio.take_txlog(),
        }
    }

    fn step_day(&mut self, date: NaiveDate) {
        // 1. Execute deferred buys at today's open. The queue clears
        //    unconditionally: an unfillable order is dropped, not retried.
        let pending = std::mem::take(&mut self.pending);
        for order in pending {
            self.execute_pending(order, date);
        }

        // 2. Mark open positions to today's data.
        self.portfolio.update_prices(date, self.source.as_ref());

        // 3. Evaluate exits; fills happen same-day at the marked price.
        //    The exit reason goes into the log as a sell signal, since
        //    the trading outcome itself is reason-blind.
        let open: Vec<_> = self.portfolio.positions().values().cloned().collect();
        for pos in open {
            if let Some(reason) = self.strategy.evaluate_exit(&pos, date) {
                info!(symbol = %pos.symbol, reason = reason.as_str(), %date, "exit triggered");
                self.tx_record(TxEvent::Signal {
                    date,
                    symbol: pos.symbol.clone(),
                    shares: pos.shares,
                    reason: reason.as_str().to_string(),
                });
                self.portfolio.sell(&pos.symbol, date, None);
            }
        }

        // 4. Generate entries from today's data and queue them for
        //    tomorrow's open.
        let signals = self.strategy.generate_signals(
            date,
            self.portfolio.cash(),
            self.portfolio.positions(),
            self.config.max_positions,
        );
        let strategy_name = self.strategy.name().to_string();
        for sig in signals {
            self.tx_record(TxEvent::Signal {
                date,
                symbol: sig.symbol.clone(),
                shares: sig.shares,
                reason: strategy_name.clone(),
            });
            self.pending.push(PendingOrder {
                symbol: sig.symbol,
                shares: sig.shares,
                signal_date: date,
            });
        }

        // 5. End-of-day snapshot, after all of the above settled.
        self.portfolio.take_snapshot(date);
    }

    /// Fill one queued order at today's open, or drop it.
    ///
    /// The signal was sized against its own day's close; today's open can
    /// differ, so the share count is re-clamped to what cash affords at
    /// the slippage-adjusted fill price before the order goes in.
    fn execute_pending(&mut self, order: PendingOrder, date: NaiveDate) {
        let Some(open) = self
            .source
            .price_at(&order.symbol, date, PriceKind::Open)
        else {
            debug!(
                symbol = %order.symbol,
                signal_date = %order.signal_date,
                %date,
                "deferred buy dropped: no opening price"
            );
            return;
        };

        let exec_price = open.saturating_add(open.mul_bps(self.config.slippage_bps));
        let affordable = self
            .portfolio
            .cash()
            .saturating_sub(self.config.commission)
            .div_price(exec_price);
        let shares = order.shares.min(affordable);
        if shares <= 0 {
            debug!(symbol = %order.symbol, "deferred buy dropped: no affordable shares");
            return;
        }

        self.portfolio.buy(&order.symbol, shares, open, date);
    }

    fn tx_record(&mut self, event: TxEvent) {
        if let Some(log) = self.portfolio.tx_mut() {
            log.record(event);
        }
    }
}
