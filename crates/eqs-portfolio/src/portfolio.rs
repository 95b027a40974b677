use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use eqs_data::{DataSource, PriceKind};
use eqs_models::{Micros, PortfolioSnapshot, Position, Side, Trade};
use eqs_txlog::{TransactionLog, TxEvent};

use crate::costs::TradingCosts;

/// The single mutable aggregate of a simulation run.
///
/// Owned exclusively by one engine run. Positions live in a `BTreeMap`
/// so iteration order is the symbol order, identical on every run.
///
/// The attached [`TransactionLog`] is an observer: logging failures are
/// absorbed and never change trading behavior.
#[derive(Debug)]
pub struct Portfolio {
    cash: Micros,
    initial_capital: Micros,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    snapshots: Vec<PortfolioSnapshot>,
    costs: TradingCosts,
    txlog: Option<TransactionLog>,
}

impl Portfolio {
    pub fn new(initial_capital: Micros, costs: TradingCosts) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            snapshots: Vec::new(),
            costs,
            txlog: None,
        }
    }

    /// Attach a transaction log; subsequent mutations emit events into it.
    pub fn attach_txlog(&mut self, log: TransactionLog) {
        self.txlog = Some(log);
    }

    /// The attached log, for callers (the engine) that emit their own
    /// events into the same sequence.
    pub fn tx_mut(&mut self) -> Option<&mut TransactionLog> {
        self.txlog.as_mut()
    }

    pub fn txlog(&self) -> Option<&TransactionLog> {
        self.txlog.as_ref()
    }

    /// Detach the transaction log, leaving the portfolio unlogged.
    pub fn take_txlog(&mut self) -> Option<TransactionLog> {
        self.txlog.take()
    }

    // -- read access ------------------------------------------------------

    pub fn cash(&self) -> Micros {
        self.cash
    }

    pub fn initial_capital(&self) -> Micros {
        self.initial_capital
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    /// Marked value of all open positions.
    pub fn positions_value(&self) -> Micros {
        self.positions
            .values()
            .fold(Micros::ZERO, |acc, p| acc.saturating_add(p.current_value()))
    }

    /// Cash plus marked positions.
    pub fn total_value(&self) -> Micros {
        self.cash.saturating_add(self.positions_value())
    }

    // -- mutation ---------------------------------------------------------

    /// Buy `shares` of `symbol` at quote `price` on `date`.
    ///
    /// Slippage is added to the quote, commission to the total. The order
    /// is rejected (no state change) when the full-size cost exceeds cash.
    /// After the cash check, the position-size cap may shrink the share
    /// count; a cap that shrinks to zero also rejects the order.
    ///
    /// Returns whether the order executed. This is the only path that
    /// creates or extends a position.
    pub fn buy(&mut self, symbol: &str, shares: i64, price: Micros, date: NaiveDate) -> bool {
        if shares <= 0 || !price.is_positive() {
            debug!(symbol, shares, %price, "buy rejected: bad order");
            return false;
        }

        let exec_price = price.saturating_add(price.mul_bps(self.costs.slippage_bps));
        let notional = match exec_price.checked_mul_qty(shares) {
            Some(n) => n,
            None => {
                warn!(symbol, shares, %exec_price, "buy rejected: notional overflow");
                return false;
            }
        };
        let total_cost = notional.saturating_add(self.costs.commission);
        if total_cost > self.cash {
            debug!(
                symbol,
                shares,
                cost = %total_cost,
                cash = %self.cash,
                "buy rejected: insufficient cash"
            );
            return false;
        }

        // Position-size cap against the pre-trade portfolio value.
        let mut shares = shares;
        let max_value = self.total_value().mul_bps(self.costs.max_position_size_bps);
        if notional > max_value {
            let capped = max_value.div_price(exec_price);
            if capped <= 0 {
                debug!(symbol, "buy rejected: position cap leaves zero shares");
                return false;
            }
            debug!(symbol, from = shares, to = capped, "position cap shrank order");
            shares = capped;
        }

        let notional = exec_price.mul_qty(shares);
        let total_cost = notional.saturating_add(self.costs.commission);
        self.cash -= total_cost;

        let updated = match self.positions.get(symbol) {
            Some(existing) => existing.averaged_in(shares, notional, exec_price),
            None => Position::new(symbol, shares, exec_price, date, Some(exec_price)),
        };
        self.positions.insert(symbol.to_string(), updated);

        info!(symbol, shares, %exec_price, cash = %self.cash, "BUY filled");
        self.tx_record(TxEvent::Order {
            date,
            symbol: symbol.to_string(),
            side: Side::Buy,
            shares,
            price: exec_price,
            commission: self.costs.commission,
            cash_after: self.cash,
        });
        true
    }

    /// Sell the entire position in `symbol` on `date`.
    ///
    /// The sell price defaults to the position's last marked price when
    /// `price` is `None`; slippage is subtracted from it. Fails (no state
    /// change) when no position is open or no price can be resolved.
    pub fn sell(&mut self, symbol: &str, date: NaiveDate, price: Option<Micros>) -> bool {
        let pos = match self.positions.get(symbol) {
            Some(p) => p.clone(),
            None => {
                debug!(symbol, "sell rejected: no open position");
                return false;
            }
        };

        let quote = match price.or(pos.current_price) {
            Some(p) if p.is_positive() => p,
            _ => {
                warn!(symbol, "sell rejected: no resolvable price");
                return false;
            }
        };

        // Realized percentage is the unrealized one just before the sell,
        // measured at the last mark (frictions excluded by definition).
        let pnl_bps = pos.unrealized_pnl_bps();

        let exec_price = quote.saturating_sub(quote.mul_bps(self.costs.slippage_bps));
        let proceeds = exec_price
            .mul_qty(pos.shares)
            .saturating_sub(self.costs.commission);
        self.cash = self.cash.saturating_add(proceeds);

        let trade = Trade {
            symbol: symbol.to_string(),
            entry_date: pos.entry_date,
            exit_date: date,
            entry_price: pos.entry_price,
            exit_price: exec_price,
            shares: pos.shares,
            pnl: proceeds - pos.cost_basis(),
            pnl_bps,
            holding_days: pos.holding_days(date),
        };
        self.positions.remove(symbol);

        info!(
            symbol,
            shares = trade.shares,
            %exec_price,
            pnl = %trade.pnl,
            cash = %self.cash,
            "SELL filled"
        );
        self.tx_record(TxEvent::Order {
            date,
            symbol: symbol.to_string(),
            side: Side::Sell,
            shares: trade.shares,
            price: exec_price,
            commission: self.costs.commission,
            cash_after: self.cash,
        });
        self.tx_record(TxEvent::TradeCompleted {
            trade: trade.clone(),
        });

        self.trades.push(trade);
        true
    }

    /// Re-mark every open position to the best-available price at `date`.
    /// Positions with no available price keep their last mark.
    pub fn update_prices(&mut self, date: NaiveDate, source: &dyn DataSource) {
        let symbols: Vec<String> = self.positions.keys().cloned().collect();
        for symbol in symbols {
            let Some(price) = source.price_at(&symbol, date, PriceKind::Close) else {
                debug!(symbol, %date, "no price for mark; keeping last");
                continue;
            };
            if let Some(pos) = self.positions.get(&symbol) {
                let updated = pos.with_price(price);
                let event = TxEvent::PositionUpdate {
                    date,
                    symbol: symbol.clone(),
                    shares: updated.shares,
                    price,
                    value: updated.current_value(),
                };
                self.positions.insert(symbol, updated);
                self.tx_record(event);
            }
        }
    }

    /// Append the end-of-day snapshot. Called exactly once per simulated
    /// day, after that day's orders have settled.
    pub fn take_snapshot(&mut self, date: NaiveDate) {
        let positions_value = self.positions_value();
        let total_value = self.cash.saturating_add(positions_value);
        let snap = PortfolioSnapshot {
            timestamp: date,
            cash: self.cash,
            positions_value,
            total_value,
            positions: self.positions.values().cloned().collect(),
        };
        self.tx_record(TxEvent::Snapshot {
            date,
            cash: snap.cash,
            positions_value: snap.positions_value,
            total_value: snap.total_value,
            num_positions: snap.num_positions(),
        });
        self.snapshots.push(snap);
    }

    fn tx_record(&mut self, event: TxEvent) {
        if let Some(log) = &mut self.txlog {
            log.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn frictionless(capital: i64) -> Portfolio {
        Portfolio::new(Micros::from_dollars(capital), TradingCosts::frictionless())
    }

    #[test]
    fn buy_decrements_cash_exactly() {
        let mut p = frictionless(10_000);
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        assert_eq!(p.cash(), Micros::from_dollars(9_000));
        assert_eq!(p.position("NVDA").map(|pos| pos.shares), Some(10));
    }

    #[test]
    fn buy_beyond_cash_is_a_no_op() {
        let mut p = frictionless(1_000);
        assert!(!p.buy("NVDA", 11, Micros::from_dollars(100), d(2024, 6, 3)));
        assert_eq!(p.cash(), Micros::from_dollars(1_000));
        assert_eq!(p.num_positions(), 0);
    }

    #[test]
    fn buy_applies_slippage_and_commission() {
        let mut p = Portfolio::new(
            Micros::from_dollars(10_000),
            TradingCosts {
                slippage_bps: 100, // 1%
                commission: Micros::from_dollars(5),
                max_position_size_bps: 10_000,
            },
        );
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        // exec price 101, cost 1010 + 5 commission
        assert_eq!(p.cash(), Micros::from_dollars(10_000 - 1_015));
        assert_eq!(
            p.position("NVDA").map(|pos| pos.entry_price),
            Some(Micros::from_dollars(101))
        );
    }

    #[test]
    fn position_cap_shrinks_the_order() {
        let mut p = Portfolio::new(
            Micros::from_dollars(10_000),
            TradingCosts {
                slippage_bps: 0,
                commission: Micros::ZERO,
                max_position_size_bps: 2_000, // 20%
            },
        );
        // 50 shares @ $100 = $5,000 notional; cap is $2,000 -> 20 shares.
        assert!(p.buy("NVDA", 50, Micros::from_dollars(100), d(2024, 6, 3)));
        assert_eq!(p.position("NVDA").map(|pos| pos.shares), Some(20));
        assert_eq!(p.cash(), Micros::from_dollars(8_000));
    }

    #[test]
    fn cap_that_leaves_zero_shares_rejects() {
        let mut p = Portfolio::new(
            Micros::from_dollars(1_000),
            TradingCosts {
                slippage_bps: 0,
                commission: Micros::ZERO,
                max_position_size_bps: 100, // 1% -> $10 cap
            },
        );
        assert!(!p.buy("NVDA", 5, Micros::from_dollars(100), d(2024, 6, 3)));
        assert_eq!(p.cash(), Micros::from_dollars(1_000));
    }

    #[test]
    fn averaging_in_weights_entry_price_and_keeps_date() {
        let mut p = frictionless(10_000);
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        assert!(p.buy("NVDA", 10, Micros::from_dollars(110), d(2024, 6, 5)));
        let pos = p.position("NVDA").cloned().unwrap();
        assert_eq!(pos.shares, 20);
        assert_eq!(pos.entry_price, Micros::from_dollars(105));
        assert_eq!(pos.entry_date, d(2024, 6, 3));
    }

    #[test]
    fn sell_round_trip_pnl_is_exact() {
        let mut p = frictionless(10_000);
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        assert!(p.sell(
            "NVDA",
            d(2024, 6, 5),
            Some(Micros::from_dollars(110))
        ));
        assert!(!p.has_position("NVDA"));
        assert_eq!(p.trades().len(), 1);
        let t = &p.trades()[0];
        assert_eq!(t.pnl, Micros::from_dollars(100)); // (110-100)*10
        assert_eq!(t.holding_days, 2);
        assert_eq!(p.cash(), Micros::from_dollars(10_100));
    }

    #[test]
    fn sell_defaults_to_last_mark() {
        let mut p = frictionless(10_000);
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        let mut src = eqs_data::PriceTable::new();
        src.insert(
            "NVDA",
            d(2024, 6, 4),
            eqs_data::DailyBar {
                open: Micros::from_dollars(104),
                close: Micros::from_dollars(105),
                volume: 0,
            },
        );
        p.update_prices(d(2024, 6, 4), &src);
        assert!(p.sell("NVDA", d(2024, 6, 4), None));
        assert_eq!(p.cash(), Micros::from_dollars(10_050));
        assert_eq!(p.trades()[0].pnl_bps, 500); // marked +5% before the sell
    }

    #[test]
    fn sell_without_position_or_price_fails() {
        let mut p = frictionless(10_000);
        assert!(!p.sell("NVDA", d(2024, 6, 4), Some(Micros::from_dollars(100))));

        // Open a position whose mark never happened and whose sell gives
        // no explicit price: entry fill sets the mark, so this succeeds.
        assert!(p.buy("NVDA", 1, Micros::from_dollars(100), d(2024, 6, 3)));
        assert!(p.sell("NVDA", d(2024, 6, 4), None));
    }

    #[test]
    fn update_prices_keeps_unpriced_positions() {
        let mut p = frictionless(10_000);
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        let src = eqs_data::PriceTable::new(); // empty: no prices at all
        p.update_prices(d(2024, 6, 4), &src);
        // Mark from the fill survives.
        assert_eq!(
            p.position("NVDA").and_then(|pos| pos.current_price),
            Some(Micros::from_dollars(100))
        );
    }

    #[test]
    fn snapshot_reflects_cash_and_positions() {
        let mut p = frictionless(10_000);
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        p.take_snapshot(d(2024, 6, 3));
        assert_eq!(p.snapshots().len(), 1);
        let s = &p.snapshots()[0];
        assert_eq!(s.cash, Micros::from_dollars(9_000));
        assert_eq!(s.positions_value, Micros::from_dollars(1_000));
        assert_eq!(s.total_value, Micros::from_dollars(10_000));
        assert_eq!(s.num_positions(), 1);
    }

    #[test]
    fn txlog_sees_orders_and_trades() {
        let mut p = frictionless(10_000);
        p.attach_txlog(TransactionLog::new());
        assert!(p.buy("NVDA", 10, Micros::from_dollars(100), d(2024, 6, 3)));
        assert!(p.sell(
            "NVDA",
            d(2024, 6, 5),
            Some(Micros::from_dollars(110))
        ));
        p.take_snapshot(d(2024, 6, 5));
        let log = p.txlog().unwrap();
        assert_eq!(log.events_by_type("order").len(), 2);
        assert_eq!(log.events_by_type("trade_completed").len(), 1);
        assert_eq!(log.events_by_type("snapshot").len(), 1);
    }
}
