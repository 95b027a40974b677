//! eqs-metrics
//!
//! Performance statistics over a finished run. One pure function:
//! snapshots + trades in, [`PerformanceMetrics`] out. Cash, prices and
//! PnL stay exact `Micros`; ratio statistics (CAGR, Sharpe, Sortino,
//! drawdown) are approximate by nature and computed in `f64` — they are
//! reporting outputs and never feed back into simulation state.

use serde::Serialize;

use eqs_models::{Micros, PortfolioSnapshot, Trade};

/// Annualization factor for daily return statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Calendar-year length for CAGR (leap-year averaged).
pub const DAYS_PER_YEAR: f64 = 365.25;

/// The full report card for one backtest run.
///
/// `Option` fields are "undefined" rather than zero: a Sharpe over zero
/// samples or a profit factor with no losses has no meaningful value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub initial_capital: Micros,
    pub final_capital: Micros,
    pub total_return: Micros,
    pub total_return_pct: f64,
    pub cagr_pct: f64,

    pub max_drawdown_pct: f64,
    pub max_drawdown_duration_days: i64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,

    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    pub avg_gain_pct: f64,
    pub avg_loss_pct: f64,
    pub largest_gain_pct: f64,
    pub largest_loss_pct: f64,
    pub avg_holding_days: f64,
    pub profit_factor: Option<f64>,

    pub avg_num_positions: f64,
    pub max_num_positions: usize,
    pub days_traded: usize,
}

impl PerformanceMetrics {
    /// The all-zero record reported when a run produced no snapshots or
    /// no trades.
    fn zeroed(initial_capital: Micros) -> Self {
        Self {
            initial_capital,
            final_capital: initial_capital,
            total_return: Micros::ZERO,
            total_return_pct: 0.0,
            cagr_pct: 0.0,
            max_drawdown_pct: 0.0,
            max_drawdown_duration_days: 0,
            sharpe_ratio: None,
            sortino_ratio: None,
            num_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: 0.0,
            avg_gain_pct: 0.0,
            avg_loss_pct: 0.0,
            largest_gain_pct: 0.0,
            largest_loss_pct: 0.0,
            avg_holding_days: 0.0,
            profit_factor: None,
            avg_num_positions: 0.0,
            max_num_positions: 0,
            days_traded: 0,
        }
    }
}

/// Compute the full metrics record for one finished run.
///
/// When either history is empty there is nothing to measure and the
/// zeroed record (with `final_capital = initial_capital`) comes back.
pub fn compute_metrics(
    snapshots: &[PortfolioSnapshot],
    trades: &[Trade],
    initial_capital: Micros,
    risk_free_rate_bps: i64,
) -> PerformanceMetrics {
    if snapshots.is_empty() || trades.is_empty() {
        return PerformanceMetrics::zeroed(initial_capital);
    }

    let mut m = PerformanceMetrics::zeroed(initial_capital);

    // -- equity-curve statistics ------------------------------------------

    let final_capital = snapshots[snapshots.len() - 1].total_value;
    m.final_capital = final_capital;
    m.total_return = final_capital - initial_capital;
    if initial_capital.is_positive() {
        m.total_return_pct = m.total_return.to_f64() / initial_capital.to_f64() * 100.0;
    }

    let elapsed_days =
        (snapshots[snapshots.len() - 1].timestamp - snapshots[0].timestamp).num_days();
    let years = elapsed_days as f64 / DAYS_PER_YEAR;
    if years > 0.0 && initial_capital.is_positive() && final_capital.is_positive() {
        let growth = final_capital.to_f64() / initial_capital.to_f64();
        m.cagr_pct = (growth.powf(1.0 / years) - 1.0) * 100.0;
    }

    let (dd_pct, dd_duration) = max_drawdown(snapshots);
    m.max_drawdown_pct = dd_pct;
    m.max_drawdown_duration_days = dd_duration;

    let returns = daily_returns(snapshots);
    let rf_daily = risk_free_rate_bps as f64 / 10_000.0 / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - rf_daily).collect();
    m.sharpe_ratio = sharpe(&excess);
    m.sortino_ratio = sortino(&excess);

    // -- trade statistics -------------------------------------------------

    m.num_trades = trades.len();
    m.winning_trades = trades.iter().filter(|t| t.is_winner()).count();
    m.losing_trades = trades.iter().filter(|t| t.is_loser()).count();
    m.win_rate_pct = m.winning_trades as f64 / m.num_trades as f64 * 100.0;

    let gains: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| bps_to_pct(t.pnl_bps))
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| bps_to_pct(t.pnl_bps))
        .collect();
    m.avg_gain_pct = mean(&gains).unwrap_or(0.0);
    m.avg_loss_pct = mean(&losses).unwrap_or(0.0);

    let all_pcts: Vec<f64> = trades.iter().map(|t| bps_to_pct(t.pnl_bps)).collect();
    m.largest_gain_pct = all_pcts.iter().copied().fold(f64::MIN, f64::max);
    m.largest_loss_pct = all_pcts.iter().copied().fold(f64::MAX, f64::min);

    let holding: Vec<f64> = trades.iter().map(|t| t.holding_days as f64).collect();
    m.avg_holding_days = mean(&holding).unwrap_or(0.0);

    let gross_profit = trades
        .iter()
        .filter(|t| t.pnl.is_positive())
        .fold(Micros::ZERO, |acc, t| acc.saturating_add(t.pnl));
    let gross_loss = trades
        .iter()
        .filter(|t| t.pnl.is_negative())
        .fold(Micros::ZERO, |acc, t| acc.saturating_add(t.pnl.abs()));
    if gross_loss.is_positive() {
        m.profit_factor = Some(gross_profit.to_f64() / gross_loss.to_f64());
    }

    // -- exposure statistics ----------------------------------------------

    let counts: Vec<f64> = snapshots.iter().map(|s| s.num_positions() as f64).collect();
    m.avg_num_positions = mean(&counts).unwrap_or(0.0);
    m.max_num_positions = snapshots.iter().map(|s| s.num_positions()).max().unwrap_or(0);
    m.days_traded = snapshots.len();

    m
}

/// Max drawdown percentage and max days spent below the running peak.
///
/// Single forward pass: drawdown at each point is measured against the
/// highest total value seen so far; the below-peak day counter resets
/// whenever a new peak is set. The two maxima are tracked independently
/// and need not occur at the same point.
fn max_drawdown(snapshots: &[PortfolioSnapshot]) -> (f64, i64) {
    let mut peak = Micros::new(i64::MIN);
    let mut max_dd = 0.0_f64;
    let mut below_peak_days = 0_i64;
    let mut max_duration = 0_i64;

    for snap in snapshots {
        if snap.total_value > peak {
            peak = snap.total_value;
            below_peak_days = 0;
            continue;
        }
        below_peak_days += 1;
        max_duration = max_duration.max(below_peak_days);
        if peak.is_positive() {
            let dd = (peak - snap.total_value).to_f64() / peak.to_f64() * 100.0;
            max_dd = max_dd.max(dd);
        }
    }

    (max_dd, max_duration)
}

/// Simple percentage change between consecutive snapshot totals, as
/// fractions (0.01 = +1%).
fn daily_returns(snapshots: &[PortfolioSnapshot]) -> Vec<f64> {
    snapshots
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].total_value;
            if !prev.is_positive() {
                return None;
            }
            Some((w[1].total_value - prev).to_f64() / prev.to_f64())
        })
        .collect()
}

fn sharpe(excess: &[f64]) -> Option<f64> {
    let avg = mean(excess)?;
    let sd = population_stddev(excess)?;
    if sd == 0.0 {
        return None;
    }
    Some(avg / sd * TRADING_DAYS_PER_YEAR.sqrt())
}

fn sortino(excess: &[f64]) -> Option<f64> {
    let avg = mean(excess)?;
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let sd = population_stddev(&downside)?;
    if sd == 0.0 {
        return None;
    }
    Some(avg / sd * TRADING_DAYS_PER_YEAR.sqrt())
}

fn bps_to_pct(bps: i64) -> f64 {
    bps as f64 / 100.0
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Population standard deviation (divide by n, not n-1).
fn population_stddev(xs: &[f64]) -> Option<f64> {
    let avg = mean(xs)?;
    let var = xs.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / xs.len() as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn snap(day: u32, total: i64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: d(day),
            cash: Micros::from_dollars(total),
            positions_value: Micros::ZERO,
            total_value: Micros::from_dollars(total),
            positions: Vec::new(),
        }
    }

    fn trade(pnl: i64, pnl_bps: i64, holding_days: i64) -> Trade {
        Trade {
            symbol: "NVDA".to_string(),
            entry_date: d(3),
            exit_date: d(3) + chrono::Days::new(holding_days as u64),
            entry_price: Micros::from_dollars(100),
            exit_price: Micros::from_dollars(100 + pnl),
            shares: 1,
            pnl: Micros::from_dollars(pnl),
            pnl_bps,
            holding_days,
        }
    }

    const RF: i64 = 0;

    #[test]
    fn empty_inputs_zero_out() {
        let capital = Micros::from_dollars(10_000);
        let m = compute_metrics(&[], &[], capital, RF);
        assert_eq!(m.final_capital, capital);
        assert_eq!(m.num_trades, 0);
        assert_eq!(m.win_rate_pct, 0.0);
        assert_eq!(m.profit_factor, None);
        assert_eq!(m.sharpe_ratio, None);

        // A run with snapshots but no trades is also zeroed.
        let m = compute_metrics(&[snap(3, 11_000)], &[], capital, RF);
        assert_eq!(m.final_capital, capital);
        assert_eq!(m.total_return, Micros::ZERO);
    }

    #[test]
    fn total_return_and_final_capital() {
        let snaps = [snap(3, 10_000), snap(4, 10_500)];
        let trades = [trade(500, 500, 1)];
        let m = compute_metrics(&snaps, &trades, Micros::from_dollars(10_000), RF);
        assert_eq!(m.final_capital, Micros::from_dollars(10_500));
        assert_eq!(m.total_return, Micros::from_dollars(500));
        assert!((m.total_return_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_zero_on_increasing_curve() {
        let snaps = [snap(3, 100), snap(4, 110), snap(5, 120)];
        let (dd, dur) = max_drawdown(&snaps);
        assert_eq!(dd, 0.0);
        assert_eq!(dur, 0);
    }

    #[test]
    fn drawdown_tracks_peak_and_duration() {
        // Peak 120, trough 90 (-25%), recovery above peak resets duration.
        let snaps = [
            snap(3, 100),
            snap(4, 120),
            snap(5, 90),
            snap(6, 100),
            snap(7, 130),
            snap(8, 125),
        ];
        let (dd, dur) = max_drawdown(&snaps);
        assert!((dd - 25.0).abs() < 1e-9);
        assert_eq!(dur, 2); // days 5 and 6 below the 120 peak
    }

    #[test]
    fn flat_curve_has_no_sharpe() {
        let snaps = [snap(3, 100), snap(4, 100), snap(5, 100)];
        let trades = [trade(0, 0, 1)];
        let m = compute_metrics(&snaps, &trades, Micros::from_dollars(100), RF);
        assert_eq!(m.sharpe_ratio, None); // zero stdev
        assert_eq!(m.sortino_ratio, None); // no negative samples
    }

    #[test]
    fn sharpe_on_known_series() {
        // Returns +10%, -5%: mean 0.025, population stdev 0.075.
        let snaps = [snap(3, 1_000), snap(4, 1_100), snap(5, 1_045)];
        let trades = [trade(45, 450, 1)];
        let m = compute_metrics(&snaps, &trades, Micros::from_dollars(1_000), RF);
        let expected = 0.025 / 0.075 * TRADING_DAYS_PER_YEAR.sqrt();
        let got = m.sharpe_ratio.unwrap();
        assert!((got - expected).abs() < 1e-9, "got {got}, want {expected}");
        // Sortino: one negative sample, stdev of a single point is 0.
        assert_eq!(m.sortino_ratio, None);
    }

    #[test]
    fn trade_buckets_and_win_rate() {
        let trades = [
            trade(100, 1_000, 2),
            trade(-50, -500, 4),
            trade(0, 0, 1),
            trade(200, 2_000, 3),
        ];
        let snaps = [snap(3, 10_000), snap(4, 10_250)];
        let m = compute_metrics(&snaps, &trades, Micros::from_dollars(10_000), RF);
        assert_eq!(m.num_trades, 4);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 1); // break-even counts toward neither
        assert!((m.win_rate_pct - 50.0).abs() < 1e-9);
        assert!((m.avg_gain_pct - 15.0).abs() < 1e-9); // mean(10, 20)
        assert!((m.avg_loss_pct - -5.0).abs() < 1e-9);
        assert!((m.largest_gain_pct - 20.0).abs() < 1e-9);
        assert!((m.largest_loss_pct - -5.0).abs() < 1e-9);
        assert!((m.avg_holding_days - 2.5).abs() < 1e-9);
        assert!((m.profit_factor.unwrap() - 6.0).abs() < 1e-9); // 300 / 50
    }

    #[test]
    fn profit_factor_absent_without_losses() {
        let trades = [trade(100, 1_000, 1)];
        let snaps = [snap(3, 10_000), snap(4, 10_100)];
        let m = compute_metrics(&snaps, &trades, Micros::from_dollars(10_000), RF);
        assert_eq!(m.profit_factor, None);
    }

    #[test]
    fn exposure_counts_positions_across_snapshots() {
        let mut s1 = snap(3, 10_000);
        let mut s2 = snap(4, 10_000);
        let pos = |sym: &str| {
            eqs_models::Position::new(sym, 1, Micros::from_dollars(100), d(3), None)
        };
        s1.positions = vec![pos("A")];
        s2.positions = vec![pos("A"), pos("B"), pos("C")];
        let trades = [trade(0, 0, 1)];
        let m = compute_metrics(&[s1, s2], &trades, Micros::from_dollars(10_000), RF);
        assert!((m.avg_num_positions - 2.0).abs() < 1e-9);
        assert_eq!(m.max_num_positions, 3);
        assert_eq!(m.days_traded, 2);
    }

    #[test]
    fn cagr_uses_calendar_years() {
        // Exactly one leap-adjusted year, +10%.
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = start + chrono::Days::new(365); // ~1 year; years = 365/365.25
        let snaps = [
            PortfolioSnapshot {
                timestamp: start,
                cash: Micros::from_dollars(10_000),
                positions_value: Micros::ZERO,
                total_value: Micros::from_dollars(10_000),
                positions: Vec::new(),
            },
            PortfolioSnapshot {
                timestamp: end,
                cash: Micros::from_dollars(11_000),
                positions_value: Micros::ZERO,
                total_value: Micros::from_dollars(11_000),
                positions: Vec::new(),
            },
        ];
        let trades = [trade(1_000, 1_000, 365)];
        let m = compute_metrics(&snaps, &trades, Micros::from_dollars(10_000), RF);
        let years = 365.0 / DAYS_PER_YEAR;
        let expected = (1.1_f64.powf(1.0 / years) - 1.0) * 100.0;
        assert!((m.cagr_pct - expected).abs() < 1e-9);
    }
}
