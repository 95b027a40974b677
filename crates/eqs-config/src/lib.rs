//! eqs-config
//!
//! Backtest and strategy configuration with construction-time validation.
//! Configuration problems are the only fatal errors in the system: they
//! surface before a single simulated day runs. Everything after
//! validation degrades gracefully per-day/per-symbol.
//!
//! Files are YAML; money fields accept decimal strings (`"50000"`,
//! `"5.50"`) or whole-dollar integers, percent fields are basis points.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use eqs_models::{Micros, BPS_SCALE};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Validation failures. All are fatal at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NonPositiveCapital { capital: Micros },
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    /// A bps-valued field is outside its allowed range.
    BpsOutOfRange { field: &'static str, value: i64 },
    /// A count or threshold that must be strictly positive is not.
    NonPositive { field: &'static str },
    /// A cost that must be non-negative is negative.
    NegativeCost { field: &'static str, value: Micros },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NonPositiveCapital { capital } => {
                write!(f, "initial_capital must be > 0, got {capital}")
            }
            ConfigError::InvalidDateRange { start, end } => {
                write!(f, "start_date {start} must be <= end_date {end}")
            }
            ConfigError::BpsOutOfRange { field, value } => {
                write!(f, "{field} = {value} bps is out of range")
            }
            ConfigError::NonPositive { field } => {
                write!(f, "{field} must be > 0")
            }
            ConfigError::NegativeCost { field, value } => {
                write!(f, "{field} must be >= 0, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Backtest configuration
// ---------------------------------------------------------------------------

/// Simulation-wide configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// First simulated calendar day (inclusive).
    pub start_date: NaiveDate,
    /// Last simulated calendar day (inclusive).
    pub end_date: NaiveDate,

    #[serde(default = "default_initial_capital")]
    pub initial_capital: Micros,

    /// Maximum simultaneously open positions.
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    /// Cap on any single position as bps of total portfolio value,
    /// evaluated pre-trade. 10_000 bps = no cap below full portfolio.
    #[serde(default = "default_max_position_size_bps")]
    pub max_position_size_bps: i64,

    /// Flat fee per executed order.
    #[serde(default)]
    pub commission: Micros,

    /// Execution-price deviation, unfavorable in both directions.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: i64,

    /// Annual risk-free rate for Sharpe/Sortino, in bps (400 = 4%).
    #[serde(default = "default_risk_free_rate_bps")]
    pub risk_free_rate_bps: i64,
}

fn default_initial_capital() -> Micros {
    Micros::from_dollars(50_000)
}

fn default_max_positions() -> usize {
    10
}

fn default_max_position_size_bps() -> i64 {
    2_000 // 20%
}

fn default_slippage_bps() -> i64 {
    10 // 0.1%
}

fn default_risk_free_rate_bps() -> i64 {
    400 // 4% annual
}

impl BacktestConfig {
    /// Validate all invariants. Called by the engine before any day runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_capital.is_positive() {
            return Err(ConfigError::NonPositiveCapital {
                capital: self.initial_capital,
            });
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.max_positions == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_positions",
            });
        }
        if self.max_position_size_bps <= 0 || self.max_position_size_bps > BPS_SCALE {
            return Err(ConfigError::BpsOutOfRange {
                field: "max_position_size_bps",
                value: self.max_position_size_bps,
            });
        }
        // Negative slippage would make fills systematically favorable —
        // a look-ahead artifact, rejected unconditionally.
        if self.slippage_bps < 0 {
            return Err(ConfigError::BpsOutOfRange {
                field: "slippage_bps",
                value: self.slippage_bps,
            });
        }
        if self.commission.is_negative() {
            return Err(ConfigError::NegativeCost {
                field: "commission",
                value: self.commission,
            });
        }
        if self.risk_free_rate_bps < 0 {
            return Err(ConfigError::BpsOutOfRange {
                field: "risk_free_rate_bps",
                value: self.risk_free_rate_bps,
            });
        }
        Ok(())
    }

    /// Reasonable defaults for testing.
    pub fn test_defaults() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
            initial_capital: default_initial_capital(),
            max_positions: default_max_positions(),
            max_position_size_bps: default_max_position_size_bps(),
            commission: Micros::ZERO,
            slippage_bps: 0,
            risk_free_rate_bps: default_risk_free_rate_bps(),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy configuration
// ---------------------------------------------------------------------------

/// Knobs for the highest-gainer strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Exit when unrealized gain reaches this many bps (500 = +5%).
    #[serde(default = "default_gain_threshold_bps")]
    pub gain_threshold_bps: i64,

    /// Optional stop loss in bps of cost basis (positive number).
    #[serde(default)]
    pub stop_loss_bps: Option<i64>,

    /// Optional maximum holding period in whole days.
    #[serde(default)]
    pub max_holding_days: Option<i64>,

    /// Candidates below this price are filtered out.
    #[serde(default = "default_min_price")]
    pub min_price: Micros,

    /// Optional upper price filter.
    #[serde(default)]
    pub max_price: Option<Micros>,

    /// Optional minimum daily volume filter.
    #[serde(default)]
    pub min_volume: Option<i64>,

    /// Trailing window (calendar days) for the gain ranking.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,

    /// New entries proposed per day, at most.
    #[serde(default = "default_stocks_per_day")]
    pub stocks_per_day: usize,
}

fn default_gain_threshold_bps() -> i64 {
    500 // +5%
}

fn default_min_price() -> Micros {
    Micros::from_dollars(5)
}

fn default_lookback_days() -> u64 {
    1
}

fn default_stocks_per_day() -> usize {
    1
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gain_threshold_bps <= 0 {
            return Err(ConfigError::NonPositive {
                field: "gain_threshold_bps",
            });
        }
        if let Some(sl) = self.stop_loss_bps {
            if sl <= 0 {
                return Err(ConfigError::NonPositive {
                    field: "stop_loss_bps",
                });
            }
        }
        if let Some(days) = self.max_holding_days {
            if days <= 0 {
                return Err(ConfigError::NonPositive {
                    field: "max_holding_days",
                });
            }
        }
        if !self.min_price.is_positive() {
            return Err(ConfigError::NonPositive { field: "min_price" });
        }
        if let Some(max) = self.max_price {
            if max < self.min_price {
                return Err(ConfigError::NonPositive { field: "max_price" });
            }
        }
        if let Some(v) = self.min_volume {
            if v <= 0 {
                return Err(ConfigError::NonPositive { field: "min_volume" });
            }
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::NonPositive {
                field: "lookback_days",
            });
        }
        if self.stocks_per_day == 0 {
            return Err(ConfigError::NonPositive {
                field: "stocks_per_day",
            });
        }
        Ok(())
    }

    pub fn test_defaults() -> Self {
        Self {
            gain_threshold_bps: default_gain_threshold_bps(),
            stop_loss_bps: None,
            max_holding_days: None,
            min_price: default_min_price(),
            max_price: None,
            min_volume: None,
            lookback_days: default_lookback_days(),
            stocks_per_day: default_stocks_per_day(),
        }
    }
}

// ---------------------------------------------------------------------------
// Combined run configuration (one YAML file)
// ---------------------------------------------------------------------------

/// The whole configuration for one run, as loaded from a YAML file with
/// `backtest:` and `strategy:` sections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub backtest: BacktestConfig,
    #[serde(default = "StrategyConfig::test_defaults")]
    pub strategy: StrategyConfig,
}

impl RunConfig {
    /// Parse and validate from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: RunConfig = serde_yaml::from_str(yaml).context("parse run config yaml")?;
        cfg.backtest.validate()?;
        cfg.strategy.validate()?;
        Ok(cfg)
    }

    /// Load, parse and validate a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
