//! eqs-txlog
//!
//! Append-only transaction log. Every portfolio mutation and engine
//! milestone becomes one event, kept in memory and optionally mirrored
//! to a JSONL file (one event per line, keys sorted for stable diffs).
//!
//! The log is an observer: it never influences simulation results.
//! [`TransactionLog::record`] therefore absorbs IO failures with a
//! warning instead of propagating them into the trading path.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use eqs_models::{Micros, Side, Trade};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Everything the simulation reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TxEvent {
    /// Emitted once before the first simulated day.
    BacktestInit {
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_capital: Micros,
    },
    /// A strategy proposed an entry (not yet executed).
    Signal {
        date: NaiveDate,
        symbol: String,
        shares: i64,
        reason: String,
    },
    /// An order actually executed against the portfolio.
    Order {
        date: NaiveDate,
        symbol: String,
        side: Side,
        shares: i64,
        price: Micros,
        commission: Micros,
        cash_after: Micros,
    },
    /// An open position was re-marked to a new price.
    PositionUpdate {
        date: NaiveDate,
        symbol: String,
        shares: i64,
        price: Micros,
        value: Micros,
    },
    /// A position was fully closed; the realized trade record.
    TradeCompleted { trade: Trade },
    /// End-of-day portfolio valuation.
    Snapshot {
        date: NaiveDate,
        cash: Micros,
        positions_value: Micros,
        total_value: Micros,
        num_positions: usize,
    },
    /// Emitted once after the last simulated day.
    BacktestComplete {
        final_value: Micros,
        num_trades: usize,
    },
}

impl TxEvent {
    /// The wire tag, for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            TxEvent::BacktestInit { .. } => "backtest_init",
            TxEvent::Signal { .. } => "signal",
            TxEvent::Order { .. } => "order",
            TxEvent::PositionUpdate { .. } => "position_update",
            TxEvent::TradeCompleted { .. } => "trade_completed",
            TxEvent::Snapshot { .. } => "snapshot",
            TxEvent::BacktestComplete { .. } => "backtest_complete",
        }
    }

    /// The symbol an event concerns, when it concerns exactly one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            TxEvent::Signal { symbol, .. }
            | TxEvent::Order { symbol, .. }
            | TxEvent::PositionUpdate { symbol, .. } => Some(symbol),
            TxEvent::TradeCompleted { trade } => Some(&trade.symbol),
            _ => None,
        }
    }
}

/// One logged event with its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    /// 0-based position in this run's log.
    pub seq: u64,
    /// Wall-clock stamp (the only non-deterministic field in the system).
    pub ts_utc: DateTime<Utc>,
    #[serde(flatten)]
    pub event: TxEvent,
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// In-memory event log with an optional JSONL mirror on disk.
#[derive(Debug, Default)]
pub struct TransactionLog {
    records: Vec<TxRecord>,
    path: Option<PathBuf>,
}

impl TransactionLog {
    /// Memory-only log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log mirrored to a JSONL file; parent directories are created here
    /// so the first append cannot fail on a missing directory.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }
        Ok(Self {
            records: Vec::new(),
            path: Some(path),
        })
    }

    /// Append one event. Fails only on file IO.
    pub fn append(&mut self, event: TxEvent) -> Result<()> {
        let rec = TxRecord {
            seq: self.records.len() as u64,
            ts_utc: Utc::now(),
            event,
        };
        if let Some(path) = &self.path {
            let line = canonical_json_line(&rec)?;
            append_line(path, &line)?;
        }
        self.records.push(rec);
        Ok(())
    }

    /// Append, absorbing IO failure. The event is kept in memory either
    /// way, so queries over a run stay complete even with a dead disk.
    pub fn record(&mut self, event: TxEvent) {
        if let Err(e) = self.append(event) {
            warn!(error = %e, "transaction log write failed; continuing");
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TxRecord] {
        &self.records
    }

    /// All records with the given wire tag, in log order.
    pub fn events_by_type(&self, event_type: &str) -> Vec<&TxRecord> {
        self.records
            .iter()
            .filter(|r| r.event.event_type() == event_type)
            .collect()
    }

    /// All records concerning `symbol`, in log order.
    pub fn events_by_symbol(&self, symbol: &str) -> Vec<&TxRecord> {
        self.records
            .iter()
            .filter(|r| r.event.symbol() == Some(symbol))
            .collect()
    }
}

/// Parse a JSONL log back into records (inspection and tests).
pub fn parse_jsonl(content: &str) -> Result<Vec<TxRecord>> {
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let rec: TxRecord = serde_json::from_str(line)
            .with_context(|| format!("parse tx record at line {}", i + 1))?;
        out.push(rec);
    }
    Ok(out)
}

/// Write a single line to the file (with trailing newline).
fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open tx log {:?}", path))?;
    f.write_all(line.as_bytes()).context("write tx line")?;
    f.write_all(b"\n").context("write newline")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
/// One event == one JSON line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize tx record")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}
