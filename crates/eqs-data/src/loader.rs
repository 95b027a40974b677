//! Daily-bar CSV loader (deterministic).
//!
//! CSV format
//!
//! Required columns:
//! - `symbol`
//! - `date` (`YYYY-MM-DD`)
//! - `open` (decimal string, e.g. `102.5` — parsed exactly, no floats)
//! - `close` (decimal string)
//!
//! Optional columns:
//! - `volume` (integer >= 0; default 0)
//!
//! Blank lines and lines starting with `#` are skipped. Quoted fields are
//! not supported; symbols and dates never contain commas.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use eqs_models::parse_micros;

use crate::table::{DailyBar, PriceTable};

/// Loader errors are small, explicit, and test-friendly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    EmptyInput,
    MissingHeader(&'static str),
    BadRow { line: usize, reason: String },
    Io(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::EmptyInput => write!(f, "empty input"),
            LoadError::MissingHeader(h) => write!(f, "missing header: {}", h),
            LoadError::BadRow { line, reason } => write!(f, "bad row at line {}: {}", line, reason),
            LoadError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

/// Load daily bars from a CSV file on disk into a [`PriceTable`].
///
/// IO is explicit; parsing is deterministic.
pub fn load_csv_file(path: impl AsRef<Path>) -> Result<PriceTable, LoadError> {
    let s = fs::read_to_string(path)?;
    parse_csv_bars(&s)
}

/// Parse daily bars from CSV content (pure, deterministic).
pub fn parse_csv_bars(csv: &str) -> Result<PriceTable, LoadError> {
    let mut lines = csv.lines();

    let header_line = lines.next().ok_or(LoadError::EmptyInput)?;
    // Normalize header: trim whitespace and strip UTF-8 BOM if present.
    let header_line = header_line.trim().trim_start_matches('\u{feff}');
    if header_line.is_empty() {
        return Err(LoadError::EmptyInput);
    }

    // Build header index map (case-insensitive, deterministic).
    let mut idx: BTreeMap<String, usize> = BTreeMap::new();
    for (i, h) in header_line.split(',').enumerate() {
        idx.insert(h.trim().to_ascii_lowercase(), i);
    }

    let col_symbol = *idx.get("symbol").ok_or(LoadError::MissingHeader("symbol"))?;
    let col_date = *idx.get("date").ok_or(LoadError::MissingHeader("date"))?;
    let col_open = *idx.get("open").ok_or(LoadError::MissingHeader("open"))?;
    let col_close = *idx.get("close").ok_or(LoadError::MissingHeader("close"))?;
    let col_volume = idx.get("volume").copied();

    let mut table = PriceTable::new();

    for (line_idx0, raw) in lines.enumerate() {
        let line_no = line_idx0 + 2; // 1-based, counting header as line 1

        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        let get = |col: usize, name: &str| -> Result<&str, LoadError> {
            fields.get(col).copied().ok_or_else(|| LoadError::BadRow {
                line: line_no,
                reason: format!("missing field '{name}'"),
            })
        };

        let symbol = get(col_symbol, "symbol")?;
        if symbol.is_empty() {
            return Err(LoadError::BadRow {
                line: line_no,
                reason: "empty symbol".to_string(),
            });
        }

        let date_raw = get(col_date, "date")?;
        let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d").map_err(|_| {
            LoadError::BadRow {
                line: line_no,
                reason: format!("cannot parse date '{date_raw}'"),
            }
        })?;

        let parse_price = |raw: &str, name: &str| {
            parse_micros(raw).map_err(|e| LoadError::BadRow {
                line: line_no,
                reason: format!("cannot parse {name}: {e}"),
            })
        };
        let open = parse_price(get(col_open, "open")?, "open")?;
        let close = parse_price(get(col_close, "close")?, "close")?;
        if !open.is_positive() || !close.is_positive() {
            return Err(LoadError::BadRow {
                line: line_no,
                reason: "prices must be > 0".to_string(),
            });
        }

        let volume = match col_volume {
            Some(col) => {
                let v = get(col, "volume")?;
                v.parse::<i64>().map_err(|_| LoadError::BadRow {
                    line: line_no,
                    reason: format!("cannot parse volume '{v}'"),
                })?
            }
            None => 0,
        };
        if volume < 0 {
            return Err(LoadError::BadRow {
                line: line_no,
                reason: format!("negative volume {volume}"),
            });
        }

        table.insert(symbol, date, DailyBar { open, close, volume });
    }

    Ok(table)
}
