use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use eqs_models::Micros;

use crate::source::{DataSource, PriceKind};

/// How far back an on-or-before lookup may reach before a bar is
/// considered stale and the lookup answers "no data". Covers weekends
/// and ordinary holiday runs without letting a delisted symbol keep
/// trading on a months-old quote.
pub const STALE_WINDOW_DAYS: u64 = 7;

/// One daily OHLCV bar (reduced to the fields the simulation reads).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DailyBar {
    pub open: Micros,
    pub close: Micros,
    pub volume: i64,
}

/// Deterministic in-memory [`DataSource`].
///
/// Nested `BTreeMap`s keep both symbol iteration and date-range scans in
/// a fixed order, so two runs over the same data always see identical
/// lookups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceTable {
    bars: BTreeMap<String, BTreeMap<NaiveDate, DailyBar>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the bar for `(symbol, date)`.
    pub fn insert(&mut self, symbol: impl Into<String>, date: NaiveDate, bar: DailyBar) {
        self.bars.entry(symbol.into()).or_default().insert(date, bar);
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.bars.len()
    }

    pub fn bar_count(&self, symbol: &str) -> usize {
        self.bars.get(symbol).map(|m| m.len()).unwrap_or(0)
    }

    /// First/last bar dates for a symbol, if any bars exist.
    pub fn date_range(&self, symbol: &str) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.bars.get(symbol)?;
        let first = *days.keys().next()?;
        let last = *days.keys().next_back()?;
        Some((first, last))
    }

    /// Most recent bar on or before `date`, within the staleness window.
    fn bar_at(&self, symbol: &str, date: NaiveDate) -> Option<(NaiveDate, DailyBar)> {
        let days = self.bars.get(symbol)?;
        let (bar_date, bar) = days.range(..=date).next_back()?;
        let oldest_usable = date.checked_sub_days(Days::new(STALE_WINDOW_DAYS))?;
        if *bar_date < oldest_usable {
            return None;
        }
        Some((*bar_date, *bar))
    }
}

impl DataSource for PriceTable {
    fn price_at(&self, symbol: &str, date: NaiveDate, kind: PriceKind) -> Option<Micros> {
        let (bar_date, bar) = self.bar_at(symbol, date)?;
        match kind {
            // An opening price only exists for the exact day: yesterday's
            // open is not a usable stand-in for today's.
            PriceKind::Open if bar_date == date => Some(bar.open),
            PriceKind::Open => None,
            PriceKind::Close => Some(bar.close),
        }
    }

    fn volume_at(&self, symbol: &str, date: NaiveDate) -> Option<i64> {
        self.bar_at(symbol, date).map(|(_, bar)| bar.volume)
    }

    fn symbols(&self) -> Vec<String> {
        self.bars.keys().cloned().collect()
    }
}
