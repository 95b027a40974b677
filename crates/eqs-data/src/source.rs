use chrono::NaiveDate;

use eqs_models::Micros;

/// Which quote of a daily bar a lookup wants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PriceKind {
    Open,
    Close,
}

/// Read-only market-data capability.
///
/// Implementations must honor the anti-look-ahead contract: `price_at`
/// returns the most recent available price **on or before** `date`, never
/// a future one, and `None` when no qualifying data exists. Absence is
/// normal (weekends, holidays, listing gaps) and must never block.
///
/// Object-safe and `Send + Sync` so one source can be shared between the
/// engine and its strategy.
pub trait DataSource: Send + Sync {
    /// Best-available price at `date` (on-or-before semantics).
    fn price_at(&self, symbol: &str, date: NaiveDate, kind: PriceKind) -> Option<Micros>;

    /// Traded volume on the most recent bar on or before `date`.
    fn volume_at(&self, symbol: &str, date: NaiveDate) -> Option<i64> {
        let _ = (symbol, date);
        None
    }

    /// The candidate universe, in deterministic (sorted) order.
    fn symbols(&self) -> Vec<String>;
}
