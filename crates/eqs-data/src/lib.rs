//! eqs-data
//!
//! Market-data boundary for the simulator:
//! - `DataSource`: the capability the engine and strategies consume
//! - `PriceTable`: deterministic in-memory implementation
//! - CSV bar loading (decimal strings, never floats)
//!
//! The anti-look-ahead contract lives here: a lookup at `date` may only
//! ever resolve to data on or before `date`.

mod loader;
mod source;
mod table;

pub use loader::{load_csv_file, parse_csv_bars, LoadError};
pub use source::{DataSource, PriceKind};
pub use table::{DailyBar, PriceTable, STALE_WINDOW_DAYS};
