//! eqs-strategy
//!
//! The strategy capability the engine depends on, plus the default
//! highest-gainer implementation. Strategies are read-only observers of
//! portfolio state: they propose entries and exit decisions, the engine
//! and portfolio decide what actually executes.

mod highest_gainer;
mod types;

pub use highest_gainer::HighestGainerStrategy;
pub use types::{EntrySignal, ExitReason, Strategy};
