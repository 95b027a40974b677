//! eqs-portfolio
//!
//! Cash + open positions + the realized trade and snapshot histories.
//! All mutation goes through [`Portfolio::buy`] / [`Portfolio::sell`] /
//! [`Portfolio::update_prices`] / [`Portfolio::take_snapshot`]; rejected
//! orders report failure and leave state untouched.

mod costs;
mod portfolio;

pub use costs::TradingCosts;
pub use portfolio::Portfolio;
