//! Pure computation engines for the trading formulas.
//!
//! Nothing here suspends or touches shared state: every function maps explicit
//! snapshots to optional results.

pub mod memo;
pub mod pricing;
pub mod quote;
pub mod sizing;
pub mod valuation;

pub use memo::MemoCache;
pub use quote::{DepositDraft, DepositQuote};
pub use sizing::LiquidationParams;
pub use valuation::{DerivedValuation, ValuationInputs, Valuator};
