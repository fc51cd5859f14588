//! Domain types for the trading terminal.
//!
//! This module provides:
//! - Exact numeric handling via the Decimal wrapper and optional combinators
//! - Fixed-point normalization at the contract's decimal widths
//! - Domain primitives: Address, MarketIdx, Market, PositionType
//! - Market and position records as the vault returns them

pub mod decimal;
pub mod market;
pub mod maybe;
pub mod normalize;
pub mod position;
pub mod primitives;

pub use decimal::Decimal;
pub use market::{MarketSnapshot, RawMarket};
pub use maybe::{map2, map3};
pub use normalize::NormalizedAmount;
pub use position::{MaybePosition, OpenPosition, PnlAndLiq, PositionRecord, PositionRequest};
pub use primitives::{Address, AddressParseError, Market, MarketIdx, PositionType};
