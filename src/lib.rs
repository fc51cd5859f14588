pub mod api;
pub mod chain;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod feed;
pub mod orchestration;

pub use chain::{ChainError, SandboxChain, Vault, Wallet, WalletProvider};
pub use config::Config;
pub use domain::{Address, Decimal, Market, MarketIdx, MarketSnapshot, OpenPosition, PositionType};
pub use engine::{DepositDraft, DepositQuote, DerivedValuation, Valuator};
pub use error::AppError;
pub use feed::{BinancePriceFeed, FeedError, MockPriceFeed, PriceFeed};
pub use orchestration::TradingSession;
