//! Stateful stores around the pure engines: wallet, market, prices, the order
//! form and the positions list, plus the session that wires their reactions.

pub mod deposit;
pub mod last_of_calls;
pub mod markets;
pub mod notify;
pub mod positions;
pub mod prices;
pub mod session;
pub mod wallet;

pub use deposit::{DepositDesk, DraftUpdate, SubmitError, SubmitStatus};
pub use last_of_calls::{LastOfCalls, Outcome};
pub use markets::{MarketBook, MarketView};
pub use notify::{Event, Notification, NotificationKind, Notifier};
pub use positions::{CloseError, CloseStatus, PositionView, PositionsBook, RefreshError};
pub use prices::{PriceBook, PricePoller};
pub use session::TradingSession;
pub use wallet::{AccountContext, WalletError, WalletSession};
