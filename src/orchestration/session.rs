use crate::chain::WalletProvider;
use crate::config::Config;
use crate::domain::{Address, Market};
use crate::feed::PriceFeed;
use crate::orchestration::deposit::DepositDesk;
use crate::orchestration::markets::MarketBook;
use crate::orchestration::notify::Notifier;
use crate::orchestration::positions::{PositionsBook, PositionsSettings};
use crate::orchestration::prices::{PriceBook, PricePoller};
use crate::orchestration::wallet::{WalletError, WalletSession};
use std::sync::Arc;
use tracing::{info, warn};

/// All stores of one trading terminal and the reactions between them.
pub struct TradingSession {
    pub wallet: Arc<WalletSession>,
    pub markets: Arc<MarketBook>,
    pub prices: Arc<PriceBook>,
    pub poller: Arc<PricePoller>,
    pub deposit: Arc<DepositDesk>,
    pub positions: Arc<PositionsBook>,
    pub notifier: Arc<Notifier>,
    config: Config,
}

impl TradingSession {
    pub fn new(config: Config, provider: Arc<dyn WalletProvider>, feed: Arc<dyn PriceFeed>) -> Self {
        let initial = Market::from_idx(config.default_market_idx).unwrap_or(Market::Btc);
        let wallet = Arc::new(WalletSession::new(provider));
        let markets = Arc::new(MarketBook::new(initial, config.market_depth));
        let prices = Arc::new(PriceBook::new());
        let poller = Arc::new(PricePoller::new(feed, prices.clone(), config.price_poll_interval));
        let notifier = Arc::new(Notifier::default());
        let deposit = Arc::new(DepositDesk::new(
            wallet.clone(),
            markets.clone(),
            prices.clone(),
            notifier.clone(),
        ));
        let positions = Arc::new(PositionsBook::new(
            wallet.clone(),
            prices.clone(),
            notifier.clone(),
            PositionsSettings {
                max_pnl_rate: config.max_pnl_rate,
                settle_delay: config.close_settle_delay,
                debounce: config.positions_debounce,
                cache_size: config.valuation_cache_size,
            },
        ));

        Self {
            wallet,
            markets,
            prices,
            poller,
            deposit,
            positions,
            notifier,
            config,
        }
    }

    /// Connect the wallet, load market and positions, and start the background loops.
    pub async fn start(&self) -> Result<(), WalletError> {
        let account = self.wallet.connect().await?;
        info!(account = ?account.as_ref().map(|a| a.to_string()), "Wallet connected");

        self.sync_market().await;
        self.reload_positions().await;
        self.poller.resync().await;
        self.positions.spawn_event_listener();
        self.positions.spawn_auto_resync(self.config.positions_resync_interval);
        Ok(())
    }

    pub fn stop(&self) {
        self.poller.stop();
        self.positions.stop();
    }

    /// Account change: new handles, fresh market snapshot, reloaded positions.
    pub async fn select_account(&self, account: &Address) -> Result<(), WalletError> {
        self.wallet.select(account).await?;
        self.sync_market().await;
        self.reload_positions().await;
        Ok(())
    }

    /// Market change: fresh snapshot and restarted price polling.
    pub async fn select_market(&self, market: Market) {
        self.markets.set_current(market).await;
        self.sync_market().await;
        self.poller.resync().await;
    }

    async fn sync_market(&self) {
        let vault = self.wallet.context().await.map(|ctx| ctx.vault);
        self.markets.sync(vault).await;
    }

    async fn reload_positions(&self) {
        if let Err(e) = self.positions.reload().await {
            warn!(error = %e, "Positions reload failed");
        }
    }
}

impl Drop for TradingSession {
    fn drop(&mut self) {
        self.stop();
    }
}
