//! Open positions of the selected account and the close flow.
//!
//! The list is only ever replaced by a full re-query; closing a position never
//! removes it locally.

use crate::chain::{ChainError, TxReceipt};
use crate::domain::normalize::{decimal_leverage, normalize_amount, COLLATERAL_DECIMALS, PRICE_DECIMALS};
use crate::domain::{Decimal, Market, MarketIdx, OpenPosition};
use crate::engine::{DerivedValuation, Valuator};
use crate::orchestration::last_of_calls::{LastOfCalls, Outcome, Ticket};
use crate::orchestration::notify::{Event, Notifier};
use crate::orchestration::prices::PriceBook;
use crate::orchestration::wallet::{AccountContext, WalletSession};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("No account selected")]
    NoAccount,
    #[error("Position {0} could not be converted")]
    Malformed(u64),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("Position {0} is already closing")]
    InProgress(u64),
    #[error("No account selected")]
    NoAccount,
    #[error("Unknown position {0}")]
    UnknownPosition(u64),
    #[error("No live price for market {0}")]
    NoPrice(MarketIdx),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Per-position close state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseStatus {
    #[default]
    Idle,
    Closing,
    Closed,
    Failed,
}

/// One row of the positions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    #[serde(flatten)]
    pub position: OpenPosition,
    pub ticker: Option<&'static str>,
    pub open_price_display: Option<Decimal>,
    pub mark_price_display: Option<Decimal>,
    pub liq_price_display: Option<Decimal>,
    pub size: Option<Decimal>,
    pub valuation: DerivedValuation,
    pub close_status: CloseStatus,
}

/// Notional size in USD at list level: `initial_collateral * leverage / 10^6`, 2 decimals.
pub fn count_size(initial_collateral: Decimal, leverage_raw: Decimal) -> Option<Decimal> {
    Some(
        initial_collateral
            .checked_mul(decimal_leverage(leverage_raw)?)?
            .checked_div(Decimal::pow10(COLLATERAL_DECIMALS)?)?
            .round_dp(2),
    )
}

#[derive(Debug, Default)]
struct ListState {
    positions: Vec<OpenPosition>,
    loading: bool,
}

pub struct PositionsBook {
    wallet: Arc<WalletSession>,
    prices: Arc<PriceBook>,
    notifier: Arc<Notifier>,
    valuator: Valuator,
    max_pnl_rate: Option<Decimal>,
    settle_delay: Duration,
    list: RwLock<ListState>,
    closing: RwLock<HashMap<u64, CloseStatus>>,
    refresh_guard: LastOfCalls,
    debounce_guard: LastOfCalls,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub struct PositionsSettings {
    pub max_pnl_rate: Option<Decimal>,
    pub settle_delay: Duration,
    pub debounce: Duration,
    pub cache_size: usize,
}

impl PositionsBook {
    pub fn new(
        wallet: Arc<WalletSession>,
        prices: Arc<PriceBook>,
        notifier: Arc<Notifier>,
        settings: PositionsSettings,
    ) -> Self {
        Self {
            wallet,
            prices,
            notifier,
            valuator: Valuator::new(settings.cache_size),
            max_pnl_rate: settings.max_pnl_rate,
            settle_delay: settings.settle_delay,
            list: RwLock::new(ListState::default()),
            closing: RwLock::new(HashMap::new()),
            refresh_guard: LastOfCalls::new(),
            debounce_guard: LastOfCalls::with_delay(settings.debounce),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub async fn positions(&self) -> Vec<OpenPosition> {
        self.list.read().await.positions.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.list.read().await.loading
    }

    pub async fn close_status(&self, id: u64) -> CloseStatus {
        self.closing.read().await.get(&id).copied().unwrap_or_default()
    }

    /// Positions with every derived figure, for display.
    pub async fn views(&self) -> Vec<PositionView> {
        let positions = self.positions().await;
        let closing = self.closing.read().await.clone();
        positions
            .into_iter()
            .map(|position| {
                let valuation = self.valuator.value(&position, self.max_pnl_rate);
                PositionView {
                    ticker: Market::from_idx(position.market_idx).map(|m| m.ticker()),
                    open_price_display: position.open_price_display(),
                    mark_price_display: position.mark_price_display(),
                    liq_price_display: position.liq_price_display(),
                    size: count_size(position.initial_collateral, position.leverage),
                    close_status: closing.get(&position.id).copied().unwrap_or_default(),
                    valuation,
                    position,
                }
            })
            .collect()
    }

    /// Re-query and revalue every position of the selected account.
    ///
    /// Silent refreshes leave the loading flag alone. On failure the previous
    /// list stays in place.
    pub async fn refresh(&self, silent: bool) -> Result<Outcome<usize>, RefreshError> {
        let ticket = self.refresh_guard.begin();
        self.refresh_with(ticket, silent).await
    }

    /// Account changed: drop the old list, then load the new one.
    pub async fn reload(&self) -> Result<Outcome<usize>, RefreshError> {
        self.closing.write().await.clear();
        self.list.write().await.positions.clear();
        self.refresh(false).await
    }

    /// Refresh once calls stop arriving for the debounce delay.
    pub async fn debounced_refresh(&self) -> Result<Outcome<usize>, RefreshError> {
        let ticket = self.debounce_guard.begin();
        if !self.debounce_guard.settle(ticket).await {
            return Ok(Outcome::Skipped);
        }
        self.refresh(false).await
    }

    async fn refresh_with(&self, ticket: Ticket, silent: bool) -> Result<Outcome<usize>, RefreshError> {
        if !silent {
            self.list.write().await.loading = true;
        }

        let result = self.fetch().await;

        let mut list = self.list.write().await;
        if !silent {
            list.loading = false;
        }
        match result {
            Ok(positions) => {
                if !self.refresh_guard.is_current(ticket) {
                    debug!("Positions refresh superseded");
                    return Ok(Outcome::Skipped);
                }
                let count = positions.len();
                self.closing.write().await.retain(|id, status| {
                    *status == CloseStatus::Closing || positions.iter().any(|p| p.id == *id)
                });
                list.positions = positions;
                Ok(Outcome::Applied(count))
            }
            Err(e) => {
                error!(error = %e, "Positions refresh failed");
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<OpenPosition>, RefreshError> {
        let ctx = self.wallet.context().await.ok_or(RefreshError::NoAccount)?;
        let slots = ctx.vault.positions(&ctx.account).await?;
        let prices = self.prices.snapshot().await;

        let records: Vec<_> = slots
            .into_iter()
            .filter(|slot| slot.is_some && slot.value.owner == ctx.account)
            .map(|slot| slot.value)
            .collect();

        let valuations = records.iter().map(|record| {
            let mark_price = prices
                .get(&record.market_idx)
                .and_then(|p| normalize_amount(*p, PRICE_DECIMALS))
                .and_then(|p| p.to_u128())
                .unwrap_or(0);
            ctx.vault.pnl_and_liq(record, mark_price)
        });
        let valuations = try_join_all(valuations).await?;

        records
            .iter()
            .zip(valuations.iter())
            .map(|(record, valuation)| {
                OpenPosition::from_chain(record, valuation).ok_or(RefreshError::Malformed(record.id))
            })
            .collect()
    }

    /// Close a position at the live price of its market.
    ///
    /// The price is checked before anything is sent. After the transaction the
    /// list is refreshed once the vault has had time to settle.
    pub async fn close_pos(&self, id: u64) -> Result<TxReceipt, CloseError> {
        let precheck = self.close_precheck(id).await;
        let (ctx, mark_price) = match precheck {
            Ok(ready) => ready,
            Err(e) => {
                warn!(id, reason = %e, "Position close not sent");
                if !matches!(e, CloseError::InProgress(_)) {
                    self.notifier.error("Position close canceled");
                }
                return Err(e);
            }
        };

        self.notifier.info("Position close request sent", None);
        let result = ctx.vault.close_position(id, mark_price).await;

        match result {
            Ok(receipt) => {
                info!(id, tx_hash = %receipt.tx_hash, "Position closed");
                tokio::time::sleep(self.settle_delay).await;
                if let Err(e) = self.refresh(false).await {
                    warn!(id, error = %e, "Refresh after close failed");
                }
                self.closing.write().await.insert(id, CloseStatus::Closed);
                self.notifier.success("Position removed!", None);
                Ok(receipt)
            }
            Err(e) => {
                error!(id, error = %e, "Position close failed");
                self.closing.write().await.insert(id, CloseStatus::Failed);
                self.notifier.error("Position close failed");
                Err(e.into())
            }
        }
    }

    async fn close_precheck(&self, id: u64) -> Result<(AccountContext, u128), CloseError> {
        let ctx = self.wallet.context().await.ok_or(CloseError::NoAccount)?;
        let market_idx = self
            .list
            .read()
            .await
            .positions
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.market_idx)
            .ok_or(CloseError::UnknownPosition(id))?;
        let mark_price = self
            .prices
            .price_normalized(market_idx)
            .await
            .ok_or(CloseError::NoPrice(market_idx))?;

        let mut closing = self.closing.write().await;
        if closing.get(&id) == Some(&CloseStatus::Closing) {
            return Err(CloseError::InProgress(id));
        }
        closing.insert(id, CloseStatus::Closing);
        Ok((ctx, mark_price))
    }

    /// Refresh on deposit success, debounced.
    pub fn spawn_event_listener(self: &Arc<Self>) {
        let book = Arc::clone(self);
        let mut events = self.notifier.subscribe_events();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Event::DepositSuccess { id }) => {
                        debug!(id, "Deposit confirmed, scheduling positions refresh");
                        let pending = Arc::clone(&book);
                        book.track(tokio::spawn(async move {
                            let _ = pending.debounced_refresh().await;
                        }));
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event listener lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.track(handle);
    }

    /// Silent refresh every `interval`.
    pub fn spawn_auto_resync(self: &Arc<Self>, interval: Duration) {
        let book = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the initial load is done by `reload`.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = book.refresh(true).await {
                    debug!(error = %e, "Silent positions resync failed");
                }
            }
        });
        self.track(handle);
    }

    pub fn stop(&self) {
        for handle in self.tasks.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            handle.abort();
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_count_size() {
        // 1000 USDC at 10x
        assert_eq!(
            count_size(d("1000000000"), d("10000000")),
            Some(d("10000"))
        );
        assert_eq!(count_size(d("1234567"), d("2500000")), Some(d("3.09")));
    }
}
