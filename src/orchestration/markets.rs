//! Selected market and its parameter snapshot.

use crate::chain::Vault;
use crate::domain::{Decimal, Market, MarketIdx, MarketSnapshot, RawMarket};
use crate::engine::pricing;
use crate::orchestration::last_of_calls::{LastOfCalls, Outcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Synced {
    idx: MarketIdx,
    raw: RawMarket,
    snapshot: MarketSnapshot,
}

/// Market stats as shown next to the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketView {
    pub market_idx: MarketIdx,
    pub ticker: &'static str,
    pub feed_symbol: &'static str,
    pub chart_symbol: &'static str,
    pub price: Option<Decimal>,
    pub snapshot: Option<MarketSnapshot>,
    pub open_interest_longs_usd: Option<Decimal>,
    pub open_interest_shorts_usd: Option<Decimal>,
}

pub struct MarketBook {
    depth: Decimal,
    current: RwLock<Market>,
    synced: RwLock<Option<Synced>>,
    guard: LastOfCalls,
}

impl MarketBook {
    pub fn new(initial: Market, depth: Decimal) -> Self {
        Self {
            depth,
            current: RwLock::new(initial),
            synced: RwLock::new(None),
            guard: LastOfCalls::new(),
        }
    }

    pub async fn current(&self) -> Market {
        *self.current.read().await
    }

    /// Switch market. The snapshot is dropped until the next sync.
    pub async fn set_current(&self, market: Market) {
        *self.current.write().await = market;
        self.guard.cancel_all();
        *self.synced.write().await = None;
    }

    /// Snapshot of the current market, if it has been synced.
    pub async fn snapshot(&self) -> Option<MarketSnapshot> {
        let idx = self.current().await.idx();
        self.synced
            .read()
            .await
            .filter(|s| s.idx == idx)
            .map(|s| s.snapshot)
    }

    /// Fetch the current market's record through `vault`. Without a vault, or on
    /// failure, the snapshot is cleared.
    pub async fn sync(&self, vault: Option<Arc<dyn Vault>>) -> Outcome<bool> {
        let ticket = self.guard.begin();
        let idx = self.current().await.idx();

        let fetched = match vault {
            Some(vault) => match vault.market(idx).await {
                Ok(raw) => MarketSnapshot::from_raw(&raw, self.depth).map(|snapshot| Synced {
                    idx,
                    raw,
                    snapshot,
                }),
                Err(e) => {
                    warn!(market = %idx, error = %e, "Market sync failed");
                    None
                }
            },
            None => None,
        };

        let mut synced = self.synced.write().await;
        if !self.guard.is_current(ticket) {
            return Outcome::Skipped;
        }
        let ok = fetched.is_some();
        *synced = fetched;
        Outcome::Applied(ok)
    }

    pub async fn view(&self, price: Option<Decimal>) -> MarketView {
        let market = self.current().await;
        let synced = self.synced.read().await.filter(|s| s.idx == market.idx());
        let open_interest = |total: u128| {
            let total = Decimal::from_u128(total)?;
            pricing::open_interest_usd(total, price?)
        };
        MarketView {
            market_idx: market.idx(),
            ticker: market.ticker(),
            feed_symbol: market.feed_symbol(),
            chart_symbol: market.chart_symbol(),
            price,
            snapshot: synced.map(|s| s.snapshot),
            open_interest_longs_usd: synced.and_then(|s| open_interest(s.raw.total_longs)),
            open_interest_shorts_usd: synced.and_then(|s| open_interest(s.raw.total_shorts)),
        }
    }
}
