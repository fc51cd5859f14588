//! Order form state and the market-order submission flow.
//!
//! Submission runs `Idle -> Submitting -> Confirmed | Canceled`. Preconditions are
//! checked before anything is sent; once `open_position` is sent the flow cannot be
//! cancelled, and any later failure leaves the draft as it was.

use crate::chain::{hash_secret, ChainError, NoteRequest, TxReceipt, POSITION_NOTE_STORAGE_SLOT};
use crate::domain::{Decimal, Market, PositionRequest, PositionType};
use crate::engine::{DepositDraft, DepositQuote};
use crate::orchestration::markets::MarketBook;
use crate::orchestration::notify::{Event, Notifier};
use crate::orchestration::prices::PriceBook;
use crate::orchestration::wallet::{AccountContext, WalletSession};
use rand::{Rng, RngCore};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Largest integer a JSON number carries exactly (2^53 - 1).
const MAX_SAFE_ID: u64 = (1 << 53) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubmitStatus {
    Idle,
    Submitting,
    #[serde(rename_all = "camelCase")]
    Confirmed { id: u64, tx_hash: String },
    Canceled,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("A submission is already in progress")]
    InProgress,
    #[error("No account selected")]
    NoAccount,
    #[error("Collateral is not set")]
    MissingCollateral,
    #[error("Open price is not available")]
    MissingOpenPrice,
    #[error("Leverage is not set")]
    MissingLeverage,
    #[error("Order is not valid at the current price")]
    Disabled,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SubmitError {
    /// Failed before anything was sent.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, SubmitError::Chain(_))
    }
}

/// Fields of a draft update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    pub deposit_type: Option<PositionType>,
    pub leverage: Option<Option<Decimal>>,
    pub slippage: Option<Option<Decimal>>,
    pub collateral: Option<Option<Decimal>>,
    pub position: Option<Option<Decimal>>,
}

pub struct DepositDesk {
    draft: RwLock<DepositDraft>,
    status: RwLock<SubmitStatus>,
    wallet: Arc<WalletSession>,
    markets: Arc<MarketBook>,
    prices: Arc<PriceBook>,
    notifier: Arc<Notifier>,
}

impl DepositDesk {
    pub fn new(
        wallet: Arc<WalletSession>,
        markets: Arc<MarketBook>,
        prices: Arc<PriceBook>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            draft: RwLock::new(DepositDraft::default()),
            status: RwLock::new(SubmitStatus::Idle),
            wallet,
            markets,
            prices,
            notifier,
        }
    }

    pub async fn draft(&self) -> DepositDraft {
        self.draft.read().await.clone()
    }

    pub async fn status(&self) -> SubmitStatus {
        self.status.read().await.clone()
    }

    /// Apply an update in a fixed order: type, leverage, slippage, then the
    /// collateral or position side, which recomputes the other side.
    pub async fn update(&self, update: DraftUpdate) {
        let fee_rate = self.fee_rate().await;
        let mut draft = self.draft.write().await;
        if let Some(deposit_type) = update.deposit_type {
            draft.set_type(deposit_type);
        }
        if let Some(leverage) = update.leverage {
            draft.set_leverage(leverage, fee_rate);
        }
        if let Some(slippage) = update.slippage {
            draft.set_slippage(slippage);
        }
        if let Some(collateral) = update.collateral {
            draft.set_collateral(collateral, fee_rate);
        }
        if let Some(position) = update.position {
            draft.set_position(position, fee_rate);
        }
    }

    /// The draft valued against the current market snapshot and live price.
    pub async fn quote(&self) -> DepositQuote {
        let market = self.markets.current().await;
        let snapshot = self.markets.snapshot().await;
        let price = self.prices.price(market.idx()).await;
        let draft = self.draft.read().await;
        DepositQuote::compute(&draft, snapshot.as_ref(), price)
    }

    pub async fn submit(&self) -> Result<TxReceipt, SubmitError> {
        {
            let mut status = self.status.write().await;
            if *status == SubmitStatus::Submitting {
                return Err(SubmitError::InProgress);
            }
            *status = SubmitStatus::Submitting;
        }

        let prepared = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                info!(reason = %e, "Market order not sent");
                *self.status.write().await = SubmitStatus::Canceled;
                self.notifier.error("Market order canceled");
                return Err(e);
            }
        };

        self.notifier.info("Position request sent", None);
        let id = prepared.request.id;
        match self.send(&prepared).await {
            Ok(receipt) => {
                self.draft.write().await.clear_after_submit();
                *self.status.write().await = SubmitStatus::Confirmed {
                    id,
                    tx_hash: receipt.tx_hash.clone(),
                };
                self.notifier.success(
                    "Market order executed",
                    Some(format!(
                        "{} {} open at ${}",
                        prepared.market.ticker(),
                        prepared.request.pos_type,
                        prepared.open_price.to_canonical_string()
                    )),
                );
                self.notifier.emit(Event::DepositSuccess { id });
                Ok(receipt)
            }
            Err(e) => {
                error!(id, error = %e, "Market order failed");
                *self.status.write().await = SubmitStatus::Canceled;
                self.notifier.error("Market order canceled");
                Err(e.into())
            }
        }
    }

    async fn fee_rate(&self) -> Option<Decimal> {
        self.markets.snapshot().await.map(|m| m.open_fee_rate_percent)
    }

    async fn prepare(&self) -> Result<Prepared, SubmitError> {
        let ctx = self.wallet.context().await.ok_or(SubmitError::NoAccount)?;
        let market = self.markets.current().await;
        let quote = self.quote().await;

        let collateral = quote
            .collateral_normalized
            .and_then(|c| c.to_u128())
            .filter(|c| *c > 0)
            .ok_or(SubmitError::MissingCollateral)?;
        let open_price_raw = quote
            .open_price_normalized
            .and_then(|p| p.to_u128())
            .ok_or(SubmitError::MissingOpenPrice)?;
        let open_price = quote.open_price.ok_or(SubmitError::MissingOpenPrice)?;
        let leverage = quote
            .leverage_normalized
            .and_then(|l| l.to_u128())
            .ok_or(SubmitError::MissingLeverage)?;
        if !quote.is_enabled {
            return Err(SubmitError::Disabled);
        }

        let (id, secret) = {
            let mut rng = rand::thread_rng();
            let mut secret = [0u8; 32];
            rng.fill_bytes(&mut secret);
            (rng.gen_range(0..=MAX_SAFE_ID), secret)
        };

        Ok(Prepared {
            request: PositionRequest {
                id,
                collateral,
                market_idx: market.idx(),
                open_price: open_price_raw,
                pos_type: quote.deposit_type,
                leverage,
                owner: ctx.account.clone(),
                secret_hash: hash_secret(&secret),
            },
            secret: hex::encode(secret),
            market,
            open_price,
            ctx,
        })
    }

    async fn send(&self, prepared: &Prepared) -> Result<TxReceipt, ChainError> {
        let vault = &prepared.ctx.vault;
        let record = vault.construct_position(&prepared.request).await?;
        let preimage = vault.serialize_pos(&record).await?;

        let opened = vault.open_position(&prepared.request).await?;
        info!(id = prepared.request.id, tx_hash = %opened.tx_hash, "Position opened");

        prepared
            .ctx
            .wallet
            .add_note(NoteRequest {
                owner: prepared.ctx.account.clone(),
                contract: vault.address().clone(),
                storage_slot: POSITION_NOTE_STORAGE_SLOT,
                preimage,
                tx_hash: opened.tx_hash.clone(),
            })
            .await?;

        vault.resolve_open_position(&prepared.secret).await
    }
}

struct Prepared {
    request: PositionRequest,
    secret: String,
    market: Market,
    open_price: Decimal,
    ctx: AccountContext,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{SandboxCall, SandboxChain, SentTx};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    async fn desk(chain: &SandboxChain, price: Option<&str>) -> (DepositDesk, Arc<Notifier>) {
        let wallet = Arc::new(WalletSession::new(Arc::new(chain.clone())));
        wallet.connect().await.unwrap();
        // Deep book so the dynamic spread stays negligible.
        let markets = Arc::new(MarketBook::new(Market::Btc, d("1000000000")));
        markets.sync(wallet.context().await.map(|c| c.vault)).await;
        let prices = Arc::new(PriceBook::new());
        if let Some(price) = price {
            prices.set(Market::Btc.idx(), d(price)).await;
        }
        let notifier = Arc::new(Notifier::default());
        (
            DepositDesk::new(wallet, markets, prices, notifier.clone()),
            notifier,
        )
    }

    fn order(collateral: &str, leverage: &str) -> DraftUpdate {
        DraftUpdate {
            leverage: Some(Some(d(leverage))),
            collateral: Some(Some(d(collateral))),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_recomputes_position() {
        let chain = SandboxChain::new(1);
        let (desk, _) = desk(&chain, Some("30000")).await;
        desk.update(order("1000", "10")).await;
        assert_eq!(desk.draft().await.position, Some(d("9900")));
    }

    #[tokio::test]
    async fn test_submit_without_price_sends_nothing() {
        let chain = SandboxChain::new(1);
        let (desk, notifier) = desk(&chain, None).await;
        desk.update(order("1000", "10")).await;

        let err = desk.submit().await.unwrap_err();
        assert!(matches!(err, SubmitError::MissingOpenPrice));
        assert!(err.is_precondition());
        assert!(chain.sent_txs().is_empty());
        assert_eq!(desk.status().await, SubmitStatus::Canceled);
        assert_eq!(notifier.recent().last().unwrap().title, "Market order canceled");
    }

    #[tokio::test]
    async fn test_submit_success_clears_draft() {
        let chain = SandboxChain::new(1);
        let (desk, notifier) = desk(&chain, Some("30000")).await;
        let mut events = notifier.subscribe_events();
        desk.update(DraftUpdate {
            deposit_type: Some(PositionType::Short),
            ..order("1000", "10")
        })
        .await;

        desk.submit().await.unwrap();

        let draft = desk.draft().await;
        assert_eq!(draft.collateral, None);
        assert_eq!(draft.position, None);
        assert_eq!(draft.leverage, Some(d("1")));

        let sent = chain.sent_txs();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], SentTx::OpenPosition { .. }));
        assert!(matches!(sent[1], SentTx::ResolveOpenPosition { .. }));

        let notes = chain.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].storage_slot, 5);
        assert_eq!(&notes[0].contract, chain.vault_address());

        let records = chain.open_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].id <= MAX_SAFE_ID);
        assert_eq!(records[0].pos_type, PositionType::Short);

        let last = notifier.recent().last().cloned().unwrap();
        assert_eq!(last.title, "Market order executed");
        assert!(last.message.unwrap().starts_with("BTC Short open at $"));
        assert!(matches!(events.recv().await.unwrap(), Event::DepositSuccess { .. }));
    }

    #[tokio::test]
    async fn test_submit_failure_preserves_draft() {
        let chain = SandboxChain::new(1);
        let (desk, notifier) = desk(&chain, Some("30000")).await;
        desk.update(order("1000", "10")).await;
        chain.fail_on(SandboxCall::AddNote);

        let err = desk.submit().await.unwrap_err();
        assert!(matches!(err, SubmitError::Chain(_)));
        assert_eq!(desk.status().await, SubmitStatus::Canceled);

        let draft = desk.draft().await;
        assert_eq!(draft.collateral, Some(d("1000")));
        assert_eq!(draft.leverage, Some(d("10")));

        let titles: Vec<_> = notifier.recent().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Position request sent", "Market order canceled"]);
    }
}
