//! In-memory vault and wallets for local runs and tests.
//!
//! Positions are opened in two steps like on chain: `open_position` parks the
//! record under its secret hash, `resolve_open_position` reveals the secret and
//! makes it visible to `positions`.

use super::{hash_secret, ChainError, NoteRequest, TxReceipt, Vault, Wallet, WalletProvider};
use crate::domain::normalize::{COLLATERAL_DECIMALS, LEVERAGE_DECIMALS, PERCENT_DECIMALS, PRICE_DECIMALS};
use crate::domain::{
    Address, Decimal, MarketIdx, MarketSnapshot, MaybePosition, PnlAndLiq, PositionRecord,
    PositionRequest, RawMarket,
};
use crate::engine::sizing::{self, LiquidationParams};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 90% at the 10^12 rate scale.
const LIQUIDATION_THRESHOLD_RATE: u128 = 900_000_000_000;

/// Calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxCall {
    Accounts,
    GetWallet,
    GetVault,
    Market,
    Positions,
    PnlAndLiq,
    ConstructPosition,
    SerializePos,
    OpenPosition,
    AddNote,
    ResolveOpenPosition,
    ClosePosition,
}

/// Sending call recorded by the sandbox, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentTx {
    OpenPosition { id: u64 },
    ResolveOpenPosition { id: u64 },
    ClosePosition { id: u64, mark_price: u128 },
}

#[derive(Default)]
struct SandboxState {
    markets: HashMap<MarketIdx, RawMarket>,
    positions: Vec<MaybePosition>,
    pending: HashMap<String, PositionRecord>,
    notes: Vec<NoteRequest>,
    sent: Vec<SentTx>,
    failures: HashSet<SandboxCall>,
    tx_counter: u128,
}

impl SandboxState {
    fn check(&self, call: SandboxCall) -> Result<(), ChainError> {
        if self.failures.contains(&call) {
            return Err(ChainError::Rpc(format!("{:?} failed", call)));
        }
        Ok(())
    }

    fn next_tx_hash(&mut self) -> String {
        self.tx_counter += 1;
        Address::from_field(self.tx_counter).to_string()
    }

    fn raw_market(&self, idx: MarketIdx) -> Result<RawMarket, ChainError> {
        self.markets
            .get(&idx)
            .copied()
            .ok_or_else(|| ChainError::NotFound(format!("market {}", idx)))
    }
}

/// Market defaults: 0.1% open fee, 0.05% base spread, 100x max leverage.
pub fn default_raw_market() -> RawMarket {
    RawMarket {
        base_spread_rate: 500_000_000,
        max_leverage: 100_000_000,
        max_total_longs: 10_000_000_000_000,
        max_total_shorts: 10_000_000_000_000,
        open_fee_rate: 1_000_000_000,
        total_longs: 0,
        total_shorts: 0,
    }
}

#[derive(Clone)]
pub struct SandboxChain {
    state: Arc<Mutex<SandboxState>>,
    accounts: Vec<Address>,
    vault_address: Address,
}

impl SandboxChain {
    /// Sandbox with `accounts` accounts and the three default markets.
    pub fn new(accounts: usize) -> Self {
        let mut state = SandboxState::default();
        for idx in 1..=3 {
            state.markets.insert(MarketIdx(idx), default_raw_market());
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            accounts: (0..accounts as u128)
                .map(|i| Address::from_field(0x1000 + i))
                .collect(),
            vault_address: Address::from_field(0x7a017),
        }
    }

    pub fn with_market(self, idx: MarketIdx, market: RawMarket) -> Self {
        self.lock().markets.insert(idx, market);
        self
    }

    /// Place a resolved position directly, bypassing the open flow.
    pub fn with_position(self, record: PositionRecord) -> Self {
        self.lock().positions.push(MaybePosition {
            is_some: true,
            value: record,
        });
        self
    }

    /// Add an empty slot to the position query results.
    pub fn with_empty_slot(self) -> Self {
        let blank = blank_record(self.vault_address.clone());
        self.lock().positions.push(MaybePosition {
            is_some: false,
            value: blank,
        });
        self
    }

    pub fn fail_on(&self, call: SandboxCall) {
        self.lock().failures.insert(call);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn account(&self, i: usize) -> Option<Address> {
        self.accounts.get(i).cloned()
    }

    pub fn vault_address(&self) -> &Address {
        &self.vault_address
    }

    pub fn sent_txs(&self) -> Vec<SentTx> {
        self.lock().sent.clone()
    }

    pub fn notes(&self) -> Vec<NoteRequest> {
        self.lock().notes.clone()
    }

    /// Resolved positions still open.
    pub fn open_records(&self) -> Vec<PositionRecord> {
        self.lock()
            .positions
            .iter()
            .filter(|p| p.is_some)
            .map(|p| p.value.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_account(&self, account: &Address) -> Result<(), ChainError> {
        if self.accounts.contains(account) {
            Ok(())
        } else {
            Err(ChainError::NotFound(format!("account {}", account)))
        }
    }
}

#[async_trait]
impl WalletProvider for SandboxChain {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.lock().check(SandboxCall::Accounts)?;
        Ok(self.accounts.clone())
    }

    async fn get_wallet(&self, account: &Address) -> Result<Arc<dyn Wallet>, ChainError> {
        self.lock().check(SandboxCall::GetWallet)?;
        self.ensure_account(account)?;
        Ok(Arc::new(SandboxWallet {
            account: account.clone(),
            state: self.state.clone(),
        }))
    }

    async fn get_vault(&self, account: &Address) -> Result<Arc<dyn Vault>, ChainError> {
        self.lock().check(SandboxCall::GetVault)?;
        self.ensure_account(account)?;
        Ok(Arc::new(SandboxVault {
            account: account.clone(),
            address: self.vault_address.clone(),
            state: self.state.clone(),
        }))
    }
}

struct SandboxWallet {
    account: Address,
    state: Arc<Mutex<SandboxState>>,
}

#[async_trait]
impl Wallet for SandboxWallet {
    fn address(&self) -> &Address {
        &self.account
    }

    async fn add_note(&self, note: NoteRequest) -> Result<(), ChainError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.check(SandboxCall::AddNote)?;
        debug!(owner = %note.owner, slot = note.storage_slot, "Note added");
        state.notes.push(note);
        Ok(())
    }
}

struct SandboxVault {
    account: Address,
    address: Address,
    state: Arc<Mutex<SandboxState>>,
}

impl SandboxVault {
    fn lock(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Vault for SandboxVault {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn market(&self, idx: MarketIdx) -> Result<RawMarket, ChainError> {
        let state = self.lock();
        state.check(SandboxCall::Market)?;
        state.raw_market(idx)
    }

    async fn positions(&self, _owner: &Address) -> Result<Vec<MaybePosition>, ChainError> {
        let state = self.lock();
        state.check(SandboxCall::Positions)?;
        Ok(state.positions.clone())
    }

    async fn pnl_and_liq(&self, record: &PositionRecord, mark_price: u128) -> Result<PnlAndLiq, ChainError> {
        let state = self.lock();
        state.check(SandboxCall::PnlAndLiq)?;
        let market = state.raw_market(record.market_idx)?;
        value_position(record, &market, mark_price).ok_or_else(overflow)
    }

    async fn construct_position(&self, request: &PositionRequest) -> Result<PositionRecord, ChainError> {
        let state = self.lock();
        state.check(SandboxCall::ConstructPosition)?;
        let market = state.raw_market(request.market_idx)?;
        construct(request, &market).ok_or_else(overflow)
    }

    async fn serialize_pos(&self, record: &PositionRecord) -> Result<Vec<String>, ChainError> {
        self.lock().check(SandboxCall::SerializePos)?;
        Ok(serialize(record))
    }

    async fn open_position(&self, request: &PositionRequest) -> Result<TxReceipt, ChainError> {
        let mut state = self.lock();
        state.check(SandboxCall::OpenPosition)?;
        if request.owner != self.account {
            return Err(ChainError::Rejected("owner is not the sender".to_string()));
        }
        let mut market = state.raw_market(request.market_idx)?;
        let record = construct(request, &market).ok_or_else(overflow)?;

        let size = open_interest_delta(&record).ok_or_else(overflow)?;
        if record.pos_type.is_long() {
            market.total_longs += size;
        } else {
            market.total_shorts += size;
        }
        state.markets.insert(request.market_idx, market);

        state.pending.insert(record.secret_hash.clone(), record);
        state.sent.push(SentTx::OpenPosition { id: request.id });
        Ok(TxReceipt {
            tx_hash: state.next_tx_hash(),
        })
    }

    async fn resolve_open_position(&self, secret: &str) -> Result<TxReceipt, ChainError> {
        let mut state = self.lock();
        state.check(SandboxCall::ResolveOpenPosition)?;
        let bytes =
            hex::decode(secret).map_err(|_| ChainError::Rejected("malformed secret".to_string()))?;
        let mut record = state
            .pending
            .remove(&hash_secret(&bytes))
            .ok_or_else(|| ChainError::NotFound("pending position".to_string()))?;
        record.secret = Some(secret.to_string());

        let id = record.id;
        state.positions.push(MaybePosition {
            is_some: true,
            value: record,
        });
        state.sent.push(SentTx::ResolveOpenPosition { id });
        Ok(TxReceipt {
            tx_hash: state.next_tx_hash(),
        })
    }

    async fn close_position(&self, id: u64, mark_price: u128) -> Result<TxReceipt, ChainError> {
        let mut state = self.lock();
        state.check(SandboxCall::ClosePosition)?;
        let slot = state
            .positions
            .iter()
            .position(|p| p.is_some && p.value.id == id)
            .ok_or_else(|| ChainError::NotFound(format!("position {}", id)))?;
        if state.positions[slot].value.owner != self.account {
            return Err(ChainError::Rejected("position belongs to another account".to_string()));
        }
        state.positions.remove(slot);
        state.sent.push(SentTx::ClosePosition { id, mark_price });
        Ok(TxReceipt {
            tx_hash: state.next_tx_hash(),
        })
    }
}

fn overflow() -> ChainError {
    ChainError::Rpc("arithmetic overflow".to_string())
}

fn scaled(raw: u128, decimals: u32) -> Option<Decimal> {
    Decimal::from_u128(raw)?.checked_div(Decimal::pow10(decimals)?)
}

fn construct(request: &PositionRequest, market: &RawMarket) -> Option<PositionRecord> {
    let leverage = scaled(request.leverage, LEVERAGE_DECIMALS)?;
    let fee_rate = scaled(market.open_fee_rate, PERCENT_DECIMALS)?;
    let open_fee = sizing::open_fee(Decimal::from_u128(request.collateral)?, leverage, fee_rate)?;
    Some(PositionRecord {
        id: request.id,
        market_idx: request.market_idx,
        pos_type: request.pos_type,
        initial_collateral: request.collateral,
        open_fee: open_fee.round_down(0).to_u128()?,
        open_price: request.open_price,
        mark_price: 0,
        leverage: request.leverage,
        liquidation_threshold_rate: LIQUIDATION_THRESHOLD_RATE,
        owner: request.owner.clone(),
        secret_hash: request.secret_hash.clone(),
        secret: None,
    })
}

/// Net position size in collateral units.
fn open_interest_delta(record: &PositionRecord) -> Option<u128> {
    let net = Decimal::from_u128(record.initial_collateral)?.checked_sub(Decimal::from_u128(record.open_fee)?)?;
    net.checked_mul(scaled(record.leverage, LEVERAGE_DECIMALS)?)?
        .round_down(0)
        .to_u128()
}

fn value_position(record: &PositionRecord, market: &RawMarket, mark_price: u128) -> Option<PnlAndLiq> {
    let mark_raw = if mark_price == 0 { record.open_price } else { mark_price };
    let open = scaled(record.open_price, PRICE_DECIMALS)?;
    let mark = scaled(mark_raw, PRICE_DECIMALS)?;
    let collateral = scaled(record.initial_collateral, COLLATERAL_DECIMALS)?;
    let open_fee = scaled(record.open_fee, COLLATERAL_DECIMALS)?;
    let leverage = scaled(record.leverage, LEVERAGE_DECIMALS)?;

    let size = sizing::position_from_collateral(collateral, open_fee, leverage)?;
    let moved = mark.checked_sub(open)?.checked_mul(size)?.checked_div(open)?;
    let pnl = if record.pos_type.is_long() { moved } else { -moved };

    let snapshot = MarketSnapshot::from_raw(market, Decimal::one())?;
    let liq = sizing::liquidation_price(&LiquidationParams {
        collateral,
        open_fee,
        open_price: open,
        leverage,
        base_spread_percent: snapshot.base_spread_rate_percent,
        pos_type: record.pos_type,
    })?;
    // The vault reports liquidation prices with one extra decimal.
    let liq_raw = liq.checked_mul(Decimal::pow10(PRICE_DECIMALS + 1)?)?.round_down(0);

    Some(PnlAndLiq {
        pnl: pnl
            .abs()
            .checked_mul(Decimal::pow10(COLLATERAL_DECIMALS)?)?
            .round_down(0)
            .to_u128()?,
        positive: !pnl.is_negative(),
        liq_price: liq_raw.to_u128()?,
        mark_price: mark_raw,
    })
}

fn serialize(record: &PositionRecord) -> Vec<String> {
    let field = |v: u128| Address::from_field(v).to_string();
    vec![
        field(record.id as u128),
        field(record.market_idx.0 as u128),
        field(record.pos_type.as_raw() as u128),
        field(record.initial_collateral),
        field(record.open_fee),
        field(record.open_price),
        field(record.mark_price),
        field(record.leverage),
        field(record.liquidation_threshold_rate),
        record.owner.to_string(),
        record.secret_hash.clone(),
    ]
}

fn blank_record(owner: Address) -> PositionRecord {
    PositionRecord {
        id: 0,
        market_idx: MarketIdx(0),
        pos_type: Default::default(),
        initial_collateral: 0,
        open_fee: 0,
        open_price: 0,
        mark_price: 0,
        leverage: 0,
        liquidation_threshold_rate: 0,
        owner,
        secret_hash: String::new(),
        secret: None,
    }
}
