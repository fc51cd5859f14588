//! Chain collaborators: account discovery, the wallet's note store and the vault contract.
//!
//! Contract calls come in two flavours. View calls (`market`, `positions`,
//! `pnl_and_liq`, `construct_position`, `serialize_pos`) return data; sending
//! calls (`open_position`, `resolve_open_position`, `close_position`) return
//! only once the transaction is mined, as a [`TxReceipt`].

use crate::domain::{
    Address, MarketIdx, MaybePosition, PnlAndLiq, PositionRecord, PositionRequest, RawMarket,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

pub mod sandbox;

pub use sandbox::{SandboxCall, SandboxChain, SentTx};

/// Storage slot of the vault's position notes.
pub const POSITION_NOTE_STORAGE_SLOT: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
}

/// Note handed to the wallet so it can later prove ownership of a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub owner: Address,
    pub contract: Address,
    pub storage_slot: u32,
    pub preimage: Vec<String>,
    pub tx_hash: String,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;
    async fn get_wallet(&self, account: &Address) -> Result<Arc<dyn Wallet>, ChainError>;
    async fn get_vault(&self, account: &Address) -> Result<Arc<dyn Vault>, ChainError>;
}

#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> &Address;
    async fn add_note(&self, note: NoteRequest) -> Result<(), ChainError>;
}

/// The vault contract as seen by one account.
#[async_trait]
pub trait Vault: Send + Sync {
    fn address(&self) -> &Address;

    async fn market(&self, idx: MarketIdx) -> Result<RawMarket, ChainError>;

    /// All position slots owned by `owner`, including empty ones.
    async fn positions(&self, owner: &Address) -> Result<Vec<MaybePosition>, ChainError>;

    /// Valuation at `mark_price` (8-decimal integer, 0 when no price is known).
    async fn pnl_and_liq(&self, record: &PositionRecord, mark_price: u128) -> Result<PnlAndLiq, ChainError>;

    async fn construct_position(&self, request: &PositionRequest) -> Result<PositionRecord, ChainError>;

    /// Field elements of the position note.
    async fn serialize_pos(&self, record: &PositionRecord) -> Result<Vec<String>, ChainError>;

    async fn open_position(&self, request: &PositionRequest) -> Result<TxReceipt, ChainError>;

    async fn resolve_open_position(&self, secret: &str) -> Result<TxReceipt, ChainError>;

    async fn close_position(&self, id: u64, mark_price: u128) -> Result<TxReceipt, ChainError>;
}

/// Hex-encoded SHA-256 of a position secret.
pub fn hash_secret(secret: &[u8]) -> String {
    hex::encode(Sha256::digest(secret))
}
