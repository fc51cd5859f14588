//! Account selection and the wallet/vault handles bound to the selected account.

use crate::chain::{ChainError, Vault, Wallet, WalletProvider};
use crate::domain::Address;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Unknown account: {0}")]
    UnknownAccount(Address),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Everything a flow needs to talk to the chain as the selected account.
#[derive(Clone)]
pub struct AccountContext {
    pub account: Address,
    pub wallet: Arc<dyn Wallet>,
    pub vault: Arc<dyn Vault>,
}

#[derive(Default)]
struct WalletState {
    accounts: Vec<Address>,
    selected: Option<AccountContext>,
}

pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    state: RwLock<WalletState>,
}

impl WalletSession {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(WalletState::default()),
        }
    }

    /// Load the account list and select the first account, if any.
    pub async fn connect(&self) -> Result<Option<Address>, WalletError> {
        let accounts = self.provider.accounts().await?;
        let first = accounts.first().cloned();
        self.state.write().await.accounts = accounts;
        if let Some(account) = &first {
            self.select(account).await?;
        }
        Ok(first)
    }

    pub async fn select(&self, account: &Address) -> Result<(), WalletError> {
        if !self.state.read().await.accounts.contains(account) {
            return Err(WalletError::UnknownAccount(account.clone()));
        }
        let wallet = self.provider.get_wallet(account).await?;
        let vault = self.provider.get_vault(account).await?;

        info!(account = %account, vault = %vault.address(), "Account selected");
        self.state.write().await.selected = Some(AccountContext {
            account: account.clone(),
            wallet,
            vault,
        });
        Ok(())
    }

    pub async fn accounts(&self) -> Vec<Address> {
        self.state.read().await.accounts.clone()
    }

    pub async fn selected(&self) -> Option<Address> {
        self.state
            .read()
            .await
            .selected
            .as_ref()
            .map(|ctx| ctx.account.clone())
    }

    /// Handles for the selected account. Cloned so no lock is held across chain calls.
    pub async fn context(&self) -> Option<AccountContext> {
        self.state.read().await.selected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{SandboxCall, SandboxChain};

    #[tokio::test]
    async fn test_connect_selects_first_account() {
        let chain = SandboxChain::new(2);
        let session = WalletSession::new(Arc::new(chain.clone()));
        let first = session.connect().await.unwrap();
        assert_eq!(first, chain.account(0));
        assert_eq!(session.selected().await, chain.account(0));
        assert_eq!(session.accounts().await.len(), 2);

        let ctx = session.context().await.unwrap();
        assert_eq!(ctx.wallet.address(), &chain.account(0).unwrap());
    }

    #[tokio::test]
    async fn test_select_unknown_account() {
        let chain = SandboxChain::new(1);
        let session = WalletSession::new(Arc::new(chain));
        session.connect().await.unwrap();
        let stranger = Address::from_field(0xdead);
        assert!(matches!(
            session.select(&stranger).await,
            Err(WalletError::UnknownAccount(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_vault_lookup_keeps_previous_selection() {
        let chain = SandboxChain::new(2);
        let session = WalletSession::new(Arc::new(chain.clone()));
        session.connect().await.unwrap();

        chain.fail_on(SandboxCall::GetVault);
        let second = chain.account(1).unwrap();
        assert!(session.select(&second).await.is_err());
        assert_eq!(session.selected().await, chain.account(0));
    }
}
