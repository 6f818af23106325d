//! Wallet provider boundary.
//!
//! The session only needs a handful of provider capabilities: account
//! access, chain inspection and switching, code lookup, contract binding and
//! a stream of account/chain notifications. [`WalletProvider`] bundles them
//! so a browser bridge, a JSON-RPC node with a local key, or a scripted test
//! wallet can stand behind the same session.

use std::{str::FromStr, sync::Arc};

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::{LocalSignerError, PrivateKeySigner},
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use sc_poll::{PollContract, ScPollSystem};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;
use url::Url;

use crate::config::ChainParams;

/// EIP-1193 code returned by `wallet_switchEthereumChain` for unknown chains.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

const EVENT_CAPACITY: usize = 16;

/// Notifications a wallet pushes to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct WalletError {
    pub code: Option<i64>,
    pub message: String,
}

impl WalletError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == Some(UNRECOGNIZED_CHAIN)
    }
}

impl From<RpcError<TransportErrorKind>> for WalletError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err.as_error_resp() {
            Some(payload) => WalletError::with_code(payload.code, payload.message.to_string()),
            None => WalletError::new(err.to_string()),
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the wallet for account access and returns the exposed accounts.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    async fn add_chain(&self, chain: &ChainParams) -> Result<(), WalletError>;

    /// Deployed bytecode at `address` on the current chain.
    async fn code_at(&self, address: Address) -> Result<Bytes, WalletError>;

    fn bind_contract(&self, address: Address) -> Arc<dyn PollContract>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// JSON-RPC node plus a local private key, standing in for an injected wallet.
///
/// The key and the node never change on their own, so subscribers receive no
/// events.
pub struct RpcWallet {
    provider: DynProvider,
    account: Address,
    events: broadcast::Sender<WalletEvent>,
}

impl RpcWallet {
    pub fn connect(rpc_url: Url, private_key: &str) -> Result<Self, LocalSignerError> {
        let signer = PrivateKeySigner::from_str(private_key)?;
        let account = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(rpc_url)
            .erased();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            provider,
            account,
            events,
        })
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.account])
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        debug!("[switch_chain]: requesting chain {chain_id:#x}");
        self.provider
            .raw_request::<_, serde_json::Value>(
                "wallet_switchEthereumChain".into(),
                [json!({ "chainId": format!("{chain_id:#x}") })],
            )
            .await?;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainParams) -> Result<(), WalletError> {
        debug!("[add_chain]: registering {}", chain.chain_name);
        self.provider
            .raw_request::<_, serde_json::Value>(
                "wallet_addEthereumChain".into(),
                [json!({
                    "chainId": chain.hex_chain_id(),
                    "chainName": chain.chain_name,
                    "nativeCurrency": chain.native_currency,
                    "rpcUrls": chain.rpc_urls,
                    "blockExplorerUrls": chain.block_explorer_urls,
                })],
            )
            .await?;
        Ok(())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, WalletError> {
        Ok(self.provider.get_code_at(address).await?)
    }

    fn bind_contract(&self, address: Address) -> Arc<dyn PollContract> {
        Arc::new(ScPollSystem::new(self.provider.clone(), address))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
