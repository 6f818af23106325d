use std::{env::VarError, num::ParseIntError, time::Duration};

use alloy::{hex::FromHexError, primitives::Address};

use crate::wallet::WalletError;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("No wallet provider found. Install or start a wallet to use this application")]
    ProviderMissing,
    #[error("Contract address not configured. Set POLL_CONTRACT_ADDRESS")]
    ConfigMissing,
    #[error("No accounts found. Please connect a wallet account")]
    NoAccounts,
    #[error("No account connected")]
    NoAccount,
    #[error("Contract not found at {address} on chain {chain_id}. Switch the wallet to the deployment network")]
    ContractNotFound { address: Address, chain_id: u64 },
    #[error("Wallet moved from chain {expected} to chain {actual} while connecting")]
    ChainChanged { expected: u64, actual: u64 },
    #[error("Session not initialized or no account connected")]
    NotInitialized,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{context}: {reason}")]
    QueryFailed {
        context: &'static str,
        reason: String,
    },
    #[error("{context}: {reason}")]
    TransactionFailed {
        context: &'static str,
        reason: String,
    },
    #[error("Value {0} exceeds the safe display range")]
    Overflow(String),

    #[error("Error connecting to wallet: {0}")]
    Wallet(#[from] WalletError),
    #[error("{context}: timed out after {after:?}")]
    Timeout {
        context: &'static str,
        after: Duration,
    },
}

impl PollError {
    pub(crate) fn query(context: &'static str, reason: impl ToString) -> Self {
        PollError::QueryFailed {
            context,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transaction(context: &'static str, reason: impl ToString) -> Self {
        PollError::TransactionFailed {
            context,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read env var {0}: {1}")]
    EnvVar(&'static str, #[source] VarError),
    #[error("Failed to parse {0} as an address: {1}")]
    Address(&'static str, #[source] FromHexError),
    #[error("Failed to parse {0} as an integer: {1}")]
    ParseInt(&'static str, #[source] ParseIntError),
}
