//! Session configuration and its environment loader.

use std::{str::FromStr, time::Duration};

use alloy::primitives::Address;
use serde::Serialize;

use crate::error::ConfigError;

pub const CONTRACT_ADDRESS_ENV: &str = "POLL_CONTRACT_ADDRESS";
pub const CALL_TIMEOUT_ENV: &str = "POLL_CALL_TIMEOUT_SECS";

/// Local Ganache development chain.
pub const GANACHE_CHAIN_ID: u64 = 1337;
pub const GANACHE_RPC_URL: &str = "http://127.0.0.1:7545";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to register a chain it does not know yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainParams {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl ChainParams {
    pub fn ganache() -> Self {
        Self {
            chain_id: GANACHE_CHAIN_ID,
            chain_name: format!("Ganache ({GANACHE_CHAIN_ID})"),
            native_currency: NativeCurrency {
                name: "ETH".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_urls: vec![GANACHE_RPC_URL.to_string()],
            block_explorer_urls: vec![],
        }
    }

    /// Chain id in the `0x`-prefixed form wallets expect.
    pub fn hex_chain_id(&self) -> String {
        format!("{:#x}", self.chain_id)
    }
}

#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Deployed poll contract. `None` surfaces as `ConfigMissing` on initialize.
    pub contract_address: Option<Address>,
    /// Accepted chains, in switch preference order.
    pub chains: Vec<ChainParams>,
    /// Upper bound for each contract call. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            contract_address: None,
            chains: vec![ChainParams::ganache()],
            call_timeout: None,
        }
    }
}

impl PollConfig {
    pub fn with_contract(address: Address) -> Self {
        Self {
            contract_address: Some(address),
            ..Self::default()
        }
    }

    pub fn accepts(&self, chain_id: u64) -> bool {
        self.chains.iter().any(|c| c.chain_id == chain_id)
    }

    /// Reads `POLL_CONTRACT_ADDRESS` and `POLL_CALL_TIMEOUT_SECS`; both optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, std::env::VarError>,
    {
        let contract_address = optional_var(&lookup, CONTRACT_ADDRESS_ENV)?
            .map(|raw| {
                Address::from_str(&raw).map_err(|e| ConfigError::Address(CONTRACT_ADDRESS_ENV, e))
            })
            .transpose()?;

        let call_timeout = optional_var(&lookup, CALL_TIMEOUT_ENV)?
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::ParseInt(CALL_TIMEOUT_ENV, e))
            })
            .transpose()?;

        Ok(Self {
            contract_address,
            call_timeout,
            ..Self::default()
        })
    }
}

fn optional_var<F>(lookup: &F, key: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&'static str) -> Result<String, std::env::VarError>,
{
    match lookup(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVar(key, e)),
    }
}
