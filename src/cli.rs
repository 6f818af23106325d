use std::str::FromStr;

use alloy::{hex::FromHexError, primitives::Address};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::{
    config::{CALL_TIMEOUT_ENV, CONTRACT_ADDRESS_ENV, GANACHE_RPC_URL},
    error::PollError,
    gateway::{Poll, PollGateway},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON-RPC endpoint of the chain the contract is deployed on
    #[arg(long, env = "POLL_RPC_URL", default_value = GANACHE_RPC_URL)]
    pub rpc_url: url::Url,

    /// Private key of the account that signs transactions
    #[arg(short = 'K', long, env = "POLL_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Poll contract address
    #[arg(short = 'C', long, env = CONTRACT_ADDRESS_ENV)]
    pub contract: Option<Address>,

    /// Per-call timeout in seconds
    #[arg(long, env = CALL_TIMEOUT_ENV)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Commands {
    /// Create a poll with two to ten non-blank options
    Create {
        question: String,
        #[arg(required = true, num_args = 2..)]
        options: Vec<String>,
    },
    /// List every poll
    List,
    /// Show one poll
    Show { poll_id: u64 },
    /// Check whether an account voted (defaults to the signer)
    HasVoted {
        poll_id: u64,
        voter: Option<String>,
    },
    /// Vote for an option by index
    Vote { poll_id: u64, option_index: u64 },
    /// Show tallies and percentages
    Results { poll_id: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    PollError(#[from] PollError),
    #[error("Failed to parse address: {0}")]
    AddressParsingError(#[from] FromHexError),
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn poll_json(poll: &Poll) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(poll)?;
    if let Some(created) = poll.created_at_utc() {
        value["createdAtUtc"] = json!(created.to_rfc3339());
    }
    Ok(value)
}

/// Runs one command and returns what should be printed.
pub async fn execute(gateway: &PollGateway, command: Commands) -> Result<Value, CliError> {
    match command {
        Commands::Create { question, options } => {
            let poll_id = gateway.create_poll(&question, &options).await?;
            Ok(json!({ "pollId": poll_id }))
        }
        Commands::List => {
            let polls = gateway.list_polls().await?;
            let polls = polls.iter().map(poll_json).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(polls))
        }
        Commands::Show { poll_id } => poll_json(&gateway.get_poll_details(poll_id).await?),
        Commands::HasVoted { poll_id, voter } => {
            let voter = voter.as_deref().map(Address::from_str).transpose()?;
            let voted = gateway.has_voted(poll_id, voter).await?;
            Ok(json!({ "pollId": poll_id, "hasVoted": voted }))
        }
        Commands::Vote {
            poll_id,
            option_index,
        } => {
            let tx_hash = gateway.submit_vote(poll_id, option_index).await?;
            Ok(json!({ "pollId": poll_id, "transactionHash": tx_hash.to_string() }))
        }
        Commands::Results { poll_id } => {
            Ok(serde_json::to_value(gateway.get_poll_results(poll_id).await?)?)
        }
    }
}
