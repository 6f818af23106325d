//! On-chain boundary of the polling contract.
//!
//! [`PollContract`] is the raw surface of the deployed contract: six calls
//! returning chain-native types. [`ScPollSystem`] talks to a real node
//! through alloy, [`LocalPollStore`] keeps the same rules in memory.

pub mod bindings;
pub mod local_polls;
pub mod sc_polls;

use alloy::{
    primitives::{Address, TxHash, U256},
    providers::PendingTransactionError,
};
use async_trait::async_trait;

pub use local_polls::LocalPollStore;
pub use sc_polls::ScPollSystem;

/// Gas limit attached to `createPoll` transactions.
pub const CREATE_POLL_GAS: u64 = 3_000_000;
/// Gas limit attached to `vote` transactions.
pub const VOTE_GAS: u64 = 300_000;

/// Detail record as returned by `getPollDetails`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDetails {
    pub question: String,
    pub options: Vec<String>,
    pub created_at: U256,
    pub is_active: bool,
    pub creator: Address,
}

#[async_trait]
pub trait PollContract: Send + Sync {
    /// Address the binding points at.
    fn address(&self) -> Address;

    async fn poll_count(&self) -> Result<U256, PollContractError>;

    async fn poll_details(&self, poll_id: U256) -> Result<PollDetails, PollContractError>;

    /// Raw vote counts, parallel to the poll's options.
    async fn poll_results(&self, poll_id: U256) -> Result<Vec<U256>, PollContractError>;

    async fn has_voted(&self, poll_id: U256, voter: Address) -> Result<bool, PollContractError>;

    /// Sends `createPoll` from `from` and returns the id carried by the
    /// `PollCreated` event.
    async fn create_poll(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
    ) -> Result<U256, PollContractError>;

    /// Sends `vote` from `from` and returns the transaction hash.
    async fn vote(
        &self,
        from: Address,
        poll_id: U256,
        option_index: U256,
    ) -> Result<TxHash, PollContractError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PollContractError {
    #[error("Alloy contract error: {0}")]
    AlloyError(#[from] alloy::contract::Error),
    #[error("Pending transaction error: {0}")]
    PendingTransactionError(#[from] PendingTransactionError),
    #[error("Transaction {0} reverted")]
    Reverted(TxHash),
    #[error("Transaction {0} did not emit PollCreated")]
    MissingCreationEvent(TxHash),

    #[error("Poll {0} does not exist")]
    UnknownPoll(U256),
    #[error("Voter {voter} already voted in poll {poll_id}")]
    AlreadyVoted { poll_id: U256, voter: Address },
    #[error("Option index {option_index} out of range for poll {poll_id}")]
    InvalidOption { poll_id: U256, option_index: U256 },
    #[error("A poll needs at least 2 options, got {0}")]
    NotEnoughOptions(usize),
}
