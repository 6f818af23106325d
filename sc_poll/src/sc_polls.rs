use alloy::{
    primitives::{Address, TxHash, U256},
    providers::DynProvider,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    bindings::PollSystem::{self, PollSystemInstance},
    PollContract, PollContractError, PollDetails, CREATE_POLL_GAS, VOTE_GAS,
};

/// Poll contract deployed on a live chain.
#[derive(Clone)]
pub struct ScPollSystem {
    instance: PollSystemInstance<(), DynProvider>,
}

impl ScPollSystem {
    pub fn new(provider: DynProvider, address: Address) -> Self {
        Self {
            instance: PollSystem::new(address, provider),
        }
    }
}

#[async_trait]
impl PollContract for ScPollSystem {
    fn address(&self) -> Address {
        *self.instance.address()
    }

    async fn poll_count(&self) -> Result<U256, PollContractError> {
        let res = self.instance.pollCount().call().await?;
        Ok(res._0)
    }

    async fn poll_details(&self, poll_id: U256) -> Result<PollDetails, PollContractError> {
        let res = self.instance.getPollDetails(poll_id).call().await?;
        Ok(PollDetails {
            question: res.question,
            options: res.options,
            created_at: res.createdAt,
            is_active: res.isActive,
            creator: res.creator,
        })
    }

    async fn poll_results(&self, poll_id: U256) -> Result<Vec<U256>, PollContractError> {
        let res = self.instance.getPollResults(poll_id).call().await?;
        Ok(res._0)
    }

    async fn has_voted(&self, poll_id: U256, voter: Address) -> Result<bool, PollContractError> {
        let res = self.instance.hasVoted(poll_id, voter).call().await?;
        Ok(res._0)
    }

    async fn create_poll(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
    ) -> Result<U256, PollContractError> {
        let receipt = self
            .instance
            .createPoll(question, options)
            .from(from)
            .gas(CREATE_POLL_GAS)
            .send()
            .await?
            .get_receipt()
            .await?;
        let tx_hash = receipt.transaction_hash;
        if !receipt.status() {
            return Err(PollContractError::Reverted(tx_hash));
        }
        debug!("[create_poll]: mined in {tx_hash}");

        receipt
            .inner
            .logs()
            .iter()
            .find_map(|log| log.log_decode::<PollSystem::PollCreated>().ok())
            .map(|event| event.inner.data.pollId)
            .ok_or(PollContractError::MissingCreationEvent(tx_hash))
    }

    async fn vote(
        &self,
        from: Address,
        poll_id: U256,
        option_index: U256,
    ) -> Result<TxHash, PollContractError> {
        let receipt = self
            .instance
            .vote(poll_id, option_index)
            .from(from)
            .gas(VOTE_GAS)
            .send()
            .await?
            .get_receipt()
            .await?;
        let tx_hash = receipt.transaction_hash;
        if !receipt.status() {
            return Err(PollContractError::Reverted(tx_hash));
        }
        debug!("[vote]: mined in {tx_hash}");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::address,
        providers::{Provider, ProviderBuilder},
    };

    use super::*;

    #[test]
    fn test_address_comes_from_bound_instance() {
        let contract = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");
        let provider = ProviderBuilder::new()
            .on_http("http://127.0.0.1:7545".parse().unwrap())
            .erased();
        let system = ScPollSystem::new(provider, contract);
        assert_eq!(system.address(), contract);
        assert_eq!(system.clone().address(), contract);
    }
}
