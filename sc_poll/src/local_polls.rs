use std::{
    collections::HashSet,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::primitives::{keccak256, Address, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{PollContract, PollContractError, PollDetails};

#[derive(Debug, Clone)]
struct StoredPoll {
    details: PollDetails,
    votes: Vec<U256>,
    voters: HashSet<Address>,
}

#[derive(Debug, Default)]
struct Storage {
    polls: Vec<StoredPoll>,
    tx_nonce: u64,
}

/// In-memory poll contract.
///
/// Enforces the same rules as the deployed contract: sequential ids from 0,
/// at least two options, one vote per voter and poll.
#[derive(Debug, Default)]
pub struct LocalPollStore {
    address: Address,
    storage: RwLock<Storage>,
}

impl LocalPollStore {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            storage: RwLock::new(Storage::default()),
        }
    }

    /// Overwrites the raw tally of a poll. Lets callers model counts that a
    /// handful of local accounts could never produce.
    pub async fn set_votes(&self, poll_id: U256, votes: Vec<U256>) -> Result<(), PollContractError> {
        let mut storage = self.storage.write().await;
        let poll = lookup_mut(&mut storage.polls, poll_id)?;
        poll.votes = votes;
        Ok(())
    }

    fn next_tx_hash(storage: &mut Storage) -> TxHash {
        storage.tx_nonce += 1;
        keccak256(storage.tx_nonce.to_be_bytes())
    }
}

fn index_of(poll_id: U256, len: usize) -> Result<usize, PollContractError> {
    usize::try_from(poll_id)
        .ok()
        .filter(|idx| *idx < len)
        .ok_or(PollContractError::UnknownPoll(poll_id))
}

fn lookup(polls: &[StoredPoll], poll_id: U256) -> Result<&StoredPoll, PollContractError> {
    let idx = index_of(poll_id, polls.len())?;
    Ok(&polls[idx])
}

fn lookup_mut(
    polls: &mut [StoredPoll],
    poll_id: U256,
) -> Result<&mut StoredPoll, PollContractError> {
    let idx = index_of(poll_id, polls.len())?;
    Ok(&mut polls[idx])
}

fn now_secs() -> U256 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    U256::from(secs)
}

#[async_trait]
impl PollContract for LocalPollStore {
    fn address(&self) -> Address {
        self.address
    }

    async fn poll_count(&self) -> Result<U256, PollContractError> {
        Ok(U256::from(self.storage.read().await.polls.len()))
    }

    async fn poll_details(&self, poll_id: U256) -> Result<PollDetails, PollContractError> {
        let storage = self.storage.read().await;
        Ok(lookup(&storage.polls, poll_id)?.details.clone())
    }

    async fn poll_results(&self, poll_id: U256) -> Result<Vec<U256>, PollContractError> {
        let storage = self.storage.read().await;
        Ok(lookup(&storage.polls, poll_id)?.votes.clone())
    }

    async fn has_voted(&self, poll_id: U256, voter: Address) -> Result<bool, PollContractError> {
        let storage = self.storage.read().await;
        Ok(lookup(&storage.polls, poll_id)?.voters.contains(&voter))
    }

    async fn create_poll(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
    ) -> Result<U256, PollContractError> {
        if options.len() < 2 {
            return Err(PollContractError::NotEnoughOptions(options.len()));
        }
        let mut storage = self.storage.write().await;
        let poll_id = U256::from(storage.polls.len());
        storage.polls.push(StoredPoll {
            votes: vec![U256::ZERO; options.len()],
            details: PollDetails {
                question,
                options,
                created_at: now_secs(),
                is_active: true,
                creator: from,
            },
            voters: HashSet::new(),
        });
        Self::next_tx_hash(&mut storage);
        Ok(poll_id)
    }

    async fn vote(
        &self,
        from: Address,
        poll_id: U256,
        option_index: U256,
    ) -> Result<TxHash, PollContractError> {
        let mut storage = self.storage.write().await;
        let poll = lookup_mut(&mut storage.polls, poll_id)?;
        if poll.voters.contains(&from) {
            return Err(PollContractError::AlreadyVoted {
                poll_id,
                voter: from,
            });
        }
        let slot = usize::try_from(option_index)
            .ok()
            .and_then(|idx| poll.votes.get_mut(idx))
            .ok_or(PollContractError::InvalidOption {
                poll_id,
                option_index,
            })?;
        *slot += U256::from(1);
        poll.voters.insert(from);
        Ok(Self::next_tx_hash(&mut storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const BOB: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sequential_ids_and_tally() {
        let store = LocalPollStore::new(Address::repeat_byte(0x11));

        let first = store
            .create_poll(ALICE, "Lunch?".to_string(), opts(&["Yes", "No"]))
            .await
            .unwrap();
        let second = store
            .create_poll(BOB, "Colour?".to_string(), opts(&["Red", "Green", "Blue"]))
            .await
            .unwrap();
        assert_eq!(first, U256::ZERO);
        assert_eq!(second, U256::from(1));
        assert_eq!(store.poll_count().await.unwrap(), U256::from(2));

        store.vote(ALICE, second, U256::from(2)).await.unwrap();
        store.vote(BOB, second, U256::from(2)).await.unwrap();

        let votes = store.poll_results(second).await.unwrap();
        assert_eq!(votes, vec![U256::ZERO, U256::ZERO, U256::from(2)]);
        assert!(store.has_voted(second, ALICE).await.unwrap());
        assert!(!store.has_voted(first, ALICE).await.unwrap());

        let details = store.poll_details(second).await.unwrap();
        assert_eq!(details.creator, BOB);
        assert!(details.is_active);
    }

    #[tokio::test]
    async fn test_rejects_invalid_requests() {
        let store = LocalPollStore::new(Address::ZERO);

        let res = store
            .create_poll(ALICE, "Only one".to_string(), opts(&["A"]))
            .await;
        assert!(matches!(res, Err(PollContractError::NotEnoughOptions(1))));

        let res = store.poll_details(U256::from(7)).await;
        assert!(matches!(res, Err(PollContractError::UnknownPoll(_))));

        let id = store
            .create_poll(ALICE, "Q".to_string(), opts(&["A", "B"]))
            .await
            .unwrap();
        let res = store.vote(ALICE, id, U256::from(2)).await;
        assert!(matches!(res, Err(PollContractError::InvalidOption { .. })));

        store.vote(ALICE, id, U256::ZERO).await.unwrap();
        let res = store.vote(ALICE, id, U256::from(1)).await;
        assert!(matches!(res, Err(PollContractError::AlreadyVoted { .. })));
        assert_eq!(
            store.poll_results(id).await.unwrap(),
            vec![U256::from(1), U256::ZERO]
        );
    }
}
