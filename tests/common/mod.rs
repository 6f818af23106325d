#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::primitives::{address, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use tokio::sync::{broadcast, Notify, Semaphore};

use dpoll::{
    wallet::UNRECOGNIZED_CHAIN, ChainParams, PollConfig, PollGateway, Session, SessionEvent,
    WalletError, WalletEvent, WalletProvider,
};
use sc_poll::{LocalPollStore, PollContract, PollContractError, PollDetails};

pub const CONTRACT: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");
pub const ALICE: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const BOB: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const CARLA: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

pub const GANACHE: u64 = 1337;
pub const MAINNET: u64 = 1;

pub fn config() -> PollConfig {
    PollConfig::with_contract(CONTRACT)
}

pub fn ganache_5777() -> ChainParams {
    ChainParams {
        chain_id: 5777,
        chain_name: "Ganache (5777)".to_string(),
        ..ChainParams::ganache()
    }
}

pub fn session_for(wallet: &Arc<ScriptedWallet>, config: PollConfig) -> Session {
    let provider: Arc<dyn WalletProvider> = wallet.clone();
    Session::new(Some(provider), config)
}

/// Initialized session over a fresh store, plus its gateway.
pub async fn connected() -> (Arc<ScriptedWallet>, Arc<LocalPollStore>, PollGateway) {
    let (wallet, store) = ScriptedWallet::with_store();
    let session = session_for(&wallet, config());
    session.initialize().await.expect("initialize");
    (wallet, store, PollGateway::new(session))
}

pub fn options(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// In-process wallet whose chain, accounts and failures are set by the test.
pub struct ScriptedWallet {
    accounts: Mutex<Vec<Address>>,
    chain_id: Mutex<u64>,
    known_chains: Mutex<HashSet<u64>>,
    switch_error: Mutex<Option<WalletError>>,
    add_error: Mutex<Option<WalletError>>,
    deployments: Mutex<HashMap<(u64, Address), Arc<dyn PollContract>>>,
    calls: Mutex<Vec<String>>,
    during_code_check: Mutex<Option<WalletEvent>>,
    events: broadcast::Sender<WalletEvent>,
}

impl ScriptedWallet {
    pub fn new(chain_id: u64, accounts: Vec<Address>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            chain_id: Mutex::new(chain_id),
            known_chains: Mutex::new(HashSet::from([chain_id])),
            switch_error: Mutex::new(None),
            add_error: Mutex::new(None),
            deployments: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            during_code_check: Mutex::new(None),
            events,
        })
    }

    /// Wallet on Ganache with Alice connected and a fresh store deployed.
    pub fn with_store() -> (Arc<Self>, Arc<LocalPollStore>) {
        let wallet = Self::new(GANACHE, vec![ALICE]);
        let store = Arc::new(LocalPollStore::new(CONTRACT));
        wallet.deploy(GANACHE, CONTRACT, store.clone());
        (wallet, store)
    }

    pub fn deploy(&self, chain_id: u64, address: Address, contract: Arc<dyn PollContract>) {
        self.deployments
            .lock()
            .unwrap()
            .insert((chain_id, address), contract);
    }

    pub fn know_chain(&self, chain_id: u64) {
        self.known_chains.lock().unwrap().insert(chain_id);
    }

    pub fn fail_switches(&self, err: WalletError) {
        *self.switch_error.lock().unwrap() = Some(err);
    }

    pub fn fail_adds(&self, err: WalletError) {
        *self.add_error.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn current_chain(&self) -> u64 {
        *self.chain_id.lock().unwrap()
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    /// Moves the wallet to `chain_id` and notifies subscribers, like a user
    /// picking another network.
    pub fn move_to_chain(&self, chain_id: u64) {
        *self.chain_id.lock().unwrap() = chain_id;
        self.emit(WalletEvent::ChainChanged(chain_id));
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts.clone();
        self.emit(WalletEvent::AccountsChanged(accounts));
    }

    /// Applies `event` to the wallet the next time contract code is fetched.
    pub fn change_during_code_check(&self, event: WalletEvent) {
        *self.during_code_check.lock().unwrap() = Some(event);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.current_chain())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        self.record(format!("switch {chain_id:#x}"));
        if let Some(err) = self.switch_error.lock().unwrap().clone() {
            return Err(err);
        }
        if !self.known_chains.lock().unwrap().contains(&chain_id) {
            return Err(WalletError::with_code(
                UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID {chain_id:#x}"),
            ));
        }
        *self.chain_id.lock().unwrap() = chain_id;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainParams) -> Result<(), WalletError> {
        self.record(format!("add {}", chain.chain_name));
        if let Some(err) = self.add_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.know_chain(chain.chain_id);
        Ok(())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, WalletError> {
        let chain_id = self.current_chain();
        let deployed = self
            .deployments
            .lock()
            .unwrap()
            .contains_key(&(chain_id, address));
        let pending = self.during_code_check.lock().unwrap().take();
        match pending {
            Some(WalletEvent::ChainChanged(chain_id)) => self.move_to_chain(chain_id),
            Some(WalletEvent::AccountsChanged(accounts)) => self.set_accounts(accounts),
            None => {}
        }
        Ok(if deployed {
            Bytes::from_static(&[0x60, 0x80, 0x60, 0x40])
        } else {
            Bytes::new()
        })
    }

    fn bind_contract(&self, address: Address) -> Arc<dyn PollContract> {
        let chain_id = self.current_chain();
        self.deployments
            .lock()
            .unwrap()
            .get(&(chain_id, address))
            .cloned()
            .unwrap_or_else(|| Arc::new(LocalPollStore::new(address)))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

/// Store wrapper whose `poll_details` calls wait for a permit.
pub struct GatedContract {
    pub inner: Arc<LocalPollStore>,
    pub gate: Arc<Semaphore>,
    pub entered: Arc<Notify>,
}

impl GatedContract {
    pub fn new(inner: Arc<LocalPollStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
            entered: Arc::new(Notify::new()),
        })
    }
}

#[async_trait]
impl PollContract for GatedContract {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn poll_count(&self) -> Result<U256, PollContractError> {
        self.inner.poll_count().await
    }

    async fn poll_details(&self, poll_id: U256) -> Result<PollDetails, PollContractError> {
        self.entered.notify_one();
        self.gate
            .acquire()
            .await
            .expect("gate semaphore closed")
            .forget();
        self.inner.poll_details(poll_id).await
    }

    async fn poll_results(&self, poll_id: U256) -> Result<Vec<U256>, PollContractError> {
        self.inner.poll_results(poll_id).await
    }

    async fn has_voted(&self, poll_id: U256, voter: Address) -> Result<bool, PollContractError> {
        self.inner.has_voted(poll_id, voter).await
    }

    async fn create_poll(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
    ) -> Result<U256, PollContractError> {
        self.inner.create_poll(from, question, options).await
    }

    async fn vote(
        &self,
        from: Address,
        poll_id: U256,
        option_index: U256,
    ) -> Result<TxHash, PollContractError> {
        self.inner.vote(from, poll_id, option_index).await
    }
}

/// Waits for the next session event matching `pred`.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<SessionEvent>, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("session event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}
