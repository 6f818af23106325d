//! Connection session: one live binding to the wallet and the poll contract.
//!
//! The bound state lives behind a single [`RwLock`] and is swapped as a
//! whole, so readers see either the previous session, the new one, or
//! nothing. Wallet notifications are consumed by a listener task spawned per
//! initialization and cancelled when that session is replaced or
//! invalidated.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use alloy::primitives::Address;
use sc_poll::PollContract;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{ChainParams, PollConfig},
    error::PollError,
    wallet::{WalletError, WalletEvent, WalletProvider},
};

const SESSION_EVENT_CAPACITY: usize = 16;

/// Contract binding produced by one successful initialization.
pub struct Connection {
    contract: Arc<dyn PollContract>,
    contract_address: Address,
    chain_id: u64,
    generation: u64,
}

impl Connection {
    pub fn contract(&self) -> &Arc<dyn PollContract> {
        &self.contract
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Increases every time the session is initialized or invalidated.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Consistent view of the session at one instant.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub connection: Arc<Connection>,
    pub accounts: Vec<Address>,
}

impl SessionSnapshot {
    pub fn current_account(&self) -> Option<Address> {
        self.accounts.first().copied()
    }
}

/// Session state changes a host can react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { chain_id: u64 },
    AccountsChanged(Vec<Address>),
    /// The wallet moved to another chain. The session has been cleared and
    /// the host must call [`Session::initialize`] again.
    ReloadRequired { chain_id: u64 },
}

/// Published session plus the token of the listener serving it.
struct Bound {
    snapshot: SessionSnapshot,
    listener: CancellationToken,
}

struct SessionInner {
    wallet: Option<Arc<dyn WalletProvider>>,
    config: PollConfig,
    state: RwLock<Option<Bound>>,
    init_lock: Mutex<()>,
    generation: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// `wallet` is `None` when no provider is available in the host.
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, config: PollConfig) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                wallet,
                config,
                state: RwLock::new(None),
                init_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.inner.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Connects to the wallet and binds the poll contract, replacing any
    /// previous session.
    ///
    /// Only one initialization runs at a time. Failed chain switches are
    /// logged and skipped; initialization then continues on whatever chain
    /// the wallet reports. Fails with `ChainChanged` if the wallet leaves
    /// that chain before the session is published.
    pub async fn initialize(&self) -> Result<SessionSnapshot, PollError> {
        let _guard = self.inner.init_lock.lock().await;
        self.clear().await;

        let wallet = self
            .inner
            .wallet
            .clone()
            .ok_or(PollError::ProviderMissing)?;
        let contract_address = self
            .inner
            .config
            .contract_address
            .ok_or(PollError::ConfigMissing)?;

        let accounts = wallet.request_accounts().await?;
        if accounts.is_empty() {
            return Err(PollError::NoAccounts);
        }
        debug!("[initialize]: wallet exposed {} account(s)", accounts.len());

        let mut wallet_events = wallet.subscribe();
        let chain_id = self.resolve_chain(wallet.as_ref()).await?;

        let contract = wallet.bind_contract(contract_address);
        let code = wallet.code_at(contract_address).await?;
        if code.is_empty() {
            return Err(PollError::ContractNotFound {
                address: contract_address,
                chain_id,
            });
        }

        let accounts = drain_account_changes(&mut wallet_events, accounts);
        if accounts.is_empty() {
            return Err(PollError::NoAccounts);
        }
        let actual = wallet.chain_id().await?;
        if actual != chain_id {
            warn!("[initialize]: wallet moved from chain {chain_id} to {actual}, not binding");
            return Err(PollError::ChainChanged {
                expected: chain_id,
                actual,
            });
        }

        let token = CancellationToken::new();
        let snapshot = {
            let mut state = self.inner.state.write().await;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let snapshot = SessionSnapshot {
                connection: Arc::new(Connection {
                    contract,
                    contract_address,
                    chain_id,
                    generation,
                }),
                accounts,
            };
            *state = Some(Bound {
                snapshot: snapshot.clone(),
                listener: token.clone(),
            });
            snapshot
        };
        spawn_listener(
            Arc::downgrade(&self.inner),
            wallet_events,
            token,
            snapshot.connection.generation,
        );

        info!(
            "[initialize]: bound poll contract {contract_address} on chain {chain_id} for {:?}",
            snapshot.current_account()
        );
        let _ = self.inner.events.send(SessionEvent::Connected { chain_id });
        Ok(snapshot)
    }

    /// Current session, or `NotInitialized`.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, PollError> {
        self.inner
            .state
            .read()
            .await
            .as_ref()
            .map(|b| b.snapshot.clone())
            .ok_or(PollError::NotInitialized)
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.state.read().await.is_some()
    }

    pub async fn current_account(&self) -> Option<Address> {
        self.inner
            .state
            .read()
            .await
            .as_ref()
            .and_then(|b| b.snapshot.current_account())
    }

    pub async fn accounts(&self) -> Vec<Address> {
        self.inner
            .state
            .read()
            .await
            .as_ref()
            .map(|b| b.snapshot.accounts.clone())
            .unwrap_or_default()
    }

    pub async fn chain_id(&self) -> Option<u64> {
        self.inner
            .state
            .read()
            .await
            .as_ref()
            .map(|b| b.snapshot.connection.chain_id)
    }

    /// Applies a wallet notification to the current session.
    ///
    /// Account changes update the account list in place. A chain change
    /// drops the whole session and emits [`SessionEvent::ReloadRequired`].
    pub async fn handle_wallet_event(&self, event: WalletEvent) {
        apply_event(&self.inner, event, None).await;
    }

    /// Drops the bound state and stops the listener.
    pub async fn invalidate(&self) {
        self.clear().await;
    }

    async fn clear(&self) {
        clear_state(&self.inner, None).await;
    }

    async fn resolve_chain(&self, wallet: &dyn WalletProvider) -> Result<u64, PollError> {
        let current = wallet.chain_id().await?;
        if self.inner.config.accepts(current) {
            return Ok(current);
        }

        info!("[resolve_chain]: chain {current} is not accepted, trying configured chains");
        for chain in &self.inner.config.chains {
            match switch_or_add(wallet, chain).await {
                Ok(()) => {
                    info!("[resolve_chain]: switched to {}", chain.chain_name);
                    return Ok(chain.chain_id);
                }
                Err(e) => {
                    warn!("[resolve_chain]: could not switch to {}: {e}", chain.chain_name);
                }
            }
        }

        warn!("[resolve_chain]: no accepted chain reachable, continuing on chain {current}");
        Ok(current)
    }
}

async fn switch_or_add(wallet: &dyn WalletProvider, chain: &ChainParams) -> Result<(), WalletError> {
    match wallet.switch_chain(chain.chain_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_unrecognized_chain() => {
            debug!("[switch_or_add]: {} unknown to wallet, adding it", chain.chain_name);
            wallet.add_chain(chain).await?;
            wallet.switch_chain(chain.chain_id).await
        }
        Err(e) => Err(e),
    }
}

/// Account changes the wallet reported while the session was being set up.
fn drain_account_changes(
    wallet_events: &mut broadcast::Receiver<WalletEvent>,
    mut accounts: Vec<Address>,
) -> Vec<Address> {
    loop {
        match wallet_events.try_recv() {
            Ok(WalletEvent::AccountsChanged(changed)) => accounts = changed,
            Ok(WalletEvent::ChainChanged(_)) => {}
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!("[initialize]: missed {skipped} wallet event(s)");
            }
            Err(_) => return accounts,
        }
    }
}

/// Drops the published session, if it is still `generation` when one is
/// given. Returns whether anything was dropped.
async fn clear_state(inner: &SessionInner, generation: Option<u64>) -> bool {
    let bound = {
        let mut state = inner.state.write().await;
        let current = state.as_ref().map(|b| b.snapshot.connection.generation);
        if generation.is_some() && current != generation {
            return false;
        }
        let bound = state.take();
        if bound.is_some() {
            inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        bound
    };
    match bound {
        Some(bound) => {
            bound.listener.cancel();
            true
        }
        None => false,
    }
}

/// `generation` is set for events coming from a listener; they only apply
/// to the session that spawned it.
async fn apply_event(inner: &SessionInner, event: WalletEvent, generation: Option<u64>) {
    match event {
        WalletEvent::AccountsChanged(accounts) => {
            {
                let mut state = inner.state.write().await;
                let Some(bound) = state.as_mut() else {
                    debug!("[apply_event]: accounts changed without a session, ignoring");
                    return;
                };
                if generation.is_some_and(|g| g != bound.snapshot.connection.generation) {
                    return;
                }
                bound.snapshot.accounts.clone_from(&accounts);
            }
            info!("[apply_event]: accounts changed, now {} account(s)", accounts.len());
            let _ = inner.events.send(SessionEvent::AccountsChanged(accounts));
        }
        WalletEvent::ChainChanged(chain_id) => {
            let cleared = clear_state(inner, generation).await;
            if generation.is_some() && !cleared {
                return;
            }
            info!("[apply_event]: chain changed to {chain_id}, session invalidated");
            let _ = inner.events.send(SessionEvent::ReloadRequired { chain_id });
        }
    }
}

fn spawn_listener(
    inner: Weak<SessionInner>,
    mut wallet_events: broadcast::Receiver<WalletEvent>,
    token: CancellationToken,
    generation: u64,
) {
    tokio::spawn(async move {
        debug!("[listener]: started for session generation {generation}");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = wallet_events.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("[listener]: missed {skipped} wallet event(s)");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    apply_event(&inner, event, Some(generation)).await;
                }
            }
        }
        debug!("[listener]: stopped for session generation {generation}");
    });
}
