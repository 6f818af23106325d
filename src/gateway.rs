//! Typed access to the poll contract through the current session.
//!
//! Each operation takes one session snapshot up front and runs every chain
//! call against it, so a session replaced mid-call never mixes bindings.

use std::{future::Future, time::Duration};

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use sc_poll::{PollContractError, PollDetails};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::PollError,
    results::{self, ResultsView},
    session::{Session, SessionSnapshot},
};

const CREATE_CONTEXT: &str = "Error creating poll";
const LIST_CONTEXT: &str = "Error loading polls";
const DETAILS_CONTEXT: &str = "Error loading poll details";
const HAS_VOTED_CONTEXT: &str = "Error checking vote status";
const VOTE_CONTEXT: &str = "Error submitting vote";
const RESULTS_CONTEXT: &str = "Error loading results";

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: u64,
    pub question: String,
    pub options: Vec<String>,
    pub creator: Address,
    /// Unix seconds.
    pub created_at: u64,
    pub is_active: bool,
}

impl Poll {
    fn from_details(id: u64, details: PollDetails) -> Result<Self, PollError> {
        Ok(Self {
            id,
            question: details.question,
            options: details.options,
            creator: details.creator,
            created_at: to_u64(details.created_at)?,
            is_active: details.is_active,
        })
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

#[derive(Clone)]
pub struct PollGateway {
    session: Session,
    call_timeout: Option<Duration>,
}

impl PollGateway {
    /// Uses the session's configured call timeout.
    pub fn new(session: Session) -> Self {
        let call_timeout = session.config().call_timeout;
        Self {
            session,
            call_timeout,
        }
    }

    pub fn with_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Creates a poll from the active account and returns its id.
    ///
    /// The question and options are trimmed and blank options dropped before
    /// anything is sent.
    pub async fn create_poll(&self, question: &str, options: &[String]) -> Result<u64, PollError> {
        let snapshot = self.session.snapshot().await?;
        let from = snapshot.current_account().ok_or(PollError::NotInitialized)?;
        let (question, options) = normalize_poll(question, options)?;

        let contract = snapshot.connection.contract();
        let poll_id = self
            .call(CREATE_CONTEXT, contract.create_poll(from, question, options))
            .await
            .map_err(|e| tx_error(CREATE_CONTEXT, e))?;
        let poll_id = to_u64(poll_id)?;
        info!("[create_poll]: poll {poll_id} created by {from}");
        Ok(poll_id)
    }

    /// All polls in id order `0..pollCount`, fetched one at a time.
    pub async fn list_polls(&self) -> Result<Vec<Poll>, PollError> {
        let snapshot = self.session.snapshot().await?;
        let contract = snapshot.connection.contract();

        let count = self
            .call(LIST_CONTEXT, contract.poll_count())
            .await
            .map_err(|e| query_error(LIST_CONTEXT, e))?;
        let count = to_u64(count)?;
        debug!("[list_polls]: loading {count} poll(s)");

        let mut polls = Vec::new();
        for id in 0..count {
            let details = self
                .call(LIST_CONTEXT, contract.poll_details(U256::from(id)))
                .await
                .map_err(|e| query_error(LIST_CONTEXT, e))?;
            polls.push(Poll::from_details(id, details)?);
        }
        Ok(polls)
    }

    pub async fn get_poll_details(&self, poll_id: u64) -> Result<Poll, PollError> {
        let snapshot = self.session.snapshot().await?;
        let details = self.fetch_details(&snapshot, poll_id, DETAILS_CONTEXT).await?;
        Poll::from_details(poll_id, details)
    }

    /// Whether `voter` (or the active account when `None`) voted in `poll_id`.
    pub async fn has_voted(&self, poll_id: u64, voter: Option<Address>) -> Result<bool, PollError> {
        let snapshot = self.session.snapshot().await?;
        let voter = voter
            .or_else(|| snapshot.current_account())
            .ok_or(PollError::NoAccount)?;

        let contract = snapshot.connection.contract();
        self.call(
            HAS_VOTED_CONTEXT,
            contract.has_voted(U256::from(poll_id), voter),
        )
        .await
        .map_err(|e| query_error(HAS_VOTED_CONTEXT, e))
    }

    /// Votes for `option_index` from the active account.
    ///
    /// Not idempotent: a repeated vote is sent again and the contract's
    /// rejection comes back as `TransactionFailed`.
    pub async fn submit_vote(&self, poll_id: u64, option_index: u64) -> Result<TxHash, PollError> {
        let snapshot = self.session.snapshot().await?;
        let from = snapshot.current_account().ok_or(PollError::NotInitialized)?;

        let contract = snapshot.connection.contract();
        let tx_hash = self
            .call(
                VOTE_CONTEXT,
                contract.vote(from, U256::from(poll_id), U256::from(option_index)),
            )
            .await
            .map_err(|e| tx_error(VOTE_CONTEXT, e))?;
        info!("[submit_vote]: {from} voted option {option_index} in poll {poll_id} ({tx_hash})");
        Ok(tx_hash)
    }

    pub async fn get_poll_results(&self, poll_id: u64) -> Result<ResultsView, PollError> {
        let snapshot = self.session.snapshot().await?;
        let details = self.fetch_details(&snapshot, poll_id, RESULTS_CONTEXT).await?;

        let contract = snapshot.connection.contract();
        let raw_votes = self
            .call(RESULTS_CONTEXT, contract.poll_results(U256::from(poll_id)))
            .await
            .map_err(|e| query_error(RESULTS_CONTEXT, e))?;

        results::aggregate(poll_id, details.question, details.options, &raw_votes)
    }

    async fn fetch_details(
        &self,
        snapshot: &SessionSnapshot,
        poll_id: u64,
        context: &'static str,
    ) -> Result<PollDetails, PollError> {
        let contract = snapshot.connection.contract();
        self.call(context, contract.poll_details(U256::from(poll_id)))
            .await
            .map_err(|e| query_error(context, e))
    }

    /// Runs one chain call, bounded by the configured timeout.
    async fn call<T, F>(&self, context: &'static str, fut: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, PollContractError>>,
    {
        match self.call_timeout {
            Some(after) => match tokio::time::timeout(after, fut).await {
                Ok(res) => res.map_err(CallError::Contract),
                Err(_) => Err(CallError::Timeout(PollError::Timeout { context, after })),
            },
            None => fut.await.map_err(CallError::Contract),
        }
    }
}

fn normalize_poll(question: &str, options: &[String]) -> Result<(String, Vec<String>), PollError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PollError::InvalidInput("Please enter a question".to_string()));
    }
    let options: Vec<String> = options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if options.len() < MIN_OPTIONS {
        return Err(PollError::InvalidInput(format!(
            "Please provide at least {MIN_OPTIONS} options"
        )));
    }
    if options.len() > MAX_OPTIONS {
        return Err(PollError::InvalidInput(format!(
            "Maximum {MAX_OPTIONS} options allowed"
        )));
    }
    Ok((question.to_string(), options))
}

enum CallError {
    Contract(PollContractError),
    Timeout(PollError),
}

fn query_error(context: &'static str, err: CallError) -> PollError {
    match err {
        CallError::Contract(e) => PollError::query(context, e),
        CallError::Timeout(e) => e,
    }
}

fn tx_error(context: &'static str, err: CallError) -> PollError {
    match err {
        CallError::Contract(e) => PollError::transaction(context, e),
        CallError::Timeout(e) => e,
    }
}

fn to_u64(value: U256) -> Result<u64, PollError> {
    u64::try_from(value).map_err(|_| PollError::Overflow(value.to_string()))
}
