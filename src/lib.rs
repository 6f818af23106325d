//! Client for an on-chain polling contract.
//!
//! - [`session::Session`] owns the wallet connection and the contract binding.
//! - [`gateway::PollGateway`] exposes the six poll operations on top of it.
//! - [`results`] turns raw tallies into percentages.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod results;
pub mod session;
pub mod wallet;

pub use config::{ChainParams, PollConfig};
pub use error::{ConfigError, PollError};
pub use gateway::{Poll, PollGateway};
pub use results::{OptionResult, ResultsView};
pub use session::{Connection, Session, SessionEvent, SessionSnapshot};
pub use wallet::{RpcWallet, WalletError, WalletEvent, WalletProvider};
