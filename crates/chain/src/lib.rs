//! dexboot Chain
//!
//! Client for the target EVM node used by the bootstrap pipeline.
//!
//! Two modes, selected by [`ChainConfig`]:
//! - **Mock**: an in-memory ledger that emulates the exchange contracts
//!   closely enough to enforce their call-order preconditions (owner gates,
//!   one-time initialization, token registration, allowances).
//! - **Live**: an `ethers` `Provider<Http>` against a node with unlocked
//!   accounts (`eth_sendTransaction`), polling for each receipt before
//!   returning.
//!
//! Everything above this crate talks to the [`Chain`] trait.

pub mod abi;
pub mod artifacts;
mod client;
mod mock;
mod types;

pub use artifacts::{Artifact, ArtifactRegistry};
pub use client::{ChainClient, ChainConfig, ChainMode};
pub use mock::{MockCall, MockDeposit, MockTransaction};
pub use types::*;

use async_trait::async_trait;
use ethers::providers::ProviderError;
use thiserror::Error;

use dexboot_core::Address;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Out of gas: limit {limit}, required {required}")]
    OutOfGas { limit: u64, required: u64 },

    #[error("Gas limit {limit} exceeds block gas limit {block_limit}")]
    ExceedsBlockGasLimit { limit: u64, block_limit: u64 },

    #[error("Transaction {0} not mined after {1} polls")]
    NotMined(String, u32),

    #[error("No contract at {0:?}")]
    UnknownContract(Address),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Invalid artifact {name}: {reason}")]
    InvalidArtifact { name: String, reason: String },

    #[error("{contract} references unlinked library {library}")]
    UnlinkedLibrary { contract: String, library: String },

    #[error("Node has no unlocked accounts")]
    NoAccounts,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for ChainError {
    fn from(e: ProviderError) -> Self {
        let message = e.to_string();
        // nodes report reverts during estimation or execution as RPC errors
        if message.contains("revert") {
            ChainError::Reverted(message)
        } else {
            ChainError::Rpc(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// Everything the pipeline needs from a node.
///
/// Each submitting method returns only after the transaction is mined; a
/// revert is reported as an error, never as a receipt.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Unlocked accounts, in node order. Index 0 is the admin.
    async fn accounts(&self) -> Result<Vec<Address>>;

    async fn block_number(&self) -> Result<u64>;

    async fn network_id(&self) -> Result<String>;

    /// Create a contract from fully linked bytecode
    async fn deploy(&self, request: DeployRequest) -> Result<Receipt>;

    /// State-changing call on a deployed contract
    async fn call(&self, request: CallRequest) -> Result<Receipt>;

    /// Raw transaction with caller-supplied data
    async fn send_transaction(&self, request: TxRequest) -> Result<Receipt>;
}
