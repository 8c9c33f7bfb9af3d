//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Bytes, Signature, TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Key material could not produce a valid key pair.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Arguments or return data do not match the declared function table.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Network failure or timeout talking to the node. Retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node rejected the request.
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Building, signing or broadcasting a transaction failed.
    #[error("Submission failed during {stage}: {reason}")]
    SubmissionFailed { stage: &'static str, reason: String },

    /// A read-only query failed after retries.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction was mined but reverted by the contract.
    #[error("Transaction reverted: {0}")]
    Reverted(TxHash),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Invalid runtime configuration handed to a component.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A confirmation watcher task died before reaching a terminal state.
    /// The transaction's fate is unknown.
    #[error("Confirmation watcher for {tx_hash} failed: {reason}")]
    WatcherFailed { tx_hash: TxHash, reason: String },
}

impl BlockchainError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BlockchainError::Transport(_))
    }

    /// Wrap a failed step of transaction submission.
    pub(crate) fn submission(stage: &'static str, err: BlockchainError) -> Self {
        match err {
            // Already-classified domain errors pass through untouched.
            e @ (BlockchainError::Schema(_)
            | BlockchainError::GasPriceTooHigh { .. }
            | BlockchainError::ChainMismatch { .. }
            | BlockchainError::SubmissionFailed { .. }) => e,
            e => BlockchainError::SubmissionFailed {
                stage,
                reason: e.to_string(),
            },
        }
    }

    /// Wrap a failed read-only query.
    pub(crate) fn query(err: BlockchainError) -> Self {
        match err {
            BlockchainError::Transport(reason) => BlockchainError::QueryFailed(reason),
            e => e,
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// A signed legacy (EIP-155) transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub nonce: u64,
    pub to: Address,
    /// Always zero for contract registration calls.
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
    pub input: Bytes,
    pub signature: Signature,
    pub hash: TxHash,
    /// EIP-2718 encoding handed to `eth_sendRawTransaction`.
    pub raw: Bytes,
}

/// The parts of a mined transaction's receipt this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

impl From<&alloy::rpc::types::TransactionReceipt> for Receipt {
    fn from(receipt: &alloy::rpc::types::TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }
    }
}

/// Transaction confirmation status as seen by a watcher.
///
/// `Confirmed` and `Reverted` are final. `TimedOut` and `Cancelled` only say
/// the watcher stopped looking; the transaction may still be mined later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmationState {
    /// No receipt observed yet.
    Pending,
    /// Mined with a success status.
    Confirmed { block_number: Option<u64>, gas_used: u64 },
    /// Mined, but the contract rejected it.
    Reverted { block_number: Option<u64> },
    /// Polling budget exhausted while still pending.
    TimedOut { attempts: u32 },
    /// Caller stopped the watcher.
    Cancelled { attempts: u32 },
}

impl ConfirmationState {
    /// Whether the ledger outcome is known and can no longer change.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ConfirmationState::Confirmed { .. } | ConfirmationState::Reverted { .. }
        )
    }

    /// Whether a watcher stops in this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationState::Pending)
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationState::Pending => "pending",
            ConfirmationState::Confirmed { .. } => "confirmed",
            ConfirmationState::Reverted { .. } => "reverted",
            ConfirmationState::TimedOut { .. } => "timed_out",
            ConfirmationState::Cancelled { .. } => "cancelled",
        }
    }

    /// Map a revert to a domain error; every other state passes through.
    pub fn into_result(self, tx_hash: TxHash) -> BlockchainResult<ConfirmationState> {
        match self {
            ConfirmationState::Reverted { .. } => Err(BlockchainError::Reverted(tx_hash)),
            other => Ok(other),
        }
    }
}

impl From<&Receipt> for ConfirmationState {
    fn from(receipt: &Receipt) -> Self {
        if receipt.success {
            ConfirmationState::Confirmed {
                block_number: receipt.block_number,
                gas_used: receipt.gas_used,
            }
        } else {
            ConfirmationState::Reverted {
                block_number: receipt.block_number,
            }
        }
    }
}
