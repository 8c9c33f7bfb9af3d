//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! contract call (function name + typed args)
//!     → codec.rs (selector + ABI encoding)
//!     → nonce.rs (per-account nonce, seeded once from the node)
//!     → transaction.rs (gas quote, EIP-155 signing via wallet.rs, broadcast)
//!     → watcher.rs (receipt polling → ConfirmationState)
//!
//! transport.rs is the seam to the node; client.rs implements it over JSON-RPC.
//! ```
//!
//! # Security Constraints
//! - Private keys come from the caller or an environment variable only
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod codec;
pub mod nonce;
pub mod transaction;
pub mod transport;
pub mod types;
pub mod wallet;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use client::RpcTransport;
pub use codec::{CallCodec, FunctionDef};
pub use nonce::NonceSequencer;
pub use transaction::TxPipeline;
pub use transport::{BoundedTransport, ChainTransport};
pub use types::{
    BlockchainError, BlockchainResult, ChainId, ConfirmationState, Receipt, SignedTransaction,
};
pub use wallet::Wallet;
pub use watcher::{ConfirmationWatcher, WatchHandle, WatcherConfig};
