//! On-chain content registration client.
//!
//! Turns a content draft into a signed, broadcast and confirmed ledger
//! transaction, and reads registered content back by id or owner.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use blockchain::{BlockchainError, BlockchainResult, ChainTransport, ConfirmationState, RpcTransport, Wallet};
pub use config::schema::RegistryConfig;
pub use registry::{ContentDraft, ContentRecord, ContentRegistry, OwnerContent, Registration};
