//! Content registration on the ledger.
//!
//! # Data Flow
//! ```text
//! ContentDraft
//!     → service.rs register (storeContent via TxPipeline) → Registration { tx_hash, WatchHandle }
//!
//! content id / owner address
//!     → service.rs get / list_by_owner (eth_call + CallCodec decode)
//!     → ContentRecord (exists=false maps to absent)
//! ```

pub mod abi;
pub mod service;
pub mod types;

pub use service::ContentRegistry;
pub use types::{ContentDraft, ContentRecord, FetchFailure, OwnerContent, Registration};
