//! Content DTOs and their contract encoding.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationState};
use crate::blockchain::watcher::WatchHandle;

/// Content to register, as supplied by the off-chain store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDraft {
    /// Distributed-storage pointer to the artifact.
    pub ipfs_hash: String,
    pub prompt: String,
    pub style: String,
    pub model: String,
    pub width: u64,
    pub height: u64,
    pub seed: String,
    pub cfg_scale: u64,
    pub steps: u64,
    /// Integrity hash of the generated artifact.
    pub content_hash: String,
}

impl ContentDraft {
    /// Arguments for `storeContent`, in declaration order.
    pub fn to_call_args(&self) -> Vec<DynSolValue> {
        vec![
            DynSolValue::String(self.ipfs_hash.clone()),
            DynSolValue::String(self.prompt.clone()),
            DynSolValue::String(self.style.clone()),
            DynSolValue::String(self.model.clone()),
            uint(self.width),
            uint(self.height),
            DynSolValue::String(self.seed.clone()),
            uint(self.cfg_scale),
            uint(self.steps),
            DynSolValue::String(self.content_hash.clone()),
        ]
    }

    /// Inverse of [`ContentDraft::to_call_args`].
    pub fn from_call_args(args: &[DynSolValue]) -> BlockchainResult<Self> {
        let mut fields = Fields::new("storeContent", args, 10)?;
        Ok(Self {
            ipfs_hash: fields.string()?,
            prompt: fields.string()?,
            style: fields.string()?,
            model: fields.string()?,
            width: fields.u64()?,
            height: fields.u64()?,
            seed: fields.string()?,
            cfg_scale: fields.u64()?,
            steps: fields.u64()?,
            content_hash: fields.string()?,
        })
    }
}

/// A content record as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: U256,
    pub ipfs_hash: String,
    pub prompt: String,
    pub style: String,
    pub creator: Address,
    /// Block timestamp of registration, in seconds.
    pub timestamp: U256,
    pub is_nft: bool,
    pub nft_token_id: U256,
    pub model: String,
    // Numeric fields keep the contract's uint256 width; a draft is narrower.
    pub width: U256,
    pub height: U256,
    pub seed: String,
    pub cfg_scale: U256,
    pub steps: U256,
    pub content_hash: String,
    /// False when the contract returned an empty slot.
    pub exists: bool,
}

impl ContentRecord {
    /// Build the record the contract would hold for `draft`.
    pub fn from_draft(id: U256, creator: Address, timestamp: u64, draft: &ContentDraft) -> Self {
        Self {
            id,
            ipfs_hash: draft.ipfs_hash.clone(),
            prompt: draft.prompt.clone(),
            style: draft.style.clone(),
            creator,
            timestamp: U256::from(timestamp),
            is_nft: false,
            nft_token_id: U256::ZERO,
            model: draft.model.clone(),
            width: U256::from(draft.width),
            height: U256::from(draft.height),
            seed: draft.seed.clone(),
            cfg_scale: U256::from(draft.cfg_scale),
            steps: U256::from(draft.steps),
            content_hash: draft.content_hash.clone(),
            exists: true,
        }
    }

    /// Encode as the `getContent` return tuple.
    pub fn to_abi(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            DynSolValue::Uint(self.id, 256),
            DynSolValue::String(self.ipfs_hash.clone()),
            DynSolValue::String(self.prompt.clone()),
            DynSolValue::String(self.style.clone()),
            DynSolValue::Address(self.creator),
            DynSolValue::Uint(self.timestamp, 256),
            DynSolValue::Bool(self.is_nft),
            DynSolValue::Uint(self.nft_token_id, 256),
            DynSolValue::String(self.model.clone()),
            DynSolValue::Uint(self.width, 256),
            DynSolValue::Uint(self.height, 256),
            DynSolValue::String(self.seed.clone()),
            DynSolValue::Uint(self.cfg_scale, 256),
            DynSolValue::Uint(self.steps, 256),
            DynSolValue::String(self.content_hash.clone()),
            DynSolValue::Bool(self.exists),
        ])
    }

    /// Decode the `getContent` return tuple.
    pub fn from_abi(value: &DynSolValue) -> BlockchainResult<Self> {
        let values = value
            .as_tuple()
            .ok_or_else(|| BlockchainError::Schema("getContent did not return a tuple".into()))?;
        let mut fields = Fields::new("getContent", values, 16)?;

        Ok(Self {
            id: fields.uint()?,
            ipfs_hash: fields.string()?,
            prompt: fields.string()?,
            style: fields.string()?,
            creator: fields.address()?,
            timestamp: fields.uint()?,
            is_nft: fields.bool()?,
            nft_token_id: fields.uint()?,
            model: fields.string()?,
            width: fields.uint()?,
            height: fields.uint()?,
            seed: fields.string()?,
            cfg_scale: fields.uint()?,
            steps: fields.uint()?,
            content_hash: fields.string()?,
            exists: fields.bool()?,
        })
    }
}

/// Result of listing an owner's content: what was fetched and what was not.
#[derive(Debug, Default)]
pub struct OwnerContent {
    pub owner: Address,
    pub records: Vec<ContentRecord>,
    pub failures: Vec<FetchFailure>,
}

impl OwnerContent {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A content id that could not be fetched.
#[derive(Debug)]
pub struct FetchFailure {
    pub id: U256,
    pub error: BlockchainError,
}

/// A submitted registration and the watcher tracking it.
#[derive(Debug)]
pub struct Registration {
    pub tx_hash: TxHash,
    pub watch: WatchHandle,
}

impl Registration {
    /// Wait for the watcher; a revert becomes [`BlockchainError::Reverted`].
    pub async fn confirmed(self) -> BlockchainResult<ConfirmationState> {
        let tx_hash = self.tx_hash;
        self.watch.wait().await?.into_result(tx_hash)
    }
}

fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

/// Positional reader over decoded ABI values.
struct Fields<'a> {
    function: &'static str,
    values: std::slice::Iter<'a, DynSolValue>,
    index: usize,
}

impl<'a> Fields<'a> {
    fn new(function: &'static str, values: &'a [DynSolValue], expected: usize) -> BlockchainResult<Self> {
        if values.len() != expected {
            return Err(BlockchainError::Schema(format!(
                "{} expects {} fields, got {}",
                function,
                expected,
                values.len()
            )));
        }
        Ok(Self {
            function,
            values: values.iter(),
            index: 0,
        })
    }

    fn next<T>(&mut self, kind: &str, pick: impl FnOnce(&DynSolValue) -> Option<T>) -> BlockchainResult<T> {
        let index = self.index;
        self.index += 1;
        self.values
            .next()
            .and_then(pick)
            .ok_or_else(|| BlockchainError::Schema(format!("{} field {} is not {}", self.function, index, kind)))
    }

    fn string(&mut self) -> BlockchainResult<String> {
        self.next("a string", |v| v.as_str().map(str::to_owned))
    }

    fn uint(&mut self) -> BlockchainResult<U256> {
        self.next("a uint256", |v| v.as_uint().map(|(n, _)| n))
    }

    fn u64(&mut self) -> BlockchainResult<u64> {
        self.next("a uint256 within u64 range", |v| {
            v.as_uint().and_then(|(n, _)| u64::try_from(n).ok())
        })
    }

    fn address(&mut self) -> BlockchainResult<Address> {
        self.next("an address", DynSolValue::as_address)
    }

    fn bool(&mut self) -> BlockchainResult<bool> {
        self.next("a bool", DynSolValue::as_bool)
    }
}
