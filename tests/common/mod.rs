//! Shared utilities for integration testing.
//!
//! `MockLedger` stands in for a node serving the registry contract: it
//! decodes signed `storeContent` transactions, keeps the resulting records
//! and answers `getContent` / `getUserContentIds` calls from them.

#![allow(dead_code)]

use alloy::consensus::TxEnvelope;
use alloy::dyn_abi::DynSolValue;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use content_registry::blockchain::{BlockchainError, BlockchainResult, CallCodec, ChainTransport, Receipt};
use content_registry::config::RegistryConfig;
use content_registry::registry::abi::{registry_codec, GET_CONTENT, GET_USER_CONTENT_IDS, STORE_CONTENT};
use content_registry::registry::{ContentDraft, ContentRecord};

/// First Anvil development account.
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_CHAIN_ID: u64 = 31337;
pub const TEST_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const BLOCK_TIMESTAMP: u64 = 1_700_000_000;

/// Registry config pointed at the mock ledger.
pub fn test_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.chain.chain_id = TEST_CHAIN_ID;
    config.chain.contract_address = TEST_CONTRACT.to_string();
    config
}

pub fn sunset_draft() -> ContentDraft {
    ContentDraft {
        ipfs_hash: "QmSunsetOverMountains".into(),
        prompt: "sunset over mountains".into(),
        style: "photographic".into(),
        model: "stable-diffusion-xl-1024-v1-0".into(),
        width: 1024,
        height: 1024,
        seed: "42".into(),
        cfg_scale: 7,
        steps: 30,
        content_hash: "0x9c1185a5c5e9fc54612808977ee8f548b2258d31".into(),
    }
}

/// A transaction the ledger accepted.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub hash: TxHash,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: Option<u64>,
}

#[derive(Default)]
struct Ledger {
    records: Vec<ContentRecord>,
    by_owner: HashMap<Address, Vec<U256>>,
    accepted: Vec<Accepted>,
    polls: HashMap<TxHash, u32>,
}

pub struct MockLedger {
    codec: CallCodec,
    /// Account registrations are attributed to.
    pub owner: Address,
    pub chain_id: u64,
    pub gas_price: u128,
    pub gas_estimate: u64,
    pub pending_nonce: u64,
    /// Receipts appear on this poll of a given hash (1-based).
    pub receipt_on_poll: u32,
    /// `getContent` for these ids fails with a transport error.
    pub failing_ids: HashSet<U256>,
    /// Number of upcoming broadcasts to reject as the node would.
    pub reject_sends: AtomicU32,
    pub nonce_queries: AtomicU32,
    ledger: Mutex<Ledger>,
}

impl MockLedger {
    pub fn new(owner: Address) -> Self {
        Self {
            codec: registry_codec().expect("registry codec"),
            owner,
            chain_id: TEST_CHAIN_ID,
            gas_price: 20,
            gas_estimate: 150_000,
            pending_nonce: 0,
            receipt_on_poll: 1,
            failing_ids: HashSet::new(),
            reject_sends: AtomicU32::new(0),
            nonce_queries: AtomicU32::new(0),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn accepted(&self) -> Vec<Accepted> {
        self.ledger.lock().unwrap().accepted.clone()
    }

    pub fn polls(&self, tx_hash: TxHash) -> u32 {
        self.ledger.lock().unwrap().polls.get(&tx_hash).copied().unwrap_or(0)
    }

    /// Store a record directly, as if registered by `creator` earlier.
    pub fn seed(&self, creator: Address, draft: &ContentDraft) -> U256 {
        let mut ledger = self.ledger.lock().unwrap();
        insert(&mut ledger, creator, draft)
    }

    fn store(&self, raw: &[u8]) -> BlockchainResult<Accepted> {
        let mut buf = raw;
        let envelope = TxEnvelope::decode_2718(&mut buf)
            .map_err(|e| BlockchainError::Remote { code: -32000, message: format!("rlp: {}", e) })?;
        let signed = envelope.as_legacy().ok_or_else(|| BlockchainError::Remote {
            code: -32000,
            message: "only legacy transactions are supported".into(),
        })?;
        let tx = signed.tx();

        let args = self
            .codec
            .decode_call(STORE_CONTENT, &tx.input)
            .map_err(|e| BlockchainError::Remote { code: 3, message: format!("execution reverted: {}", e) })?;
        let draft = ContentDraft::from_call_args(&args)?;

        let accepted = Accepted {
            hash: keccak256(raw),
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            chain_id: tx.chain_id,
        };

        let mut ledger = self.ledger.lock().unwrap();
        insert(&mut ledger, self.owner, &draft);
        ledger.accepted.push(accepted.clone());
        Ok(accepted)
    }

    fn content(&self, id: U256) -> BlockchainResult<Bytes> {
        if self.failing_ids.contains(&id) {
            return Err(BlockchainError::Transport(format!("connection reset while reading {}", id)));
        }
        let ledger = self.ledger.lock().unwrap();
        let record = ledger
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap_or_else(|| empty_record(id));
        self.codec.encode_output(GET_CONTENT, &[record.to_abi()])
    }

    fn ids(&self, owner: Address) -> BlockchainResult<Bytes> {
        let ledger = self.ledger.lock().unwrap();
        let ids = ledger
            .by_owner
            .get(&owner)
            .map(|ids| ids.iter().map(|id| DynSolValue::Uint(*id, 256)).collect())
            .unwrap_or_default();
        self.codec.encode_output(GET_USER_CONTENT_IDS, &[DynSolValue::Array(ids)])
    }
}

fn insert(ledger: &mut Ledger, creator: Address, draft: &ContentDraft) -> U256 {
    let id = U256::from(ledger.records.len() + 1);
    ledger
        .records
        .push(ContentRecord::from_draft(id, creator, BLOCK_TIMESTAMP, draft));
    ledger.by_owner.entry(creator).or_default().push(id);
    id
}

/// What the contract returns for an unused slot.
fn empty_record(id: U256) -> ContentRecord {
    ContentRecord {
        id,
        ipfs_hash: String::new(),
        prompt: String::new(),
        style: String::new(),
        creator: Address::ZERO,
        timestamp: U256::ZERO,
        is_nft: false,
        nft_token_id: U256::ZERO,
        model: String::new(),
        width: U256::ZERO,
        height: U256::ZERO,
        seed: String::new(),
        cfg_scale: U256::ZERO,
        steps: U256::ZERO,
        content_hash: String::new(),
        exists: false,
    }
}

#[async_trait]
impl ChainTransport for MockLedger {
    async fn call(&self, _to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        match self.codec.function_for(&data) {
            Some(GET_CONTENT) => {
                let args = self.codec.decode_call(GET_CONTENT, &data)?;
                let id = args
                    .first()
                    .and_then(DynSolValue::as_uint)
                    .map(|(id, _)| id)
                    .unwrap_or_default();
                self.content(id)
            }
            Some(GET_USER_CONTENT_IDS) => {
                let args = self.codec.decode_call(GET_USER_CONTENT_IDS, &data)?;
                let owner = args.first().and_then(DynSolValue::as_address).unwrap_or_default();
                self.ids(owner)
            }
            _ => Err(BlockchainError::Remote {
                code: 3,
                message: "execution reverted".into(),
            }),
        }
    }

    async fn estimate_gas(&self, _from: Address, _to: Address, _data: Bytes) -> BlockchainResult<u64> {
        Ok(self.gas_estimate)
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        Ok(self.gas_price)
    }

    async fn pending_nonce(&self, _address: Address) -> BlockchainResult<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.pending_nonce)
    }

    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let rejected = self
            .reject_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(BlockchainError::Remote {
                code: -32000,
                message: "insufficient funds for gas * price + value".into(),
            });
        }
        Ok(self.store(&raw)?.hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>> {
        let mut ledger = self.ledger.lock().unwrap();
        if !ledger.accepted.iter().any(|a| a.hash == tx_hash) {
            return Ok(None);
        }
        let poll = ledger.polls.entry(tx_hash).or_insert(0);
        *poll += 1;
        if *poll < self.receipt_on_poll {
            return Ok(None);
        }
        Ok(Some(Receipt {
            tx_hash,
            success: true,
            block_number: Some(4_000_000 + *poll as u64),
            gas_used: 120_000,
        }))
    }

    async fn chain_id(&self) -> BlockchainResult<u64> {
        Ok(self.chain_id)
    }
}

/// Wraps a transport and records how many requests overlap.
pub struct CountingTransport {
    inner: Arc<dyn ChainTransport>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingTransport {
    pub fn new(inner: Arc<dyn ChainTransport>) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Most requests of any kind that were running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of `call` requests started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn tracked<T>(&self, request: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Stay in flight long enough for other tasks to pile up.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let result = request.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ChainTransport for CountingTransport {
    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tracked(self.inner.call(to, data)).await
    }

    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes) -> BlockchainResult<u64> {
        self.tracked(self.inner.estimate_gas(from, to, data)).await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.tracked(self.inner.gas_price()).await
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.tracked(self.inner.pending_nonce(address)).await
    }

    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.tracked(self.inner.send_raw(raw)).await
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>> {
        self.tracked(self.inner.receipt(tx_hash)).await
    }

    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.tracked(self.inner.chain_id()).await
    }
}
