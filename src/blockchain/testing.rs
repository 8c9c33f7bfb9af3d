//! Scripted in-memory transport for unit tests.

use alloy::primitives::{keccak256, Address, Bytes, TxHash};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::blockchain::transport::ChainTransport;
use crate::blockchain::types::{BlockchainError, BlockchainResult, Receipt};

pub(crate) const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Each field scripts one RPC method.
pub(crate) struct ScriptedTransport {
    pub chain_id: u64,
    pub gas_price: u128,
    pub gas_estimate: u64,
    pub pending_nonce: u64,
    /// Receipt appears on this poll (1-based); `None` never mines.
    pub receipt_on_poll: Option<u32>,
    pub receipt_success: bool,
    /// Make `receipt` panic, as a buggy transport might.
    pub panic_on_receipt: bool,
    /// Errors returned, in order, before `receipt` answers normally.
    pub receipt_errors: Mutex<VecDeque<BlockchainError>>,
    /// Errors returned, in order, before `send_raw` accepts.
    pub send_errors: Mutex<VecDeque<BlockchainError>>,
    /// Errors returned, in order, before `gas_price` answers.
    pub gas_price_errors: Mutex<VecDeque<BlockchainError>>,

    pub nonce_queries: AtomicU32,
    pub receipt_polls: AtomicU32,
    pub send_calls: AtomicU32,
    pub sent: Mutex<Vec<Bytes>>,
    /// `gas_price` requests currently running, and the most ever seen at once.
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            gas_price: 20,
            gas_estimate: 100_000,
            pending_nonce: 0,
            receipt_on_poll: Some(1),
            receipt_success: true,
            panic_on_receipt: false,
            receipt_errors: Mutex::new(VecDeque::new()),
            send_errors: Mutex::new(VecDeque::new()),
            gas_price_errors: Mutex::new(VecDeque::new()),
            nonce_queries: AtomicU32::new(0),
            receipt_polls: AtomicU32::new(0),
            send_calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedTransport {
    pub fn polls(&self) -> u32 {
        self.receipt_polls.load(Ordering::SeqCst)
    }
}

fn next_error(queue: &Mutex<VecDeque<BlockchainError>>) -> Option<BlockchainError> {
    queue.lock().ok().and_then(|mut q| q.pop_front())
}

#[async_trait]
impl ChainTransport for ScriptedTransport {
    async fn call(&self, _to: Address, _data: Bytes) -> BlockchainResult<Bytes> {
        Ok(Bytes::new())
    }

    async fn estimate_gas(&self, _from: Address, _to: Address, _data: Bytes) -> BlockchainResult<u64> {
        Ok(self.gas_estimate)
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next_error(&self.gas_price_errors) {
            Some(e) => Err(e),
            None => Ok(self.gas_price),
        }
    }

    async fn pending_nonce(&self, _address: Address) -> BlockchainResult<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.pending_nonce)
    }

    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = next_error(&self.send_errors) {
            return Err(e);
        }
        let hash = keccak256(&raw);
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>> {
        let poll = self.receipt_polls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_receipt {
            panic!("receipt lookup blew up on poll {}", poll);
        }
        if let Some(e) = next_error(&self.receipt_errors) {
            return Err(e);
        }
        match self.receipt_on_poll {
            Some(n) if poll >= n => Ok(Some(Receipt {
                tx_hash,
                success: self.receipt_success,
                block_number: Some(100 + poll as u64),
                gas_used: 90_000,
            })),
            _ => Ok(None),
        }
    }

    async fn chain_id(&self) -> BlockchainResult<u64> {
        Ok(self.chain_id)
    }
}
