//! Link to a ledger node.
//!
//! Every operation can fail with [`BlockchainError::Transport`] (network or
//! timeout, retryable) or [`BlockchainError::Remote`] (the node rejected the
//! request, not retryable).

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::blockchain::types::{BlockchainError, BlockchainResult, Receipt};

/// Remote-procedure interface to a ledger node.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Read-only contract invocation (`eth_call`).
    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes>;

    /// Simulated gas cost (`eth_estimateGas`). Callers add a safety margin.
    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes) -> BlockchainResult<u64>;

    /// Suggested gas price in wei (`eth_gasPrice`).
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Pending transaction count for an account. Only used to seed the nonce sequencer.
    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// Broadcast a signed transaction (`eth_sendRawTransaction`).
    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash>;

    /// Receipt for a mined transaction, `None` while it is not yet mined.
    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>>;

    /// Network the node is serving (`eth_chainId`).
    async fn chain_id(&self) -> BlockchainResult<u64>;
}

/// Caps the number of requests in flight against an inner transport.
///
/// Every component that talks to the node shares one of these, so reads,
/// submissions and confirmation polls draw from the same permit pool. A
/// permit is held only for the duration of one request, never across
/// retry backoff or poll intervals.
pub struct BoundedTransport {
    inner: Arc<dyn ChainTransport>,
    permits: Semaphore,
    max_in_flight: usize,
}

impl BoundedTransport {
    pub fn new(inner: Arc<dyn ChainTransport>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            inner,
            permits: Semaphore::new(max_in_flight),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    async fn permit(&self, method: &'static str) -> BlockchainResult<SemaphorePermit<'_>> {
        if self.permits.available_permits() == 0 {
            tracing::trace!(method, max_in_flight = self.max_in_flight, "Waiting for a request slot");
        }
        self.permits
            .acquire()
            .await
            .map_err(|_| BlockchainError::Transport(format!("request limiter closed during {}", method)))
    }
}

#[async_trait]
impl ChainTransport for BoundedTransport {
    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        let _permit = self.permit("call").await?;
        self.inner.call(to, data).await
    }

    async fn estimate_gas(&self, from: Address, to: Address, data: Bytes) -> BlockchainResult<u64> {
        let _permit = self.permit("estimate_gas").await?;
        self.inner.estimate_gas(from, to, data).await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        let _permit = self.permit("gas_price").await?;
        self.inner.gas_price().await
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        let _permit = self.permit("pending_nonce").await?;
        self.inner.pending_nonce(address).await
    }

    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let _permit = self.permit("send_raw").await?;
        self.inner.send_raw(raw).await
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<Receipt>> {
        let _permit = self.permit("receipt").await?;
        self.inner.receipt(tx_hash).await
    }

    async fn chain_id(&self) -> BlockchainResult<u64> {
        let _permit = self.permit("chain_id").await?;
        self.inner.chain_id().await
    }
}

impl std::fmt::Debug for BoundedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedTransport")
            .field("max_in_flight", &self.max_in_flight)
            .field("available", &self.permits.available_permits())
            .finish()
    }
}
