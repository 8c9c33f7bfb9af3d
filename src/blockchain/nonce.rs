//! Per-account nonce sequencing.
//!
//! The first reservation for an account seeds the counter from the node's
//! pending transaction count; every later reservation is served locally.
//! Issued nonces are never handed back: a submission that fails after
//! reserving leaves a gap in the account's sequence.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::blockchain::transport::ChainTransport;
use crate::blockchain::types::BlockchainResult;
use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::retries::retry_transient;

/// Issues strictly increasing, never reused nonces per account.
pub struct NonceSequencer {
    transport: Arc<dyn ChainTransport>,
    retries: RetryConfig,
    /// Next nonce per account; `None` until seeded.
    accounts: DashMap<Address, Arc<Mutex<Option<u64>>>>,
}

impl NonceSequencer {
    pub fn new(transport: Arc<dyn ChainTransport>, retries: RetryConfig) -> Self {
        Self {
            transport,
            retries,
            accounts: DashMap::new(),
        }
    }

    /// Return the next nonce for `address` and advance the counter.
    ///
    /// Callers for the same account are serialized; different accounts never
    /// contend. Seeding failures leave the account unseeded so the next call
    /// tries again.
    pub async fn reserve(&self, address: Address) -> BlockchainResult<u64> {
        // Clone the slot out so the map shard lock is not held across awaits.
        let slot = self
            .accounts
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone();

        let mut next = slot.lock().await;
        let nonce = match *next {
            Some(n) => n,
            None => {
                let seed = retry_transient(&self.retries, "pending_nonce", || {
                    self.transport.pending_nonce(address)
                })
                .await?;
                tracing::info!(address = %address, nonce = seed, "Seeded nonce sequence from node");
                seed
            }
        };
        *next = Some(nonce + 1);

        metrics::record_nonce_reserved();
        tracing::debug!(address = %address, nonce, "Nonce reserved");
        Ok(nonce)
    }

    /// Next nonce that would be issued, if the account has been seeded.
    pub async fn peek(&self, address: Address) -> Option<u64> {
        let slot = self.accounts.get(&address).map(|s| Arc::clone(s.value()))?;
        let next = *slot.lock().await;
        next
    }
}

impl std::fmt::Debug for NonceSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceSequencer")
            .field("accounts", &self.accounts.len())
            .finish()
    }
}
