//! Content registry facade.
//!
//! # Responsibilities
//! - Register drafts through the transaction pipeline
//! - Read single records and an owner's records back from the contract
//! - Bound concurrent requests against the node
//!
//! # Design Decisions
//! - All collaborators are injected; nothing is process-global
//! - The injected transport is wrapped once in a [`BoundedTransport`]; the
//!   pipeline, nonce sequencer, watchers and reads all share that limit
//! - A missing record is `Ok(None)`, not an error
//! - Listing tolerates per-record failures and reports them alongside results

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use futures_util::stream::{self, Stream, StreamExt};
use std::sync::Arc;

use crate::blockchain::codec::CallCodec;
use crate::blockchain::nonce::NonceSequencer;
use crate::blockchain::transaction::TxPipeline;
use crate::blockchain::transport::{BoundedTransport, ChainTransport};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Wallet;
use crate::blockchain::watcher::{ConfirmationWatcher, WatchHandle, WatcherConfig};
use crate::config::loader::ConfigError;
use crate::config::schema::{RegistryConfig, RetryConfig};
use crate::config::validation::{contract_address, validate_config};
use crate::registry::abi::{registry_codec, GET_CONTENT, GET_USER_CONTENT_IDS, STORE_CONTENT};
use crate::registry::types::{ContentDraft, ContentRecord, FetchFailure, OwnerContent, Registration};
use crate::resilience::retries::retry_transient;

/// Domain operations over the content registry contract.
pub struct ContentRegistry {
    transport: Arc<dyn ChainTransport>,
    codec: Arc<CallCodec>,
    pipeline: TxPipeline,
    contract: Address,
    watcher: WatcherConfig,
    retries: RetryConfig,
    max_in_flight: usize,
}

impl ContentRegistry {
    /// Assemble the registry from its collaborators.
    ///
    /// The configuration is validated here as well as at load time, since
    /// library callers may build it by hand.
    pub fn new(
        config: &RegistryConfig,
        transport: Arc<dyn ChainTransport>,
        wallet: Wallet,
    ) -> BlockchainResult<Self> {
        validate_config(config)
            .map_err(|errors| BlockchainError::Config(ConfigError::Validation(errors).to_string()))?;
        let contract = contract_address(config).map_err(|e| BlockchainError::Config(e.to_string()))?;
        let codec = Arc::new(registry_codec()?);

        let max_in_flight = config.concurrency.max_in_flight.max(1);
        let transport: Arc<dyn ChainTransport> = Arc::new(BoundedTransport::new(transport, max_in_flight));
        let nonces = Arc::new(NonceSequencer::new(transport.clone(), config.retries.clone()));

        let pipeline = TxPipeline::new(
            transport.clone(),
            wallet,
            codec.clone(),
            nonces,
            contract,
            config.gas.clone(),
            config.retries.clone(),
            Some(config.chain.chain_id),
        );

        tracing::info!(
            contract = %contract,
            sender = %pipeline.address(),
            max_in_flight,
            "Content registry ready"
        );

        Ok(Self {
            transport,
            codec,
            pipeline,
            contract,
            watcher: WatcherConfig::from(&config.confirmation),
            retries: config.retries.clone(),
            max_in_flight,
        })
    }

    /// Account registrations are sent from.
    pub fn address(&self) -> Address {
        self.pipeline.address()
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Submit a `storeContent` transaction and start watching it.
    ///
    /// Returns once the node has accepted the transaction; await
    /// `Registration::watch` (or drop it) as needed.
    pub async fn register(&self, draft: &ContentDraft) -> BlockchainResult<Registration> {
        let tx_hash = self.pipeline.submit(STORE_CONTENT, &draft.to_call_args()).await?;

        tracing::info!(
            tx_hash = %tx_hash,
            ipfs_hash = %draft.ipfs_hash,
            "Registration submitted"
        );

        Ok(Registration {
            tx_hash,
            watch: self.watch(tx_hash),
        })
    }

    /// Start watching a transaction submitted earlier.
    pub fn watch(&self, tx_hash: TxHash) -> WatchHandle {
        ConfirmationWatcher::new(self.transport.clone(), tx_hash, self.watcher).spawn()
    }

    /// Fetch one record; `None` when the contract has no record under `id`.
    pub async fn get(&self, id: U256) -> BlockchainResult<Option<ContentRecord>> {
        let values = self
            .read(GET_CONTENT, &[DynSolValue::Uint(id, 256)])
            .await?;
        let record = values
            .first()
            .ok_or_else(|| BlockchainError::Schema("getContent returned no values".into()))
            .and_then(ContentRecord::from_abi)?;

        if !record.exists {
            tracing::debug!(id = %id, "Content not found");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Content ids registered by `owner`.
    pub async fn content_ids(&self, owner: Address) -> BlockchainResult<Vec<U256>> {
        let values = self
            .read(GET_USER_CONTENT_IDS, &[DynSolValue::Address(owner)])
            .await?;

        values
            .first()
            .and_then(DynSolValue::as_array)
            .ok_or_else(|| BlockchainError::Schema("getUserContentIds did not return an array".into()))?
            .iter()
            .map(|v| {
                v.as_uint()
                    .map(|(id, _)| id)
                    .ok_or_else(|| BlockchainError::Schema("content id is not a uint256".into()))
            })
            .collect()
    }

    /// Lazily fetch every record of `owner`, in id order.
    ///
    /// Each item carries its own result, so one failed fetch does not end the stream.
    pub async fn stream_by_owner(
        &self,
        owner: Address,
    ) -> BlockchainResult<impl Stream<Item = (U256, BlockchainResult<Option<ContentRecord>>)> + '_> {
        let ids = self.content_ids(owner).await?;
        tracing::debug!(owner = %owner, count = ids.len(), "Fetching owner content");

        Ok(stream::iter(ids)
            .map(move |id| async move { (id, self.get(id).await) })
            .buffered(self.max_in_flight))
    }

    /// Fetch every record of `owner`, collecting per-record failures.
    pub async fn list_by_owner(&self, owner: Address) -> BlockchainResult<OwnerContent> {
        let mut content = OwnerContent {
            owner,
            ..Default::default()
        };

        let mut items = Box::pin(self.stream_by_owner(owner).await?);
        while let Some((id, result)) = items.next().await {
            match result {
                Ok(Some(record)) => content.records.push(record),
                Ok(None) => tracing::debug!(owner = %owner, id = %id, "Listed id has no record"),
                Err(error) => {
                    tracing::warn!(owner = %owner, id = %id, error = %error, "Failed to fetch content");
                    content.failures.push(FetchFailure { id, error });
                }
            }
        }

        Ok(content)
    }

    /// Read-only contract call, retried on transport failures.
    async fn read(&self, function: &str, args: &[DynSolValue]) -> BlockchainResult<Vec<DynSolValue>> {
        let data: Bytes = self.codec.encode(function, args)?;

        let output = retry_transient(&self.retries, "call", || {
            self.transport.call(self.contract, data.clone())
        })
        .await
        .map_err(BlockchainError::query)?;

        self.codec.decode(function, &output)
    }
}

impl std::fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentRegistry")
            .field("contract", &self.contract)
            .field("pipeline", &self.pipeline)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}
