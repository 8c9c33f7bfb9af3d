//! Transaction building, signing, and broadcast.
//!
//! # Responsibilities
//! - Encode the contract call
//! - Reserve a nonce, quote gas price and gas limit
//! - Sign with the chain id reported by the node
//! - Broadcast with retry on transport failures
//!
//! Submission returns as soon as the node accepts the transaction;
//! confirmation is the watcher's job.

use alloy::consensus::TxLegacy;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::blockchain::codec::CallCodec;
use crate::blockchain::nonce::NonceSequencer;
use crate::blockchain::transport::ChainTransport;
use crate::blockchain::types::{BlockchainError, BlockchainResult, SignedTransaction};
use crate::blockchain::wallet::Wallet;
use crate::config::schema::{GasConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::retries::retry_transient;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Builds, signs and broadcasts contract calls from one wallet.
pub struct TxPipeline {
    transport: Arc<dyn ChainTransport>,
    wallet: Wallet,
    codec: Arc<CallCodec>,
    nonces: Arc<NonceSequencer>,
    contract: Address,
    gas: GasConfig,
    retries: RetryConfig,
    /// Network the signatures must be bound to, when configured.
    expected_chain_id: Option<u64>,
    chain_id: OnceCell<u64>,
}

impl TxPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn ChainTransport>,
        wallet: Wallet,
        codec: Arc<CallCodec>,
        nonces: Arc<NonceSequencer>,
        contract: Address,
        gas: GasConfig,
        retries: RetryConfig,
        expected_chain_id: Option<u64>,
    ) -> Self {
        Self {
            transport,
            wallet,
            codec,
            nonces,
            contract,
            gas,
            retries,
            expected_chain_id,
            chain_id: OnceCell::new(),
        }
    }

    /// Encode, sign and broadcast a call to `function`.
    pub async fn submit(&self, function: &str, args: &[DynSolValue]) -> BlockchainResult<TxHash> {
        let result = async {
            let signed = self.prepare(function, args).await?;
            self.broadcast(&signed).await
        }
        .await;

        metrics::record_submission(if result.is_ok() { "accepted" } else { "failed" });
        result
    }

    /// Steps up to and including signing. Consumes a nonce unless encoding fails.
    pub async fn prepare(&self, function: &str, args: &[DynSolValue]) -> BlockchainResult<SignedTransaction> {
        let input = self.codec.encode(function, args)?;
        let from = self.wallet.address();

        let nonce = self
            .nonces
            .reserve(from)
            .await
            .map_err(|e| BlockchainError::submission("nonce", e))?;

        let gas_price = self.quote_gas_price().await?;
        let gas_limit = self.quote_gas_limit(from, input.clone()).await?;
        let chain_id = self.chain_id().await?;

        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            input,
        };

        let signed = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| BlockchainError::submission("sign", e))?;

        tracing::debug!(
            function,
            nonce,
            gas_price,
            gas_limit,
            chain_id,
            tx_hash = %signed.hash,
            "Transaction signed"
        );
        Ok(signed)
    }

    /// Broadcast a signed transaction.
    ///
    /// Re-sending the same signed bytes after a transport failure is safe: the
    /// nonce pins it to one slot, so the node either already has it or takes it now.
    pub async fn broadcast(&self, signed: &SignedTransaction) -> BlockchainResult<TxHash> {
        let mut attempts = 0u32;
        let result = retry_transient(&self.retries, "send_raw", || {
            attempts += 1;
            self.transport.send_raw(signed.raw.clone())
        })
        .await;

        match result {
            Ok(hash) => {
                if hash != signed.hash {
                    tracing::warn!(
                        local = %signed.hash,
                        remote = %hash,
                        "Node reported a different transaction hash"
                    );
                }
                tracing::info!(tx_hash = %signed.hash, nonce = signed.nonce, "Transaction broadcast");
                Ok(signed.hash)
            }
            // A retried broadcast whose first attempt landed.
            Err(BlockchainError::Remote { ref message, .. }) if attempts > 1 && is_already_known(message) => {
                tracing::info!(tx_hash = %signed.hash, "Transaction already known to node");
                Ok(signed.hash)
            }
            Err(e) => {
                tracing::warn!(tx_hash = %signed.hash, nonce = signed.nonce, error = %e, "Broadcast failed");
                Err(BlockchainError::submission("broadcast", e))
            }
        }
    }

    /// Address transactions are sent from.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn quote_gas_price(&self) -> BlockchainResult<u128> {
        let suggested = retry_transient(&self.retries, "gas_price", || self.transport.gas_price())
            .await
            .map_err(|e| BlockchainError::submission("gas price", e))?;

        let adjusted = (suggested as f64 * self.gas.price_multiplier) as u128;
        let ceiling = (self.gas.max_gas_price_gwei as u128).saturating_mul(WEI_PER_GWEI);
        if adjusted > ceiling {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: u64::try_from(adjusted.div_ceil(WEI_PER_GWEI)).unwrap_or(u64::MAX),
                max_gwei: self.gas.max_gas_price_gwei,
            });
        }
        Ok(adjusted)
    }

    async fn quote_gas_limit(&self, from: Address, input: Bytes) -> BlockchainResult<u64> {
        let estimate = retry_transient(&self.retries, "estimate_gas", || {
            self.transport.estimate_gas(from, self.contract, input.clone())
        })
        .await
        .map_err(|e| BlockchainError::submission("gas estimate", e))?;

        Ok(self.gas.padded_limit(estimate))
    }

    /// Chain id reported by the node, fetched once and checked against configuration.
    async fn chain_id(&self) -> BlockchainResult<u64> {
        let chain_id = *self
            .chain_id
            .get_or_try_init(|| async {
                let reported = retry_transient(&self.retries, "chain_id", || self.transport.chain_id())
                    .await
                    .map_err(|e| BlockchainError::submission("chain id", e))?;
                match self.expected_chain_id {
                    Some(expected) if expected != reported => Err(BlockchainError::ChainMismatch {
                        expected,
                        actual: reported,
                    }),
                    _ => Ok(reported),
                }
            })
            .await?;
        Ok(chain_id)
    }
}

impl std::fmt::Debug for TxPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxPipeline")
            .field("from", &self.wallet.address())
            .field("contract", &self.contract)
            .field("chain_id", &self.chain_id.get())
            .finish()
    }
}

fn is_already_known(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already known") || message.contains("known transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::codec::FunctionDef;
    use crate::blockchain::testing::{ScriptedTransport, TEST_PRIVATE_KEY};
    use alloy::primitives::keccak256;
    use std::sync::atomic::Ordering;

    const TABLE: &[FunctionDef] = &[FunctionDef {
        name: "ping",
        inputs: &["uint256"],
        outputs: &[],
    }];

    fn contract() -> Address {
        Address::repeat_byte(0xcc)
    }

    fn pipeline(transport: Arc<ScriptedTransport>, expected_chain_id: Option<u64>) -> TxPipeline {
        let retries = RetryConfig::default();
        let nonces = Arc::new(NonceSequencer::new(transport.clone(), retries.clone()));
        TxPipeline::new(
            transport,
            Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap(),
            Arc::new(CallCodec::new(TABLE).unwrap()),
            nonces,
            contract(),
            GasConfig::default(),
            retries,
            expected_chain_id,
        )
    }

    fn ping(n: u64) -> Vec<DynSolValue> {
        vec![DynSolValue::Uint(U256::from(n), 256)]
    }

    #[tokio::test]
    async fn test_prepare_builds_padded_signed_transaction() {
        let transport = Arc::new(ScriptedTransport {
            pending_nonce: 7,
            gas_price: 20,
            gas_estimate: 100_000,
            ..Default::default()
        });
        let pipeline = pipeline(transport, Some(31337));

        let signed = pipeline.prepare("ping", &ping(1)).await.unwrap();

        assert_eq!(signed.nonce, 7);
        assert_eq!(signed.gas_price, 20);
        assert_eq!(signed.gas_limit, 120_000);
        assert_eq!(signed.chain_id, 31337);
        assert_eq!(signed.to, contract());
        assert_eq!(signed.value, U256::ZERO);
        assert_eq!(signed.hash, keccak256(&signed.raw));
    }

    #[tokio::test]
    async fn test_submit_returns_hash_and_advances_nonce() {
        let transport = Arc::new(ScriptedTransport {
            pending_nonce: 3,
            ..Default::default()
        });
        let pipeline = pipeline(transport.clone(), None);

        let first = pipeline.submit("ping", &ping(1)).await.unwrap();
        let second = pipeline.submit("ping", &ping(1)).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
        assert_eq!(keccak256(&transport.sent.lock().unwrap()[0]), first);
    }

    #[tokio::test]
    async fn test_schema_error_consumes_no_nonce() {
        let transport = Arc::new(ScriptedTransport::default());
        let pipeline = pipeline(transport.clone(), None);

        let err = pipeline.submit("ping", &[]).await.unwrap_err();
        assert!(matches!(err, BlockchainError::Schema(_)));
        assert_eq!(transport.nonce_queries.load(Ordering::SeqCst), 0);

        pipeline.submit("ping", &ping(2)).await.unwrap();
        let signed = pipeline.prepare("ping", &ping(3)).await.unwrap();
        assert_eq!(signed.nonce, 1);
    }

    #[tokio::test]
    async fn test_remote_rejection_is_submission_failure_and_leaves_gap() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.send_errors.lock().unwrap().push_back(BlockchainError::Remote {
            code: -32000,
            message: "replacement transaction underpriced".into(),
        });
        let pipeline = pipeline(transport.clone(), None);

        let err = pipeline.submit("ping", &ping(1)).await.unwrap_err();
        match err {
            BlockchainError::SubmissionFailed { stage, reason } => {
                assert_eq!(stage, "broadcast");
                assert!(reason.contains("underpriced"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 1);

        // Nonce 0 was consumed by the failed attempt.
        let signed = pipeline.prepare("ping", &ping(1)).await.unwrap();
        assert_eq!(signed.nonce, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_are_retried_on_broadcast() {
        let transport = Arc::new(ScriptedTransport::default());
        transport
            .send_errors
            .lock()
            .unwrap()
            .push_back(BlockchainError::Transport("connection reset".into()));
        let pipeline = pipeline(transport.clone(), None);

        let hash = pipeline.submit("ping", &ping(1)).await.unwrap();
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 2);
        assert_eq!(keccak256(&transport.sent.lock().unwrap()[0]), hash);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_known_after_retry_is_success() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.send_errors.lock().unwrap().extend([
            BlockchainError::Transport("timeout".into()),
            BlockchainError::Remote {
                code: -32000,
                message: "already known".into(),
            },
        ]);
        let pipeline = pipeline(transport.clone(), None);

        let signed = pipeline.prepare("ping", &ping(1)).await.unwrap();
        assert_eq!(pipeline.broadcast(&signed).await.unwrap(), signed.hash);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_gas_price_retries() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.gas_price_errors.lock().unwrap().extend([
            BlockchainError::Transport("a".into()),
            BlockchainError::Transport("b".into()),
            BlockchainError::Transport("c".into()),
        ]);
        let pipeline = pipeline(transport.clone(), None);

        let err = pipeline.submit("ping", &ping(1)).await.unwrap_err();
        assert!(matches!(err, BlockchainError::SubmissionFailed { stage: "gas price", .. }));
        assert_eq!(transport.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gas_price_ceiling() {
        let transport = Arc::new(ScriptedTransport {
            gas_price: 600 * WEI_PER_GWEI,
            ..Default::default()
        });
        let pipeline = pipeline(transport, None);

        let err = pipeline.submit("ping", &ping(1)).await.unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::GasPriceTooHigh { current_gwei: 600, max_gwei: 500 }
        ));
    }

    #[tokio::test]
    async fn test_gas_price_ceiling_counts_fractional_gwei() {
        let transport = Arc::new(ScriptedTransport {
            gas_price: 500 * WEI_PER_GWEI + 900_000_000,
            ..Default::default()
        });
        let err = pipeline(transport, None).submit("ping", &ping(1)).await.unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::GasPriceTooHigh { current_gwei: 501, max_gwei: 500 }
        ));

        let at_ceiling = Arc::new(ScriptedTransport {
            gas_price: 500 * WEI_PER_GWEI,
            ..Default::default()
        });
        let signed = pipeline(at_ceiling, None).prepare("ping", &ping(1)).await.unwrap();
        assert_eq!(signed.gas_price, 500 * WEI_PER_GWEI);
    }

    #[tokio::test]
    async fn test_chain_mismatch_refuses_to_sign() {
        let transport = Arc::new(ScriptedTransport {
            chain_id: 1,
            ..Default::default()
        });
        let pipeline = pipeline(transport.clone(), Some(11_155_111));

        let err = pipeline.submit("ping", &ping(1)).await.unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::ChainMismatch { expected: 11_155_111, actual: 1 }
        ));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_already_known_messages() {
        assert!(is_already_known("already known"));
        assert!(is_already_known("Known transaction: 0xabc"));
        assert!(!is_already_known("nonce too low"));
    }
}
