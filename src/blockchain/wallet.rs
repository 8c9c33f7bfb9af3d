//! Key management and transaction signing.
//!
//! # Security
//! - Private keys are loaded from the caller or from an environment variable
//! - Keys are never logged or serialized
//! - Only signing is exposed; the raw key never leaves this module

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Signature, TxKind, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::blockchain::types::{BlockchainError, BlockchainResult, SignedTransaction};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "CONTENT_REGISTRY_PRIVATE_KEY";

/// Signing key for a single account.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    pub fn from_private_key(private_key_hex: &str) -> BlockchainResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::InvalidKey(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Wallet initialized");

        Ok(Self { signer })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `CONTENT_REGISTRY_PRIVATE_KEY` from environment.
    pub fn from_env() -> BlockchainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BlockchainError::InvalidKey(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key)
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a 32-byte digest.
    pub async fn sign_hash(&self, hash: B256) -> BlockchainResult<Signature> {
        self.signer
            .sign_hash(&hash)
            .await
            .map_err(signing_failed)
    }

    /// Sign a legacy transaction with EIP-155 replay protection.
    ///
    /// The chain id is folded into the signing hash, so the signature is only
    /// valid on that network.
    pub async fn sign_transaction(&self, tx: TxLegacy) -> BlockchainResult<SignedTransaction> {
        let chain_id = tx.chain_id.ok_or_else(|| {
            BlockchainError::Schema("refusing to sign a transaction without a chain id".into())
        })?;
        let to = match tx.to {
            TxKind::Call(to) => to,
            TxKind::Create => {
                return Err(BlockchainError::Schema(
                    "contract creation is not supported".into(),
                ))
            }
        };

        let signature = self.sign_hash(tx.signature_hash()).await?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let nonce = signed.tx().nonce;
        let gas_limit = signed.tx().gas_limit;
        let gas_price = signed.tx().gas_price;
        let value = signed.tx().value;
        let input = signed.tx().input.clone();

        let raw = TxEnvelope::from(signed).encoded_2718();

        Ok(SignedTransaction {
            nonce,
            to,
            value,
            gas_limit,
            gas_price,
            chain_id,
            input,
            signature,
            hash,
            raw: raw.into(),
        })
    }
}

/// A key that parsed at construction can still fail to sign at runtime.
fn signing_failed(err: impl std::fmt::Display) -> BlockchainError {
    BlockchainError::SubmissionFailed {
        stage: "sign",
        reason: err.to_string(),
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
