//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the registry
//! client. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Node connection and contract location.
    pub chain: ChainConfig,

    /// Gas pricing policy.
    pub gas: GasConfig,

    /// Retry policy for transient node failures.
    pub retries: RetryConfig,

    /// Confirmation polling.
    pub confirmation: ConfirmationConfig,

    /// Limits on concurrent node requests.
    pub concurrency: ConcurrencyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Expected chain ID (e.g., 11155111 for Sepolia, 31337 for local Anvil).
    pub chain_id: u64,

    /// Address of the content registry contract.
    pub contract_address: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 11_155_111,
            contract_address: String::new(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Gas pricing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GasConfig {
    /// Percentage added on top of the node's gas estimate.
    pub limit_margin_percent: u64,

    /// Gas price multiplier (1.0 = node suggestion).
    pub price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            limit_margin_percent: 20,
            price_multiplier: 1.0,
            max_gas_price_gwei: 500,
        }
    }
}

impl GasConfig {
    /// Apply the safety margin to a gas estimate.
    pub fn padded_limit(&self, estimate: u64) -> u64 {
        let padded = (estimate as u128) * (100 + self.limit_margin_percent as u128) / 100;
        u64::try_from(padded).unwrap_or(u64::MAX)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of tries per operation, the first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Confirmation polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Delay between receipt polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Overall time budget in seconds.
    pub timeout_secs: u64,

    /// Explicit poll budget; derived from the timeout when unset.
    pub max_attempts: Option<u32>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            timeout_secs: 120,
            max_attempts: None,
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Number of polls a watcher performs before giving up.
    pub fn attempt_budget(&self) -> u32 {
        match self.max_attempts {
            Some(n) => n.max(1),
            None => {
                let interval = self.poll_interval_ms.max(1);
                let polls = (self.timeout_secs.saturating_mul(1000) / interval).max(1);
                u32::try_from(polls).unwrap_or(u32::MAX)
            }
        }
    }
}

/// Node request concurrency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum requests in flight against the node, across reads,
    /// submissions and confirmation polls.
    pub max_in_flight: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_in_flight: 8 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
