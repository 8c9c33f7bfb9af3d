//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and the contract address
//! - Validate value ranges (timeouts > 0, budgets >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::RegistryConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("chain.contract_address: {0}")]
    InvalidContractAddress(String),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("confirmation.timeout_secs must cover at least one poll interval")]
    TimeoutShorterThanInterval,

    #[error("gas.price_multiplier must be a positive finite number")]
    InvalidMultiplier,
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.chain.rpc_url).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field: "chain.rpc_url",
            value: config.chain.rpc_url.clone(),
        });
    }
    for url in &config.chain.failover_urls {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field: "chain.failover_urls",
                value: url.clone(),
            });
        }
    }

    if let Err(e) = contract_address(config) {
        errors.push(e);
    }

    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::MustBePositive("chain.rpc_timeout_secs"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::MustBePositive("retries.max_attempts"));
    }
    if config.confirmation.poll_interval_ms == 0 {
        errors.push(ValidationError::MustBePositive("confirmation.poll_interval_ms"));
    }
    if config.confirmation.max_attempts == Some(0) {
        errors.push(ValidationError::MustBePositive("confirmation.max_attempts"));
    }
    if config.confirmation.max_attempts.is_none()
        && config.confirmation.timeout_secs.saturating_mul(1000) < config.confirmation.poll_interval_ms
    {
        errors.push(ValidationError::TimeoutShorterThanInterval);
    }
    if config.concurrency.max_in_flight == 0 {
        errors.push(ValidationError::MustBePositive("concurrency.max_in_flight"));
    }
    if !config.gas.price_multiplier.is_finite() || config.gas.price_multiplier <= 0.0 {
        errors.push(ValidationError::InvalidMultiplier);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse the configured contract address. The zero address is rejected.
pub fn contract_address(config: &RegistryConfig) -> Result<Address, ValidationError> {
    let address: Address = config
        .chain
        .contract_address
        .parse()
        .map_err(|e| ValidationError::InvalidContractAddress(format!("{}", e)))?;
    if address == Address::ZERO {
        return Err(ValidationError::InvalidContractAddress(
            "zero address".to_string(),
        ));
    }
    Ok(address)
}
