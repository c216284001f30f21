//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! address and URL parses. All errors are collected, not just the first.

use thiserror::Error;

use crate::config::schema::SentinelConfig;
use crate::policy::parse_account;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &SentinelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.network.rpc_url.parse::<url::Url>() {
        errors.push(ValidationError::new("network.rpc_url", e.to_string()));
    }
    for url in &config.network.failover_urls {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "network.failover_urls",
                format!("invalid URL '{}'", url),
            ));
        }
    }
    if config.network.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("network.rpc_timeout_secs", "must be > 0"));
    }

    if parse_account(&config.contract.token_address).is_err() {
        errors.push(ValidationError::new(
            "contract.token_address",
            format!("invalid address '{}'", config.contract.token_address),
        ));
    }
    if !config.contract.policy_engine_address.is_empty()
        && parse_account(&config.contract.policy_engine_address).is_err()
    {
        errors.push(ValidationError::new(
            "contract.policy_engine_address",
            format!("invalid address '{}'", config.contract.policy_engine_address),
        ));
    }
    // U256 holds at most 77 decimal digits.
    if config.contract.token_decimals > 77 {
        errors.push(ValidationError::new("contract.token_decimals", "must be <= 77"));
    }

    if config.fees.max_priority_fee_per_gas > config.fees.max_fee_per_gas {
        errors.push(ValidationError::new(
            "fees.max_priority_fee_per_gas",
            "must not exceed max_fee_per_gas",
        ));
    }
    if config.fees.gas_limit == Some(0) {
        errors.push(ValidationError::new("fees.gas_limit", "must be > 0 when set"));
    }

    if config.submitter.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "submitter.confirmation_timeout_secs",
            "must be > 0",
        ));
    }
    if config.submitter.poll_interval_ms == 0 {
        errors.push(ValidationError::new("submitter.poll_interval_ms", "must be > 0"));
    }
    if config.monitor.connection_poll_secs == 0 {
        errors.push(ValidationError::new("monitor.connection_poll_secs", "must be > 0"));
    }
    if config.monitor.balance_poll_secs == 0 {
        errors.push(ValidationError::new("monitor.balance_poll_secs", "must be > 0"));
    }

    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }

    if config.tiers.trusted_from > 100 {
        errors.push(ValidationError::new("tiers.trusted_from", "must be <= 100"));
    }
    if config.tiers.frozen_below > config.tiers.trusted_from {
        errors.push(ValidationError::new(
            "tiers.frozen_below",
            "must not exceed trusted_from",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
