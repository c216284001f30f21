//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Sentinel token deployed on Arbitrum Sepolia.
pub const DEFAULT_TOKEN_ADDRESS: &str = "0xb04c22a9635a4f74e972a2df60c5c2fefd98a327";

/// Stylus policy engine the token is wired to.
pub const DEFAULT_POLICY_ENGINE_ADDRESS: &str = "0x6ae7760270787324f187111bfc6096d0094778a3";

/// Root configuration for the policy client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SentinelConfig {
    /// Chain and RPC endpoint settings.
    pub network: NetworkConfig,

    /// Target contract settings.
    pub contract: ContractConfig,

    /// Fee parameters attached to every mutating call.
    pub fees: FeeConfig,

    /// Transaction submitter settings.
    pub submitter: SubmitterConfig,

    /// Background monitor settings.
    pub monitor: MonitorConfig,

    /// Retry configuration for read-only calls.
    pub retries: RetryConfig,

    /// Access tier thresholds used when presenting policy records.
    pub tiers: TierConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Chain ID (421614 for Arbitrum Sepolia, 31337 for local Anvil).
    pub chain_id: u64,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs, used for reads only.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: 421_614,
            rpc_url: "https://sepolia-rollup.arbitrum.io/rpc".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Target contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Address of the policy-gated token contract.
    pub token_address: String,

    /// Address of the policy engine, used by `connect` and `deploy`.
    pub policy_engine_address: String,

    /// Decimals used to convert operator-entered amounts.
    pub token_decimals: u8,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            token_address: DEFAULT_TOKEN_ADDRESS.to_string(),
            policy_engine_address: DEFAULT_POLICY_ENGINE_ADDRESS.to_string(),
            token_decimals: 18,
        }
    }
}

/// EIP-1559 fee parameters in wei.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeConfig {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,

    /// Explicit gas limit. When unset the ledger client estimates it.
    pub gas_limit: Option<u64>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            max_fee_per_gas: 100_000_000,
            max_priority_fee_per_gas: 100_000_000,
            gas_limit: None,
        }
    }
}

/// Transaction submitter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitterConfig {
    /// Ceiling on the wait for a receipt, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Blocks on top of the inclusion block before reporting confirmed.
    pub confirmation_blocks: u32,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 120,
            poll_interval_ms: 2_000,
            confirmation_blocks: 0,
        }
    }
}

/// Background monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How often `isConnected` is refetched, in seconds.
    pub connection_poll_secs: u64,

    /// How often a watched balance is refetched, in seconds.
    pub balance_poll_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connection_poll_secs: 5,
            balance_poll_secs: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
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
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

/// Trust score thresholds for access tiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TierConfig {
    /// Scores below this are frozen.
    pub frozen_below: u8,

    /// Scores at or above this are trusted signers.
    pub trusted_from: u8,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            frozen_below: 30,
            trusted_from: 80,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint (only used by `watch`).
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
