//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, environment overrides)
//!     → validation.rs (semantic checks)
//!     → SentinelConfig (validated, immutable)
//!     → handed to the ledger, policy client, and console
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Private keys never live in the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ContractConfig, FeeConfig, MonitorConfig, NetworkConfig, ObservabilityConfig, RetryConfig,
    SentinelConfig, SubmitterConfig, TierConfig,
};
