//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SentinelConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `network.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "SENTINEL_RPC_URL";

/// Overrides `contract.token_address`.
pub const TOKEN_ADDRESS_ENV_VAR: &str = "SENTINEL_TOKEN_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<SentinelConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate.
pub fn parse_config(content: &str) -> Result<SentinelConfig, ConfigError> {
    let mut config: SentinelConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load from `path` when given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<SentinelConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => parse_config(""),
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut SentinelConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(RPC_URL_ENV_VAR).filter(|v| !v.is_empty()) {
        config.network.rpc_url = url;
    }
    if let Some(address) = lookup(TOKEN_ADDRESS_ENV_VAR).filter(|v| !v.is_empty()) {
        config.contract.token_address = address;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let mut config = SentinelConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            RPC_URL_ENV_VAR => Some("http://localhost:8545".to_string()),
            TOKEN_ADDRESS_ENV_VAR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.network.rpc_url, "http://localhost:8545");
        // Empty values are ignored.
        assert_eq!(
            config.contract.token_address,
            crate::config::schema::DEFAULT_TOKEN_ADDRESS
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = toml::from_str::<SentinelConfig>("[submitter]\npoll_interval_ms = 0")
            .map_err(ConfigError::from)
            .and_then(|config| {
                validate_config(&config).map_err(ConfigError::Validation)?;
                Ok(config)
            })
            .unwrap_err();
        assert!(err.to_string().contains("submitter.poll_interval_ms"));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
