//! Shared fixtures for integration tests.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use sentinel_client::config::{RetryConfig, SentinelConfig};
use sentinel_client::ledger::InMemoryLedger;
use sentinel_client::policy::{PolicyContract, RecordingNotifier, Submitter};

pub const TOKEN: Address = Address::repeat_byte(0x70);
pub const ADMIN: Address = Address::repeat_byte(0xad);
pub const USER_X: Address = Address::repeat_byte(0x11);
#[allow(dead_code)]
pub const USER_X_HEX: &str = "0x1111111111111111111111111111111111111111";

/// Balance minted to the admin account.
pub const ADMIN_FUNDS: u64 = 10_000;

/// Config with raw-unit amounts and fast polling.
pub fn fast_config() -> SentinelConfig {
    let mut config = SentinelConfig::default();
    config.contract.token_decimals = 0;
    config.submitter.poll_interval_ms = 10;
    config.submitter.confirmation_timeout_secs = 1;
    config.retries = RetryConfig {
        enabled: true,
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    config
}

/// A funded admin on a fresh chain with the policy engine linked.
pub fn funded_ledger() -> InMemoryLedger {
    let ledger = InMemoryLedger::new(TOKEN, ADMIN);
    ledger.mint(ADMIN, U256::from(ADMIN_FUNDS));
    ledger
}

pub fn contract(ledger: &InMemoryLedger) -> PolicyContract<InMemoryLedger> {
    PolicyContract::from_config(Arc::new(ledger.clone()), &with_token(fast_config()))
        .expect("token address is valid")
}

#[allow(dead_code)]
pub fn submitter(ledger: &InMemoryLedger) -> (Submitter<InMemoryLedger>, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let submitter = Submitter::new(
        contract(ledger),
        Arc::new(notifier.clone()),
        fast_config().submitter,
    );
    (submitter, notifier)
}

fn with_token(mut config: SentinelConfig) -> SentinelConfig {
    config.contract.token_address = TOKEN.to_string();
    config
}
