//! Retry logic for read-only ledger calls.
//!
//! Only network and timeout failures are retried. Reverts are
//! deterministic, and mutating calls never come through here: repeating a
//! state change could apply it twice.

use std::future::Future;

use crate::config::RetryConfig;
use crate::ledger::LedgerResult;
use crate::resilience::backoff::calculate_backoff;

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_read<T, F, Fut>(
    config: &RetryConfig,
    operation: &'static str,
    mut op: F,
) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let max_attempts = if config.enabled {
        config.max_attempts.max(1)
    } else {
        1
    };

    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                tracing::debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying read-only call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
