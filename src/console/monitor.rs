//! Policy engine connectivity monitor.
//!
//! # Responsibilities
//! - Poll `isConnected` on a fixed interval
//! - Publish the latest status; `None` while unknown or unreachable
//! - Optionally refetch one account's balance on its own interval
//! - Stop on the shutdown signal

use std::time::Duration;

use alloy::primitives::{Address, U256};
use tokio::sync::{broadcast, watch};
use tokio::time;

use crate::config::MonitorConfig;
use crate::ledger::LedgerClient;
use crate::observability::metrics;
use crate::policy::PolicyContract;

pub struct ConnectionMonitor<L> {
    contract: PolicyContract<L>,
    interval: Duration,
    status: watch::Sender<Option<bool>>,
    balance_interval: Duration,
    watched: Option<Address>,
    balance: watch::Sender<Option<U256>>,
}

impl<L: LedgerClient> ConnectionMonitor<L> {
    pub fn new(contract: PolicyContract<L>, config: &MonitorConfig) -> Self {
        let (status, _) = watch::channel(None);
        let (balance, _) = watch::channel(None);
        Self {
            contract,
            interval: Duration::from_secs(config.connection_poll_secs),
            status,
            balance_interval: Duration::from_secs(config.balance_poll_secs),
            watched: None,
            balance,
        }
    }

    /// Also refetch `account`'s balance while running.
    pub fn watch_balance(mut self, account: Address) -> Self {
        self.watched = Some(account);
        self
    }

    /// Last fetched balance of the watched account. A failed refetch keeps
    /// the previous value.
    pub fn subscribe_balance(&self) -> watch::Receiver<Option<U256>> {
        self.balance.subscribe()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.status.subscribe()
    }

    /// Latest known status.
    pub fn current(&self) -> Option<bool> {
        *self.status.borrow()
    }

    /// Query once and publish the result.
    pub async fn poll_once(&self) -> Option<bool> {
        let status = match self.contract.is_policy_engine_connected().await {
            Ok(connected) => {
                metrics::record_engine_connected(connected);
                Some(connected)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connectivity check failed");
                None
            }
        };

        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            match status {
                Some(true) => tracing::info!("Policy engine linked"),
                Some(false) => tracing::warn!("Policy engine offline"),
                None => tracing::warn!("Policy engine status unknown"),
            }
        }
        status
    }

    /// Refetch the watched balance. `None` when nothing is watched or the
    /// read failed.
    pub async fn poll_balance(&self) -> Option<U256> {
        let account = self.watched?;
        match self.contract.get_balance(account).await {
            Ok(balance) => {
                self.balance.send_if_modified(|current| {
                    if *current == Some(balance) {
                        return false;
                    }
                    *current = Some(balance);
                    true
                });
                Some(balance)
            }
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "Balance refetch failed");
                None
            }
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            token = %self.contract.address(),
            "Connection monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        let mut balance_ticker = time::interval(self.balance_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = balance_ticker.tick(), if self.watched.is_some() => {
                    self.poll_balance().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Connection monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::ledger::InMemoryLedger;
    use crate::lifecycle::Shutdown;
    use std::sync::Arc;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ADMIN: Address = Address::repeat_byte(0xad);

    fn monitor(ledger: &InMemoryLedger) -> ConnectionMonitor<InMemoryLedger> {
        let contract = PolicyContract::new(
            Arc::new(ledger.clone()),
            TOKEN,
            Default::default(),
            RetryConfig {
                enabled: false,
                ..RetryConfig::default()
            },
        );
        ConnectionMonitor::new(contract, &MonitorConfig::default())
    }

    #[tokio::test]
    async fn test_poll_tracks_engine_link() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let monitor = monitor(&ledger);
        assert_eq!(monitor.current(), None);

        assert_eq!(monitor.poll_once().await, Some(true));
        ledger.set_engine(None);
        assert_eq!(monitor.poll_once().await, Some(false));
        ledger.set_offline(true);
        assert_eq!(monitor.poll_once().await, None);
    }

    #[tokio::test]
    async fn test_balance_refetch_keeps_last_value_on_failure() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        ledger.mint(ADMIN, U256::from(40));
        let unwatched = monitor(&ledger);
        assert_eq!(unwatched.poll_balance().await, None);

        let monitor = monitor(&ledger).watch_balance(ADMIN);
        let balance = monitor.subscribe_balance();
        assert_eq!(monitor.poll_balance().await, Some(U256::from(40)));

        ledger.mint(ADMIN, U256::from(2));
        assert_eq!(monitor.poll_balance().await, Some(U256::from(42)));

        ledger.set_offline(true);
        assert_eq!(monitor.poll_balance().await, None);
        assert_eq!(*balance.borrow(), Some(U256::from(42)));
    }

    #[tokio::test]
    async fn test_run_refetches_watched_balance() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        ledger.mint(ADMIN, U256::from(7));
        let monitor = monitor(&ledger).watch_balance(ADMIN);
        let mut balance = monitor.subscribe_balance();
        let shutdown = Shutdown::new();

        let task = tokio::spawn(monitor.run(shutdown.subscribe()));
        balance
            .wait_for(|b| *b == Some(U256::from(7)))
            .await
            .unwrap();

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_publishes_and_stops_on_shutdown() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let monitor = monitor(&ledger);
        let mut status = monitor.subscribe();
        let shutdown = Shutdown::new();

        let task = tokio::spawn(monitor.run(shutdown.subscribe()));
        status.wait_for(|s| *s == Some(true)).await.unwrap();

        shutdown.trigger();
        task.await.unwrap();
    }
}
