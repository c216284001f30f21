//! Transaction submission and confirmation tracking.
//!
//! # Lifecycle
//! ```text
//! Idle → Submitting → Pending(hash) → Confirmed | Failed
//!             └──────────────────────→ Failed   (node refused, no hash)
//! ```
//!
//! One submitter carries at most one call in flight. Independent
//! submitters are not serialized against each other; per-account ordering
//! is left to the node's nonce sequencing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::TxHash;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::SubmitterConfig;
use crate::ledger::{LedgerClient, TxReceipt};
use crate::observability::metrics;
use crate::policy::contract::{PolicyContract, PreparedCall};
use crate::policy::notify::{Notification, Notifier};
use crate::policy::types::{ActionKind, FailureReason, TransactionHandle, TxStatus};

/// Observable state of a submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting {
        action: ActionKind,
    },
    Pending {
        action: ActionKind,
        hash: TxHash,
    },
    Confirmed {
        action: ActionKind,
        hash: TxHash,
        block_number: u64,
    },
    Failed {
        action: ActionKind,
        hash: Option<TxHash>,
        reason: FailureReason,
    },
}

impl SubmissionState {
    /// Whether a call is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SubmissionState::Submitting { .. } | SubmissionState::Pending { .. }
        )
    }
}

/// Submission errors that leave no transaction handle behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a transaction from this panel is already in flight")]
    Busy,

    #[error("submission refused: {0}")]
    Refused(FailureReason),
}

impl SubmitError {
    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            SubmitError::Refused(reason) => Some(reason),
            SubmitError::Busy => None,
        }
    }
}

/// Submits prepared calls and follows them to a terminal status.
pub struct Submitter<L> {
    contract: PolicyContract<L>,
    notifier: Arc<dyn Notifier>,
    config: SubmitterConfig,
    state: Arc<watch::Sender<SubmissionState>>,
}

impl<L> Clone for Submitter<L> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<L: LedgerClient> Submitter<L> {
    pub fn new(
        contract: PolicyContract<L>,
        notifier: Arc<dyn Notifier>,
        config: SubmitterConfig,
    ) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            contract,
            notifier,
            config,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// Submit `prepared` and wait for its terminal status.
    ///
    /// Returns the resolved handle (Confirmed or Failed). A node that
    /// refuses the request outright yields [`SubmitError::Refused`].
    /// Never retried.
    pub async fn submit(
        &self,
        prepared: &PreparedCall,
    ) -> Result<TransactionHandle, SubmitError> {
        let action = prepared.action;
        let claimed = self.state.send_if_modified(|state| {
            if state.is_busy() {
                return false;
            }
            *state = SubmissionState::Submitting { action };
            true
        });
        if !claimed {
            tracing::warn!(action = %action, "Submission refused, another is in flight");
            return Err(SubmitError::Busy);
        }
        let mut claim = Claim {
            state: Arc::clone(&self.state),
            notifier: Arc::clone(&self.notifier),
            action,
            hash: None,
            settled: false,
        };
        self.notifier
            .notify(Notification::Progress { action, hash: None });
        let started = Instant::now();

        let mut handle = match self.contract.dispatch(prepared).await {
            Ok(handle) => handle,
            Err(err) => {
                let reason = err.reason();
                claim.settled = true;
                self.fail(action, None, reason.clone(), started);
                return Err(SubmitError::Refused(reason));
            }
        };

        claim.hash = Some(handle.hash);
        self.state.send_replace(SubmissionState::Pending {
            action,
            hash: handle.hash,
        });
        self.notifier.notify(Notification::Progress {
            action,
            hash: Some(handle.hash),
        });

        let status = self.await_outcome(prepared, handle.hash).await;
        if let Err(e) = handle.resolve(status.clone()) {
            tracing::error!(action_id = %handle.action_id, error = %e, "Handle resolved twice");
        }

        claim.settled = true;
        match status {
            TxStatus::Confirmed { block_number } => {
                self.state.send_replace(SubmissionState::Confirmed {
                    action,
                    hash: handle.hash,
                    block_number,
                });
                tracing::info!(
                    action_id = %handle.action_id,
                    action = %action,
                    tx_hash = %handle.hash,
                    block_number,
                    "Transaction confirmed"
                );
                metrics::record_submission(action.as_str(), "confirmed");
                metrics::record_confirmation_latency(
                    action.as_str(),
                    started.elapsed().as_secs_f64(),
                );
                self.notifier.notify(Notification::Success {
                    action,
                    hash: handle.hash,
                    block_number,
                });
            }
            TxStatus::Failed { reason } => self.fail(action, Some(handle.hash), reason, started),
            TxStatus::Pending => {}
        }
        Ok(handle)
    }

    fn fail(
        &self,
        action: ActionKind,
        hash: Option<TxHash>,
        reason: FailureReason,
        started: Instant,
    ) {
        tracing::warn!(
            action = %action,
            tx_hash = ?hash,
            reason = reason.label(),
            detail = %reason,
            "Transaction failed"
        );
        metrics::record_submission(action.as_str(), reason.label());
        metrics::record_confirmation_latency(action.as_str(), started.elapsed().as_secs_f64());
        self.state.send_replace(SubmissionState::Failed {
            action,
            hash,
            reason: reason.clone(),
        });
        self.notifier.notify(Notification::Error { action, reason });
    }

    /// Poll until confirmed, reverted, or the ceiling elapses. A timeout
    /// says nothing about whether the transaction eventually lands.
    async fn await_outcome(&self, prepared: &PreparedCall, hash: TxHash) -> TxStatus {
        let ceiling = Duration::from_secs(self.config.confirmation_timeout_secs);
        match tokio::time::timeout(ceiling, self.poll_receipt(prepared, hash)).await {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(
                    tx_hash = %hash,
                    timeout_secs = self.config.confirmation_timeout_secs,
                    "Confirmation wait timed out"
                );
                TxStatus::Failed {
                    reason: FailureReason::Timeout,
                }
            }
        }
    }

    async fn poll_receipt(&self, prepared: &PreparedCall, hash: TxHash) -> TxStatus {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let ledger = self.contract.ledger();
        loop {
            match ledger.receipt(hash).await {
                Ok(Some(receipt)) if !receipt.success => {
                    return TxStatus::Failed {
                        reason: self.revert_reason(prepared).await,
                    };
                }
                Ok(Some(receipt)) => {
                    if self.is_deep_enough(&receipt).await {
                        return TxStatus::Confirmed {
                            block_number: receipt.block_number,
                        };
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    tracing::debug!(tx_hash = %hash, error = %e, "Receipt poll failed, retrying");
                }
                Err(e) => return TxStatus::Failed { reason: e.into() },
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn is_deep_enough(&self, receipt: &TxReceipt) -> bool {
        if self.config.confirmation_blocks == 0 {
            return true;
        }
        match self.contract.ledger().block_number().await {
            Ok(head) => {
                head >= receipt.block_number + u64::from(self.config.confirmation_blocks)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Block number lookup failed");
                false
            }
        }
    }

    /// Receipts carry no revert message; replaying the call against
    /// current state recovers one when the cause still holds.
    async fn revert_reason(&self, prepared: &PreparedCall) -> FailureReason {
        match self.contract.call_prepared(prepared).await {
            Err(e) => FailureReason::from(e),
            Ok(_) => FailureReason::Generic("transaction reverted".to_string()),
        }
    }
}

/// Busy claim held by an in-flight `submit`. If the caller drops the
/// future before an outcome, the claim is released as `Failed(Timeout)`;
/// the transaction itself may still land.
struct Claim {
    state: Arc<watch::Sender<SubmissionState>>,
    notifier: Arc<dyn Notifier>,
    action: ActionKind,
    hash: Option<TxHash>,
    settled: bool,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let (action, hash) = (self.action, self.hash);
        self.state.send_replace(SubmissionState::Failed {
            action,
            hash,
            reason: FailureReason::Timeout,
        });
        tracing::warn!(action = %action, tx_hash = ?hash, "Submission abandoned before an outcome");
        metrics::record_submission(action.as_str(), FailureReason::Timeout.label());
        self.notifier.notify(Notification::Error {
            action,
            reason: FailureReason::Timeout,
        });
    }
}
