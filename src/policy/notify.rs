//! Operator notifications raised by submission state changes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::TxHash;

use crate::policy::types::{ActionKind, FailureReason};

/// One user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Non-blocking progress: submitting, then pending.
    Progress {
        action: ActionKind,
        hash: Option<TxHash>,
    },
    Success {
        action: ActionKind,
        hash: TxHash,
        block_number: u64,
    },
    Error {
        action: ActionKind,
        reason: FailureReason,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Progress { action, hash: None } => {
                write!(f, "{action}: submitting transaction")
            }
            Notification::Progress {
                action,
                hash: Some(hash),
            } => write!(f, "{action}: transaction pending ({hash})"),
            Notification::Success {
                action,
                block_number,
                ..
            } => write!(f, "{action}: confirmed in block {block_number}"),
            Notification::Error { action, reason } => write!(f, "{action}: {reason}"),
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits notifications as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Progress { .. } => tracing::info!("{notification}"),
            Notification::Success { hash, .. } => {
                tracing::info!(tx_hash = %hash, "{notification}")
            }
            Notification::Error { reason, .. } => {
                tracing::warn!(reason = reason.label(), "{notification}")
            }
        }
    }
}

/// Keeps every notification in order, for tests and scripted runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let clone = notifier.clone();
        notifier.notify(Notification::Progress {
            action: ActionKind::Whitelist,
            hash: None,
        });
        clone.notify(Notification::Error {
            action: ActionKind::Whitelist,
            reason: FailureReason::Timeout,
        });

        let events = notifier.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Notification::Error { .. }));
    }

    #[test]
    fn test_error_display_uses_classified_reason() {
        let n = Notification::Error {
            action: ActionKind::Transfer,
            reason: FailureReason::PolicyRejection("Transfer Denied".into()),
        };
        assert_eq!(
            n.to_string(),
            "transfer: Sentinel firewall: trust score too low or unauthorized"
        );
    }
}
