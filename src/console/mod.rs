//! Operator console state.
//!
//! # Data Flow
//! ```text
//! ContributorPanel: balance + transfer draft → PreflightGate → Submitter
//! GuardianPanel:    target lookup, whitelist/revoke, trust score → Submitter
//! ConnectionMonitor: isConnected every N seconds → watch channel
//! ```
//!
//! # Design Decisions
//! - Each panel owns its inputs and its own submitter; nothing is global
//! - Panels never refetch a guardian lookup on their own

pub mod contributor;
pub mod guardian;
pub mod monitor;

use thiserror::Error;

use crate::policy::{GateState, PolicyError, SubmitError, ValidationError};

pub use contributor::ContributorPanel;
pub use guardian::GuardianPanel;
pub use monitor::ConnectionMonitor;

/// Errors raised by a panel action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transfer is not ready to submit ({0:?})")]
    NotReady(GateState),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}
