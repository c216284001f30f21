//! Policy client subsystem.
//!
//! # Data Flow
//! ```text
//! Operator input (address, amount, score)
//!     → types.rs (local validation, no network)
//!     → contract.rs (encode once into a PreparedCall)
//!     → simulator.rs (dry run of that exact request, classified verdict)
//!     → submitter.rs (send, poll receipt, one terminal status)
//!     → notify.rs (progress / success / error)
//! ```
//!
//! # Design Decisions
//! - Remote failures become a [`FailureReason`] once, where the raw error
//!   arrives; nothing downstream re-parses message text
//! - Reads retry on network trouble; mutations never do
//! - The remote contract stays the only enforcement point for policy

pub mod abi;
pub mod contract;
pub mod notify;
pub mod simulator;
pub mod submitter;
pub mod types;

pub use contract::{PolicyContract, PreparedCall};
pub use notify::{Notification, Notifier, RecordingNotifier, TracingNotifier};
pub use simulator::{GateState, Preflight, PreflightGate, SimulationOutcome, TransferDraft};
pub use submitter::{SubmissionState, SubmitError, Submitter};
pub use types::{
    format_amount, parse_account, parse_amount, AccessTier, ActionKind, FailureReason,
    PolicyError, PolicyResult, TransactionHandle, TransferIntent, TrustScore, TxStatus,
    UserPolicyRecord, ValidationError, MAX_TRUST_SCORE,
};
