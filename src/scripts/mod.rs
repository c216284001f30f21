//! One-shot operator procedures built on the policy client.
//!
//! # Data Flow
//! ```text
//! deploy.rs:   build artifact → creation tx → receipt → token address
//!              → simulate connectToRust → submit → linked token
//! scenario.rs: whitelist sender → whitelist recipient → transfer
//!              → revoke recipient → transfer expected to fail
//! ```

pub mod deploy;
pub mod scenario;

use std::path::PathBuf;

use alloy::primitives::TxHash;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::policy::{FailureReason, PolicyError, SubmitError};

pub use deploy::{deploy_token, link_engine, load_artifact, wait_for_receipt, Deployment};
pub use scenario::{render, Scenario, ScenarioReport, StepReport};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read artifact {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid artifact JSON: {0}")]
    ArtifactJson(#[from] serde_json::Error),

    #[error("artifact has no usable bytecode: {0}")]
    Bytecode(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("simulation rejected the call: {0}")]
    Simulation(FailureReason),

    #[error("transaction {hash} failed: {reason}")]
    Failed { hash: TxHash, reason: FailureReason },

    #[error("receipt for {0} carries no contract address")]
    MissingContractAddress(TxHash),

    #[error("no receipt for {hash} after {secs}s")]
    ReceiptTimeout { hash: TxHash, secs: u64 },
}
