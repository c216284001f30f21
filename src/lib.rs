//! Sentinel policy client.
//!
//! Reads and writes a token whose transfers are vetted by an external
//! policy engine (whitelist plus trust score), with pre-flight simulation
//! and tracked submission.

pub mod config;
pub mod console;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod resilience;
pub mod scripts;

pub use config::SentinelConfig;
pub use ledger::{InMemoryLedger, LedgerClient, RpcLedger};
pub use lifecycle::Shutdown;
pub use policy::{PolicyContract, Preflight, Submitter};
