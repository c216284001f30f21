//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Read-only call (balanceOf, getUserData, isConnected):
//!     → ledger timeout + provider failover (ledger/rpc.rs)
//!     → On network failure: retries.rs (retry with backoff.rs delays)
//!
//! Mutating call (transfer, whitelistUser, ...):
//!     → never retried; resubmission needs a new operator action
//! ```

pub mod backoff;
pub mod retries;

pub use retries::retry_read;
