//! Remote ledger subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + NetworkConfig
//!     → wallet.rs (key loading, signing)
//!     → rpc.rs (JSON-RPC providers with timeouts and read failover)
//!     → LedgerClient trait (call / send / receipt)
//!     → policy subsystem
//! ```
//!
//! `memory.rs` implements the same trait in-process for tests and
//! offline dry runs.
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod memory;
pub mod rpc;
pub mod types;
pub mod wallet;

use std::future::Future;

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;

pub use memory::InMemoryLedger;
pub use rpc::RpcLedger;
pub use types::{ChainId, LedgerError, LedgerResult, TxReceipt};
pub use wallet::Wallet;

/// Connection to a chain node able to read state and submit signed
/// transactions on behalf of one sender.
pub trait LedgerClient: Send + Sync {
    /// Account that signs submitted transactions.
    fn sender(&self) -> Address;

    /// Execute `tx` against the latest state without committing it.
    fn call(&self, tx: &TransactionRequest) -> impl Future<Output = LedgerResult<Bytes>> + Send;

    /// Sign and submit `tx`, resolving once the node accepted it.
    fn send(&self, tx: TransactionRequest) -> impl Future<Output = LedgerResult<TxHash>> + Send;

    /// Receipt for `hash`, `None` while the transaction is still pending.
    fn receipt(&self, hash: TxHash)
        -> impl Future<Output = LedgerResult<Option<TxReceipt>>> + Send;

    /// Latest block number.
    fn block_number(&self) -> impl Future<Output = LedgerResult<u64>> + Send;
}
