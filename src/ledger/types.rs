//! Ledger-level types and error definitions.

use alloy::primitives::Address;
use thiserror::Error;

/// Errors raised at the remote ledger boundary.
///
/// Every transport or node failure is mapped into one of these variants
/// where the raw error is received, so callers never inspect RPC payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The node executed the call and it reverted (or was refused by the
    /// node for a reason tied to the call itself, e.g. gas estimation).
    #[error("execution reverted: {0}")]
    Rejected(String),

    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered but the response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid private key format or signing failure.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl LedgerError {
    /// True for failures that say nothing about the call itself.
    ///
    /// Only these are worth repeating, and only for read-only calls.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Network(_) | LedgerError::Timeout(_))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The parts of a transaction receipt the client acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// Block the transaction was included in.
    pub block_number: u64,
    /// False when execution reverted.
    pub success: bool,
    /// Set for contract creations.
    pub contract_address: Option<Address>,
}
