//! Policy client data model and error definitions.

use std::fmt;

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::TierConfig;
use crate::ledger::LedgerError;

/// Highest trust score the policy engine accepts.
pub const MAX_TRUST_SCORE: u8 = 100;

/// Input rejected locally, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed account address '{0}'")]
    MalformedAddress(String),

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("malformed amount '{0}'")]
    MalformedAmount(String),

    #[error("trust score {0} is outside 0-{max}", max = MAX_TRUST_SCORE)]
    ScoreOutOfRange(u64),

    #[error("malformed trust score '{0}'")]
    MalformedScore(String),

    #[error("intent sender {intent} does not match signing account {signer}")]
    SenderMismatch { intent: Address, signer: Address },
}

/// Why a simulation or submission did not go through.
///
/// Determined once, where the raw remote error is received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The trust/whitelist gate denied the call.
    PolicyRejection(String),
    /// The sender cannot cover the amount.
    InsufficientBalance(String),
    /// Any other remote refusal or revert.
    Generic(String),
    /// Infrastructure trouble, not a policy decision.
    Network(String),
    /// No outcome within the configured ceiling.
    Timeout,
}

const POLICY_PATTERNS: &[&str] = &["transfer denied", "not whitelisted", "policy violation"];
const BALANCE_PATTERNS: &[&str] = &[
    "insufficient funds",
    "insufficient balance",
    "exceeds balance",
    "erc20insufficientbalance",
];

impl FailureReason {
    /// Classify a remote failure message. Unknown messages are generic.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if POLICY_PATTERNS.iter().any(|p| lowered.contains(p)) {
            FailureReason::PolicyRejection(message.to_string())
        } else if BALANCE_PATTERNS.iter().any(|p| lowered.contains(p)) {
            FailureReason::InsufficientBalance(message.to_string())
        } else {
            FailureReason::Generic(message.to_string())
        }
    }

    /// Short label used in metrics and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::PolicyRejection(_) => "policy_rejection",
            FailureReason::InsufficientBalance(_) => "insufficient_balance",
            FailureReason::Generic(_) => "generic",
            FailureReason::Network(_) => "network",
            FailureReason::Timeout => "timeout",
        }
    }

    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, FailureReason::PolicyRejection(_))
    }
}

impl From<LedgerError> for FailureReason {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(message) => FailureReason::classify(&message),
            LedgerError::Network(message) => FailureReason::Network(message),
            LedgerError::Timeout(_) => FailureReason::Timeout,
            other => FailureReason::Generic(other.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PolicyRejection(_) => {
                write!(f, "Sentinel firewall: trust score too low or unauthorized")
            }
            FailureReason::InsufficientBalance(_) => write!(f, "insufficient treasury balance"),
            FailureReason::Generic(detail) => write!(f, "policy violation detected ({detail})"),
            FailureReason::Network(detail) => write!(f, "network failure: {detail}"),
            FailureReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// Errors surfaced by the policy contract proxy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("remote call failed: {0}")]
    Remote(#[from] LedgerError),

    #[error("transaction {0} already resolved")]
    AlreadyResolved(TxHash),
}

impl PolicyError {
    /// Classified reason, for display and the submitter.
    pub fn reason(&self) -> FailureReason {
        match self {
            PolicyError::Remote(err) => FailureReason::from(err.clone()),
            other => FailureReason::Generic(other.to_string()),
        }
    }
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Parse an operator-entered account: `0x` followed by 40 hex digits.
pub fn parse_account(input: &str) -> Result<Address, ValidationError> {
    let trimmed = input.trim();
    let malformed = || ValidationError::MalformedAddress(input.to_string());
    let hex = trimmed.strip_prefix("0x").ok_or_else(malformed)?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    trimmed.parse().map_err(|_| malformed())
}

/// Convert a decimal token amount (e.g. `"1.5"`) into smallest units.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, ValidationError> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(ValidationError::NonPositiveAmount);
    }
    let amount = parse_units(trimmed, decimals)
        .map_err(|_| ValidationError::MalformedAmount(input.to_string()))?
        .get_absolute();
    if amount.is_zero() {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(amount)
}

/// Render smallest units as a decimal token amount.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

/// A trust score known to be within 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrustScore(u8);

impl TrustScore {
    pub fn new(score: u64) -> Result<Self, ValidationError> {
        match u8::try_from(score) {
            Ok(s) if s <= MAX_TRUST_SCORE => Ok(Self(s)),
            _ => Err(ValidationError::ScoreOutOfRange(score)),
        }
    }

    /// Parse an operator-entered score.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let score = input
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::MalformedScore(input.to_string()))?;
        Self::new(score)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Whitelist flag and trust score of one account, as held by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPolicyRecord {
    pub whitelisted: bool,
    pub trust_score: u8,
}

impl UserPolicyRecord {
    /// Interpret the record using the configured thresholds.
    pub fn tier(&self, tiers: &TierConfig) -> AccessTier {
        if !self.whitelisted {
            AccessTier::Unauthorized
        } else if self.trust_score < tiers.frozen_below {
            AccessTier::Frozen
        } else if self.trust_score < tiers.trusted_from {
            AccessTier::Standard
        } else {
            AccessTier::Trusted
        }
    }
}

/// Operator-facing reading of a policy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    Unauthorized,
    Frozen,
    Standard,
    Trusted,
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccessTier::Unauthorized => "UNAUTHORIZED (NO ACCESS)",
            AccessTier::Frozen => "FROZEN (SECURITY RISK)",
            AccessTier::Standard => "STANDARD ACCESS",
            AccessTier::Trusted => "TRUSTED SIGNER",
        };
        f.write_str(label)
    }
}

/// One requested token movement. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferIntent {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

impl TransferIntent {
    pub fn new(from: Address, to: Address, amount: U256) -> Result<Self, ValidationError> {
        if amount.is_zero() {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(Self { from, to, amount })
    }

    /// Build from operator input; `amount` is in decimal token units.
    pub fn parse(
        from: Address,
        to: &str,
        amount: &str,
        decimals: u8,
    ) -> Result<Self, ValidationError> {
        let to = parse_account(to)?;
        let amount = parse_amount(amount, decimals)?;
        Self::new(from, to, amount)
    }
}

/// Mutating operations the client can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Transfer,
    Whitelist,
    Revoke,
    UpdateScore,
    ConnectEngine,
}

impl ActionKind {
    /// Whether a confirmed outcome resets the dependent input field.
    pub fn clears_input_on_confirm(self) -> bool {
        matches!(self, ActionKind::Transfer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Transfer => "transfer",
            ActionKind::Whitelist => "whitelist",
            ActionKind::Revoke => "revoke",
            ActionKind::UpdateScore => "update_score",
            ActionKind::ConnectEngine => "connect_engine",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a submitted transaction as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed { block_number: u64 },
    Failed { reason: FailureReason },
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// Client-side tracking token for one submitted mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// Correlates log lines for this action.
    pub action_id: Uuid,
    pub action: ActionKind,
    pub hash: TxHash,
    status: TxStatus,
}

impl TransactionHandle {
    pub fn pending(action: ActionKind, hash: TxHash) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            action,
            hash,
            status: TxStatus::Pending,
        }
    }

    pub fn status(&self) -> &TxStatus {
        &self.status
    }

    /// Move to a terminal status. Allowed exactly once.
    pub fn resolve(&mut self, status: TxStatus) -> PolicyResult<()> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(PolicyError::AlreadyResolved(self.hash));
        }
        self.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account() {
        let addr = parse_account(" 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266 ").unwrap();
        assert_eq!(
            addr.to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        for bad in [
            "",
            "0x",
            "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb9226",
            "0xz39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        ] {
            assert!(
                matches!(parse_account(bad), Err(ValidationError::MalformedAddress(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("500", 0).unwrap(), U256::from(500));
        assert_eq!(
            parse_amount("1.5", 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(parse_amount("0", 18), Err(ValidationError::NonPositiveAmount));
        assert_eq!(parse_amount("0.000", 18), Err(ValidationError::NonPositiveAmount));
        assert_eq!(parse_amount("-3", 18), Err(ValidationError::NonPositiveAmount));
        assert!(matches!(
            parse_amount("abc", 18),
            Err(ValidationError::MalformedAmount(_))
        ));
    }

    #[test]
    fn test_format_amount() {
        let amount = U256::from(1_500_000_000_000_000_000u128);
        assert!(format_amount(amount, 18).starts_with("1.5"));
    }

    #[test]
    fn test_trust_score_bounds() {
        assert_eq!(TrustScore::new(0).unwrap().value(), 0);
        assert_eq!(TrustScore::new(100).unwrap().value(), 100);
        assert_eq!(TrustScore::new(150), Err(ValidationError::ScoreOutOfRange(150)));
        assert_eq!(
            TrustScore::new(u64::MAX),
            Err(ValidationError::ScoreOutOfRange(u64::MAX))
        );
        assert_eq!(TrustScore::parse(" 75 ").unwrap().value(), 75);
        assert_eq!(
            TrustScore::parse("150"),
            Err(ValidationError::ScoreOutOfRange(150))
        );
        assert!(matches!(
            TrustScore::parse("-1"),
            Err(ValidationError::MalformedScore(_))
        ));
    }

    #[test]
    fn test_classify_failure_messages() {
        assert!(FailureReason::classify("execution reverted: Transfer Denied").is_policy_rejection());
        assert!(matches!(
            FailureReason::classify("insufficient funds for gas * price + value"),
            FailureReason::InsufficientBalance(_)
        ));
        assert!(matches!(
            FailureReason::classify("ERC20: transfer amount exceeds balance"),
            FailureReason::InsufficientBalance(_)
        ));
        assert!(matches!(
            FailureReason::classify("Access Denied"),
            FailureReason::Generic(_)
        ));
    }

    #[test]
    fn test_network_failures_are_not_policy() {
        let reason = FailureReason::from(LedgerError::Network("connection refused".into()));
        assert_eq!(reason.label(), "network");
        assert_eq!(FailureReason::from(LedgerError::Timeout(10)), FailureReason::Timeout);
    }

    #[test]
    fn test_access_tiers() {
        let tiers = TierConfig::default();
        let record = |whitelisted, trust_score| UserPolicyRecord {
            whitelisted,
            trust_score,
        };
        assert_eq!(record(false, 95).tier(&tiers), AccessTier::Unauthorized);
        assert_eq!(record(true, 29).tier(&tiers), AccessTier::Frozen);
        assert_eq!(record(true, 30).tier(&tiers), AccessTier::Standard);
        assert_eq!(record(true, 79).tier(&tiers), AccessTier::Standard);
        assert_eq!(record(true, 80).tier(&tiers), AccessTier::Trusted);
    }

    #[test]
    fn test_transfer_intent_rejects_zero() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        assert_eq!(
            TransferIntent::new(from, to, U256::ZERO),
            Err(ValidationError::NonPositiveAmount)
        );
        assert!(matches!(
            TransferIntent::parse(from, "0x123", "5", 18),
            Err(ValidationError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_handle_resolves_once() {
        let mut handle = TransactionHandle::pending(ActionKind::Transfer, TxHash::ZERO);
        assert!(handle.resolve(TxStatus::Pending).is_err());
        handle
            .resolve(TxStatus::Confirmed { block_number: 7 })
            .unwrap();
        let again = handle.resolve(TxStatus::Failed {
            reason: FailureReason::Timeout,
        });
        assert!(matches!(again, Err(PolicyError::AlreadyResolved(_))));
        assert_eq!(handle.status(), &TxStatus::Confirmed { block_number: 7 });
    }

    #[test]
    fn test_only_transfer_clears_input() {
        assert!(ActionKind::Transfer.clears_input_on_confirm());
        assert!(!ActionKind::Whitelist.clears_input_on_confirm());
        assert!(!ActionKind::UpdateScore.clears_input_on_confirm());
    }
}
