//! Pre-flight simulation of mutating calls.
//!
//! A simulation runs the exact [`PreparedCall`] that would be submitted as
//! a read-only call, so the remote policy gate sees the same sender,
//! arguments, and fee parameters. Rejections are classified once, here.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;

use crate::ledger::LedgerClient;
use crate::observability::metrics;
use crate::policy::abi::ISentinelToken;
use crate::policy::contract::{PolicyContract, PreparedCall};
use crate::policy::types::{ActionKind, FailureReason, TransferIntent, ValidationError};

/// Predicted outcome of a mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// The call would go through; submit this request unchanged.
    WouldSucceed(PreparedCall),
    WouldFail(FailureReason),
}

impl SimulationOutcome {
    pub fn would_succeed(&self) -> bool {
        matches!(self, SimulationOutcome::WouldSucceed(_))
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            SimulationOutcome::WouldFail(reason) => Some(reason),
            SimulationOutcome::WouldSucceed(_) => None,
        }
    }
}

/// Dry-runs calls against current remote state.
#[derive(Debug)]
pub struct Preflight<L> {
    contract: PolicyContract<L>,
}

impl<L> Clone for Preflight<L> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
        }
    }
}

impl<L: LedgerClient> Preflight<L> {
    pub fn new(contract: PolicyContract<L>) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &PolicyContract<L> {
        &self.contract
    }

    pub fn sender(&self) -> Address {
        self.contract.sender()
    }

    /// Simulate a transfer intent. Local validation failures are returned
    /// as errors and never reach the network.
    pub async fn simulate(
        &self,
        intent: &TransferIntent,
    ) -> Result<SimulationOutcome, ValidationError> {
        let prepared = self.contract.prepare_intent(intent)?;
        Ok(self.simulate_call(prepared).await)
    }

    /// Simulate any prepared mutation.
    pub async fn simulate_call(&self, prepared: PreparedCall) -> SimulationOutcome {
        let outcome = match self.contract.call_prepared(&prepared).await {
            Ok(output) if prepared.action == ActionKind::Transfer => {
                // A token may signal refusal by returning false instead of reverting.
                match ISentinelToken::transferCall::abi_decode_returns(&output) {
                    Ok(false) => SimulationOutcome::WouldFail(FailureReason::Generic(
                        "transfer returned false".to_string(),
                    )),
                    _ => SimulationOutcome::WouldSucceed(prepared),
                }
            }
            Ok(_) => SimulationOutcome::WouldSucceed(prepared),
            Err(err) => SimulationOutcome::WouldFail(FailureReason::from(err)),
        };

        match &outcome {
            SimulationOutcome::WouldSucceed(p) => {
                tracing::debug!(action = %p.action, "Simulation passed");
                metrics::record_simulation("would_succeed");
            }
            SimulationOutcome::WouldFail(reason) => {
                tracing::info!(reason = reason.label(), detail = %reason, "Simulation rejected");
                metrics::record_simulation(reason.label());
            }
        }
        outcome
    }
}

/// Operator-entered transfer fields, kept as typed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferDraft {
    pub to: String,
    pub amount: String,
}

impl TransferDraft {
    pub fn new(to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            amount: amount.into(),
        }
    }
}

/// Where a draft stands with respect to submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// A field is empty or the amount is zero; nothing was simulated.
    Idle,
    /// Local validation failed; nothing was sent to the network.
    Invalid(ValidationError),
    /// Simulation passed; this request may be submitted.
    Ready(PreparedCall),
    /// Simulation rejected the draft.
    Blocked(FailureReason),
}

/// Re-simulates a transfer draft whenever its fields change.
///
/// Submission stays disabled after a rejection until `to` or `amount`
/// changes, or the gate is invalidated.
#[derive(Debug)]
pub struct PreflightGate {
    decimals: u8,
    last_draft: Option<TransferDraft>,
    state: GateState,
}

impl PreflightGate {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            last_draft: None,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.state, GateState::Ready(_))
    }

    /// The request that passed simulation, if any.
    pub fn prepared(&self) -> Option<&PreparedCall> {
        match &self.state {
            GateState::Ready(prepared) => Some(prepared),
            _ => None,
        }
    }

    /// Forget the last evaluation so the next refresh simulates again.
    pub fn invalidate(&mut self) {
        self.last_draft = None;
        self.state = GateState::Idle;
    }

    /// Evaluate `draft`, simulating only if it differs from the last one.
    pub async fn refresh<L: LedgerClient>(
        &mut self,
        preflight: &Preflight<L>,
        draft: &TransferDraft,
    ) -> &GateState {
        if self.last_draft.as_ref() == Some(draft) {
            return &self.state;
        }
        self.last_draft = Some(draft.clone());
        self.state = self.evaluate(preflight, draft).await;
        &self.state
    }

    async fn evaluate<L: LedgerClient>(
        &self,
        preflight: &Preflight<L>,
        draft: &TransferDraft,
    ) -> GateState {
        let amount = draft.amount.trim();
        if draft.to.trim().is_empty() || amount.is_empty() {
            return GateState::Idle;
        }

        let intent =
            match TransferIntent::parse(preflight.sender(), &draft.to, &draft.amount, self.decimals) {
                Ok(intent) => intent,
                Err(ValidationError::NonPositiveAmount) if !amount.starts_with('-') => {
                    return GateState::Idle;
                }
                Err(err) => return GateState::Invalid(err),
            };

        match preflight.simulate(&intent).await {
            Ok(SimulationOutcome::WouldSucceed(prepared)) => GateState::Ready(prepared),
            Ok(SimulationOutcome::WouldFail(reason)) => GateState::Blocked(reason),
            Err(err) => GateState::Invalid(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeeConfig, RetryConfig};
    use crate::ledger::InMemoryLedger;
    use alloy::primitives::U256;
    use std::sync::Arc;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const ALICE_HEX: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";

    fn preflight(ledger: &InMemoryLedger) -> Preflight<InMemoryLedger> {
        Preflight::new(PolicyContract::new(
            Arc::new(ledger.clone()),
            TOKEN,
            FeeConfig::default(),
            RetryConfig::default(),
        ))
    }

    /// Admin holds funds and both parties are whitelisted.
    fn funded_ledger() -> InMemoryLedger {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        ledger.mint(ADMIN, U256::from(1_000));
        ledger
    }

    async fn whitelist(ledger: &InMemoryLedger, account: Address) {
        let contract = preflight(ledger).contract().clone();
        contract.set_whitelist(account, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_not_whitelisted_is_policy_rejection() {
        let ledger = funded_ledger();
        let intent = TransferIntent::new(ADMIN, ALICE, U256::from(10)).unwrap();
        let outcome = preflight(&ledger).simulate(&intent).await.unwrap();
        assert!(outcome.failure().unwrap().is_policy_rejection());
    }

    #[tokio::test]
    async fn test_overdraft_is_insufficient_balance() {
        let ledger = funded_ledger();
        whitelist(&ledger, ADMIN).await;
        whitelist(&ledger, ALICE).await;
        let intent = TransferIntent::new(ADMIN, ALICE, U256::from(5_000)).unwrap();
        let outcome = preflight(&ledger).simulate(&intent).await.unwrap();
        assert!(matches!(
            outcome.failure(),
            Some(FailureReason::InsufficientBalance(_))
        ));
    }

    #[tokio::test]
    async fn test_success_does_not_mutate_state() {
        let ledger = funded_ledger();
        whitelist(&ledger, ADMIN).await;
        whitelist(&ledger, ALICE).await;
        let preflight = preflight(&ledger);
        let intent = TransferIntent::new(ADMIN, ALICE, U256::from(10)).unwrap();

        let outcome = preflight.simulate(&intent).await.unwrap();
        assert!(outcome.would_succeed());
        assert_eq!(
            preflight.contract().get_balance(ALICE).await.unwrap(),
            U256::ZERO
        );
    }

    #[tokio::test]
    async fn test_network_failure_is_not_policy() {
        let ledger = funded_ledger();
        ledger.set_offline(true);
        let preflight = Preflight::new(PolicyContract::new(
            Arc::new(ledger.clone()),
            TOKEN,
            FeeConfig::default(),
            RetryConfig {
                enabled: false,
                ..RetryConfig::default()
            },
        ));
        let intent = TransferIntent::new(ADMIN, ALICE, U256::from(10)).unwrap();
        let outcome = preflight.simulate(&intent).await.unwrap();
        assert_eq!(outcome.failure().unwrap().label(), "network");
    }

    #[tokio::test]
    async fn test_gate_suppresses_empty_and_zero() {
        let ledger = funded_ledger();
        let preflight = preflight(&ledger);
        let mut gate = PreflightGate::new(0);

        for draft in [
            TransferDraft::new("", "5"),
            TransferDraft::new(ALICE_HEX, ""),
            TransferDraft::new(ALICE_HEX, "0"),
        ] {
            assert_eq!(gate.refresh(&preflight, &draft).await, &GateState::Idle);
        }
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_gate_blocks_invalid_input_without_network() {
        let ledger = funded_ledger();
        let preflight = preflight(&ledger);
        let mut gate = PreflightGate::new(0);

        let state = gate
            .refresh(&preflight, &TransferDraft::new("0x1234", "5"))
            .await;
        assert!(matches!(
            state,
            GateState::Invalid(ValidationError::MalformedAddress(_))
        ));
        let state = gate
            .refresh(&preflight, &TransferDraft::new(ALICE_HEX, "-5"))
            .await;
        assert_eq!(state, &GateState::Invalid(ValidationError::NonPositiveAmount));
        assert!(!gate.can_submit());
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_gate_reruns_only_on_change() {
        let ledger = funded_ledger();
        whitelist(&ledger, ADMIN).await;
        let preflight = preflight(&ledger);
        let mut gate = PreflightGate::new(0);
        let draft = TransferDraft::new(ALICE_HEX, "10");

        gate.refresh(&preflight, &draft).await;
        assert!(matches!(gate.state(), GateState::Blocked(_)));
        let calls = ledger.call_count();

        // Whitelisting the recipient alone does not reopen the gate.
        whitelist(&ledger, ALICE).await;
        gate.refresh(&preflight, &draft).await;
        assert!(!gate.can_submit());
        assert_eq!(ledger.call_count(), calls);

        gate.refresh(&preflight, &TransferDraft::new(ALICE_HEX, "11"))
            .await;
        assert!(gate.can_submit());
        assert_eq!(gate.prepared().unwrap().action, ActionKind::Transfer);
    }
}
