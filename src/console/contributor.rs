//! Contributor panel: own balance and a gated transfer draft.

use std::sync::Arc;

use alloy::primitives::{Address, U256};

use crate::config::SentinelConfig;
use crate::console::PanelError;
use crate::ledger::LedgerClient;
use crate::policy::{
    GateState, Notifier, PolicyContract, PolicyResult, Preflight, PreflightGate, SubmissionState,
    SubmitError, Submitter, TransactionHandle, TransferDraft, TransferIntent, TxStatus,
};

pub struct ContributorPanel<L> {
    preflight: Preflight<L>,
    submitter: Submitter<L>,
    gate: PreflightGate,
    draft: TransferDraft,
    decimals: u8,
    balance: Option<U256>,
}

impl<L: LedgerClient> ContributorPanel<L> {
    pub fn new(
        contract: PolicyContract<L>,
        notifier: Arc<dyn Notifier>,
        config: &SentinelConfig,
    ) -> Self {
        let decimals = config.contract.token_decimals;
        Self {
            preflight: Preflight::new(contract.clone()),
            submitter: Submitter::new(contract, notifier, config.submitter.clone()),
            gate: PreflightGate::new(decimals),
            draft: TransferDraft::default(),
            decimals,
            balance: None,
        }
    }

    /// Account this panel transfers from.
    pub fn account(&self) -> Address {
        self.preflight.sender()
    }

    pub fn draft(&self) -> &TransferDraft {
        &self.draft
    }

    pub fn gate_state(&self) -> &GateState {
        self.gate.state()
    }

    pub fn can_submit(&self) -> bool {
        self.gate.can_submit() && !self.submitter.state().is_busy()
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submitter.state()
    }

    /// Last fetched balance.
    pub fn balance(&self) -> Option<U256> {
        self.balance
    }

    pub async fn refresh_balance(&mut self) -> PolicyResult<U256> {
        let balance = self.preflight.contract().get_balance(self.account()).await?;
        self.balance = Some(balance);
        Ok(balance)
    }

    pub async fn set_recipient(&mut self, to: &str) -> &GateState {
        self.draft.to = to.to_string();
        self.gate.refresh(&self.preflight, &self.draft).await
    }

    pub async fn set_amount(&mut self, amount: &str) -> &GateState {
        self.draft.amount = amount.to_string();
        self.gate.refresh(&self.preflight, &self.draft).await
    }

    /// Simulate the current draft again against fresh state.
    pub async fn recheck(&mut self) -> &GateState {
        self.gate.invalidate();
        self.gate.refresh(&self.preflight, &self.draft).await
    }

    /// Submit the request that passed simulation.
    pub async fn submit(&mut self) -> Result<TransactionHandle, PanelError> {
        let prepared = match self.gate.prepared() {
            Some(prepared) => prepared.clone(),
            None => return Err(PanelError::NotReady(self.gate.state().clone())),
        };
        let result = self.submitter.submit(&prepared).await;
        self.settle(result).await
    }

    /// Submit the draft without simulating it. The remote contract is then
    /// the only enforcement point.
    pub async fn force_submit(&mut self) -> Result<TransactionHandle, PanelError> {
        let intent = TransferIntent::parse(
            self.account(),
            &self.draft.to,
            &self.draft.amount,
            self.decimals,
        )?;
        let prepared = self.preflight.contract().prepare_intent(&intent)?;
        tracing::warn!(to = %intent.to, "Submitting transfer without simulation");
        let result = self.submitter.submit(&prepared).await;
        self.settle(result).await
    }

    async fn settle(
        &mut self,
        result: Result<TransactionHandle, SubmitError>,
    ) -> Result<TransactionHandle, PanelError> {
        let handle = match result {
            Ok(handle) => handle,
            Err(err) => {
                self.recheck().await;
                return Err(err.into());
            }
        };

        if matches!(handle.status(), TxStatus::Confirmed { .. })
            && handle.action.clears_input_on_confirm()
        {
            self.draft.amount.clear();
        }
        self.recheck().await;
        if let Err(e) = self.refresh_balance().await {
            tracing::warn!(error = %e, "Balance refresh failed");
        }
        Ok(handle)
    }
}
