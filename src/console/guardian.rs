//! Guardian panel: on-demand policy lookup and policy administration for
//! one operator-entered target account.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::config::{SentinelConfig, TierConfig};
use crate::console::PanelError;
use crate::ledger::LedgerClient;
use crate::policy::{
    parse_account, AccessTier, Notifier, PolicyContract, PreparedCall, SubmissionState,
    Submitter, TransactionHandle, TrustScore, UserPolicyRecord,
};

/// Score draft shown before the operator types one.
pub const DEFAULT_SCORE_DRAFT: &str = "50";

pub struct GuardianPanel<L> {
    contract: PolicyContract<L>,
    submitter: Submitter<L>,
    tiers: TierConfig,
    target: String,
    score_draft: String,
    record: Option<UserPolicyRecord>,
}

impl<L: LedgerClient> GuardianPanel<L> {
    pub fn new(
        contract: PolicyContract<L>,
        notifier: Arc<dyn Notifier>,
        config: &SentinelConfig,
    ) -> Self {
        Self {
            submitter: Submitter::new(contract.clone(), notifier, config.submitter.clone()),
            contract,
            tiers: config.tiers.clone(),
            target: String::new(),
            score_draft: DEFAULT_SCORE_DRAFT.to_string(),
            record: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Change the target. The previous lookup no longer applies.
    pub fn set_target(&mut self, target: &str) {
        if self.target != target {
            self.target = target.to_string();
            self.record = None;
        }
    }

    pub fn score_draft(&self) -> &str {
        &self.score_draft
    }

    pub fn set_score_draft(&mut self, score: &str) {
        self.score_draft = score.to_string();
    }

    /// Result of the last lookup for the current target.
    pub fn record(&self) -> Option<&UserPolicyRecord> {
        self.record.as_ref()
    }

    pub fn tier(&self) -> Option<AccessTier> {
        self.record.map(|r| r.tier(&self.tiers))
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submitter.state()
    }

    /// Fetch the target's policy record. Only runs when asked.
    pub async fn lookup(&mut self) -> Result<UserPolicyRecord, PanelError> {
        let account = self.target_account()?;
        let record = self.contract.get_user_policy(account).await?;
        tracing::debug!(
            account = %account,
            whitelisted = record.whitelisted,
            trust_score = record.trust_score,
            "Policy record fetched"
        );
        self.record = Some(record);
        Ok(record)
    }

    /// Whitelist the target.
    pub async fn authorize(&mut self) -> Result<TransactionHandle, PanelError> {
        let prepared = self.contract.prepare_whitelist(self.target_account()?, true);
        self.submit(&prepared).await
    }

    /// Revoke the target's whitelist entry.
    pub async fn freeze(&mut self) -> Result<TransactionHandle, PanelError> {
        let prepared = self.contract.prepare_whitelist(self.target_account()?, false);
        self.submit(&prepared).await
    }

    /// Set the target's trust score from the score draft.
    pub async fn update_score(&mut self) -> Result<TransactionHandle, PanelError> {
        let account = self.target_account()?;
        let score = TrustScore::parse(&self.score_draft)?;
        let prepared = self
            .contract
            .prepare_trust_score(account, u64::from(score.value()))?;
        self.submit(&prepared).await
    }

    fn target_account(&self) -> Result<Address, PanelError> {
        Ok(parse_account(&self.target)?)
    }

    async fn submit(&mut self, prepared: &PreparedCall) -> Result<TransactionHandle, PanelError> {
        Ok(self.submitter.submit(prepared).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::policy::{RecordingNotifier, TxStatus, ValidationError};

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE_HEX: &str = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";

    fn panel() -> (InMemoryLedger, GuardianPanel<InMemoryLedger>) {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let contract = PolicyContract::new(
            Arc::new(ledger.clone()),
            TOKEN,
            Default::default(),
            Default::default(),
        );
        let mut config = SentinelConfig::default();
        config.submitter.poll_interval_ms = 10;
        let panel = GuardianPanel::new(contract, Arc::new(RecordingNotifier::new()), &config);
        (ledger, panel)
    }

    #[tokio::test]
    async fn test_lookup_only_on_request() {
        let (ledger, mut panel) = panel();
        panel.set_target(ALICE_HEX);
        assert!(panel.record().is_none());
        assert_eq!(ledger.call_count(), 0);

        panel.authorize().await.unwrap();
        assert!(panel.record().is_none());

        let record = panel.lookup().await.unwrap();
        assert!(record.whitelisted);
        assert_eq!(record.trust_score, 50);
        assert_eq!(panel.tier(), Some(AccessTier::Standard));
    }

    #[tokio::test]
    async fn test_score_update_and_freeze() {
        let (_, mut panel) = panel();
        panel.set_target(ALICE_HEX);
        panel.authorize().await.unwrap();

        panel.set_score_draft("85");
        let handle = panel.update_score().await.unwrap();
        assert!(matches!(handle.status(), TxStatus::Confirmed { .. }));
        panel.lookup().await.unwrap();
        assert_eq!(panel.tier(), Some(AccessTier::Trusted));

        panel.freeze().await.unwrap();
        panel.lookup().await.unwrap();
        assert_eq!(panel.tier(), Some(AccessTier::Unauthorized));
        assert_eq!(panel.score_draft(), "85");
    }

    #[tokio::test]
    async fn test_out_of_range_score_never_sent() {
        let (ledger, mut panel) = panel();
        panel.set_target(ALICE_HEX);
        panel.set_score_draft("150");

        let err = panel.update_score().await.unwrap_err();
        assert_eq!(
            err,
            PanelError::Validation(ValidationError::ScoreOutOfRange(150))
        );
        assert_eq!(ledger.send_count(), 0);
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_changing_target_drops_stale_record() {
        let (_, mut panel) = panel();
        panel.set_target(ALICE_HEX);
        panel.lookup().await.unwrap();
        assert!(panel.record().is_some());

        panel.set_target("0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");
        assert!(panel.record().is_none());
    }

    #[test]
    fn test_default_score_draft() {
        let (_, panel) = panel();
        assert_eq!(panel.score_draft(), DEFAULT_SCORE_DRAFT);
    }
}
