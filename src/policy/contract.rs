//! Typed proxy for the policy-gated token at one fixed address.
//!
//! # Responsibilities
//! - Encode every call once, with sender and fee parameters attached
//! - Read balances, policy records, and engine connectivity
//! - Submit mutating calls and hand back a pending handle immediately

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;

use crate::config::{FeeConfig, RetryConfig, SentinelConfig};
use crate::ledger::{LedgerClient, LedgerError, LedgerResult};
use crate::policy::abi::ISentinelToken;
use crate::policy::types::{
    parse_account, ActionKind, PolicyResult, TransactionHandle, TransferIntent, TrustScore,
    UserPolicyRecord, ValidationError,
};
use crate::resilience::retry_read;

/// A fully encoded mutating call, ready for simulation or submission.
///
/// Simulation and submission both consume this exact request, so the dry
/// run sees the same sender, calldata, and fee parameters as the real call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub action: ActionKind,
    pub request: TransactionRequest,
}

/// Binding to the token contract through a ledger client.
pub struct PolicyContract<L> {
    ledger: Arc<L>,
    address: Address,
    fees: FeeConfig,
    retries: RetryConfig,
}

impl<L> Clone for PolicyContract<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            address: self.address,
            fees: self.fees.clone(),
            retries: self.retries.clone(),
        }
    }
}

impl<L: LedgerClient> PolicyContract<L> {
    pub fn new(ledger: Arc<L>, address: Address, fees: FeeConfig, retries: RetryConfig) -> Self {
        Self {
            ledger,
            address,
            fees,
            retries,
        }
    }

    /// Bind to the token configured in `config.contract.token_address`.
    pub fn from_config(ledger: Arc<L>, config: &SentinelConfig) -> Result<Self, ValidationError> {
        let address = parse_account(&config.contract.token_address)?;
        Ok(Self::new(
            ledger,
            address,
            config.fees.clone(),
            config.retries.clone(),
        ))
    }

    /// Contract every call targets.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Account that signs mutating calls.
    pub fn sender(&self) -> Address {
        self.ledger.sender()
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    // ---- reads ----

    /// Token balance of `account`; zero for accounts the contract never saw.
    pub async fn get_balance(&self, account: Address) -> PolicyResult<U256> {
        self.read(ISentinelToken::balanceOfCall { account }, "balanceOf")
            .await
    }

    /// Whitelist flag and trust score of `account`.
    pub async fn get_user_policy(&self, account: Address) -> PolicyResult<UserPolicyRecord> {
        let data = self
            .read(ISentinelToken::getUserDataCall { user: account }, "getUserData")
            .await?;
        let trust_score = u8::try_from(data.trustScore).map_err(|_| {
            LedgerError::Decode(format!("trust score {} out of range", data.trustScore))
        })?;
        Ok(UserPolicyRecord {
            whitelisted: data.whitelisted,
            trust_score,
        })
    }

    /// Whether the token is wired to its policy engine.
    pub async fn is_policy_engine_connected(&self) -> PolicyResult<bool> {
        self.read(ISentinelToken::isConnectedCall {}, "isConnected")
            .await
    }

    async fn read<C: SolCall>(&self, call: C, operation: &'static str) -> PolicyResult<C::Return> {
        let request = TransactionRequest::default()
            .with_from(self.sender())
            .with_to(self.address)
            .with_input(call.abi_encode());

        let output = retry_read(&self.retries, operation, || self.ledger.call(&request)).await?;
        let decoded = C::abi_decode_returns(&output)
            .map_err(|e| LedgerError::Decode(format!("{operation}: {e}")))?;
        Ok(decoded)
    }

    // ---- call preparation ----

    /// Encode a transfer; zero amounts never leave the process.
    pub fn prepare_transfer(
        &self,
        to: Address,
        amount: U256,
    ) -> Result<PreparedCall, ValidationError> {
        let intent = TransferIntent::new(self.sender(), to, amount)?;
        self.prepare_intent(&intent)
    }

    /// Encode a transfer intent signed by this client's account.
    pub fn prepare_intent(
        &self,
        intent: &TransferIntent,
    ) -> Result<PreparedCall, ValidationError> {
        if intent.from != self.sender() {
            return Err(ValidationError::SenderMismatch {
                intent: intent.from,
                signer: self.sender(),
            });
        }
        if intent.amount.is_zero() {
            return Err(ValidationError::NonPositiveAmount);
        }
        let input = ISentinelToken::transferCall {
            to: intent.to,
            amount: intent.amount,
        }
        .abi_encode();
        Ok(self.prepare(ActionKind::Transfer, input))
    }

    /// Encode `whitelistUser` (allowed) or `revokeUser` (not allowed).
    pub fn prepare_whitelist(&self, account: Address, allowed: bool) -> PreparedCall {
        if allowed {
            let input = ISentinelToken::whitelistUserCall { user: account }.abi_encode();
            self.prepare(ActionKind::Whitelist, input)
        } else {
            let input = ISentinelToken::revokeUserCall { user: account }.abi_encode();
            self.prepare(ActionKind::Revoke, input)
        }
    }

    /// Encode `updateUserScore` after checking the 0–100 bound.
    pub fn prepare_trust_score(
        &self,
        account: Address,
        score: u64,
    ) -> Result<PreparedCall, ValidationError> {
        let score = TrustScore::new(score)?;
        let input = ISentinelToken::updateUserScoreCall {
            user: account,
            score: U256::from(score.value()),
        }
        .abi_encode();
        Ok(self.prepare(ActionKind::UpdateScore, input))
    }

    /// Encode `connectToRust`, wiring the token to a policy engine.
    pub fn prepare_connect(&self, engine: Address) -> PreparedCall {
        let input = ISentinelToken::connectToRustCall { engine }.abi_encode();
        self.prepare(ActionKind::ConnectEngine, input)
    }

    fn prepare(&self, action: ActionKind, input: Vec<u8>) -> PreparedCall {
        let mut request = TransactionRequest::default()
            .with_from(self.sender())
            .with_to(self.address)
            .with_input(input)
            .with_max_fee_per_gas(self.fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(self.fees.max_priority_fee_per_gas);
        if let Some(gas_limit) = self.fees.gas_limit {
            request.set_gas_limit(gas_limit);
        }
        PreparedCall { action, request }
    }

    // ---- submission ----

    /// Execute the exact request of `prepared` without committing it.
    pub async fn call_prepared(&self, prepared: &PreparedCall) -> LedgerResult<Bytes> {
        retry_read(&self.retries, prepared.action.as_str(), || {
            self.ledger.call(&prepared.request)
        })
        .await
    }

    /// Submit a prepared call. Returns once the node accepted it; the
    /// handle is still pending.
    pub async fn dispatch(&self, prepared: &PreparedCall) -> PolicyResult<TransactionHandle> {
        let hash = self.ledger.send(prepared.request.clone()).await?;
        let handle = TransactionHandle::pending(prepared.action, hash);
        tracing::info!(
            action_id = %handle.action_id,
            action = %prepared.action,
            tx_hash = %hash,
            "Transaction accepted by node"
        );
        Ok(handle)
    }

    /// Transfer `amount` smallest units to `to`. The policy verdict is the
    /// contract's; only `amount > 0` is checked here.
    pub async fn transfer(&self, to: Address, amount: U256) -> PolicyResult<TransactionHandle> {
        let prepared = self.prepare_transfer(to, amount)?;
        self.dispatch(&prepared).await
    }

    pub async fn set_whitelist(
        &self,
        account: Address,
        allowed: bool,
    ) -> PolicyResult<TransactionHandle> {
        let prepared = self.prepare_whitelist(account, allowed);
        self.dispatch(&prepared).await
    }

    /// Out-of-range scores are rejected before any network call.
    pub async fn set_trust_score(
        &self,
        account: Address,
        score: u64,
    ) -> PolicyResult<TransactionHandle> {
        let prepared = self.prepare_trust_score(account, score)?;
        self.dispatch(&prepared).await
    }

    pub async fn connect_policy_engine(
        &self,
        engine: Address,
    ) -> PolicyResult<TransactionHandle> {
        let prepared = self.prepare_connect(engine);
        self.dispatch(&prepared).await
    }
}

impl<L> std::fmt::Debug for PolicyContract<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyContract")
            .field("address", &self.address)
            .field("fees", &self.fees)
            .finish()
    }
}
