//! Token deployment and policy engine linking.

use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash};
use serde_json::Value;

use crate::config::SubmitterConfig;
use crate::ledger::{LedgerClient, RpcLedger, TxReceipt};
use crate::policy::{
    FailureReason, PolicyContract, Preflight, SimulationOutcome, Submitter, TransactionHandle,
    TxStatus,
};
use crate::scripts::ScriptError;

/// Outcome of deploying a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub token: Address,
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Read creation bytecode from a build artifact.
///
/// Accepts Hardhat (`"bytecode": "0x.."`) and Foundry
/// (`"bytecode": {"object": "0x.."}`) layouts.
pub fn load_artifact(path: &Path) -> Result<Bytes, ScriptError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ScriptError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_artifact(&raw)
}

fn parse_artifact(raw: &str) -> Result<Bytes, ScriptError> {
    let json: Value = serde_json::from_str(raw)?;
    let bytecode = match &json["bytecode"] {
        Value::String(code) => code.as_str(),
        Value::Object(obj) => obj
            .get("object")
            .and_then(Value::as_str)
            .ok_or_else(|| ScriptError::Bytecode("missing bytecode.object".to_string()))?,
        _ => return Err(ScriptError::Bytecode("missing bytecode field".to_string())),
    };

    let code: Bytes = bytecode
        .parse()
        .map_err(|e| ScriptError::Bytecode(format!("{e}")))?;
    if code.is_empty() {
        return Err(ScriptError::Bytecode(
            "empty bytecode (abstract contract or interface?)".to_string(),
        ));
    }
    Ok(code)
}

/// Deploy `code` and wait for the creation receipt.
pub async fn deploy_token(
    ledger: &RpcLedger,
    code: Bytes,
    config: &SubmitterConfig,
) -> Result<Deployment, ScriptError> {
    tracing::info!(deployer = %ledger.sender(), bytes = code.len(), "Deploying token");
    let tx_hash = ledger.deploy(code).await?;
    tracing::info!(tx_hash = %tx_hash, "Deployment submitted");

    let receipt = wait_for_receipt(ledger, tx_hash, config).await?;
    if !receipt.success {
        return Err(ScriptError::Failed {
            hash: tx_hash,
            reason: FailureReason::Generic("deployment reverted".to_string()),
        });
    }
    let token = receipt
        .contract_address
        .ok_or(ScriptError::MissingContractAddress(tx_hash))?;
    tracing::info!(token = %token, block_number = receipt.block_number, "Token deployed");

    Ok(Deployment {
        token,
        tx_hash,
        block_number: receipt.block_number,
    })
}

/// Poll for the receipt of `hash` within the configured ceiling.
pub async fn wait_for_receipt<L: LedgerClient>(
    ledger: &L,
    hash: TxHash,
    config: &SubmitterConfig,
) -> Result<TxReceipt, ScriptError> {
    let interval = Duration::from_millis(config.poll_interval_ms);
    let poll = async {
        loop {
            match ledger.receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    tracing::debug!(tx_hash = %hash, error = %e, "Receipt poll failed, retrying");
                }
                Err(e) => return Err(ScriptError::Ledger(e)),
            }
            tokio::time::sleep(interval).await;
        }
    };

    let ceiling = Duration::from_secs(config.confirmation_timeout_secs);
    tokio::time::timeout(ceiling, poll)
        .await
        .map_err(|_| ScriptError::ReceiptTimeout {
            hash,
            secs: config.confirmation_timeout_secs,
        })?
}

/// Wire the token to `engine`: simulate first, submit only if it passes.
pub async fn link_engine<L: LedgerClient>(
    contract: &PolicyContract<L>,
    submitter: &Submitter<L>,
    engine: Address,
) -> Result<TransactionHandle, ScriptError> {
    tracing::info!(token = %contract.address(), engine = %engine, "Linking policy engine");

    let preflight = Preflight::new(contract.clone());
    let prepared = match preflight.simulate_call(contract.prepare_connect(engine)).await {
        SimulationOutcome::WouldSucceed(prepared) => prepared,
        SimulationOutcome::WouldFail(reason) => return Err(ScriptError::Simulation(reason)),
    };

    let handle = submitter.submit(&prepared).await?;
    match handle.status() {
        TxStatus::Failed { reason } => Err(ScriptError::Failed {
            hash: handle.hash,
            reason: reason.clone(),
        }),
        _ => Ok(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeeConfig, RetryConfig};
    use crate::ledger::InMemoryLedger;
    use crate::policy::RecordingNotifier;
    use std::sync::Arc;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ADMIN: Address = Address::repeat_byte(0xad);
    const ENGINE: Address = Address::repeat_byte(0xe1);

    fn fast_submitter() -> SubmitterConfig {
        SubmitterConfig {
            confirmation_timeout_secs: 1,
            poll_interval_ms: 10,
            confirmation_blocks: 0,
        }
    }

    fn contract(ledger: &InMemoryLedger) -> PolicyContract<InMemoryLedger> {
        PolicyContract::new(
            Arc::new(ledger.clone()),
            TOKEN,
            FeeConfig::default(),
            RetryConfig::default(),
        )
    }

    #[test]
    fn test_parse_hardhat_and_foundry_artifacts() {
        let hardhat = r#"{"contractName":"SentinelRWA","bytecode":"0x6080604052"}"#;
        assert_eq!(parse_artifact(hardhat).unwrap().len(), 5);

        let foundry = r#"{"bytecode":{"object":"0x60806040"}}"#;
        assert_eq!(parse_artifact(foundry).unwrap().len(), 4);
    }

    #[test]
    fn test_reject_unusable_artifacts() {
        assert!(matches!(
            parse_artifact(r#"{"bytecode":"0x"}"#),
            Err(ScriptError::Bytecode(_))
        ));
        assert!(matches!(
            parse_artifact(r#"{"abi":[]}"#),
            Err(ScriptError::Bytecode(_))
        ));
        assert!(matches!(
            parse_artifact("not json"),
            Err(ScriptError::ArtifactJson(_))
        ));
    }

    #[test]
    fn test_missing_artifact_file() {
        let err = load_artifact(Path::new("/nonexistent/SentinelRWA.json")).unwrap_err();
        assert!(matches!(err, ScriptError::ArtifactIo { .. }));
    }

    #[tokio::test]
    async fn test_link_engine() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        ledger.set_engine(None);
        let contract = contract(&ledger);
        let submitter = Submitter::new(
            contract.clone(),
            Arc::new(RecordingNotifier::new()),
            fast_submitter(),
        );

        let handle = link_engine(&contract, &submitter, ENGINE).await.unwrap();
        assert!(matches!(handle.status(), TxStatus::Confirmed { .. }));
        assert!(contract.is_policy_engine_connected().await.unwrap());
    }

    #[tokio::test]
    async fn test_link_engine_rejected_by_simulation() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let outsider = ledger.as_account(Address::repeat_byte(0x0b));
        let contract = contract(&outsider);
        let submitter = Submitter::new(
            contract.clone(),
            Arc::new(RecordingNotifier::new()),
            fast_submitter(),
        );

        let err = link_engine(&contract, &submitter, ENGINE).await.unwrap_err();
        assert!(matches!(err, ScriptError::Simulation(_)));
        assert_eq!(ledger.send_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_receipt_times_out() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let err = wait_for_receipt(&ledger, TxHash::ZERO, &fast_submitter())
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::ReceiptTimeout { secs: 1, .. }));
    }
}
