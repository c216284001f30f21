//! JSON-RPC ledger client with timeouts and read failover.
//!
//! # Responsibilities
//! - Connect to the primary endpoint (reads and signed submissions)
//! - Fail reads over to secondary endpoints on network errors
//! - Map every transport/node error into `LedgerError` at the boundary

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::decode_revert_reason;
use alloy::transports::{RpcError, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::NetworkConfig;
use crate::ledger::types::{ChainId, LedgerError, LedgerResult, TxReceipt};
use crate::ledger::wallet::Wallet;
use crate::ledger::LedgerClient;
use crate::observability::metrics;

/// Ledger client backed by alloy HTTP providers.
#[derive(Clone)]
pub struct RpcLedger {
    /// Read providers (primary + failovers).
    readers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Wallet-filled provider on the primary endpoint.
    signer: Arc<dyn Provider + Send + Sync>,
    sender: Address,
    config: NetworkConfig,
    timeout_duration: Duration,
}

impl RpcLedger {
    /// Connect to the configured endpoints and bind `wallet` as sender.
    ///
    /// An unreachable node is tolerated (reads fail later with a network
    /// error); a node reporting a different chain ID is not, since every
    /// signature would be for the wrong chain.
    pub async fn connect(config: NetworkConfig, wallet: Wallet) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Network(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;

        let signer = Arc::new(
            ProviderBuilder::new()
                .wallet(wallet.to_network_wallet())
                .connect_http(primary_url.clone()),
        ) as Arc<dyn Provider + Send + Sync>;

        let mut readers = vec![
            Arc::new(ProviderBuilder::new().connect_http(primary_url)) as Arc<dyn Provider + Send + Sync>,
        ];
        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => readers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>,
                ),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let ledger = Self {
            readers,
            signer,
            sender: wallet.address(),
            config,
            timeout_duration,
        };

        match ledger.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %ledger.config.rpc_url,
                chain_id = ledger.config.chain_id,
                sender = %ledger.sender,
                "Ledger client initialized"
            ),
            Err(e @ LedgerError::ChainMismatch { .. }) => return Err(e),
            Err(e) => tracing::warn!(
                error = %e,
                "Ledger client initialized but chain verification failed"
            ),
        }

        Ok(ledger)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> LedgerResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> LedgerResult<ChainId> {
        let mut last_error = no_providers();
        for (i, provider) in self.readers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(id)) => return Ok(ChainId(id)),
                Ok(Err(e)) => {
                    let err = map_rpc_error(e);
                    tracing::warn!(provider_idx = i, error = %err, "RPC error, trying next provider");
                    last_error = err;
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                    last_error = self.timeout_error();
                }
            }
            self.record_failover(i, "eth_chainId");
        }
        Err(last_error)
    }

    /// Deploy contract creation code and return the transaction hash.
    pub async fn deploy(&self, code: Bytes) -> LedgerResult<TxHash> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_deploy_code(code);
        self.send(tx).await
    }

    fn timeout_error(&self) -> LedgerError {
        LedgerError::Timeout(self.config.rpc_timeout_secs)
    }
}

impl LedgerClient for RpcLedger {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn call(&self, tx: &TransactionRequest) -> LedgerResult<Bytes> {
        let mut last_error = no_providers();
        for (i, provider) in self.readers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.call(tx.clone())).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) => {
                    let err = map_rpc_error(e);
                    // A revert is deterministic; another node will say the same.
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    tracing::warn!(provider_idx = i, error = %err, "RPC error, trying next provider");
                    last_error = err;
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                    last_error = self.timeout_error();
                }
            }
            self.record_failover(i, "eth_call");
        }
        Err(last_error)
    }

    async fn send(&self, tx: TransactionRequest) -> LedgerResult<TxHash> {
        // Submissions go to the primary only; failing over a signed write
        // risks the same transaction landing twice under different nonces.
        match timeout(self.timeout_duration, self.signer.send_transaction(tx)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(map_rpc_error(e)),
            Err(_) => Err(self.timeout_error()),
        }
    }

    async fn receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>> {
        let mut last_error = no_providers();
        for (i, provider) in self.readers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_receipt(hash)).await {
                Ok(Ok(receipt)) => {
                    return Ok(receipt.map(|r| TxReceipt {
                        block_number: r.block_number.unwrap_or_default(),
                        success: r.status(),
                        contract_address: r.contract_address,
                    }))
                }
                Ok(Err(e)) => {
                    let err = map_rpc_error(e);
                    tracing::warn!(provider_idx = i, error = %err, "RPC error");
                    last_error = err;
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout");
                    last_error = self.timeout_error();
                }
            }
            self.record_failover(i, "eth_getTransactionReceipt");
        }
        Err(last_error)
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        let mut last_error = no_providers();
        for (i, provider) in self.readers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(number)) => return Ok(number),
                Ok(Err(e)) => {
                    let err = map_rpc_error(e);
                    tracing::warn!(provider_idx = i, error = %err, "RPC error");
                    last_error = err;
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout");
                    last_error = self.timeout_error();
                }
            }
            self.record_failover(i, "eth_blockNumber");
        }
        Err(last_error)
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("sender", &self.sender)
            .field("read_providers", &self.readers.len())
            .finish()
    }
}

impl RpcLedger {
    /// Whether a read provider follows index `i`.
    fn has_fallback(&self, i: usize) -> bool {
        i + 1 < self.readers.len()
    }

    /// Count a failover only when another provider is actually tried.
    fn record_failover(&self, i: usize, method: &'static str) {
        if self.has_fallback(i) {
            metrics::record_rpc_failover(method);
        }
    }
}

fn no_providers() -> LedgerError {
    LedgerError::Network("All RPC providers failed".to_string())
}

/// Convert an alloy transport error into the ledger taxonomy.
pub(crate) fn map_rpc_error(err: TransportError) -> LedgerError {
    match err {
        RpcError::ErrorResp(payload) => {
            let reason = payload
                .as_revert_data()
                .and_then(|data| decode_revert_reason(&data))
                .unwrap_or_else(|| payload.message.to_string());
            LedgerError::Rejected(reason)
        }
        RpcError::Transport(kind) => LedgerError::Network(kind.to_string()),
        RpcError::DeserError { err, .. } => LedgerError::Decode(err.to_string()),
        // Filler failures (gas estimation, signing) are local refusals of
        // this particular call.
        RpcError::LocalUsageError(e) => LedgerError::Rejected(e.to_string()),
        other => LedgerError::Network(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_config() -> NetworkConfig {
        NetworkConfig {
            chain_id: 31337, // Anvil default
            // Nothing listens on port 1; connections are refused fast.
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn test_connect_tolerates_unreachable_node() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let ledger = RpcLedger::connect(test_config(), wallet.clone()).await.unwrap();
        assert_eq!(ledger.sender(), wallet.address());
    }

    #[tokio::test]
    async fn test_reads_fail_over_then_report_network_error() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        config.failover_urls.push("not a url".to_string());

        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let ledger = RpcLedger::connect(config, wallet).await.unwrap();
        assert_eq!(ledger.readers.len(), 2);

        let err = ledger.block_number().await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_failover_only_counted_when_a_provider_follows() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let single = RpcLedger::connect(test_config(), wallet.clone()).await.unwrap();
        assert!(!single.has_fallback(0));

        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());
        let pair = RpcLedger::connect(config, wallet).await.unwrap();
        assert!(pair.has_fallback(0));
        assert!(!pair.has_fallback(1));
    }

    #[test]
    fn test_error_response_maps_to_rejected() {
        let payload = ErrorPayload {
            code: 3,
            message: "execution reverted: Transfer Denied".into(),
            data: None,
        };
        let err = map_rpc_error(RpcError::ErrorResp(payload));
        assert_eq!(
            err,
            LedgerError::Rejected("execution reverted: Transfer Denied".into())
        );
    }
}
