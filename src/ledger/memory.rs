//! In-process ledger for tests and offline dry runs.
//!
//! Executes the Sentinel token ABI against local state with a simplified
//! policy gate (both parties whitelisted, sender score at least 30). Never
//! touches the network. Several handles created with [`InMemoryLedger::as_account`]
//! share one chain, so an admin and a contributor can act on the same state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolInterface, SolValue};

use crate::ledger::types::{LedgerError, LedgerResult, TxReceipt};
use crate::ledger::LedgerClient;
use crate::policy::abi::ISentinelToken::ISentinelTokenCalls;

/// Score assigned by `whitelistUser`.
const WHITELIST_SCORE: u8 = 50;
/// Senders below this score are denied.
const MIN_ACTIVE_SCORE: u8 = 30;

#[derive(Debug, Clone, Default)]
struct World {
    admin: Address,
    engine: Option<Address>,
    balances: HashMap<Address, U256>,
    whitelisted: HashMap<Address, bool>,
    scores: HashMap<Address, u8>,
}

#[derive(Debug)]
struct PendingTx {
    hash: TxHash,
    from: Address,
    input: Bytes,
}

#[derive(Debug, Default)]
struct Chain {
    token: Address,
    world: World,
    block: u64,
    auto_mine: bool,
    offline: bool,
    nonces: HashMap<Address, u64>,
    mempool: Vec<PendingTx>,
    receipts: HashMap<TxHash, TxReceipt>,
    call_log: Vec<TransactionRequest>,
    send_log: Vec<TransactionRequest>,
}

/// Deterministic ledger holding one Sentinel token deployment.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    chain: Arc<Mutex<Chain>>,
    sender: Address,
}

impl InMemoryLedger {
    /// Create a chain with `token` deployed by `admin`, the policy engine
    /// already linked, and blocks mined on every submission.
    pub fn new(token: Address, admin: Address) -> Self {
        let chain = Chain {
            token,
            world: World {
                admin,
                engine: Some(Address::repeat_byte(0xee)),
                ..World::default()
            },
            auto_mine: true,
            ..Chain::default()
        };
        Self {
            chain: Arc::new(Mutex::new(chain)),
            sender: admin,
        }
    }

    /// A handle on the same chain that signs as `sender`.
    pub fn as_account(&self, sender: Address) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            sender,
        }
    }

    /// Credit `amount` to `account`.
    pub fn mint(&self, account: Address, amount: U256) {
        let mut chain = self.lock();
        let balance = chain.world.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Link or unlink the policy engine.
    pub fn set_engine(&self, engine: Option<Address>) {
        self.lock().world.engine = engine;
    }

    /// When disabled, submissions wait in the mempool until [`mine`](Self::mine).
    pub fn set_auto_mine(&self, enabled: bool) {
        self.lock().auto_mine = enabled;
    }

    /// Make every request fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Include all pending transactions in a new block.
    pub fn mine(&self) {
        Self::mine_block(&mut self.lock());
    }

    /// Number of `call` requests served so far.
    pub fn call_count(&self) -> usize {
        self.lock().call_log.len()
    }

    /// Number of transactions accepted so far.
    pub fn send_count(&self) -> usize {
        self.lock().send_log.len()
    }

    /// Every request passed to `call`, oldest first.
    pub fn calls(&self) -> Vec<TransactionRequest> {
        self.lock().call_log.clone()
    }

    /// Every request passed to `send`, oldest first.
    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.lock().send_log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mine_block(chain: &mut Chain) {
        chain.block += 1;
        let block_number = chain.block;
        for tx in std::mem::take(&mut chain.mempool) {
            let mut next = chain.world.clone();
            let success = execute(&mut next, tx.from, &tx.input).is_ok();
            if success {
                chain.world = next;
            }
            chain.receipts.insert(
                tx.hash,
                TxReceipt {
                    block_number,
                    success,
                    contract_address: None,
                },
            );
        }
    }

    /// Resolve sender, target check, and calldata of a request.
    fn unpack(&self, chain: &Chain, tx: &TransactionRequest) -> LedgerResult<(Address, Bytes)> {
        if chain.offline {
            return Err(LedgerError::Network("connection refused".to_string()));
        }
        let target = tx.to.and_then(|kind| kind.to().copied());
        if target != Some(chain.token) {
            return Err(LedgerError::Rejected(
                "no contract code at target address".to_string(),
            ));
        }
        let input = tx.input.input().cloned().unwrap_or_default();
        Ok((tx.from.unwrap_or(self.sender), input))
    }
}

impl LedgerClient for InMemoryLedger {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn call(&self, tx: &TransactionRequest) -> LedgerResult<Bytes> {
        let mut chain = self.lock();
        chain.call_log.push(tx.clone());
        let (from, input) = self.unpack(&chain, tx)?;
        let mut scratch = chain.world.clone();
        execute(&mut scratch, from, &input).map_err(LedgerError::Rejected)
    }

    async fn send(&self, tx: TransactionRequest) -> LedgerResult<TxHash> {
        let mut chain = self.lock();
        let (from, input) = self.unpack(&chain, &tx)?;
        if from != self.sender {
            return Err(LedgerError::Wallet(format!("no signer for {from}")));
        }

        // Without an explicit gas limit the node estimates gas, which runs
        // the call and refuses a reverting transaction outright.
        if tx.gas.is_none() {
            let mut scratch = chain.world.clone();
            execute(&mut scratch, from, &input).map_err(LedgerError::Rejected)?;
        }

        let nonce = chain.nonces.entry(from).or_default();
        let hash = keccak256((from, U256::from(*nonce), input.clone()).abi_encode());
        *nonce += 1;

        chain.send_log.push(tx);
        chain.mempool.push(PendingTx { hash, from, input });
        if chain.auto_mine {
            Self::mine_block(&mut chain);
        }
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>> {
        let chain = self.lock();
        if chain.offline {
            return Err(LedgerError::Network("connection refused".to_string()));
        }
        Ok(chain.receipts.get(&hash).copied())
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        let chain = self.lock();
        if chain.offline {
            return Err(LedgerError::Network("connection refused".to_string()));
        }
        Ok(chain.block)
    }
}

/// Run one token call as `from`, mutating `world` on success.
fn execute(world: &mut World, from: Address, input: &[u8]) -> Result<Bytes, String> {
    let call = ISentinelTokenCalls::abi_decode(input)
        .map_err(|e| format!("unrecognized function selector: {e}"))?;

    let output = match call {
        ISentinelTokenCalls::balanceOf(c) => {
            let balance = world.balances.get(&c.account).copied().unwrap_or_default();
            balance.abi_encode()
        }
        ISentinelTokenCalls::getUserData(c) => {
            let whitelisted = world.whitelisted.get(&c.user).copied().unwrap_or(false);
            let score = world.scores.get(&c.user).copied().unwrap_or(0);
            (whitelisted, U256::from(score)).abi_encode_params()
        }
        ISentinelTokenCalls::isConnected(_) => world.engine.is_some().abi_encode(),
        ISentinelTokenCalls::transfer(c) => {
            check_transfer(world, from, c.to)?;
            let from_balance = world.balances.get(&from).copied().unwrap_or_default();
            if from_balance < c.amount {
                return Err("ERC20: transfer amount exceeds balance".to_string());
            }
            world.balances.insert(from, from_balance - c.amount);
            let to_balance = world.balances.entry(c.to).or_default();
            *to_balance = to_balance.saturating_add(c.amount);
            true.abi_encode()
        }
        ISentinelTokenCalls::whitelistUser(c) => {
            ensure_admin(world, from)?;
            world.whitelisted.insert(c.user, true);
            world.scores.insert(c.user, WHITELIST_SCORE);
            Vec::new()
        }
        ISentinelTokenCalls::revokeUser(c) => {
            ensure_admin(world, from)?;
            world.whitelisted.insert(c.user, false);
            world.scores.insert(c.user, 0);
            Vec::new()
        }
        ISentinelTokenCalls::updateUserScore(c) => {
            ensure_admin(world, from)?;
            let score = u8::try_from(c.score)
                .ok()
                .filter(|s| *s <= 100)
                .ok_or_else(|| "Score max 100".to_string())?;
            world.scores.insert(c.user, score);
            Vec::new()
        }
        ISentinelTokenCalls::connectToRust(c) => {
            ensure_admin(world, from)?;
            world.engine = Some(c.engine);
            Vec::new()
        }
    };

    Ok(output.into())
}

fn ensure_admin(world: &World, from: Address) -> Result<(), String> {
    if from != world.admin {
        return Err("Access Denied".to_string());
    }
    Ok(())
}

fn check_transfer(world: &World, from: Address, to: Address) -> Result<(), String> {
    if world.engine.is_none() {
        return Err("Transfer Denied: policy engine not connected".to_string());
    }
    let allowed = |account: &Address| world.whitelisted.get(account).copied().unwrap_or(false);
    if !allowed(&from) || !allowed(&to) {
        return Err("Transfer Denied: not whitelisted".to_string());
    }
    if world.scores.get(&from).copied().unwrap_or(0) < MIN_ACTIVE_SCORE {
        return Err("Transfer Denied: trust score too low".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::abi::ISentinelToken;
    use alloy::network::TransactionBuilder;
    use alloy::sol_types::SolCall;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE: Address = Address::repeat_byte(0xa1);

    fn request(from: Address, input: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(TOKEN)
            .with_input(input)
    }

    #[tokio::test]
    async fn test_balance_of_unknown_account_is_zero() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let input = ISentinelToken::balanceOfCall { account: ALICE }.abi_encode();
        let output = ledger.call(&request(ADMIN, input)).await.unwrap();
        let balance = ISentinelToken::balanceOfCall::abi_decode_returns(&output).unwrap();
        assert_eq!(balance, U256::ZERO);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_whitelist() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN).as_account(ALICE);
        let input = ISentinelToken::whitelistUserCall { user: ALICE }.abi_encode();
        let err = ledger.send(request(ALICE, input)).await.unwrap_err();
        assert_eq!(err, LedgerError::Rejected("Access Denied".into()));
        assert_eq!(ledger.send_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_gas_limit_mines_reverted_receipt() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        let input = ISentinelToken::transferCall {
            to: ALICE,
            amount: U256::from(1),
        }
        .abi_encode();
        let tx = request(ADMIN, input).with_gas_limit(100_000);

        let hash = ledger.send(tx).await.unwrap();
        let receipt = ledger.receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.block_number, 1);
    }

    #[tokio::test]
    async fn test_manual_mining_keeps_transaction_pending() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        ledger.set_auto_mine(false);
        let input = ISentinelToken::whitelistUserCall { user: ALICE }.abi_encode();

        let hash = ledger.send(request(ADMIN, input)).await.unwrap();
        assert!(ledger.receipt(hash).await.unwrap().is_none());

        ledger.mine();
        assert!(ledger.receipt(hash).await.unwrap().unwrap().success);
    }

    #[tokio::test]
    async fn test_offline_reports_network_error() {
        let ledger = InMemoryLedger::new(TOKEN, ADMIN);
        ledger.set_offline(true);
        let err = ledger.block_number().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
