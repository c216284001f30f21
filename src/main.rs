//! `sentinel`: operator console for the Sentinel policy-gated token.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!   ┌──────────┐   ┌──────────────────────────────────────────────┐
//!   │  config  │──▶│ policy: contract → simulator → submitter      │
//!   └──────────┘   └───────────────┬──────────────────────────────┘
//!                                  │ LedgerClient
//!                                  ▼
//!                  ┌──────────────────────────────┐
//!                  │ ledger: RpcLedger (alloy)     │──▶ chain node
//!                  └──────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::U256;
use clap::{Parser, Subcommand};

use sentinel_client::config::{load_or_default, SentinelConfig};
use sentinel_client::console::{ConnectionMonitor, ContributorPanel, GuardianPanel, PanelError};
use sentinel_client::ledger::{RpcLedger, Wallet};
use sentinel_client::lifecycle::{shutdown_on_signal, Shutdown};
use sentinel_client::observability::{logging, metrics};
use sentinel_client::policy::{
    format_amount, parse_account, GateState, Notifier, PolicyContract, SubmitError, Submitter,
    TracingNotifier, TransactionHandle, TxStatus,
};
use sentinel_client::scripts::{self, Scenario};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Operator console for the Sentinel policy-gated token", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engine link, balance, and policy record of the signing account
    Status,
    /// Token balance of an account (default: the signing account)
    Balance { account: Option<String> },
    /// Whitelist flag, trust score, and access tier of an account
    Inspect { account: String },
    /// Simulate, then submit a transfer (amount in token units)
    Transfer {
        to: String,
        amount: String,
        /// Submit even if simulation rejects it
        #[arg(long)]
        force: bool,
    },
    /// Whitelist an account
    Whitelist { account: String },
    /// Revoke an account's whitelist entry
    Revoke { account: String },
    /// Set an account's trust score (0-100)
    Score { account: String, score: String },
    /// Link the token to a policy engine (default: the configured engine)
    Connect { engine: Option<String> },
    /// Deploy the token from a build artifact, then link the engine
    Deploy {
        #[arg(long)]
        artifact: PathBuf,
        /// Skip linking the policy engine
        #[arg(long)]
        no_link: bool,
    },
    /// Run the whitelist → transfer → revoke → denied-transfer scenario
    Scenario {
        #[arg(long)]
        recipient: Option<String>,
        /// Amount in smallest units
        #[arg(long, default_value_t = scripts::scenario::DEFAULT_TRANSFER_AMOUNT)]
        amount: u64,
    },
    /// Poll engine connectivity and the signer's balance until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(
        chain_id = config.network.chain_id,
        rpc_url = %config.network.rpc_url,
        token = %config.contract.token_address,
        "Configuration loaded"
    );

    let wallet = Wallet::from_env(config.network.chain_id)?;
    let ledger = Arc::new(RpcLedger::connect(config.network.clone(), wallet).await?);
    let contract = PolicyContract::from_config(Arc::clone(&ledger), &config)?;
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let decimals = config.contract.token_decimals;

    match cli.command {
        Commands::Status => status(&contract, &config).await?,
        Commands::Balance { account } => {
            let account = match account {
                Some(account) => parse_account(&account)?,
                None => contract.sender(),
            };
            let balance = contract.get_balance(account).await?;
            println!("{} {}", account, format_amount(balance, decimals));
        }
        Commands::Inspect { account } => {
            let mut panel = GuardianPanel::new(contract, notifier, &config);
            panel.set_target(&account);
            let record = panel.lookup().await?;
            println!("account      {}", panel.target());
            println!("whitelisted  {}", record.whitelisted);
            println!("trust score  {}", record.trust_score);
            println!("tier         {}", record.tier(&config.tiers));
        }
        Commands::Transfer { to, amount, force } => {
            let mut panel = ContributorPanel::new(contract, notifier, &config);
            panel.set_recipient(&to).await;
            let state = panel.set_amount(&amount).await.clone();
            let result = match state {
                GateState::Ready(_) => panel.submit().await,
                GateState::Blocked(reason) if force => {
                    eprintln!("simulation rejected ({reason}); forcing submission");
                    panel.force_submit().await
                }
                GateState::Blocked(reason) => {
                    return Err(format!(
                        "simulation rejected: {reason} (use --force to submit anyway)"
                    )
                    .into())
                }
                GateState::Invalid(err) => return Err(err.into()),
                GateState::Idle => return Err("amount must be greater than zero".into()),
            };
            report(result)?;
            if let Some(balance) = panel.balance() {
                println!("balance {}", format_amount(balance, decimals));
            }
        }
        Commands::Whitelist { account } => {
            let mut panel = GuardianPanel::new(contract, notifier, &config);
            panel.set_target(&account);
            report(panel.authorize().await)?;
        }
        Commands::Revoke { account } => {
            let mut panel = GuardianPanel::new(contract, notifier, &config);
            panel.set_target(&account);
            report(panel.freeze().await)?;
        }
        Commands::Score { account, score } => {
            let mut panel = GuardianPanel::new(contract, notifier, &config);
            panel.set_target(&account);
            panel.set_score_draft(&score);
            report(panel.update_score().await)?;
        }
        Commands::Connect { engine } => {
            let engine = match engine {
                Some(engine) => parse_account(&engine)?,
                None => parse_account(&config.contract.policy_engine_address)?,
            };
            let submitter = Submitter::new(contract.clone(), notifier, config.submitter.clone());
            let handle = scripts::link_engine(&contract, &submitter, engine).await?;
            println!(
                "linked {} to engine {} in {}",
                contract.address(),
                engine,
                handle.hash
            );
        }
        Commands::Deploy { artifact, no_link } => {
            let code = scripts::load_artifact(&artifact)?;
            let deployment = scripts::deploy_token(&ledger, code, &config.submitter).await?;
            println!("TOKEN_ADDRESS = \"{}\"", deployment.token);

            if !no_link {
                let engine = parse_account(&config.contract.policy_engine_address)?;
                let token = PolicyContract::new(
                    Arc::clone(&ledger),
                    deployment.token,
                    config.fees.clone(),
                    config.retries.clone(),
                );
                let submitter = Submitter::new(token.clone(), notifier, config.submitter.clone());
                scripts::link_engine(&token, &submitter, engine).await?;
                println!("ENGINE_ADDRESS = \"{engine}\"");
            }
        }
        Commands::Scenario { recipient, amount } => {
            let mut scenario = Scenario::new(contract, notifier, config.submitter.clone())
                .with_amount(U256::from(amount));
            if let Some(recipient) = recipient {
                scenario = scenario.with_recipient(parse_account(&recipient)?);
            }
            let result = scenario.run().await;
            print!("{}", scripts::render(&result, decimals));
            if !result.passed() {
                return Err("scenario failed".into());
            }
        }
        Commands::Watch => watch(contract, &config).await?,
    }

    Ok(())
}

async fn status(contract: &PolicyContract<RpcLedger>, config: &SentinelConfig) -> CliResult {
    let account = contract.sender();
    let (connected, (balance, record)) = futures_util::future::try_join(
        contract.is_policy_engine_connected(),
        futures_util::future::try_join(
            contract.get_balance(account),
            contract.get_user_policy(account),
        ),
    )
    .await?;

    println!("token        {}", contract.address());
    println!("engine       {}", if connected { "linked" } else { "offline" });
    println!("account      {account}");
    println!("balance      {}", format_amount(balance, config.contract.token_decimals));
    println!("whitelisted  {}", record.whitelisted);
    println!("trust score  {}", record.trust_score);
    println!("tier         {}", record.tier(&config.tiers));
    Ok(())
}

async fn watch(contract: PolicyContract<RpcLedger>, config: &SentinelConfig) -> CliResult {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let account = contract.sender();
    let decimals = config.contract.token_decimals;
    let shutdown = Shutdown::new();
    let monitor = ConnectionMonitor::new(contract, &config.monitor).watch_balance(account);
    let mut status = monitor.subscribe();
    let mut balance = monitor.subscribe_balance();
    let task = tokio::spawn(monitor.run(shutdown.subscribe()));
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = match *status.borrow_and_update() {
                    Some(true) => "policy engine: linked",
                    Some(false) => "policy engine: offline",
                    None => "policy engine: unknown (node unreachable)",
                };
                println!("{line}");
            }
            changed = balance.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(amount) = *balance.borrow_and_update() {
                    println!("balance {account}: {}", format_amount(amount, decimals));
                }
            }
            _ = stop.recv() => break,
        }
    }

    task.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Print the terminal outcome of a panel action.
fn report(result: Result<TransactionHandle, PanelError>) -> CliResult {
    match result {
        Ok(handle) => match handle.status() {
            TxStatus::Confirmed { block_number } => {
                println!("{} confirmed in block {block_number} ({})", handle.action, handle.hash);
                Ok(())
            }
            TxStatus::Failed { reason } => {
                Err(format!("{} failed: {reason} ({})", handle.action, handle.hash).into())
            }
            TxStatus::Pending => {
                Err(format!("{} still pending ({})", handle.action, handle.hash).into())
            }
        },
        Err(PanelError::Submit(SubmitError::Refused(reason))) => {
            Err(format!("rejected by node: {reason}").into())
        }
        Err(e) => Err(e.into()),
    }
}
