//! `tusc` command line client.
//!
//! Looks up chain objects, builds transfers (optionally wrapped in a
//! proposal) and signs or verifies messages. Transactions are printed
//! unless `--broadcast` is given; signing keys come from the `TUSC_WIF`
//! environment variable.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use tusc_client::blockchain::wallet::WIF_ENV_VAR;
use tusc_client::blockchain::{BlockchainInstance, HttpRpc, Wallet};
use tusc_client::config::{load_config, ClientConfig};
use tusc_client::market::Amount;
use tusc_client::message::Message;
use tusc_client::objects::{Account, Committee};
use tusc_client::observability::logging::init_logging;
use tusc_client::protocol::operations::Transfer;

#[derive(Parser)]
#[command(name = "tusc")]
#[command(about = "Command line client for the TUSC chain", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node URL, overrides the configuration
    #[arg(short, long)]
    node: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a raw object by id
    Object { id: String },
    /// Show an account by name or id
    Account { name: String },
    /// Show a committee member by account name or 1.5.x id
    Committee { name: String },
    /// Build a transfer
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount with symbol, e.g. "1.5 TUSC"
        #[arg(long)]
        amount: String,
        /// Wrap the transfer in a proposal paid by this account
        #[arg(long)]
        propose: Option<String>,
        /// Sign and send instead of printing
        #[arg(long)]
        broadcast: bool,
    },
    /// Sign a message with an account's memo key
    SignMessage {
        #[arg(long)]
        account: String,
        message: String,
    },
    /// Verify an armored signed message read from a file
    VerifyMessage { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(node) = cli.node {
        config.node.url = node;
    }
    init_logging(&config.observability.log_level);

    tracing::info!(node = %config.node.url, "tusc v0.1.0 starting");

    let wallet = if std::env::var_os(WIF_ENV_VAR).is_some() {
        Wallet::from_env(&config.chain.prefix)?
    } else {
        Wallet::in_memory(&config.chain.prefix)
    };
    let rpc = HttpRpc::new(&config.node)?;
    let instance = BlockchainInstance::with_wallet(config, std::sync::Arc::new(rpc), wallet);

    match cli.command {
        Commands::Object { id } => {
            let object = instance.rpc().get_object(&id).await?.unwrap_or(Value::Null);
            print_json(&object)?;
        }
        Commands::Account { name } => {
            let account = Account::new(&name, Some(&instance)).await?;
            print_json(account.raw())?;
        }
        Commands::Committee { name } => {
            let member = Committee::new(&name, Some(&instance)).await?;
            println!("{} ({})", member.id(), member.account().name());
            print_json(member.raw())?;
        }
        Commands::Transfer {
            from,
            to,
            amount,
            propose,
            broadcast,
        } => {
            let from = Account::new(&from, Some(&instance)).await?;
            let to = Account::new(&to, Some(&instance)).await?;
            let amount = Amount::parse(&amount, &instance).await?;
            let op = Transfer::new(from.id(), to.id(), amount.to_asset_amount());

            let mut tx = instance.new_tx();
            match propose {
                Some(proposer) => {
                    let handle = instance.new_proposal(&mut tx, &proposer, None, None)?;
                    tx.proposal_mut(handle)?.append_op(op);
                }
                None => {
                    tx.append_op(op)?;
                }
            }

            let result = if broadcast {
                tx.broadcast().await?
            } else {
                tx.json().await?
            };
            print_json(&result)?;
        }
        Commands::SignMessage { account, message } => {
            let signed = Message::new(&message, Some(&instance))?.sign(&account).await?;
            println!("{}", signed);
        }
        Commands::VerifyMessage { path } => {
            let text = std::fs::read_to_string(path)?;
            let signed = Message::new(&text, Some(&instance))?.verify().await?;
            println!("Signed by {} at block {}", signed.meta().account, signed.meta().block);
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
