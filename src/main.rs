//! Command-line client for the content registry.
//!
//! ```text
//! content-registry --config registry.toml register draft.json --wait
//! content-registry --config registry.toml get 12
//! content-registry --config registry.toml list 0xf39F...2266
//! content-registry --config registry.toml watch 0xabc...
//! ```
//!
//! The signing key is read from `CONTENT_REGISTRY_PRIVATE_KEY`.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use clap::{Parser, Subcommand};
use serde_json::json;

use content_registry::blockchain::{
    BlockchainResult, ConfirmationState, RpcTransport, WatchHandle, Wallet,
};
use content_registry::config::{load_config, RegistryConfig};
use content_registry::observability::{logging, metrics};
use content_registry::registry::{ContentDraft, ContentRegistry};

#[derive(Parser)]
#[command(name = "content-registry")]
#[command(about = "Register and read AI-generated content on chain", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a content draft (JSON file)
    Register {
        draft: PathBuf,
        /// Wait for the transaction to be confirmed
        #[arg(long)]
        wait: bool,
    },
    /// Fetch one record by id
    Get { id: U256 },
    /// List every record of an owner
    List { owner: Address },
    /// Wait for a previously submitted transaction
    Watch { tx_hash: TxHash },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("content-registry v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let transport = Arc::new(RpcTransport::new(config.chain.clone()).await?);
    let wallet = Wallet::from_env()?;
    let registry = ContentRegistry::new(&config, transport, wallet)?;

    match cli.command {
        Commands::Register { draft, wait } => {
            let draft: ContentDraft = serde_json::from_str(&std::fs::read_to_string(draft)?)?;
            let registration = registry.register(&draft).await?;

            if wait {
                let state = wait_with_ctrl_c(registration.watch).await?;
                print_json(&json!({ "tx_hash": registration.tx_hash, "confirmation": state }))?;
            } else {
                print_json(&json!({ "tx_hash": registration.tx_hash }))?;
            }
        }
        Commands::Get { id } => match registry.get(id).await? {
            Some(record) => print_json(&record)?,
            None => {
                eprintln!("Content {} not found", id);
                std::process::exit(1);
            }
        },
        Commands::List { owner } => {
            let content = registry.list_by_owner(owner).await?;
            for failure in &content.failures {
                eprintln!("Failed to fetch content {}: {}", failure.id, failure.error);
            }
            print_json(&content.records)?;
        }
        Commands::Watch { tx_hash } => {
            let state = wait_with_ctrl_c(registry.watch(tx_hash)).await?;
            print_json(&json!({ "tx_hash": tx_hash, "confirmation": state }))?;
        }
    }

    Ok(())
}

/// Await a watcher, cancelling it on Ctrl-C.
async fn wait_with_ctrl_c(handle: WatchHandle) -> BlockchainResult<ConfirmationState> {
    let cancel = handle.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling confirmation watch");
            cancel.cancel();
        }
    });

    let state = handle.wait().await;
    ctrl_c.abort();
    state
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
