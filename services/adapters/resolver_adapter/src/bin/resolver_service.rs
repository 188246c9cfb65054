//! Resolver Service
//!
//! Command-line front end for the resolver adapter. Loads configuration,
//! starts the eviction sweeper and resolves the identifiers given on the
//! command line concurrently, printing one JSON line per identifier.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use resolver_adapter::{ResolverAdapter, ResolverConfig, Resolution};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "resolver_service")]
#[command(about = "Resolve transaction signatures and token metadata")]
struct Args {
    /// Optional TOML configuration file (RESOLVER_* variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve transaction signatures via getTransaction
    Transaction {
        /// Signatures to resolve
        #[arg(required = true)]
        signatures: Vec<String>,
    },

    /// Resolve token metadata by address
    Metadata {
        /// Token addresses to resolve
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Print the configured admission limits
    Status,
}

fn report<T: Serialize>(key: &str, resolution: Resolution<T>) -> serde_json::Value {
    match resolution {
        Resolution::Resolved(record) => json!({ "key": key, "status": "resolved", "record": record }),
        Resolution::Unavailable => json!({ "key": key, "status": "unavailable" }),
        Resolution::Rejected(reason) => {
            json!({ "key": key, "status": "rejected", "reason": reason.to_string() })
        }
    }
}

/// Limits the loaded configuration admits under; in-flight counts only exist
/// inside a running process
fn capacity_report(config: &ResolverConfig) -> serde_json::Value {
    json!({
        "maxConcurrent": config.max_concurrent_processing,
        "processingTtlMs": config.processing_ttl_ms,
        "retryMaxAttempts": config.retry_max_attempts,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("resolver_adapter=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 Starting Resolver Service");

    let config = ResolverConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    info!("🔗 RPC: {}", config.rpc_url);
    info!("🏷️  Metadata API: {}", config.metadata_api_url);

    let adapter = ResolverAdapter::new(config).context("Failed to create resolver adapter")?;
    let sweeper = adapter.spawn_sweeper();
    let adapter = &adapter;

    let results = match args.command {
        Command::Transaction { signatures } => {
            join_all(signatures.iter().map(|signature| async move {
                report(signature, adapter.resolve_transaction(signature).await)
            }))
            .await
        }
        Command::Metadata { addresses } => {
            join_all(addresses.iter().map(|address| async move {
                report(address, adapter.resolve_metadata(address).await)
            }))
            .await
        }
        Command::Status => vec![capacity_report(adapter.config())],
    };

    for result in results {
        println!("{}", result);
    }

    info!("📊 Metrics: {:?}", adapter.metrics());
    sweeper.abort();
    Ok(())
}
