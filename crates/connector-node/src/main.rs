//! Connector node — entry point.
//!
//! Starts a connector with configuration from a TOML file or defaults. Every
//! configured ledger is served by an in-memory ledger on a shared local bus.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use connector_ledgers::{InMemoryLedger, LedgerBus};
use tracing_subscriber::EnvFilter;

use connector_node::{Connector, ConnectorConfig, LedgerConfig, LoggingConfig};

/// Ledger connector node
#[derive(Parser, Debug)]
#[command(name = "connector-node", version, about = "Ledger connector node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "connector.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Disable route broadcasting.
    #[arg(long)]
    no_broadcast: bool,

    /// Generate a sample config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn in_memory_ledger(bus: &Arc<LedgerBus>, ledger: &LedgerConfig) -> InMemoryLedger {
    InMemoryLedger::new(Arc::clone(bus), &ledger.prefix, &ledger.account, &ledger.currency)
        .with_scale(ledger.currency_scale)
        .with_balance(ledger.balance)
        .with_connectors(ledger.connectors.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle --init flag
    if args.init {
        let config = ConnectorConfig::sample();
        config.save(&args.config)?;
        println!("wrote sample config to {}", args.config.display());
        return Ok(());
    }

    // Load configuration and apply CLI overrides
    let mut config = ConnectorConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.no_broadcast {
        config.routing.broadcast_enabled = false;
    }

    init_tracing(&config.logging);
    tracing::info!("Ledger connector v{}", env!("CARGO_PKG_VERSION"));

    let bus = LedgerBus::new();
    let ledgers = config.ledgers.clone();
    let mut connector = Connector::new(config)?;
    for ledger in &ledgers {
        connector
            .add_ledger(&ledger.prefix, Arc::new(in_memory_ledger(&bus, ledger)))
            .await?;
    }
    connector.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    connector.shutdown().await?;
    tracing::info!("connector exited cleanly");
    Ok(())
}
