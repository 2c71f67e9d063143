//! Beacon node binary.
//!
//! # Usage
//!
//! ```bash
//! # Rotate identifiers until Ctrl-C
//! beacon-node --db beacon.redb run
//!
//! # Regenerate the disclosure window after a positive test
//! beacon-node --db beacon.redb report
//!
//! # Print the identifiers of the current window
//! beacon-node --db beacon.redb identifiers
//! ```

use std::{io::Write, path::PathBuf, time::Duration};

use beacon_core::ChainConfig;
use beacon_crypto::MemoryKeyStore;
use beacon_node::{BeaconError, BeaconManager, RedbStore, SystemEnv};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Beacon rotating-identifier node
#[derive(Parser, Debug)]
#[command(name = "beacon-node")]
#[command(about = "Rotating-identifier chain for proximity tracing")]
#[command(version)]
struct Args {
    /// Minutes between identifier rotations
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u32).range(1..))]
    rotation_minutes: u32,

    /// Days of identifiers published after a report
    #[arg(long, default_value = "14", value_parser = clap::value_parser!(u32).range(1..))]
    window_days: u32,

    /// Path to the chain database
    #[arg(long, default_value = "beacon.redb")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap if needed and rotate until interrupted
    Run,
    /// Wipe the chain and regenerate the disclosure window
    Report,
    /// Print the identifiers of the current disclosure window
    Identifiers,
}

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Both fields are `u32`, so neither product can overflow.
fn chain_config(args: &Args) -> ChainConfig {
    ChainConfig {
        rotation_period: Duration::from_secs(u64::from(args.rotation_minutes) * 60),
        disclosure_window: DAY * args.window_days,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = chain_config(&args);

    tracing::info!("Opening chain database {}", args.db.display());
    let store = RedbStore::open(&args.db)?;

    // Keys live only as long as the process; bootstrap rebuilds the head from
    // the record store when the previous key is gone.
    let key_store = MemoryKeyStore::without_symmetric_support();
    let mut manager = BeaconManager::new(config, SystemEnv::new(), store.clone(), store, key_store)?;

    match manager.bootstrap() {
        Ok(bootstrap) => tracing::info!(?bootstrap, "Chain ready"),
        // A new report is the only way out of an interrupted one
        Err(e @ BeaconError::InterruptedReport { .. })
            if matches!(args.command, Command::Report) =>
        {
            tracing::warn!(error = %e, "Resuming interrupted report");
        },
        Err(e) => return Err(e.into()),
    }

    match args.command {
        Command::Run => {
            manager.start_rotation().require_changed("start")?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("Interrupted, stopping rotation");
            manager.shutdown().await;
        },
        Command::Report => {
            let chain = manager.trigger_report().await?;
            manager.shutdown().await;

            let mut out = std::io::stdout().lock();
            writeln!(
                out,
                "regenerated {} records, window start {}, head {}",
                chain.records, chain.window_start, chain.head_timestamp
            )?;
        },
        Command::Identifiers => {
            let mut out = std::io::stdout().lock();
            for identifier in manager.disclosure_identifiers()? {
                writeln!(out, "{identifier}")?;
            }
        },
    }

    Ok(())
}
