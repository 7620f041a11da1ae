use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use staking_drop_client::{ConfigOption, DropChain, DropError};
use tokio::sync::oneshot;
use tracing_subscriber::filter::LevelFilter;

mod logging;

#[derive(Parser, Debug)]
#[command(name = "staking-dropd")]
#[command(about = "Pays a one-time reward drop to new liquidity bonders", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON or YAML configuration file
    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Log verbosity: crit, error, warn, info, debug, trace (or 0-5)
    #[arg(long, default_value = "info", value_parser = logging::parse_verbosity)]
    verbosity: LevelFilter,

    /// Directory for log.json and log_errors.json
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
}

#[cfg(unix)]
async fn terminate() -> std::io::Result<()> {
    let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    signal.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> std::io::Result<()> {
    std::future::pending().await
}

/// Block until an interrupt, a terminate signal, or a fatal listener error.
async fn wait_for_shutdown(fatal: oneshot::Receiver<DropError>) -> Result<()> {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            tracing::info!("Interrupt received, shutting down");
            Ok(())
        }
        res = terminate() => {
            res.context("failed to listen for SIGTERM")?;
            tracing::info!("Terminate received, shutting down");
            Ok(())
        }
        res = fatal => match res {
            Ok(err) => {
                tracing::error!(error = %err, category = %err.category(), "Listener failed, shutting down");
                Err(err.into())
            }
            Err(_) => Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbosity, &cli.log_dir)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %cli.config.display(), "staking-dropd starting");

    let option = ConfigOption::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    tracing::info!(
        endpoint = %option.endpoint,
        account = %option.account,
        denoms = ?option.drop_infos.denoms().collect::<Vec<_>>(),
        "Config loaded"
    );

    let mut chain = DropChain::connect(&option).await?;
    chain.initialize().await?;
    let fatal = chain.start().await?;

    let outcome = wait_for_shutdown(fatal).await;

    chain.stop();
    chain.join().await?;
    tracing::info!("staking-dropd stopped");
    outcome
}
