//! roverlink agent
//!
//! Runs once at boot: resolves the control-plane address, compares the cached
//! event id against the current one, and reconfigures the overlay tunnel if
//! they differ. The surrounding service supervisor guarantees single-instance
//! execution and any boot-level retry.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roverlink_client::{ControlPlaneClient, EndpointResolver};
use roverlink_core::{
    Orchestrator, PlaybookProvisioner, RunOutcome, StateStore, StatusCommandProbe,
};
use roverlink_exec::LocalRunner;

mod config;

use crate::config::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let strategy = cli.strategy()?;
    let robot_name = cli.robot_identity()?;
    info!(robot_name = %robot_name, "roverlink agent starting");

    let credentials = cli.credentials();
    if credentials.is_none() {
        warn!("no basic-auth credentials configured - control-plane calls may fail");
    }

    if cli.startup_delay > 0 {
        info!(seconds = cli.startup_delay, "waiting before starting (startup delay)");
        tokio::time::sleep(Duration::from_secs(cli.startup_delay)).await;
    }

    let runner = Arc::new(LocalRunner::new());
    let resolver = Arc::new(EndpointResolver::new(
        strategy,
        robot_name.clone(),
        credentials.clone(),
        cli.resolve_retries,
        Duration::from_secs(cli.resolve_retry_delay),
    )?);
    let control = Arc::new(ControlPlaneClient::new(
        robot_name,
        credentials,
        Duration::from_secs(cli.token_retry_delay),
    )?);
    let probe = Arc::new(StatusCommandProbe::new(runner.clone(), cli.probe_config()));
    let provisioner = Arc::new(PlaybookProvisioner::new(runner, cli.provisioner_config()));
    let state = StateStore::new(&cli.state_file);

    let orchestrator = Orchestrator::new(
        resolver,
        control,
        probe,
        provisioner,
        state,
        &cli.token_file,
        Duration::from_secs(cli.settle_delay),
    );

    match orchestrator.run_once().await {
        RunOutcome::Completed => {
            info!("roverlink agent completed successfully");
            Ok(())
        }
        RunOutcome::Skipped => {
            warn!("roverlink agent completed with warnings");
            std::process::exit(1);
        }
    }
}
