//! steam-server-runner — entry point.
//!
//! Parses configuration, resolves the game install, wires the managed
//! server facade and workflow engine, then blocks the main thread until a
//! termination signal requests a graceful shutdown.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use steam_server_runner::api_client::ServerApiClient;
use steam_server_runner::config::AppConfig;
use steam_server_runner::engine::Engine;
use steam_server_runner::install_resolver::InstallResolver;
use steam_server_runner::logging;
use steam_server_runner::managed_server::{ManagedServer, StopMode};
use steam_server_runner::process::ManagedProcess;
use steam_server_runner::system_metrics::SystemMetrics;
use steam_server_runner::version::VersionProbe;
use steam_server_runner::workflow::JobId;

fn main() {
    let config = match AppConfig::parse() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    logging::init(config.verbose);

    if let Err(e) = run(config) {
        error!(error = format!("{e:#}"), "fatal error");
        std::process::exit(1);
    }
}

fn run(config: AppConfig) -> Result<()> {
    info!(app_id = config.app_id, is_production = config.is_production, "starting up");

    let resolver = InstallResolver::new(config.app_id, config.install_source.clone());
    let executable = resolver.executable().context("failed to resolve game executable")?;
    let game_dir = resolver.game_dir().context("failed to resolve game directory")?;

    let mut command = vec![executable.display().to_string()];
    command.extend(config.game_args.clone());

    let metrics = Arc::new(SystemMetrics::new());
    let process = ManagedProcess::new(command, Some(game_dir), metrics);
    let version = VersionProbe::new(config.app_id);
    let api = ServerApiClient::new(config.api_base_url.clone(), config.auth.clone());
    let server = Arc::new(ManagedServer::new(process, version, api));

    let engine = Arc::new(Engine::new(Arc::clone(&server)));
    engine.start();
    engine.enqueue_job(JobId::UpdateStart);

    let (tx, rx) = mpsc::sync_channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("failed to install signal handler")?;

    // Block until SIGTERM/SIGINT; shutdown is handled here rather than in
    // the signal handler itself, which must stay async-signal-safe.
    let _ = rx.recv();
    info!("termination signal received; shutting down");

    server.stop(StopMode::Force, Duration::from_secs(30));
    engine.stop();

    info!("shutdown complete");
    Ok(())
}
