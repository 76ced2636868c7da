//! greenlined — the blue/green promotion daemon.
//!
//! Single binary that assembles the deployment control plane:
//! - State store (redb)
//! - Topology build plan
//! - Blue/green exposures (listener + target group pair per service)
//! - Health probe loops
//! - Promotion controllers
//! - REST API
//!
//! # Usage
//!
//! ```text
//! greenlined run --config greenline.toml --port 8090 --data-dir /var/lib/greenline
//! ```

mod bootstrap;
mod launcher;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use greenline_api::ApiState;
use greenline_core::Config;
use greenline_promote::{ControllerApi, PromoteConfig};
use greenline_state::StateStore;

#[derive(Parser)]
#[command(name = "greenlined", about = "greenline promotion daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control plane.
    Run {
        /// Path to the topology configuration.
        #[arg(long, default_value = "greenline.toml")]
        config: PathBuf,

        /// Port the API listens on.
        #[arg(long, default_value = "8090")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/greenline")]
        data_dir: PathBuf,

        /// Health probe interval in seconds.
        #[arg(long, default_value = "5")]
        probe_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,greenlined=debug,greenline=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
            probe_interval,
        } => run(config, port, data_dir, probe_interval).await,
    }
}

async fn run(
    config_path: PathBuf,
    port: u16,
    data_dir: PathBuf,
    probe_interval: u64,
) -> anyhow::Result<()> {
    info!("greenline daemon starting");

    let config = Config::from_file(&config_path)?;
    info!(path = ?config_path, services = config.services.len(), "configuration loaded");

    let plan = greenline_topology::plan(&config)?;
    let order: Vec<&str> = plan.ordered()?.iter().map(|n| n.name.as_str()).collect();
    info!(topology = ?plan.topology, ?order, "build plan derived");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("greenline.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    bootstrap::seed_state(&store, &config)?;

    let promote = PromoteConfig {
        verify_timeout: config.verify_timeout(),
        poll_interval: config.poll_interval(),
        invalid_state_retries: config.promotion.invalid_state_retries,
        retry_backoff: config.retry_backoff(),
    };
    let runtimes = bootstrap::build_runtimes(&config, &plan, &store, &promote).await?;
    info!(exposed = runtimes.len(), "service runtimes assembled");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    let mut handles = Vec::new();
    let mut controllers: HashMap<String, Arc<dyn ControllerApi>> = HashMap::new();
    for (name, runtime) in runtimes {
        // Probe both groups; the standby side is what verification
        // watches during an attempt.
        for group in [runtime.exposure.active(), runtime.exposure.standby()] {
            handles.push(tokio::spawn(greenline_health::run_probe_loop(
                group,
                Duration::from_secs(probe_interval),
                Duration::from_secs(2),
                3,
                shutdown_rx.clone(),
            )));
        }
        handles.push(tokio::spawn(
            runtime.controller.clone().run(shutdown_rx.clone()),
        ));
        controllers.insert(name, runtime.controller as Arc<dyn ControllerApi>);
    }

    // ── API server ─────────────────────────────────────────────

    let router = greenline_api::build_router(ApiState {
        store,
        controllers: Arc::new(controllers),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    for handle in handles {
        let _ = handle.await;
    }

    info!("greenline daemon stopped");
    Ok(())
}
