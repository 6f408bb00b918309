//! scalegridd — the scalegrid daemon.
//!
//! Loads `scalegrid.toml`, starts one reconcile loop per workload against
//! the in-memory simulated platform, and serves the status API.
//!
//! # Usage
//!
//! ```text
//! scalegridd run --config scalegrid.toml [--log-json]
//! scalegridd check --config scalegrid.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scalegrid_core::ControllerConfig;
use scalegrid_reconciler::{SimulatedPlatform, Supervisor};

const DEFAULT_FILTER: &str = "info,scalegridd=debug,scalegrid=debug";

#[derive(Parser)]
#[command(name = "scalegridd", about = "scalegrid autoscaling controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller until Ctrl-C.
    Run {
        /// Path to the controller configuration.
        #[arg(long, default_value = "scalegrid.toml")]
        config: PathBuf,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
    /// Validate a configuration file and print a summary.
    Check {
        #[arg(long, default_value = "scalegrid.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, log_json } => {
            init_tracing(log_json);
            run(&config).await
        }
        Command::Check { config } => {
            init_tracing(false);
            check(&config)
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load(path: &Path) -> anyhow::Result<ControllerConfig> {
    ControllerConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    let settings = &config.controller;

    println!("config ok: {}", path.display());
    println!(
        "  cycle {:?}, command timeout {:?}, stabilization window {:?}",
        settings.cycle, settings.command_timeout, settings.stabilization_window
    );
    match settings.listen {
        Some(addr) => println!("  api listening on {addr}"),
        None => println!("  api disabled"),
    }
    for w in &config.workloads {
        let target = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        println!(
            "  {}: replicas {}..={}, cpu {}, memory {}, min available {}",
            w.id,
            w.bounds.min(),
            w.bounds.max(),
            target(w.targets.cpu),
            target(w.targets.memory),
            w.budget.min_available,
        );
    }
    Ok(())
}

async fn run(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    info!(
        config = %path.display(),
        workloads = config.workloads.len(),
        "scalegrid controller starting"
    );

    // ── Platform ───────────────────────────────────────────────

    let platform = Arc::new(SimulatedPlatform::new());
    for w in &config.workloads {
        match &w.simulation {
            Some(sim) => platform.add_from_spec(&w.id, sim).await,
            None => {
                warn!(workload = %w.id, "no simulation profile; starting idle at min replicas");
                platform.add_workload(&w.id, w.bounds.min()).await;
            }
        }
    }

    // ── Reconcile loops ────────────────────────────────────────

    let supervisor = Arc::new(Supervisor::new(platform, config.controller.clone()));
    for w in config.workloads {
        supervisor.spawn(w).await?;
    }

    // ── API server ─────────────────────────────────────────────

    match config.controller.listen {
        Some(addr) => {
            let router = scalegrid_api::build_router(supervisor.clone());
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%addr, "API server starting");

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        None => {
            info!("API disabled; running until Ctrl-C");
            shutdown_signal().await;
        }
    }

    // Loops finish their current cycle before exiting.
    supervisor.shutdown_all().await;

    info!("scalegrid controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
