//! Control gateway
//!
//! TLS front door for the control plane: one port, two protocols.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                 CONTROL GATEWAY                  │
//!                     │                                                  │
//!   TLS client ───────┼─▶ net::listener ──▶ http::multiplex ──┬─▶ rpc    │
//!                     │   (idle timeout)    (HTTP/2 + grpc?)  └─▶ admin  │
//!                     │          ▲                                       │
//!                     │          │ per-handshake lookup                  │
//!                     │   tls::MaterialStore ◀── tls::manager ◀── vault  │
//!                     │                          (refresh, renew)        │
//!                     │                                                  │
//!                     │   jobs (worker + periodic)   health (:24401)     │
//!                     │   lifecycle (startup order, shared shutdown)     │
//!                     └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use control_gateway::config::loader;
use control_gateway::lifecycle::signals::spawn_signal_handler;
use control_gateway::lifecycle::{launch, Collaborators, Shutdown, StartupError};
use control_gateway::observability::logging::{self, LogOptions};
use control_gateway::observability::metrics;

#[derive(Parser, Debug)]
#[command(name = "control-gateway", version, about = "TLS front door for the control plane")]
struct Cli {
    /// Optional TOML file with tuning overrides; deployment values come from the environment.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(LogOptions::from_lookup(|key| std::env::var(key).ok())) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Control gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "control-gateway starting");

    let config = loader::load(cli.config.as_deref(), |key| std::env::var(key).ok())?;
    tracing::info!(
        domain = %config.deployment.domain,
        listen = %config.listener.bind_address(),
        tls_manager = config.deployment.use_tls_manager,
        cloud = config.deployment.use_cloud,
        "Configuration loaded"
    );

    let metrics = match metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder unavailable");
            None
        }
    };

    let shutdown = Shutdown::new();
    let _signals = spawn_signal_handler(shutdown.clone());

    let collaborators = Collaborators {
        metrics,
        ..Collaborators::default()
    };
    launch(config, collaborators, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
