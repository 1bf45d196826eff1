//! Request Gate
//!
//! An authorization gate built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server (request ID, trace, timeout)
//!                          │
//!                          ▼
//!                     gate middleware ──── buffer body, client IP
//!                          │
//!                          ▼
//!     ┌──────────────────────────────────────────────────────────┐
//!     │ pipeline                                                 │
//!     │  classify → origin → policy lookup → authorize → rate    │
//!     │                                        │                 │
//!     │                        token (JWKS) / signature / email  │
//!     └──────────────────────────────────────────────────────────┘
//!                          │
//!             denied ◀─────┴─────▶ admitted: handler
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use request_gate::config::load_config;
use request_gate::lifecycle::{build_pipeline, signals, Shutdown, StartupError};
use request_gate::observability::{logging, metrics};
use request_gate::GateServer;

#[derive(Parser)]
#[command(name = "request-gate")]
#[command(about = "Authorization gate for HTTP applications", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/gate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("request-gate: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("request-gate: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: request_gate::GateConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pipeline = build_pipeline(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|e| StartupError::BindAddress(config.listener.bind_address.clone(), e))?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    GateServer::new(&config, pipeline).run(listener, shutdown).await?;
    Ok(())
}
