//! multiserver
//!
//! Runs the profiling, metrics and API listeners described by a TOML
//! configuration file until SIGINT or SIGTERM.
//!
//! ```text
//!                 ┌────────────────────── MultiServer ──────────────────────┐
//!                 │                                                          │
//!   config.toml ──┼─▶ factory ──▶ pprof   (/debug/pprof/*)                   │
//!   + env vars    │           ──▶ metrics (/metrics)                         │
//!                 │           ──▶ api     (/healthz, /status)                │
//!                 │           ──▶ grpc    (library callers only)             │
//!                 │                                                          │
//!   SIGTERM ──────┼─▶ stop: drain each listener, bounded by shutdown_timeout │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use multiserver::config::{load_settings, LoggerConfig, Settings};
use multiserver::lifecycle::{signals, Service};
use multiserver::observability::{health, logging};
use multiserver::server::{MultiServer, ServerParams};

#[derive(Parser)]
#[command(name = "multiserver")]
#[command(about = "Run the process servers described by a configuration file", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefix for environment overrides (PREFIX_API_ADDRESS, ...)
    #[arg(long, default_value = "MULTISERVER")]
    env_prefix: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => match load_settings(path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Settings::new(),
    };
    let settings = settings.with_env_prefix(cli.env_prefix);

    let logger = match LoggerConfig::from_source(&settings) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("invalid logger configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(&logger) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "multiserver starting");

    let servers = match MultiServer::new(
        &settings,
        ServerParams {
            api_handler: Some(health::router()),
            ..Default::default()
        },
    ) {
        Ok(servers) => servers,
        Err(err) => {
            tracing::error!(error = %err, "Invalid server configuration");
            return ExitCode::FAILURE;
        }
    };

    if servers.is_empty() {
        tracing::warn!("No servers configured, nothing to run");
        return ExitCode::SUCCESS;
    }

    if let Err(err) = servers.start().await {
        tracing::error!(error = %err, "Failed to start servers");
        return ExitCode::FAILURE;
    }

    if let Err(err) = signals::wait_for_termination().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signals");
    }

    servers.stop().await;

    let failures = servers.failures();
    for failure in &failures {
        tracing::error!(server = %failure.service(), error = %failure, "Server reported a failure");
    }

    tracing::info!("Shutdown complete");
    if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
