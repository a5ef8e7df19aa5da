//! Conflux - data source connectors and API supervisor
//!
//! Without a subcommand the binary supervises the requested APIs, each one
//! running as its own process. Subcommands talk to configured data sources.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use conflux::cli::{self, Command};
use conflux::supervisor::{parse_api_list, Supervisor};
use conflux::{config, EXIT_CONFIG, EXIT_FAILURE};
use conflux_common::{logging, Config};

#[derive(Parser)]
#[command(name = "conflux")]
#[command(author, version, about = "Conflux - data source connectors and API supervisor", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Comma-separated APIs to start
    #[arg(long, default_value = "http,mysql", env = "CONFLUX_API")]
    api: String,

    /// Configuration file path, passed on to every API process
    #[arg(long, default_value = "/etc/conflux/config.json", env = "CONFLUX_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Err(e) = logging::init(&config.log) {
        eprintln!("Warning: {}", e);
    }

    let outcome = match cli.command {
        Some(command) => cli::execute(command, &config).await,
        None => supervise(&cli.api, &cli.config, config).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn supervise(api: &str, config_path: &Path, config: Config) -> Result<u8> {
    let supervisor = match Supervisor::new(parse_api_list(api), config_path, config.supervisor) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!("{}", e);
            return Ok(e.exit_code());
        }
    };

    info!(
        "Starting APIs {:?} with config {}",
        supervisor.apis(),
        config_path.display()
    );

    let token = supervisor.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });

    match supervisor.run().await {
        Ok(report) => Ok(report.exit_code()),
        Err(e) => {
            error!("{}", e);
            Ok(e.exit_code())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received terminate signal, shutting down..."),
    }
}
