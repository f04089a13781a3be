//! # Arcana Server
//!
//! Entry point for the Arcana job queue runtime: `run` starts the scheduler,
//! reaper, worker pool, and admin HTTP surface; `admin` runs a single
//! administrative operation directly against the store; `version` prints
//! build metadata.

use arcana_jobs::JobsConfig;
use arcana_server::cli::{Cli, Command};
use arcana_server::{admin_cli, app::AppBuilder, startup};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { role } => {
            startup::print_banner();
            match load_config(cli.config.as_deref()) {
                Ok(config) => AppBuilder::new(role).with_config(config).run().await,
                Err(e) => Err(e),
            }
        }
        Command::Version => {
            print_version();
            Ok(())
        }
        Command::Admin { command } => match load_config(cli.config.as_deref()) {
            Ok(config) => admin_cli::execute(config, command).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> arcana_core::ArcanaResult<JobsConfig> {
    JobsConfig::load(path).map_err(|e| arcana_core::ArcanaError::Configuration(e.to_string()))
}

fn print_version() {
    println!("arcana-server {}", env!("CARGO_PKG_VERSION"));
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,arcana=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("arcana-server {}", env!("CARGO_PKG_VERSION"));
}
