//! CLI module for Flow Manager
//!
//! Provides commands:
//! - `serve`: Run the HTTP ingress and pipeline (default)
//! - `check`: Resolve configuration and print every data source endpoint

use crate::server::config::AppConfig;
use clap::{Parser, Subcommand};

pub mod check;

/// Flow Manager orchestration node
#[derive(Parser, Debug)]
#[command(name = "flowmanager")]
#[command(about = "Event-driven orchestration node for the login pipeline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the server (default)
    Serve {
        /// Listen port, overriding `server.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build all data sources and print their endpoints
    Check,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Check) => check::run(&config),
        Some(Commands::Serve { port }) => crate::server::run(config, port).await,
        None => crate::server::run(config, None).await,
    }
}
