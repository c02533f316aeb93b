//! Stats proxy CLI
//!
//! A command-line tool for viewing per-instance stats, datacenter totals
//! and health of a running stats proxy.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, reports};

/// Cloud Foundry app stats CLI
#[derive(Parser)]
#[command(name = "cfstats")]
#[command(author, version, about = "CLI for the Cloud Foundry app stats proxy", long_about = None)]
pub struct Cli {
    /// Stats proxy URL (can also be set via CFSTATS_PROXY_URL env var)
    #[arg(long, env = "CFSTATS_PROXY_URL", default_value = "http://localhost:3000")]
    pub proxy_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show per-instance stats of the proxied app
    Instances {
        /// Only show instances in this state (e.g. RUNNING, CRASHED)
        #[arg(long)]
        state: Option<String>,
    },

    /// Show datacenter-level usage totals
    Aggregate,

    /// Show proxy health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.proxy_url)?;

    match cli.command {
        Commands::Instances { state } => {
            reports::show_instances(&client, state.as_deref(), cli.format).await?;
        }
        Commands::Aggregate => {
            reports::show_aggregate(&client, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
