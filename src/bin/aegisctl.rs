//! `aegisctl`: command-line client for the Aegis Orchestrator control plane.

use anyhow::Result;
use clap::Parser;

use aegis_orchestrator::cli::commands::{mission, swarm};
use aegis_orchestrator::cli::{AegisClient, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = AegisClient::new(cli.url);

    match cli.command {
        Commands::Submit { brief_path, dry_run } => mission::handle_submit(&client, &brief_path, dry_run, cli.json).await,
        Commands::Status { mission_id } => mission::handle_status(&client, mission_id, cli.json).await,
        Commands::List => mission::handle_list(&client, cli.json).await,
        Commands::Cancel { mission_id, reason } => mission::handle_cancel(&client, mission_id, reason, cli.json).await,
        Commands::Watch { mission_id } => mission::handle_watch(&client, mission_id).await,
        Commands::Swarm => swarm::handle_swarm(&client, cli.json).await,
        Commands::Health => swarm::handle_health(&client, cli.json).await,
    }
}
