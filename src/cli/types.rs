//! `aegisctl` command definitions.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "aegisctl")]
#[command(about = "Control client for the Aegis Orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the aegisd control plane.
    #[arg(long, env = "AEGISCTL_URL", default_value = "http://127.0.0.1:8080", global = true)]
    pub url: String,

    /// Output raw JSON instead of formatted tables.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a mission brief (from a JSON file, or `-` for stdin)
    Submit {
        /// Path to a JSON mission brief, or `-` for stdin
        brief_path: String,

        /// Estimate duration without scheduling any tasks
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a single mission's full state
    Status {
        mission_id: Uuid,
    },

    /// List all known missions
    List,

    /// Cancel an in-flight mission
    Cancel {
        mission_id: Uuid,

        /// Human-readable cancellation reason
        #[arg(long)]
        reason: Option<String>,
    },

    /// Stream a mission's events as they happen
    Watch {
        mission_id: Uuid,
    },

    /// Show worker slot occupancy
    Swarm,

    /// Check aegisd's health
    Health,
}
