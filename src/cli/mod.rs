//! `aegisctl` CLI: clap command definitions, the HTTP client, and display
//! helpers, consumed by the `aegisctl` binary.

pub mod client;
pub mod commands;
pub mod display;
pub mod types;

pub use client::AegisClient;
pub use types::{Cli, Commands};
