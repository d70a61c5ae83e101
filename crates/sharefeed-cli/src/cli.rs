use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sharefeed")]
#[command(about = "Inspect and maintain a cached user alert feed")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the alert cache database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Handle of the logged-in account
    #[arg(long, global = true, value_name = "HANDLE")]
    pub own_user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replace the cached feed with a catch-up snapshot
    Ingest {
        /// Snapshot file (JSON)
        file: PathBuf,
    },
    /// List cached alerts, newest first
    List {
        /// Number of alerts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only alerts not yet seen
        #[arg(long)]
        unseen: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark every alert as seen
    #[command(alias = "acknowledge")]
    Ack,
    /// Evict seen alerts beyond the configured maximum
    Trim,
}
