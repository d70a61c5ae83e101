//! sharefeed CLI - inspect and maintain a cached user alert feed
//!
//! Feeds a catch-up snapshot into the alert engine and works on the cache it
//! leaves behind.

mod cli;
mod commands;
mod error;


use std::env;
use std::path::PathBuf;

use clap::Parser;
use sharefeed_core::config::load_alerts_config;
use sharefeed_core::{AlertsConfig, Handle};

use crate::cli::{Cli, Commands};
use crate::commands::ack::run_ack;
use crate::commands::common::EngineSettings;
use crate::commands::ingest::run_ingest;
use crate::commands::list::run_list;
use crate::commands::trim::run_trim;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sharefeed=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let settings = EngineSettings {
        config: resolve_config(cli.config)?,
        own_user: resolve_own_user(cli.own_user)?,
    };

    match cli.command {
        Commands::Ingest { file } => run_ingest(&file, &settings, &db_path)?,
        Commands::List {
            limit,
            unseen,
            json,
        } => run_list(limit, unseen, json, &settings, &db_path)?,
        Commands::Ack => run_ack(&settings, &db_path)?,
        Commands::Trim => run_trim(&settings, &db_path)?,
    }

    Ok(())
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SHAREFEED_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sharefeed")
        .join("alerts.db")
}

fn resolve_config(cli_config: Option<PathBuf>) -> Result<AlertsConfig, CliError> {
    let path = cli_config
        .or_else(|| env::var_os("SHAREFEED_CONFIG").map(PathBuf::from))
        .or_else(|| dirs::config_dir().map(|dir| dir.join("sharefeed").join("config.json")));

    match path {
        Some(path) => Ok(load_alerts_config(path)?),
        None => Ok(AlertsConfig::default()),
    }
}

fn resolve_own_user(cli_own_user: Option<String>) -> Result<Handle, CliError> {
    let Some(text) = cli_own_user.or_else(|| env::var("SHAREFEED_OWN_USER").ok()) else {
        return Ok(Handle::UNDEF);
    };
    parse_own_user(&text)
}

fn parse_own_user(text: &str) -> Result<Handle, CliError> {
    text.trim()
        .parse()
        .map_err(|_| CliError::InvalidOwnUser(text.to_string()))
}
