//! sharefeed-core - Core library for sharefeed
//!
//! This crate turns the one-time catch-up snapshot and the live stream of
//! share/contact/account events into a single deduplicated, persisted feed of
//! user alerts. The engine lives in [`alerts`]; [`db`] holds the durable cache.

pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod record;
pub mod util;

pub use alerts::UserAlerts;
pub use config::{AlertFlags, AlertsConfig};
pub use error::{Error, Result};
pub use models::{Alert, AlertId, AlertKind, AlertPayload, Handle};
