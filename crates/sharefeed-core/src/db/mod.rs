//! Durable storage layer for the alert cache

mod cache;
mod codec;
mod connection;
mod migrations;

pub use cache::{AlertCache, SqliteAlertCache};
pub use codec::{serialize_alert, unserialize_alert, ALERT_FORMAT_VERSION};
pub use connection::Database;
