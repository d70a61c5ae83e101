pub mod ack;
pub mod common;
pub mod ingest;
pub mod list;
pub mod trim;
