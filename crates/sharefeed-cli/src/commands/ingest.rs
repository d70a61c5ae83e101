use std::path::Path;

use sharefeed_core::db::{AlertCache, SqliteAlertCache};
use sharefeed_core::record::CatchupSnapshot;
use sharefeed_core::UserAlerts;

use crate::commands::common::{open_database, EngineSettings};
use crate::error::CliError;

pub fn run_ingest(file: &Path, settings: &EngineSettings, db_path: &Path) -> Result<(), CliError> {
    let payload = std::fs::read_to_string(file)?;
    let snapshot = CatchupSnapshot::from_json(&payload)?;

    let db = open_database(db_path)?;
    let cache = SqliteAlertCache::new(db.connection());
    // a snapshot supersedes whatever an earlier session cached
    cache.clear()?;

    let mut alerts = UserAlerts::new(settings.config.clone(), settings.own_user);
    let ingested = alerts.ingest_catchup(&snapshot);
    alerts.init_sc_alerts();
    let trimmed = alerts.trim_alerts_to_max_count();
    alerts.purge_sc_alerts(&cache)?;

    println!(
        "Ingested {ingested} alert(s), kept {}",
        ingested.saturating_sub(trimmed.len())
    );
    Ok(())
}
