use std::path::Path;

use sharefeed_core::db::SqliteAlertCache;

use crate::commands::common::{load_alerts, open_database, EngineSettings};
use crate::error::CliError;

pub fn run_trim(settings: &EngineSettings, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let cache = SqliteAlertCache::new(db.connection());
    let mut alerts = load_alerts(&cache, settings)?;

    let evicted = alerts.trim_alerts_to_max_count();
    alerts.purge_sc_alerts(&cache)?;
    println!(
        "Trimmed {} alert(s), {} remaining",
        evicted.len(),
        alerts.alerts().count()
    );
    Ok(())
}
