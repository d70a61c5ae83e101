use std::path::Path;

use sharefeed_core::db::SqliteAlertCache;

use crate::commands::common::{
    alert_to_list_item, format_alert_lines, load_alerts, open_database, select_alerts,
    AlertListItem, EngineSettings,
};
use crate::error::CliError;

pub fn run_list(
    limit: usize,
    unseen_only: bool,
    as_json: bool,
    settings: &EngineSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let cache = SqliteAlertCache::new(db.connection());
    let alerts = load_alerts(&cache, settings)?;
    let selected = select_alerts(&alerts, limit, unseen_only);

    if as_json {
        let json_items = selected
            .iter()
            .map(|alert| alert_to_list_item(alert))
            .collect::<Vec<AlertListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if selected.is_empty() {
        println!("No alerts.");
        return Ok(());
    }

    for line in format_alert_lines(&selected) {
        println!("{line}");
    }
    Ok(())
}
