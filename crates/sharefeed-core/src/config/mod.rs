//! Alert engine configuration.
//!
//! `AlertsConfig` carries the retention bound, the merge window for adjacent
//! node alerts, and the per-category `AlertFlags` gating which live events may
//! produce alerts at all.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_MAX_ALERTS: usize = 200;
const DEFAULT_MERGE_WINDOW_SECS: i64 = 300;

/// Per-category switches for alert creation. All enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertFlags {
    /// Master switch for share and shared-node alerts
    pub cloud_enabled: bool,
    /// Master switch for contact alerts
    pub contacts_enabled: bool,
    /// New files/folders in incoming shares
    pub cloud_newfiles: bool,
    /// New incoming shares
    pub cloud_newshare: bool,
    /// Removed incoming shares
    pub cloud_delshare: bool,
    /// Incoming contact requests
    pub contacts_fcrin: bool,
    /// Deleted contacts
    pub contacts_fcrdel: bool,
    /// Accepted contact requests
    pub contacts_fcracpt: bool,
}

impl Default for AlertFlags {
    fn default() -> Self {
        Self {
            cloud_enabled: true,
            contacts_enabled: true,
            cloud_newfiles: true,
            cloud_newshare: true,
            cloud_delshare: true,
            contacts_fcrin: true,
            contacts_fcrdel: true,
            contacts_fcracpt: true,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsConfig {
    /// Retention bound applied by trimming
    pub max_alerts: usize,
    /// Adjacent node alerts from one user closer than this are merged
    pub merge_window_secs: i64,
    pub flags: AlertFlags,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            max_alerts: DEFAULT_MAX_ALERTS,
            merge_window_secs: DEFAULT_MERGE_WINDOW_SECS,
            flags: AlertFlags::default(),
        }
    }
}

impl AlertsConfig {
    fn validate(self) -> Result<Self> {
        if self.max_alerts == 0 {
            return Err(Error::InvalidInput(
                "config field 'max_alerts' must be greater than zero".to_string(),
            ));
        }
        if self.merge_window_secs < 0 {
            return Err(Error::InvalidInput(
                "config field 'merge_window_secs' must not be negative".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Parse and validate a JSON configuration payload.
///
/// Missing fields take their defaults; unknown fields are rejected.
pub fn parse_alerts_config(payload: &str) -> Result<AlertsConfig> {
    let config: AlertsConfig = serde_json::from_str(payload)?;
    config.validate()
}

/// Read a configuration file, falling back to defaults when it does not exist
pub fn load_alerts_config(path: impl AsRef<Path>) -> Result<AlertsConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("No alerts config at {}, using defaults", path.display());
        return Ok(AlertsConfig::default());
    }
    let payload = std::fs::read_to_string(path)?;
    parse_alerts_config(&payload)
}
