//! Cached alert record format
//!
//! A record is a JSON object holding the envelope fields and the payload
//! under `p`, tagged by the same type discriminator as catch-up records.
//! `v` is the format version. Readers ignore fields they don't know and
//! default fields that are missing, so older and newer records both load.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Alert, AlertId, AlertPayload, Handle};

/// Format version written by this build
pub const ALERT_FORMAT_VERSION: u8 = 1;

#[derive(Serialize)]
struct StoredAlertRef<'a> {
    v: u8,
    id: AlertId,
    ts: i64,
    u: Handle,
    m: &'a str,
    relevant: bool,
    seen: bool,
    p: &'a AlertPayload,
}

const fn default_relevant() -> bool {
    true
}

#[derive(Deserialize)]
struct StoredAlert {
    v: u8,
    id: AlertId,
    #[serde(default)]
    ts: i64,
    #[serde(default)]
    u: Handle,
    #[serde(default)]
    m: String,
    #[serde(default = "default_relevant")]
    relevant: bool,
    #[serde(default)]
    seen: bool,
    p: AlertPayload,
}

/// Encode an alert for the durable cache
pub fn serialize_alert(alert: &Alert) -> Result<Vec<u8>> {
    let stored = StoredAlertRef {
        v: ALERT_FORMAT_VERSION,
        id: alert.id,
        ts: alert.timestamp,
        u: alert.user,
        m: &alert.email,
        relevant: alert.relevant,
        seen: alert.seen,
        p: alert.payload(),
    };
    Ok(serde_json::to_vec(&stored)?)
}

/// Rebuild an alert from a cached record.
///
/// Unknown payload types and truncated or malformed records fail; the caller
/// drops the record and keeps loading.
pub fn unserialize_alert(bytes: &[u8], record_id: u32) -> Result<Alert> {
    let stored: StoredAlert = serde_json::from_slice(bytes).map_err(|error| Error::Decode {
        record_id,
        reason: error.to_string(),
    })?;

    if stored.v == 0 {
        return Err(Error::Decode {
            record_id,
            reason: "missing format version".to_string(),
        });
    }
    if !stored.id.is_assigned() {
        return Err(Error::Decode {
            record_id,
            reason: "alert id is zero".to_string(),
        });
    }

    let mut alert = Alert::new(stored.p, stored.u, stored.m, stored.ts);
    alert.id = stored.id;
    alert.relevant = stored.relevant;
    alert.seen = stored.seen;
    alert.record_id = Some(record_id);
    // cached alerts were already announced in an earlier session
    alert.delivered = true;
    Ok(alert)
}
