//! Alert envelope

use std::fmt;

use serde::{Deserialize, Serialize};

use super::handle::Handle;
use super::payload::{AlertKind, AlertPayload};

/// Monotonic alert identifier. Ids start at 1; gaps appear after merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(u32);

impl AlertId {
    /// Placeholder carried by alerts that have not reached the store yet
    pub const UNASSIGNED: Self = Self(0);

    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write-back state of an alert, consumed by the next purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistFlags {
    /// Add or replace the cached record
    pub put: bool,
    /// Delete the cached record; wins over `put`
    pub remove: bool,
}

impl PersistFlags {
    pub const fn is_pending(self) -> bool {
        self.put || self.remove
    }
}

/// A user-visible notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Identifier assigned by the store
    pub id: AlertId,
    /// Event time (Unix seconds)
    pub timestamp: i64,
    /// Originating user
    pub user: Handle,
    /// Originating user's email, empty until resolved
    pub email: String,
    /// False when superseded or not worth showing
    pub relevant: bool,
    /// Acknowledged by the user
    pub seen: bool,
    /// Correlation tag of the live batch that produced it, 0 otherwise
    pub tag: i32,
    payload: AlertPayload,
    pub(crate) persist: PersistFlags,
    pub(crate) record_id: Option<u32>,
    pub(crate) delivered: bool,
}

impl Alert {
    /// Create an unstored alert
    #[must_use]
    pub fn new(payload: AlertPayload, user: Handle, email: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: AlertId::UNASSIGNED,
            timestamp,
            user,
            email: email.into(),
            relevant: true,
            seen: false,
            tag: 0,
            payload,
            persist: PersistFlags::default(),
            record_id: None,
            delivered: false,
        }
    }

    /// Attach the correlation tag of the originating batch
    #[must_use]
    pub const fn with_tag(mut self, tag: i32) -> Self {
        self.tag = tag;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> AlertKind {
        self.payload.kind()
    }

    #[must_use]
    pub const fn payload(&self) -> &AlertPayload {
        &self.payload
    }

    /// Mutable payload access; the variant itself cannot be swapped
    pub(crate) fn payload_mut(&mut self) -> &mut AlertPayload {
        &mut self.payload
    }

    #[must_use]
    pub const fn persist_flags(&self) -> PersistFlags {
        self.persist
    }

    /// Durable row id, once written
    #[must_use]
    pub const fn record_id(&self) -> Option<u32> {
        self.record_id
    }

    pub(crate) fn set_persist_put(&mut self) {
        self.persist.put = true;
    }

    pub(crate) fn set_persist_remove(&mut self) {
        self.persist.remove = true;
    }

    /// Whether this alert survives provisional evaluation.
    ///
    /// Contact changes only look at the alert's own user; every other kind
    /// is also dropped when the event that produced it came from us.
    #[must_use]
    pub fn check_provisional(&self, originating_user: Handle, own_user: Handle) -> bool {
        let own_alert = !own_user.is_undef() && self.user == own_user;
        match self.payload {
            AlertPayload::ContactChange(_) => !own_alert,
            _ => {
                let own_event = !own_user.is_undef() && originating_user == own_user;
                !own_alert && !own_event
            }
        }
    }
}
