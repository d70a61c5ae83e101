use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sharefeed_core::db::{AlertCache, Database};
use sharefeed_core::models::{AlertPayload, Handle};
use sharefeed_core::{Alert, AlertsConfig, UserAlerts};

use crate::error::CliError;

/// Engine inputs resolved from flags and environment
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub config: AlertsConfig,
    pub own_user: Handle,
}

#[derive(Debug, Serialize)]
pub struct AlertListItem {
    pub id: u32,
    pub kind: &'static str,
    pub user: String,
    pub email: String,
    pub timestamp: i64,
    pub timestamp_iso: String,
    pub relative_time: String,
    pub seen: bool,
    pub relevant: bool,
    pub summary: String,
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    Ok(Database::open(path)?)
}

/// Build an engine from whatever the cache holds
pub fn load_alerts(
    cache: &impl AlertCache,
    settings: &EngineSettings,
) -> Result<UserAlerts, CliError> {
    let mut alerts = UserAlerts::new(settings.config.clone(), settings.own_user);
    let loaded = alerts.load_from_cache(cache)?;
    tracing::debug!("Loaded {loaded} cached alert(s)");
    Ok(alerts)
}

/// Newest first, optionally unseen only
pub fn select_alerts(alerts: &UserAlerts, limit: usize, unseen_only: bool) -> Vec<&Alert> {
    let mut selected = alerts
        .alerts()
        .filter(|alert| !unseen_only || !alert.seen)
        .collect::<Vec<_>>();
    selected.reverse();
    selected.truncate(limit);
    selected
}

pub fn format_alert_lines(alerts: &[&Alert]) -> Vec<String> {
    let now = Utc::now().timestamp();
    alerts
        .iter()
        .map(|alert| {
            let marker = if alert.seen { ' ' } else { '*' };
            let kind = alert.kind().tag();
            let relative_time = format_relative_time(alert.timestamp, now);
            let summary = describe_alert(alert);
            format!(
                "{marker} {:>5}  {kind:<6}  {relative_time:<10}  {summary}",
                alert.id.get()
            )
        })
        .collect()
}

pub fn alert_to_list_item(alert: &Alert) -> AlertListItem {
    let now = Utc::now().timestamp();
    AlertListItem {
        id: alert.id.get(),
        kind: alert.kind().tag(),
        user: alert.user.to_string(),
        email: alert.email.clone(),
        timestamp: alert.timestamp,
        timestamp_iso: format_timestamp(alert.timestamp),
        relative_time: format_relative_time(alert.timestamp, now),
        seen: alert.seen,
        relevant: alert.relevant,
        summary: describe_alert(alert),
    }
}

/// One-line human description of an alert
pub fn describe_alert(alert: &Alert) -> String {
    let who = if alert.email.is_empty() {
        alert.user.to_string()
    } else {
        alert.email.clone()
    };

    match alert.payload() {
        AlertPayload::IncomingPendingContact(request) => {
            if request.request_deleted {
                format!("{who} cancelled their contact request")
            } else if request.request_reminded {
                format!("Reminder: {who} sent you a contact request")
            } else {
                format!("{who} sent you a contact request")
            }
        }
        AlertPayload::ContactChange(change) => match change.action {
            0 => format!("{who} was removed from your contacts"),
            1 => format!("{who} accepted your contact request"),
            2 => format!("{who} removed you as a contact"),
            3 => format!("{who} blocked you"),
            _ => format!("Contact {who} changed"),
        },
        AlertPayload::UpdatedPendingContactIncoming(update) => match update.action {
            1 => format!("You ignored the contact request from {who}"),
            2 => format!("You accepted the contact request from {who}"),
            3 => format!("You denied the contact request from {who}"),
            _ => format!("Contact request from {who} updated"),
        },
        AlertPayload::UpdatedPendingContactOutgoing(update) => match update.action {
            2 => format!("{who} accepted your contact request"),
            3 => format!("{who} denied your contact request"),
            _ => format!("Your contact request to {who} was updated"),
        },
        AlertPayload::NewShare(share) => {
            format!("{who} shared folder {}", share.folder_handle)
        }
        AlertPayload::DeletedShare(share) => {
            if share.folder_name.is_empty() {
                format!("Access to folder {} was removed", share.folder_handle)
            } else {
                format!("Access to folder \"{}\" was removed", share.folder_name)
            }
        }
        AlertPayload::NewSharedNodes(nodes) => {
            format!(
                "{who} added {} file(s) and {} folder(s) to {}",
                nodes.file_handles.len(),
                nodes.folder_handles.len(),
                nodes.parent_handle
            )
        }
        AlertPayload::RemovedSharedNode(nodes) => {
            format!("{who} removed {} item(s)", nodes.node_handles.len())
        }
        AlertPayload::UpdatedSharedNode(nodes) => {
            format!("{who} updated {} item(s)", nodes.node_handles.len())
        }
        AlertPayload::Payment(payment) => {
            if payment.success {
                format!("Payment for plan {} succeeded", payment.plan_number)
            } else {
                format!("Payment for plan {} failed", payment.plan_number)
            }
        }
        AlertPayload::PaymentReminder(reminder) => {
            if reminder.expiry_time == 0 {
                "Your subscription is about to expire".to_string()
            } else {
                format!(
                    "Your subscription expires {}",
                    format_timestamp(reminder.expiry_time)
                )
            }
        }
        AlertPayload::Takedown(takedown) => {
            if takedown.is_reinstate {
                format!("Node {} was reinstated", takedown.node_handle)
            } else {
                format!("Node {} was taken down", takedown.node_handle)
            }
        }
    }
}

pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    let diff = now.saturating_sub(timestamp);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map_or_else(|| timestamp.to_string(), |moment| moment.to_rfc3339())
}
