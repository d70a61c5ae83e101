//! Alert construction from raw records

use crate::models::{
    Alert, AlertKind, AlertPayload, ContactChange, DeletedShare, Handle, IncomingPendingContact,
    NewShare, NewSharedNodes, NodeKind, Payment, PaymentReminder, PendingContactUpdate,
    SharedNodeHandles, Takedown,
};
use crate::record::AlertRecord;

/// Build the alert a raw record describes, `None` for unknown types.
///
/// The envelope time is absolute `ts` when present, otherwise `now - td`.
/// Payment reminders use `ts` for the expiry instead.
pub(crate) fn alert_from_record(record: &impl AlertRecord, now: i64) -> Option<Alert> {
    let kind = AlertKind::from_tag(record.type_tag())?;
    let payload = payload_from_record(kind, record);

    let timestamp = if kind != AlertKind::PaymentReminder && record.has("ts") {
        record.int64("ts", now)
    } else {
        now.saturating_sub(record.int64("td", 0))
    };
    let user = record.handle("u", Handle::UNDEF);
    let email = record.string("m", "");

    Some(Alert::new(payload, user, email, timestamp))
}

fn payload_from_record(kind: AlertKind, record: &impl AlertRecord) -> AlertPayload {
    match kind {
        AlertKind::IncomingPendingContact => {
            AlertPayload::IncomingPendingContact(IncomingPendingContact {
                pcr_handle: record.handle("p", Handle::UNDEF),
                request_deleted: record.int64("dts", 0) != 0,
                request_reminded: record.int64("rts", 0) != 0,
            })
        }
        AlertKind::ContactChange => AlertPayload::ContactChange(ContactChange {
            action: record.int("c", 0),
        }),
        AlertKind::UpdatedPendingContactIncoming => {
            AlertPayload::UpdatedPendingContactIncoming(PendingContactUpdate {
                action: record.int("s", 0),
            })
        }
        AlertKind::UpdatedPendingContactOutgoing => {
            AlertPayload::UpdatedPendingContactOutgoing(PendingContactUpdate {
                action: record.int("s", 0),
            })
        }
        AlertKind::NewShare => AlertPayload::NewShare(NewShare {
            folder_handle: record.handle("n", Handle::UNDEF),
        }),
        AlertKind::DeletedShare => AlertPayload::DeletedShare(DeletedShare {
            folder_handle: record.handle("n", Handle::UNDEF),
            folder_path: record.string("fp", ""),
            folder_name: record.string("fn", ""),
            owner_handle: record.handle("o", Handle::UNDEF),
        }),
        AlertKind::NewSharedNodes => {
            let mut nodes = NewSharedNodes {
                parent_handle: record.handle("n", Handle::UNDEF),
                file_handles: Vec::new(),
                folder_handles: Vec::new(),
            };
            for entry in record.handle_types("f").unwrap_or_default() {
                match entry.kind {
                    NodeKind::File => nodes.file_handles.push(entry.handle),
                    NodeKind::Folder => nodes.folder_handles.push(entry.handle),
                    NodeKind::Other => {}
                }
            }
            AlertPayload::NewSharedNodes(nodes)
        }
        AlertKind::RemovedSharedNode => AlertPayload::RemovedSharedNode(node_handles(record)),
        AlertKind::UpdatedSharedNode => AlertPayload::UpdatedSharedNode(node_handles(record)),
        AlertKind::Payment => AlertPayload::Payment(Payment {
            success: record.string("r", "") == "s",
            plan_number: record.int("p", 0),
        }),
        AlertKind::PaymentReminder => AlertPayload::PaymentReminder(PaymentReminder {
            expiry_time: record.int64("ts", 0),
        }),
        AlertKind::Takedown => {
            let down = record.int("down", -1);
            AlertPayload::Takedown(Takedown {
                is_takedown: down == 1,
                is_reinstate: down == 0,
                node_handle: record.handle("h", Handle::UNDEF),
            })
        }
    }
}

fn node_handles(record: &impl AlertRecord) -> SharedNodeHandles {
    SharedNodeHandles {
        node_handles: record
            .handle_types("f")
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.handle)
            .collect(),
    }
}
