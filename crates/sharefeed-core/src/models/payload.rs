//! Alert payload variants

use serde::{Deserialize, Serialize};

use super::handle::Handle;
use crate::util::push_unique;

/// Discriminator of an alert payload.
///
/// The tag strings are shared by catch-up records and cached records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertKind {
    IncomingPendingContact,
    ContactChange,
    UpdatedPendingContactIncoming,
    UpdatedPendingContactOutgoing,
    NewShare,
    DeletedShare,
    NewSharedNodes,
    RemovedSharedNode,
    UpdatedSharedNode,
    Payment,
    PaymentReminder,
    Takedown,
}

impl AlertKind {
    /// Every kind, in tag-table order
    pub const ALL: [Self; 12] = [
        Self::IncomingPendingContact,
        Self::ContactChange,
        Self::UpdatedPendingContactIncoming,
        Self::UpdatedPendingContactOutgoing,
        Self::NewShare,
        Self::DeletedShare,
        Self::NewSharedNodes,
        Self::RemovedSharedNode,
        Self::UpdatedSharedNode,
        Self::Payment,
        Self::PaymentReminder,
        Self::Takedown,
    ];

    /// Short type tag
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::IncomingPendingContact => "ipc",
            Self::ContactChange => "c",
            Self::UpdatedPendingContactIncoming => "upci",
            Self::UpdatedPendingContactOutgoing => "upco",
            Self::NewShare => "share",
            Self::DeletedShare => "dshare",
            Self::NewSharedNodes => "put",
            Self::RemovedSharedNode => "d",
            Self::UpdatedSharedNode => "u",
            Self::Payment => "psts",
            Self::PaymentReminder => "pses",
            Self::Takedown => "ph",
        }
    }

    /// Look up a kind by its type tag
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// A contact invited us
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingPendingContact {
    #[serde(default)]
    pub pcr_handle: Handle,
    #[serde(default)]
    pub request_deleted: bool,
    #[serde(default)]
    pub request_reminded: bool,
}

/// A contact relationship changed.
///
/// `action`: 0 deleted, 1 added/accepted, 2 deleted by them, 3 blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactChange {
    #[serde(default)]
    pub action: i32,
}

/// A pending contact request changed state.
///
/// `action`: 1 ignored, 2 accepted, 3 denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingContactUpdate {
    #[serde(default)]
    pub action: i32,
}

/// A folder was shared with us
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShare {
    #[serde(default)]
    pub folder_handle: Handle,
}

/// A share we had access to went away
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedShare {
    #[serde(default)]
    pub folder_handle: Handle,
    #[serde(default)]
    pub folder_path: String,
    #[serde(default)]
    pub folder_name: String,
    #[serde(default)]
    pub owner_handle: Handle,
}

/// Files and folders added under one shared parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSharedNodes {
    #[serde(default)]
    pub parent_handle: Handle,
    #[serde(default)]
    pub file_handles: Vec<Handle>,
    #[serde(default)]
    pub folder_handles: Vec<Handle>,
}

impl NewSharedNodes {
    pub fn contains(&self, handle: Handle) -> bool {
        self.file_handles.contains(&handle) || self.folder_handles.contains(&handle)
    }

    /// Drop `handle` from whichever list holds it
    pub fn erase(&mut self, handle: Handle) -> bool {
        let before = self.file_handles.len() + self.folder_handles.len();
        self.file_handles.retain(|h| *h != handle);
        self.folder_handles.retain(|h| *h != handle);
        before != self.file_handles.len() + self.folder_handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_handles.is_empty() && self.folder_handles.is_empty()
    }

    /// Fold another batch in, skipping handles already listed
    pub fn absorb(&mut self, other: &Self) {
        for handle in &other.file_handles {
            push_unique(&mut self.file_handles, *handle);
        }
        for handle in &other.folder_handles {
            push_unique(&mut self.folder_handles, *handle);
        }
    }
}

/// Node handles touched by a removal or an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedNodeHandles {
    #[serde(default)]
    pub node_handles: Vec<Handle>,
}

impl SharedNodeHandles {
    pub fn contains(&self, handle: Handle) -> bool {
        self.node_handles.contains(&handle)
    }

    pub fn erase(&mut self, handle: Handle) -> bool {
        let before = self.node_handles.len();
        self.node_handles.retain(|h| *h != handle);
        before != self.node_handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_handles.is_empty()
    }

    pub fn absorb(&mut self, other: &Self) {
        for handle in &other.node_handles {
            push_unique(&mut self.node_handles, *handle);
        }
    }
}

/// Result of a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub plan_number: i32,
}

/// Subscription about to expire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReminder {
    /// Unix seconds; 0 when unknown
    #[serde(default)]
    pub expiry_time: i64,
}

/// A node was taken down or reinstated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Takedown {
    #[serde(default)]
    pub is_takedown: bool,
    #[serde(default)]
    pub is_reinstate: bool,
    #[serde(default)]
    pub node_handle: Handle,
}

/// Kind-specific alert data. Exactly one per alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum AlertPayload {
    #[serde(rename = "ipc")]
    IncomingPendingContact(IncomingPendingContact),
    #[serde(rename = "c")]
    ContactChange(ContactChange),
    #[serde(rename = "upci")]
    UpdatedPendingContactIncoming(PendingContactUpdate),
    #[serde(rename = "upco")]
    UpdatedPendingContactOutgoing(PendingContactUpdate),
    #[serde(rename = "share")]
    NewShare(NewShare),
    #[serde(rename = "dshare")]
    DeletedShare(DeletedShare),
    #[serde(rename = "put")]
    NewSharedNodes(NewSharedNodes),
    #[serde(rename = "d")]
    RemovedSharedNode(SharedNodeHandles),
    #[serde(rename = "u")]
    UpdatedSharedNode(SharedNodeHandles),
    #[serde(rename = "psts")]
    Payment(Payment),
    #[serde(rename = "pses")]
    PaymentReminder(PaymentReminder),
    #[serde(rename = "ph")]
    Takedown(Takedown),
}

impl AlertPayload {
    #[must_use]
    pub const fn kind(&self) -> AlertKind {
        match self {
            Self::IncomingPendingContact(_) => AlertKind::IncomingPendingContact,
            Self::ContactChange(_) => AlertKind::ContactChange,
            Self::UpdatedPendingContactIncoming(_) => AlertKind::UpdatedPendingContactIncoming,
            Self::UpdatedPendingContactOutgoing(_) => AlertKind::UpdatedPendingContactOutgoing,
            Self::NewShare(_) => AlertKind::NewShare,
            Self::DeletedShare(_) => AlertKind::DeletedShare,
            Self::NewSharedNodes(_) => AlertKind::NewSharedNodes,
            Self::RemovedSharedNode(_) => AlertKind::RemovedSharedNode,
            Self::UpdatedSharedNode(_) => AlertKind::UpdatedSharedNode,
            Self::Payment(_) => AlertKind::Payment,
            Self::PaymentReminder(_) => AlertKind::PaymentReminder,
            Self::Takedown(_) => AlertKind::Takedown,
        }
    }

    /// Action code used by the policy filter, 0 for kinds without one
    #[must_use]
    pub const fn action(&self) -> i32 {
        match self {
            Self::ContactChange(change) => change.action,
            Self::UpdatedPendingContactIncoming(update)
            | Self::UpdatedPendingContactOutgoing(update) => update.action,
            _ => 0,
        }
    }

    /// Whether `handle` is listed by a node-level payload
    #[must_use]
    pub fn references_node(&self, handle: Handle) -> bool {
        match self {
            Self::NewSharedNodes(nodes) => nodes.contains(handle),
            Self::RemovedSharedNode(nodes) | Self::UpdatedSharedNode(nodes) => {
                nodes.contains(handle)
            }
            _ => false,
        }
    }

    /// Whether a node-level payload has run out of handles
    #[must_use]
    pub fn is_empty_node_list(&self) -> bool {
        match self {
            Self::NewSharedNodes(nodes) => nodes.is_empty(),
            Self::RemovedSharedNode(nodes) | Self::UpdatedSharedNode(nodes) => nodes.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in AlertKind::ALL {
            assert_eq!(AlertKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(AlertKind::from_tag("bogus"), None);
    }

    #[test]
    fn test_payload_serde_uses_type_tag() {
        let payload = AlertPayload::RemovedSharedNode(SharedNodeHandles {
            node_handles: vec![Handle::new(5)],
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["t"], "d");
        assert_eq!(payload.kind(), AlertKind::RemovedSharedNode);
    }

    #[test]
    fn test_new_shared_nodes_erase_and_absorb() {
        let mut nodes = NewSharedNodes {
            parent_handle: Handle::new(7),
            file_handles: vec![Handle::new(1), Handle::new(2)],
            folder_handles: vec![Handle::new(3)],
        };
        assert!(nodes.erase(Handle::new(3)));
        assert!(!nodes.erase(Handle::new(3)));
        assert!(!nodes.is_empty());

        nodes.absorb(&NewSharedNodes {
            parent_handle: Handle::new(7),
            file_handles: vec![Handle::new(2), Handle::new(4)],
            folder_handles: vec![],
        });
        assert_eq!(
            nodes.file_handles,
            vec![Handle::new(1), Handle::new(2), Handle::new(4)]
        );
    }

    #[test]
    fn test_action_only_for_contact_kinds() {
        let change = AlertPayload::ContactChange(ContactChange { action: 2 });
        assert_eq!(change.action(), 2);
        let share = AlertPayload::NewShare(NewShare {
            folder_handle: Handle::new(1),
        });
        assert_eq!(share.action(), 0);
    }
}
