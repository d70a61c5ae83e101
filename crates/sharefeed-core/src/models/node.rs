//! Node descriptions consulted while noting shared-node events

use serde::{Deserialize, Serialize};

use super::handle::Handle;
use super::payload::AlertKind;

/// Node type as reported by the node graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Folder,
    /// Roots, rubbish bin and anything else that never produces alerts
    Other,
}

impl NodeKind {
    /// Map the numeric node type of a raw record (0 file, 1 folder)
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::File,
            1 => Self::Folder,
            _ => Self::Other,
        }
    }
}

/// What happened to a noted node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeEventKind {
    Added,
    Removed,
    Updated,
}

impl NodeEventKind {
    /// Alert kind this event converts into
    #[must_use]
    pub const fn alert_kind(self) -> AlertKind {
        match self {
            Self::Added => AlertKind::NewSharedNodes,
            Self::Removed => AlertKind::RemovedSharedNode,
            Self::Updated => AlertKind::UpdatedSharedNode,
        }
    }
}

/// Snapshot of a node taken from the client's node graph.
///
/// `share_root` is the top of the incoming share containing the node, or
/// `None` when the node is not inside an incoming share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedNode {
    pub handle: Handle,
    pub kind: NodeKind,
    pub share_root: Option<Handle>,
}

impl SharedNode {
    #[must_use]
    pub const fn file(handle: Handle, share_root: Handle) -> Self {
        Self {
            handle,
            kind: NodeKind::File,
            share_root: Some(share_root),
        }
    }

    #[must_use]
    pub const fn folder(handle: Handle, share_root: Handle) -> Self {
        Self {
            handle,
            kind: NodeKind::Folder,
            share_root: Some(share_root),
        }
    }
}
