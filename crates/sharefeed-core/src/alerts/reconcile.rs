//! Handle-level lookups and edits over unseen node alerts

use std::collections::BTreeSet;

use super::store::AlertStore;
use crate::models::{AlertId, AlertKind, AlertPayload, Handle};

fn unseen_with(store: &AlertStore, handle: Handle, kind: AlertKind) -> Vec<AlertId> {
    store
        .iter()
        .filter(|alert| !alert.seen && alert.kind() == kind)
        .filter(|alert| alert.payload().references_node(handle))
        .map(|alert| alert.id)
        .collect()
}

/// Whether an unseen alert of `kind` lists `handle`
pub(crate) fn unseen_contains(store: &AlertStore, handle: Handle, kind: AlertKind) -> bool {
    store.iter().any(|alert| {
        !alert.seen && alert.kind() == kind && alert.payload().references_node(handle)
    })
}

/// Strip `handle` from every unseen alert of `kind` listing it.
///
/// Alerts left without handles are erased; the rest are rewritten and
/// re-queued. Returns whether any alert listed the handle.
pub(crate) fn erase_from_unseen(
    store: &mut AlertStore,
    handle: Handle,
    kind: AlertKind,
    notify: bool,
) -> bool {
    let ids = unseen_with(store, handle, kind);
    let mut emptied = BTreeSet::new();

    for id in &ids {
        let Some(alert) = store.get_mut(*id) else {
            continue;
        };
        match alert.payload_mut() {
            AlertPayload::NewSharedNodes(nodes) => {
                nodes.erase(handle);
            }
            AlertPayload::RemovedSharedNode(nodes) | AlertPayload::UpdatedSharedNode(nodes) => {
                nodes.erase(handle);
            }
            _ => continue,
        }
        if alert.payload().is_empty_node_list() {
            emptied.insert(*id);
        } else {
            store.touch(*id, notify);
        }
    }

    if !emptied.is_empty() {
        tracing::debug!("Erasing {} alert(s) emptied by {handle}", emptied.len());
        store.erase(&emptied);
    }
    !ids.is_empty()
}

/// Drop the handles of an incoming node alert that contradict or repeat
/// unseen alerts.
///
/// An addition cancels a pending removal of the same handle and the other
/// way round; neither side survives. Handles already reported the same way
/// are skipped.
pub(crate) fn reconcile_incoming(store: &mut AlertStore, payload: &mut AlertPayload, notify: bool) {
    match payload {
        AlertPayload::NewSharedNodes(nodes) => {
            nodes
                .file_handles
                .retain(|handle| keep_added(store, *handle, notify));
            nodes
                .folder_handles
                .retain(|handle| keep_added(store, *handle, notify));
        }
        AlertPayload::RemovedSharedNode(nodes) => {
            nodes
                .node_handles
                .retain(|handle| keep_removed(store, *handle, notify));
        }
        AlertPayload::UpdatedSharedNode(nodes) => {
            nodes.node_handles.retain(|handle| {
                !unseen_contains(store, *handle, AlertKind::UpdatedSharedNode)
                    && !unseen_contains(store, *handle, AlertKind::NewSharedNodes)
            });
        }
        _ => {}
    }
}

fn keep_added(store: &mut AlertStore, handle: Handle, notify: bool) -> bool {
    if erase_from_unseen(store, handle, AlertKind::RemovedSharedNode, notify) {
        tracing::debug!("Addition of {handle} cancels its pending removal");
        return false;
    }
    !unseen_contains(store, handle, AlertKind::NewSharedNodes)
}

fn keep_removed(store: &mut AlertStore, handle: Handle, notify: bool) -> bool {
    if erase_from_unseen(store, handle, AlertKind::NewSharedNodes, notify) {
        tracing::debug!("Removal of {handle} cancels its unseen addition");
        return false;
    }
    !unseen_contains(store, handle, AlertKind::RemovedSharedNode)
}

/// Whether any alert, seen or not, already records the removal of `handle`
pub(crate) fn records_removal(store: &AlertStore, handle: Handle) -> bool {
    store.iter().any(|alert| {
        alert.kind() == AlertKind::RemovedSharedNode && alert.payload().references_node(handle)
    })
}
