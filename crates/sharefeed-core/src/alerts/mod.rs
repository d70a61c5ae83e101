//! User alert engine
//!
//! [`UserAlerts`] owns the alert store and everything that feeds it: the
//! catch-up snapshot, live events filtered by [`AlertFlags`], the provisional
//! window that drops self-caused alerts, and the noting batches that collapse
//! node-level events into one alert per share or per user. Contradictory
//! node alerts are reconciled before they reach the store.

mod ingest;
mod noted;
mod provisional;
mod reconcile;
mod store;

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use noted::{BucketKey, BucketRole, Live, NotedShareBucket, NotedShareMap, Stash};
pub use store::{AlertStore, PurgeSummary};

use provisional::ProvisionalBuffer;

use crate::config::{AlertFlags, AlertsConfig};
use crate::db::{self, AlertCache};
use crate::error::Result;
use crate::models::{
    Alert, AlertId, AlertKind, AlertPayload, Handle, NewSharedNodes, NodeEventKind, NodeKind,
    SharedNode, SharedNodeHandles,
};
use crate::record::{AlertRecord, CatchupSnapshot};
use crate::util::{normalize_text_option, push_unique, unix_timestamp_now};

#[derive(Debug, Clone, Copy, Default)]
struct CatchupState {
    done: bool,
    /// Newest alert time seen before catch-up completed
    last_timestamp: i64,
}

/// Removed and updated handles collected for one user
#[derive(Debug, Default)]
struct UserNodeChanges {
    timestamp: i64,
    removed: Vec<Handle>,
    updated: Vec<Handle>,
}

/// The alert feed of one logged-in account
#[derive(Debug)]
pub struct UserAlerts {
    config: AlertsConfig,
    own_user: Handle,
    store: AlertStore,
    catchup: CatchupState,
    provisional: ProvisionalBuffer,
    noting: bool,
    ignore_nodes_under: Option<Handle>,
    noted: NotedShareMap<Live>,
    /// Removals held back by the open batch; kept only if the batch converts
    batch_stash: NotedShareMap<Stash>,
    stash: NotedShareMap<Stash>,
    user_emails: HashMap<Handle, String>,
    acknowledge_requested: bool,
}

impl UserAlerts {
    pub fn new(config: AlertsConfig, own_user: Handle) -> Self {
        Self {
            config,
            own_user,
            store: AlertStore::new(),
            catchup: CatchupState::default(),
            provisional: ProvisionalBuffer::default(),
            noting: false,
            ignore_nodes_under: None,
            noted: NotedShareMap::new(),
            batch_stash: NotedShareMap::new(),
            stash: NotedShareMap::new(),
            user_emails: HashMap::new(),
            acknowledge_requested: false,
        }
    }

    pub const fn own_user(&self) -> Handle {
        self.own_user
    }

    pub fn set_own_user(&mut self, own_user: Handle) {
        self.own_user = own_user;
    }

    pub const fn config(&self) -> &AlertsConfig {
        &self.config
    }

    pub const fn flags(&self) -> AlertFlags {
        self.config.flags
    }

    pub fn set_flags(&mut self, flags: AlertFlags) {
        self.config.flags = flags;
    }

    // Catch-up

    /// Start a fresh catch-up, forgetting any earlier completion
    pub fn begin_catchup(&mut self) {
        self.catchup = CatchupState::default();
    }

    pub const fn is_catchup_done(&self) -> bool {
        self.catchup.done
    }

    /// Newest alert time recorded while the catch-up was running
    pub const fn catchup_last_timestamp(&self) -> i64 {
        self.catchup.last_timestamp
    }

    /// Ingest the catch-up snapshot and mark the catch-up complete.
    ///
    /// Returns the number of alerts the snapshot produced. Unknown record
    /// types are skipped.
    pub fn ingest_catchup(&mut self, snapshot: &CatchupSnapshot) -> usize {
        for user in &snapshot.users {
            let handle = user.handle();
            if handle.is_undef() {
                continue;
            }
            if let Some(email) = normalize_text_option(Some(user.email.clone())) {
                self.user_emails.insert(handle, email);
            }
        }

        let now = unix_timestamp_now();
        let mut ingested = Vec::new();
        for record in snapshot.records() {
            if let Some(id) = self.add_raw_at(&record, now) {
                push_unique(&mut ingested, id);
            }
        }

        if let Some(delta) = snapshot.last_seen_delta {
            let last_seen = now.saturating_sub(delta);
            for id in &ingested {
                if let Some(alert) = self.store.get_mut(*id) {
                    if alert.timestamp <= last_seen {
                        alert.seen = true;
                    }
                }
            }
        }

        self.catchup.done = true;
        tracing::info!(
            "Catch-up complete: {} alert(s), newest at {}",
            ingested.len(),
            self.catchup.last_timestamp
        );
        ingested.len()
    }

    /// Add one snapshot record. Unknown types are logged and skipped.
    pub fn add_raw(&mut self, record: &impl AlertRecord) -> Option<AlertId> {
        self.add_raw_at(record, unix_timestamp_now())
    }

    fn add_raw_at(&mut self, record: &impl AlertRecord, now: i64) -> Option<AlertId> {
        let Some(alert) = ingest::alert_from_record(record, now) else {
            tracing::warn!("Skipping alert of unknown type '{}'", record.type_tag());
            return None;
        };
        self.commit(alert)
    }

    // Live events

    /// Add an alert built from a live event.
    ///
    /// Categories disabled by the flags are dropped. While a provisional
    /// window is open the alert is staged instead and `None` is returned.
    pub fn add(&mut self, alert: Alert) -> Option<AlertId> {
        if self.is_unwanted_alert(alert.kind(), alert.payload().action()) {
            tracing::debug!("Dropping unwanted {} alert", alert.kind().tag());
            return None;
        }
        self.submit(alert)
    }

    /// Whether the flags suppress alerts of `kind` with `action`
    pub fn is_unwanted_alert(&self, kind: AlertKind, action: i32) -> bool {
        let flags = &self.config.flags;
        match kind {
            AlertKind::NewShare => !flags.cloud_enabled || !flags.cloud_newshare,
            AlertKind::DeletedShare => !flags.cloud_enabled || !flags.cloud_delshare,
            AlertKind::NewSharedNodes => !flags.cloud_enabled || !flags.cloud_newfiles,
            AlertKind::RemovedSharedNode | AlertKind::UpdatedSharedNode => !flags.cloud_enabled,
            AlertKind::IncomingPendingContact => {
                !flags.contacts_enabled || !flags.contacts_fcrin
            }
            AlertKind::ContactChange => {
                !flags.contacts_enabled
                    || match action {
                        0 | 2 => !flags.contacts_fcrdel,
                        1 => !flags.contacts_fcracpt,
                        _ => false,
                    }
            }
            AlertKind::UpdatedPendingContactIncoming => !flags.contacts_enabled,
            AlertKind::UpdatedPendingContactOutgoing => {
                !flags.contacts_enabled || (action == 2 && !flags.contacts_fcracpt)
            }
            AlertKind::Payment | AlertKind::PaymentReminder | AlertKind::Takedown => false,
        }
    }

    fn submit(&mut self, alert: Alert) -> Option<AlertId> {
        let alert = self.provisional.stage(alert)?;
        self.commit(alert)
    }

    /// Catch-up bookkeeping and node reconciliation, then placement
    fn commit(&mut self, mut alert: Alert) -> Option<AlertId> {
        if !self.catchup.done {
            self.catchup.last_timestamp = self.catchup.last_timestamp.max(alert.timestamp);
        } else if alert.timestamp < self.catchup.last_timestamp {
            tracing::debug!(
                "Discarding {} alert older than catch-up ({} < {})",
                alert.kind().tag(),
                alert.timestamp,
                self.catchup.last_timestamp
            );
            return None;
        }

        if !alert.payload().is_empty_node_list() {
            let notify = self.catchup.done;
            reconcile::reconcile_incoming(&mut self.store, alert.payload_mut(), notify);
            if alert.payload().is_empty_node_list() {
                tracing::debug!("Dropping {} alert cancelled by reconciliation", alert.kind().tag());
                return None;
            }
        }
        Some(self.place(alert))
    }

    /// Merge into the newest alert or append. Consumes an id either way.
    fn place(&mut self, mut alert: Alert) -> AlertId {
        if alert.email.is_empty() {
            if let Some(email) = self.user_emails.get(&alert.user) {
                alert.email.clone_from(email);
            }
        }

        let id = self.store.allocate_id();
        if let Some(merged) = self.merge_into_newest(&alert) {
            tracing::debug!("Merged {} alert into {merged}", alert.kind().tag());
            return merged;
        }

        if let AlertPayload::PaymentReminder(reminder) = alert.payload() {
            let expiry = reminder.expiry_time;
            self.supersede_payment_reminders();
            if expiry != 0 && expiry < unix_timestamp_now() {
                alert.relevant = false;
            }
        }

        alert.id = id;
        let notify = self.catchup.done;
        let id = self.store.insert(alert, notify);
        tracing::debug!("Added user alert {id}");
        id
    }

    fn merge_into_newest(&mut self, alert: &Alert) -> Option<AlertId> {
        let window = self.config.merge_window_secs;
        let newest = self.store.last_mut()?;
        if newest.seen
            || !newest.relevant
            || newest.user != alert.user
            || alert.timestamp.saturating_sub(newest.timestamp) >= window
        {
            return None;
        }

        let merged = match (newest.payload_mut(), alert.payload()) {
            (AlertPayload::NewSharedNodes(old), AlertPayload::NewSharedNodes(new))
                if old.parent_handle == new.parent_handle && !new.parent_handle.is_undef() =>
            {
                old.absorb(new);
                true
            }
            (AlertPayload::RemovedSharedNode(old), AlertPayload::RemovedSharedNode(new))
            | (AlertPayload::UpdatedSharedNode(old), AlertPayload::UpdatedSharedNode(new)) => {
                old.absorb(new);
                true
            }
            _ => false,
        };
        if !merged {
            return None;
        }

        let id = newest.id;
        self.store.touch(id, self.catchup.done);
        Some(id)
    }

    fn supersede_payment_reminders(&mut self) {
        let superseded: Vec<AlertId> = self
            .store
            .iter_mut()
            .filter(|alert| alert.relevant && alert.kind() == AlertKind::PaymentReminder)
            .map(|alert| {
                alert.relevant = false;
                alert.id
            })
            .collect();
        for id in superseded {
            self.store.touch(id, self.catchup.done);
        }
    }

    // Provisional window

    /// Start staging alerts instead of committing them
    pub fn start_provisional(&mut self) -> Result<()> {
        self.provisional.start()
    }

    pub const fn is_provisional(&self) -> bool {
        self.provisional.is_active()
    }

    /// Close the window: drop self-caused alerts, commit the rest in order
    pub fn eval_provisional(&mut self, originating_user: Handle) -> Result<Vec<AlertId>> {
        let staged = self.provisional.finish()?;
        let mut committed = Vec::new();
        for alert in staged {
            if !alert.check_provisional(originating_user, self.own_user) {
                tracing::debug!("Discarding self-caused {} alert", alert.kind().tag());
                continue;
            }
            if let Some(id) = self.commit(alert) {
                push_unique(&mut committed, id);
            }
        }
        Ok(committed)
    }

    // Noting batches

    /// Open a batch. Nothing is noted before the catch-up is complete.
    pub fn begin_noting_shared_nodes(&mut self) {
        if self.catchup.done {
            self.noting = true;
        }
    }

    /// Record one node event into the open batch
    pub fn note_shared_node(
        &mut self,
        user: Handle,
        timestamp: i64,
        node: &SharedNode,
        event: NodeEventKind,
    ) {
        if !self.catchup.done || !self.noting {
            return;
        }
        let is_folder = match node.kind {
            NodeKind::File => false,
            NodeKind::Folder => true,
            NodeKind::Other => return,
        };
        let Some(share_root) = node.share_root else {
            return;
        };
        if self.ignore_nodes_under == Some(share_root) {
            tracing::trace!("Ignoring {} under {share_root}", node.handle);
            return;
        }
        if self.is_unwanted_alert(event.alert_kind(), 0) {
            return;
        }

        let key = BucketKey { user, share_root };
        let handle = node.handle;
        match (event, self.noted.kind_of(handle)) {
            (NodeEventKind::Removed, Some(NodeEventKind::Added)) => {
                tracing::debug!("Stashing removal of {handle} until its addition is converted");
                self.batch_stash.note(key, timestamp, handle, is_folder, event);
            }
            (NodeEventKind::Added, Some(NodeEventKind::Removed)) => {
                // removed and put back within the batch
                self.noted.remove_handle(handle);
            }
            (NodeEventKind::Updated, Some(_)) => {}
            _ => self.noted.note(key, timestamp, handle, is_folder, event),
        }
    }

    /// Skip nodes under `share_root` for the rest of the current batch
    pub fn ignore_next_shared_nodes_under(&mut self, share_root: Handle) {
        self.ignore_nodes_under = Some(share_root);
    }

    fn is_convert_ready(&self, originating_user: Handle) -> bool {
        self.catchup.done
            && self.noting
            && (self.own_user.is_undef() || originating_user != self.own_user)
    }

    fn clear_noted_members(&mut self) {
        self.noted.clear();
        self.batch_stash.clear();
        self.noting = false;
        self.ignore_nodes_under = None;
    }

    /// Flush the batch into alerts and close it.
    ///
    /// Added nodes give one alert per (user, share root); removed and
    /// updated nodes give one alert per user. A batch caused by our own
    /// account is dropped.
    pub fn convert_noted_shared_nodes(&mut self, was_added: bool, originating_user: Handle) {
        if self.is_convert_ready(originating_user) {
            let noted = std::mem::take(&mut self.noted);
            if was_added {
                self.convert_added(noted);
            } else {
                self.convert_removed(noted);
            }
            self.keep_batch_stash();
        } else if !self.noted.is_empty() || !self.batch_stash.is_empty() {
            tracing::debug!(
                "Dropping {} noted and {} stashed node(s)",
                self.noted.len(),
                self.batch_stash.len()
            );
        }
        self.clear_noted_members();
    }

    /// Move the batch's removals into the stash and close the batch
    pub fn stash_deleted_noted_shared_nodes(&mut self, originating_user: Handle) {
        if self.is_convert_ready(originating_user) {
            let removals: NotedShareMap<Stash> = self.noted.extract(NodeEventKind::Removed);
            tracing::debug!("Stashing {} removed node(s)", removals.len());
            self.stash.absorb(removals);
            self.keep_batch_stash();
        }
        self.clear_noted_members();
    }

    fn keep_batch_stash(&mut self) {
        let held = std::mem::take(&mut self.batch_stash);
        self.stash.absorb(held);
    }

    /// Replay stashed removals now that the additions they follow are alerts
    pub fn convert_stashed_deleted_shared_nodes(&mut self) {
        if self.stash.is_empty() {
            return;
        }
        let stash = std::mem::take(&mut self.stash);
        tracing::debug!("Converting {} stashed removal(s)", stash.len());
        self.convert_removed(stash.into_role());
    }

    /// No removal is stashed, counting those held by the open batch
    pub fn is_deleted_shared_nodes_stash_empty(&self) -> bool {
        self.stash.is_empty() && self.batch_stash.is_empty()
    }

    fn convert_added(&mut self, noted: NotedShareMap<Live>) {
        for (key, bucket) in noted.into_buckets() {
            let mut nodes = NewSharedNodes {
                parent_handle: key.share_root,
                file_handles: Vec::new(),
                folder_handles: Vec::new(),
            };
            for (handle, event) in bucket.entries() {
                if event == NodeEventKind::Removed {
                    tracing::warn!("Removed node {handle} noted in an added batch, dropping");
                } else if bucket.folder_handles.contains_key(&handle) {
                    nodes.folder_handles.push(handle);
                } else {
                    nodes.file_handles.push(handle);
                }
            }
            if nodes.is_empty() {
                continue;
            }

            let alert = Alert::new(
                AlertPayload::NewSharedNodes(nodes),
                key.user,
                "",
                bucket.timestamp,
            );
            self.submit(alert);
        }
    }

    fn convert_removed(&mut self, noted: NotedShareMap<Live>) {
        let mut per_user: BTreeMap<Handle, UserNodeChanges> = BTreeMap::new();
        for (key, bucket) in noted.into_buckets() {
            let changes = per_user.entry(key.user).or_default();
            changes.timestamp = changes.timestamp.max(bucket.timestamp);
            for (handle, event) in bucket.entries() {
                match event {
                    NodeEventKind::Removed => {
                        push_unique(&mut changes.removed, handle);
                    }
                    NodeEventKind::Updated => {
                        push_unique(&mut changes.updated, handle);
                    }
                    NodeEventKind::Added => {
                        tracing::warn!("Added node {handle} noted in a removal batch, dropping");
                    }
                }
            }
        }

        for (user, changes) in per_user {
            if !changes.removed.is_empty() {
                let payload = AlertPayload::RemovedSharedNode(SharedNodeHandles {
                    node_handles: changes.removed,
                });
                self.submit(Alert::new(payload, user, "", changes.timestamp));
            }
            if !changes.updated.is_empty() {
                let payload = AlertPayload::UpdatedSharedNode(SharedNodeHandles {
                    node_handles: changes.updated,
                });
                self.submit(Alert::new(payload, user, "", changes.timestamp));
            }
        }
    }

    // Reconciler queries and node lifecycle hooks

    /// Whether `handle` is waiting in the batch or the stash as removed
    pub fn is_shared_node_noted_as_removed(&self, handle: Handle) -> bool {
        self.noted.kind_of(handle) == Some(NodeEventKind::Removed)
            || self.batch_stash.kind_of(handle) == Some(NodeEventKind::Removed)
            || self.stash.kind_of(handle) == Some(NodeEventKind::Removed)
    }

    /// Whether some alert already records the removal of `handle`
    pub fn is_handle_in_alerts_as_removed(&self, handle: Handle) -> bool {
        reconcile::records_removal(&self.store, handle)
    }

    /// Forget a node that left the local graph.
    ///
    /// The handle is stripped from unseen added and updated alerts and from
    /// the noted maps. Removal alerts keep it.
    pub fn remove_node_alerts(&mut self, handle: Handle) -> bool {
        let notify = self.catchup.done;
        let mut found =
            reconcile::erase_from_unseen(&mut self.store, handle, AlertKind::NewSharedNodes, notify);
        found |= reconcile::erase_from_unseen(
            &mut self.store,
            handle,
            AlertKind::UpdatedSharedNode,
            notify,
        );
        if matches!(
            self.noted.kind_of(handle),
            Some(NodeEventKind::Added | NodeEventKind::Updated)
        ) {
            found |= self.noted.remove_handle(handle);
        }
        found
    }

    /// Re-label a node reported as added as updated instead.
    ///
    /// Used when a new node replaces an older version of itself.
    pub fn set_new_node_alert_to_update_node_alert(&mut self, node: &SharedNode) -> bool {
        let handle = node.handle;
        let source = self
            .store
            .iter()
            .find(|alert| {
                !alert.seen
                    && alert.kind() == AlertKind::NewSharedNodes
                    && alert.payload().references_node(handle)
            })
            .map(|alert| (alert.user, alert.timestamp));

        if let Some((user, timestamp)) = source {
            let notify = self.catchup.done;
            reconcile::erase_from_unseen(&mut self.store, handle, AlertKind::NewSharedNodes, notify);
            let payload = AlertPayload::UpdatedSharedNode(SharedNodeHandles {
                node_handles: vec![handle],
            });
            let id = self.place(Alert::new(payload, user, "", timestamp));
            tracing::debug!("Node {handle} now reported as updated in alert {id}");
            return true;
        }

        self.noted
            .set_kind(handle, NodeEventKind::Added, NodeEventKind::Updated)
    }

    // Store operations

    /// Erase alerts by id; returns how many were live
    pub fn erase_alerts(&mut self, ids: &BTreeSet<AlertId>) -> usize {
        self.store.erase(ids)
    }

    /// Evict seen alerts beyond the configured maximum
    pub fn trim_alerts_to_max_count(&mut self) -> Vec<AlertId> {
        let evicted = self.store.trim(self.config.max_alerts);
        if !evicted.is_empty() {
            tracing::debug!("Trimmed {} alert(s)", evicted.len());
        }
        evicted
    }

    /// Mark everything seen locally and ask the sync layer to tell the server
    pub fn acknowledge_all(&mut self) -> usize {
        let changed = self.store.mark_all_seen(true);
        self.acknowledge_requested = true;
        changed
    }

    /// Apply an acknowledgement made by another session
    pub fn on_acknowledge_received(&mut self) -> usize {
        self.store.mark_all_seen(false)
    }

    /// Take the pending acknowledge request, if any
    pub fn take_acknowledge_request(&mut self) -> bool {
        std::mem::take(&mut self.acknowledge_requested)
    }

    /// Record `user`'s email and fill it into alerts that lack it
    pub fn set_user_email(&mut self, user: Handle, email: impl Into<String>) {
        let Some(email) = normalize_text_option(Some(email.into())) else {
            return;
        };
        let changed: Vec<AlertId> = self
            .store
            .iter_mut()
            .filter(|alert| alert.user == user && alert.email != email)
            .map(|alert| {
                alert.email.clone_from(&email);
                alert.id
            })
            .collect();
        for id in changed {
            self.store.touch(id, false);
        }
        self.user_emails.insert(user, email);
    }

    /// Live alerts, oldest first
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.store.iter()
    }

    pub const fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn pending_notifications(&self) -> impl Iterator<Item = &Alert> {
        self.store.pending_notifications()
    }

    /// Drain the pending-notify list
    pub fn take_notifications(&mut self) -> Vec<Alert> {
        self.store.take_notifications()
    }

    /// Mark every alert for write-back
    pub fn init_sc_alerts(&mut self) {
        self.store.mark_all_put();
    }

    /// Forget everything, as on logout
    pub fn clear(&mut self) {
        self.store.clear();
        self.catchup = CatchupState::default();
        self.provisional.clear();
        self.clear_noted_members();
        self.stash.clear();
        self.user_emails.clear();
        self.acknowledge_requested = false;
    }

    // Persistence

    /// Write pending changes to the cache
    pub fn purge_sc_alerts(&mut self, cache: &impl AlertCache) -> Result<PurgeSummary> {
        let summary = self.store.purge(cache)?;
        if self.catchup.done {
            cache.save_catchup_timestamp(self.catchup.last_timestamp)?;
        }
        if summary != PurgeSummary::default() {
            tracing::debug!(
                "Purged alerts: {} written, {} removed",
                summary.written,
                summary.removed
            );
        }
        Ok(summary)
    }

    /// Load cached alerts. A non-empty cache counts as a completed catch-up.
    pub fn load_from_cache(&mut self, cache: &impl AlertCache) -> Result<usize> {
        let mut loaded = 0;
        for (record_id, bytes) in cache.load_all()? {
            if self.unserialize_alert(&bytes, record_id) {
                loaded += 1;
            }
        }

        if loaded > 0 {
            let newest = self.store.iter().map(|alert| alert.timestamp).max();
            let saved = cache.load_catchup_timestamp()?;
            self.catchup = CatchupState {
                done: true,
                last_timestamp: newest.max(saved).unwrap_or_default(),
            };
            tracing::info!("Loaded {loaded} alert(s) from cache");
        }
        Ok(loaded)
    }

    /// Restore one cached record; unreadable records are logged and dropped
    pub fn unserialize_alert(&mut self, bytes: &[u8], record_id: u32) -> bool {
        match db::unserialize_alert(bytes, record_id) {
            Ok(alert) => self.store.restore(alert),
            Err(error) => {
                tracing::warn!("Dropping cached alert: {error}");
                false
            }
        }
    }
}
