//! Ordered alert store
//!
//! Live alerts sit in a deque ordered by id. Erased alerts move to a tombstone
//! arena while the app still has to hear about them or the cache still holds
//! their row; tombstones are compacted after each purge and drain. The
//! pending-notify list holds ids only and always resolves into one of the two.

use std::collections::{BTreeSet, VecDeque};

use crate::db::{serialize_alert, AlertCache};
use crate::error::Result;
use crate::models::{Alert, AlertId, PersistFlags};

/// Outcome of one write-back pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Records added or replaced
    pub written: usize,
    /// Records deleted
    pub removed: usize,
}

/// Exclusive owner of every known alert
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: VecDeque<Alert>,
    tombstones: Vec<Alert>,
    notify: Vec<AlertId>,
    last_id: u32,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live alerts
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Live alerts, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.position(id).map(|pos| &self.alerts[pos])
    }

    /// Erased alerts still awaiting a durable delete or app notification
    pub fn tombstones(&self) -> impl Iterator<Item = &Alert> {
        self.tombstones.iter()
    }

    /// Alerts added or changed since the app last drained the list
    pub fn pending_notifications(&self) -> impl Iterator<Item = &Alert> {
        self.notify.iter().filter_map(|id| self.find_any(*id))
    }

    pub(crate) fn get_mut(&mut self, id: AlertId) -> Option<&mut Alert> {
        self.position(id).map(move |pos| &mut self.alerts[pos])
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Alert> {
        self.alerts.back_mut()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Alert> {
        self.alerts.iter_mut()
    }

    fn position(&self, id: AlertId) -> Option<usize> {
        self.alerts.binary_search_by_key(&id, |alert| alert.id).ok()
    }

    fn find_any(&self, id: AlertId) -> Option<&Alert> {
        self.get(id)
            .or_else(|| self.tombstones.iter().find(|alert| alert.id == id))
    }

    /// Next id. Ids are never reused, even when the alert ends up merged.
    pub(crate) fn allocate_id(&mut self) -> AlertId {
        self.last_id += 1;
        AlertId::new(self.last_id)
    }

    /// Append a new alert and mark it for write-back
    pub(crate) fn insert(&mut self, mut alert: Alert, notify: bool) -> AlertId {
        if !alert.id.is_assigned() {
            alert.id = self.allocate_id();
        }
        debug_assert!(self.alerts.back().is_none_or(|last| last.id < alert.id));

        alert.set_persist_put();
        let id = alert.id;
        self.alerts.push_back(alert);
        if notify {
            self.queue_notification(id);
        }
        id
    }

    /// Re-insert an alert loaded from the cache, keeping its id and row
    pub(crate) fn restore(&mut self, alert: Alert) -> bool {
        self.last_id = self.last_id.max(alert.id.get());
        match self
            .alerts
            .binary_search_by_key(&alert.id, |existing| existing.id)
        {
            Ok(_) => {
                tracing::warn!("Dropping cached alert with duplicate id {}", alert.id);
                false
            }
            Err(pos) => {
                self.alerts.insert(pos, alert);
                true
            }
        }
    }

    /// Queue an alert for the app once
    pub(crate) fn queue_notification(&mut self, id: AlertId) {
        if !self.notify.contains(&id) {
            self.notify.push(id);
        }
    }

    /// Record an in-place change: write it back and tell the app
    pub(crate) fn touch(&mut self, id: AlertId, notify: bool) {
        let Some(alert) = self.get_mut(id) else {
            return;
        };
        alert.set_persist_put();
        if notify {
            alert.tag = 0;
            self.queue_notification(id);
        }
    }

    pub(crate) fn mark_all_put(&mut self) {
        for alert in &mut self.alerts {
            alert.set_persist_put();
        }
    }

    /// Set `seen` on every unseen alert; returns how many changed
    pub(crate) fn mark_all_seen(&mut self, notify: bool) -> usize {
        let mut changed = Vec::new();
        for alert in self.alerts.iter_mut().filter(|alert| !alert.seen) {
            alert.seen = true;
            alert.set_persist_put();
            changed.push(alert.id);
        }
        if notify {
            for id in &changed {
                self.queue_notification(*id);
            }
        }
        changed.len()
    }

    /// Remove alerts from the live list.
    ///
    /// An alert the app has never been given simply disappears from the
    /// notify list. One it already knows about becomes an irrelevant
    /// tombstone that is (re)queued so the app can drop it.
    pub(crate) fn erase(&mut self, ids: &BTreeSet<AlertId>) -> usize {
        self.retire(ids, true)
    }

    /// Evict seen and irrelevant alerts, oldest first, until at most `max`
    /// remain. Unseen or relevant alerts stay even if that leaves more than
    /// `max`.
    pub(crate) fn trim(&mut self, max: usize) -> Vec<AlertId> {
        let excess = self.alerts.len().saturating_sub(max);
        let evict: BTreeSet<AlertId> = self
            .alerts
            .iter()
            .filter(|alert| alert.seen && !alert.relevant)
            .take(excess)
            .map(|alert| alert.id)
            .collect();

        self.retire(&evict, false);
        evict.into_iter().collect()
    }

    fn retire(&mut self, ids: &BTreeSet<AlertId>, announce: bool) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let mut retired = 0;
        let alerts = std::mem::take(&mut self.alerts);
        for mut alert in alerts {
            if !ids.contains(&alert.id) {
                self.alerts.push_back(alert);
                continue;
            }

            retired += 1;
            alert.set_persist_remove();
            let queued = self.notify.contains(&alert.id);
            if announce && alert.delivered {
                alert.relevant = false;
                alert.tag = 0;
                if !queued {
                    self.notify.push(alert.id);
                }
            } else if queued {
                self.notify.retain(|id| *id != alert.id);
            }
            self.tombstones.push(alert);
        }

        self.compact_tombstones();
        retired
    }

    /// Drop tombstones nobody needs anymore
    fn compact_tombstones(&mut self) {
        let notify = &self.notify;
        self.tombstones.retain(|alert| {
            (alert.persist.remove && alert.record_id.is_some()) || notify.contains(&alert.id)
        });
    }

    /// Hand the pending list to the app and mark live entries delivered
    pub(crate) fn take_notifications(&mut self) -> Vec<Alert> {
        let ids = std::mem::take(&mut self.notify);
        let mut drained = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(alert) = self.get_mut(id) {
                alert.delivered = true;
                drained.push(alert.clone());
            } else if let Some(alert) = self.tombstones.iter().find(|alert| alert.id == id) {
                drained.push(alert.clone());
            }
        }
        self.compact_tombstones();
        drained
    }

    /// Write every Put-pending alert, delete every Remove-pending tombstone.
    ///
    /// Flags are cleared per alert as its write succeeds, so a failed pass
    /// resumes where it stopped.
    pub(crate) fn purge(&mut self, cache: &impl AlertCache) -> Result<PurgeSummary> {
        let mut summary = PurgeSummary::default();

        for alert in self.alerts.iter_mut().filter(|alert| alert.persist.put) {
            let bytes = serialize_alert(alert)?;
            alert.record_id = Some(cache.put(alert.record_id, &bytes)?);
            alert.persist = PersistFlags::default();
            summary.written += 1;
        }

        for alert in &mut self.tombstones {
            if alert.persist.remove {
                if let Some(record_id) = alert.record_id {
                    cache.remove(record_id)?;
                    alert.record_id = None;
                    summary.removed += 1;
                }
            }
            alert.persist = PersistFlags::default();
        }

        self.compact_tombstones();
        Ok(summary)
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteAlertCache};
    use crate::models::{AlertPayload, Handle, Payment};

    fn payment(ts: i64) -> Alert {
        Alert::new(
            AlertPayload::Payment(Payment {
                success: true,
                plan_number: 1,
            }),
            Handle::UNDEF,
            "",
            ts,
        )
    }

    fn store_with(count: i64) -> AlertStore {
        let mut store = AlertStore::new();
        for ts in 0..count {
            store.insert(payment(ts), true);
        }
        store
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = store_with(3);
        let ids: Vec<u32> = store.iter().map(|alert| alert.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(store.iter().all(|alert| alert.persist_flags().put));
        assert_eq!(store.pending_notifications().count(), 3);
    }

    #[test]
    fn test_allocated_id_gap_is_kept() {
        let mut store = store_with(1);
        store.allocate_id();
        let id = store.insert(payment(9), false);
        assert_eq!(id.get(), 3);
    }

    #[test]
    fn test_erase_undelivered_leaves_notify_list() {
        let mut store = store_with(2);
        let erased = store.erase(&BTreeSet::from([AlertId::new(1)]));

        assert_eq!(erased, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(AlertId::new(1)).is_none());
        let pending: Vec<AlertId> = store.pending_notifications().map(|a| a.id).collect();
        assert_eq!(pending, vec![AlertId::new(2)]);
    }

    #[test]
    fn test_erase_delivered_becomes_irrelevant_tombstone() {
        let mut store = store_with(2);
        store.take_notifications();
        store.erase(&BTreeSet::from([AlertId::new(2)]));

        let pending: Vec<&Alert> = store.pending_notifications().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, AlertId::new(2));
        assert!(!pending[0].relevant);
        assert!(pending[0].persist_flags().remove);
        assert!(store.get(AlertId::new(2)).is_none());

        let drained = store.take_notifications();
        assert_eq!(drained.len(), 1);
        // never written, so nothing keeps the tombstone alive after the drain
        assert_eq!(store.tombstones().count(), 0);
    }

    #[test]
    fn test_trim_evicts_only_seen_irrelevant() {
        let mut store = store_with(5);
        for alert in store.iter_mut() {
            alert.seen = alert.id.get() != 1;
            alert.relevant = !matches!(alert.id.get(), 1 | 3 | 4);
        }

        let evicted = store.trim(3);
        assert_eq!(evicted, vec![AlertId::new(3), AlertId::new(4)]);
        let remaining: Vec<u32> = store.iter().map(|a| a.id.get()).collect();
        assert_eq!(remaining, vec![1, 2, 5]);
    }

    #[test]
    fn test_trim_keeps_seen_relevant_over_cap() {
        let mut store = store_with(4);
        store.mark_all_seen(false);

        assert!(store.trim(2).is_empty());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_trim_never_evicts_unseen() {
        let mut store = store_with(4);
        let evicted = store.trim(2);
        assert!(evicted.is_empty());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_mark_all_seen_queues_once() {
        let mut store = store_with(2);
        assert_eq!(store.mark_all_seen(true), 2);
        assert_eq!(store.mark_all_seen(true), 0);
        assert_eq!(store.pending_notifications().count(), 2);
    }

    #[test]
    fn test_purge_writes_then_deletes() {
        let db = Database::open_in_memory().unwrap();
        let cache = SqliteAlertCache::new(db.connection());
        let mut store = store_with(3);

        let summary = store.purge(&cache).unwrap();
        assert_eq!(summary, PurgeSummary { written: 3, removed: 0 });
        assert!(store.iter().all(|alert| alert.record_id().is_some()));
        assert!(store.iter().all(|alert| !alert.persist_flags().is_pending()));

        store.erase(&BTreeSet::from([AlertId::new(2)]));
        let summary = store.purge(&cache).unwrap();
        assert_eq!(summary, PurgeSummary { written: 0, removed: 1 });
        assert_eq!(cache.count().unwrap(), 2);
        assert_eq!(store.tombstones().count(), 0);
    }

    #[test]
    fn test_put_then_remove_before_purge_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let cache = SqliteAlertCache::new(db.connection());
        let mut store = store_with(1);

        store.erase(&BTreeSet::from([AlertId::new(1)]));
        let summary = store.purge(&cache).unwrap();
        assert_eq!(summary, PurgeSummary::default());
        assert_eq!(cache.count().unwrap(), 0);
    }

    #[test]
    fn test_restore_keeps_order_and_bumps_ids() {
        let mut store = AlertStore::new();
        let mut late = payment(2);
        late.id = AlertId::new(7);
        let mut early = payment(1);
        early.id = AlertId::new(3);

        assert!(store.restore(late.clone()));
        assert!(store.restore(early));
        assert!(!store.restore(late));

        let ids: Vec<u32> = store.iter().map(|a| a.id.get()).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(store.allocate_id(), AlertId::new(8));
    }
}
