//! End-to-end behaviour of the alert engine through its public API

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use serde_json::json;
use sharefeed_core::db::{Database, SqliteAlertCache};
use sharefeed_core::models::{
    AlertPayload, NewShare, NewSharedNodes, NodeEventKind, Payment, PaymentReminder, SharedNode,
};
use sharefeed_core::record::CatchupSnapshot;
use sharefeed_core::{Alert, AlertKind, AlertsConfig, Handle, UserAlerts};

const ME: Handle = Handle::new(1);
const USER: Handle = Handle::new(42);
const SHARE: Handle = Handle::new(7);

fn caught_up(config: AlertsConfig) -> UserAlerts {
    let mut alerts = UserAlerts::new(config, ME);
    alerts.ingest_catchup(&CatchupSnapshot::default());
    alerts
}

fn note(alerts: &mut UserAlerts, handle: u64, ts: i64, event: NodeEventKind) {
    note_as(alerts, USER, handle, ts, event);
}

fn note_as(alerts: &mut UserAlerts, user: Handle, handle: u64, ts: i64, event: NodeEventKind) {
    alerts.note_shared_node(user, ts, &SharedNode::file(Handle::new(handle), SHARE), event);
}

fn unseen_handles(alerts: &UserAlerts, kind: AlertKind) -> BTreeSet<Handle> {
    alerts
        .alerts()
        .filter(|alert| !alert.seen && alert.kind() == kind)
        .flat_map(|alert| match alert.payload() {
            AlertPayload::NewSharedNodes(nodes) => nodes
                .file_handles
                .iter()
                .chain(&nodes.folder_handles)
                .copied()
                .collect::<Vec<_>>(),
            AlertPayload::RemovedSharedNode(nodes) | AlertPayload::UpdatedSharedNode(nodes) => {
                nodes.node_handles.clone()
            }
            _ => Vec::new(),
        })
        .collect()
}

fn assert_no_contradiction(alerts: &UserAlerts) {
    let added = unseen_handles(alerts, AlertKind::NewSharedNodes);
    let removed = unseen_handles(alerts, AlertKind::RemovedSharedNode);
    assert!(
        added.is_disjoint(&removed),
        "handles both added and removed: {:?}",
        added.intersection(&removed).collect::<Vec<_>>()
    );
}

fn expired_reminder(ts: i64) -> Alert {
    Alert::new(
        AlertPayload::PaymentReminder(PaymentReminder { expiry_time: 1 }),
        Handle::UNDEF,
        "",
        ts,
    )
}

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

/// Small deterministic generator so the sequences are reproducible
struct XorShift(u64);

impl XorShift {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 % bound
    }
}

#[test]
fn added_then_removed_node_leaves_no_alert() {
    let mut alerts = caught_up(AlertsConfig::default());

    alerts.begin_noting_shared_nodes();
    note(&mut alerts, 1, 100, NodeEventKind::Added);
    alerts.convert_noted_shared_nodes(true, USER);

    let only: Vec<&Alert> = alerts.alerts().collect();
    assert_eq!(only.len(), 1);
    assert_eq!(
        only[0].payload(),
        &AlertPayload::NewSharedNodes(NewSharedNodes {
            parent_handle: SHARE,
            file_handles: vec![Handle::new(1)],
            folder_handles: vec![],
        })
    );

    alerts.begin_noting_shared_nodes();
    note(&mut alerts, 1, 101, NodeEventKind::Removed);
    alerts.convert_noted_shared_nodes(false, USER);

    assert_eq!(alerts.alerts().count(), 0);
    assert!(!alerts.is_handle_in_alerts_as_removed(Handle::new(1)));
}

#[test]
fn snapshot_skips_unknown_types_without_consuming_ids() {
    let mut alerts = UserAlerts::new(AlertsConfig::default(), ME);
    let snapshot = CatchupSnapshot {
        alerts: vec![
            json!({"t": "c", "u": 42, "c": 1}),
            json!({"t": "share", "u": 42, "n": 7}),
            json!({"t": "mystery", "u": 42}),
        ],
        ..CatchupSnapshot::default()
    };

    assert_eq!(alerts.ingest_catchup(&snapshot), 2);
    let summary: Vec<(u32, AlertKind)> = alerts.alerts().map(|a| (a.id.get(), a.kind())).collect();
    assert_eq!(
        summary,
        vec![(1, AlertKind::ContactChange), (2, AlertKind::NewShare)]
    );
}

#[test]
fn no_handle_is_both_added_and_removed() {
    for seed in 1..=64_u64 {
        let mut rng = XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let mut alerts = caught_up(AlertsConfig::default());
        let mut ts = 1_000;

        for _ in 0..40 {
            ts += 1 + i64::try_from(rng.next(400)).unwrap();
            // one batch in four comes from our own account
            let origin = if rng.next(4) == 0 { ME } else { USER };
            alerts.begin_noting_shared_nodes();
            for _ in 0..=rng.next(4) {
                let event = match rng.next(3) {
                    0 => NodeEventKind::Added,
                    1 => NodeEventKind::Removed,
                    _ => NodeEventKind::Updated,
                };
                note_as(&mut alerts, origin, 1 + rng.next(6), ts, event);
            }

            match rng.next(4) {
                0 => alerts.convert_noted_shared_nodes(true, origin),
                1 => alerts.convert_noted_shared_nodes(false, origin),
                2 => alerts.stash_deleted_noted_shared_nodes(origin),
                _ => {
                    alerts.convert_noted_shared_nodes(true, origin);
                    alerts.convert_stashed_deleted_shared_nodes();
                }
            }
            assert_no_contradiction(&alerts);
            assert!(alerts.alerts().all(|alert| alert.user != ME));
        }
    }
}

#[test]
fn removal_of_unseen_addition_cancels_out() {
    let mut alerts = caught_up(AlertsConfig::default());
    alerts.begin_noting_shared_nodes();
    note(&mut alerts, 1, 100, NodeEventKind::Added);
    note(&mut alerts, 2, 100, NodeEventKind::Added);
    alerts.convert_noted_shared_nodes(true, USER);

    alerts.begin_noting_shared_nodes();
    note(&mut alerts, 1, 150, NodeEventKind::Removed);
    alerts.convert_noted_shared_nodes(false, USER);

    assert!(alerts
        .alerts()
        .all(|alert| !alert.payload().references_node(Handle::new(1))));
    assert_eq!(
        alerts.alerts().map(Alert::kind).collect::<Vec<_>>(),
        vec![AlertKind::NewSharedNodes]
    );
}

#[test]
fn stashed_removal_matches_removal_after_conversion() {
    let mut stashed = caught_up(AlertsConfig::default());
    stashed.begin_noting_shared_nodes();
    note(&mut stashed, 1, 100, NodeEventKind::Added);
    note(&mut stashed, 2, 100, NodeEventKind::Added);
    note(&mut stashed, 1, 100, NodeEventKind::Removed);
    assert!(!stashed.is_deleted_shared_nodes_stash_empty());
    stashed.convert_noted_shared_nodes(true, USER);
    stashed.convert_stashed_deleted_shared_nodes();

    let mut ordered = caught_up(AlertsConfig::default());
    ordered.begin_noting_shared_nodes();
    note(&mut ordered, 1, 100, NodeEventKind::Added);
    note(&mut ordered, 2, 100, NodeEventKind::Added);
    ordered.convert_noted_shared_nodes(true, USER);
    ordered.begin_noting_shared_nodes();
    note(&mut ordered, 1, 100, NodeEventKind::Removed);
    ordered.convert_noted_shared_nodes(false, USER);

    let state = |alerts: &UserAlerts| {
        alerts
            .alerts()
            .map(|alert| (alert.id, alert.user, alert.payload().clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(state(&stashed), state(&ordered));
    assert!(stashed.is_deleted_shared_nodes_stash_empty());
}

#[test]
fn acknowledge_twice_queues_each_alert_once() {
    let mut alerts = caught_up(AlertsConfig::default());
    for ts in [100, 200, 300] {
        alerts.add(payment(ts));
    }
    alerts.take_notifications();

    alerts.acknowledge_all();
    alerts.acknowledge_all();

    assert!(alerts.alerts().all(|alert| alert.seen));
    let pending: Vec<u32> = alerts.pending_notifications().map(|a| a.id.get()).collect();
    assert_eq!(pending, vec![1, 2, 3]);
}

#[test]
fn self_caused_alerts_never_reach_the_store() {
    let mut alerts = caught_up(AlertsConfig::default());
    let share = |user| {
        Alert::new(
            AlertPayload::NewShare(NewShare {
                folder_handle: SHARE,
            }),
            user,
            "",
            500,
        )
    };

    alerts.start_provisional().unwrap();
    alerts.add(share(ME));
    alerts.add(share(USER));
    alerts.begin_noting_shared_nodes();
    note(&mut alerts, 3, 500, NodeEventKind::Added);
    alerts.convert_noted_shared_nodes(true, USER);
    alerts.eval_provisional(USER).unwrap();

    assert!(alerts.alerts().all(|alert| alert.user != ME));
    assert_eq!(
        alerts.alerts().map(Alert::kind).collect::<Vec<_>>(),
        vec![AlertKind::NewShare, AlertKind::NewSharedNodes]
    );

    alerts.start_provisional().unwrap();
    alerts.add(share(USER));
    alerts.eval_provisional(ME).unwrap();
    assert_eq!(alerts.alerts().count(), 2);
}

#[test]
fn trimming_respects_the_cap_or_keeps_unseen_and_relevant() {
    let config = AlertsConfig {
        max_alerts: 3,
        ..AlertsConfig::default()
    };
    let mut alerts = caught_up(config);
    alerts.add(payment(100));
    alerts.add(payment(101));
    for ts in 102..105 {
        alerts.add(expired_reminder(ts));
    }
    alerts.on_acknowledge_received();
    alerts.add(payment(105));
    alerts.add(payment(106));

    let evicted: Vec<u32> = alerts
        .trim_alerts_to_max_count()
        .iter()
        .map(|id| id.get())
        .collect();
    assert_eq!(evicted, vec![3, 4, 5]);

    // seen relevant and unseen alerts stay even though the cap is exceeded
    assert_eq!(alerts.alerts().count(), 4);
    assert!(alerts.alerts().all(|alert| !alert.seen || alert.relevant));
    assert!(alerts.trim_alerts_to_max_count().is_empty());
}

#[test]
fn own_batch_does_not_leak_through_the_stash() {
    let mut alerts = caught_up(AlertsConfig::default());
    alerts.begin_noting_shared_nodes();
    note_as(&mut alerts, ME, 5, 100, NodeEventKind::Added);
    note_as(&mut alerts, ME, 5, 100, NodeEventKind::Removed);
    alerts.convert_noted_shared_nodes(true, ME);

    assert!(alerts.is_deleted_shared_nodes_stash_empty());
    alerts.convert_stashed_deleted_shared_nodes();
    assert_eq!(alerts.alerts().count(), 0);
}

#[test]
fn extreme_time_fields_do_not_abort_ingestion() {
    let mut alerts = UserAlerts::new(AlertsConfig::default(), ME);
    let snapshot = CatchupSnapshot {
        alerts: vec![
            json!({"t": "c", "u": 42, "td": i64::MIN}),
            json!({"t": "c", "u": 42, "td": i64::MAX}),
            json!({"t": "share", "u": 42, "n": 7, "ts": i64::MIN}),
        ],
        last_seen_delta: Some(i64::MIN),
        ..CatchupSnapshot::default()
    };

    assert_eq!(alerts.ingest_catchup(&snapshot), 3);
    assert_eq!(alerts.catchup_last_timestamp(), i64::MAX);
    assert!(alerts.alerts().all(|alert| alert.seen));
}

#[test]
fn alerts_survive_a_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("alerts.db");

    {
        let db = Database::open(&path).unwrap();
        let cache = SqliteAlertCache::new(db.connection());
        let mut alerts = caught_up(AlertsConfig::default());
        alerts.add(payment(100));
        alerts.add(payment(200));
        alerts.purge_sc_alerts(&cache).unwrap();

        let first = alerts.alerts().next().unwrap().id;
        alerts.erase_alerts(&BTreeSet::from([first]));
        alerts.purge_sc_alerts(&cache).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let cache = SqliteAlertCache::new(db.connection());
    let mut alerts = UserAlerts::new(AlertsConfig::default(), ME);
    assert_eq!(alerts.load_from_cache(&cache).unwrap(), 1);
    assert_eq!(alerts.alerts().next().unwrap().id.get(), 2);
    assert!(alerts.add(payment(150)).is_none());
    assert_eq!(alerts.add(payment(250)).unwrap().get(), 3);
}
