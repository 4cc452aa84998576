//! Replay of complete timelines.

use arbor_core::Timestamp;
use arbor_log::{
    ChildState, Event, EventOrigin, EventPayload, IngestConfig, ManagerState, Timeline, TreeState,
    build_timeline,
};
use arbor_replay::{
    DeletionPolicy, EdgeData, EdgeKind, InvariantViolation, ReplayConfig, ReplayEngine,
    ReplayError,
};
use proptest::prelude::*;
use std::net::Ipv4Addr;

fn addr(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n + 1)
}

fn name(n: u8) -> String {
    format!("node-{n}")
}

/// Builds timelines one event at a time, 10ms apart
#[derive(Default)]
struct Script {
    events: Vec<Event>,
}

impl Script {
    fn push(mut self, node: u8, payload: EventPayload) -> Self {
        let line = self.events.len() + 1;
        let millis = 1_700_000_000_000 + 10 * line as i64;
        self.events.push(Event::new(
            Timestamp::from_millis(millis).unwrap(),
            name(node),
            EventOrigin {
                file: format!("{}.log", name(node)),
                line,
            },
            payload,
        ));
        self
    }

    fn hello(self, node: u8) -> Self {
        self.push(node, EventPayload::Hello { address: addr(node), location: None })
    }

    fn tree(self, node: u8, state: TreeState, parent: Option<u8>, grandparents: &[u8]) -> Self {
        self.push(
            node,
            EventPayload::TreeStateChange {
                state,
                parent: parent.map(addr),
                grandparents: grandparents.iter().copied().map(addr).collect(),
            },
        )
    }

    fn child(self, node: u8, child: u8, state: ChildState) -> Self {
        self.push(node, EventPayload::ChildStateChange { child: addr(child), state })
    }

    fn active(self, node: u8, peer: u8, added: bool) -> Self {
        self.push(node, EventPayload::ActiveViewChange { peer: addr(peer), added })
    }

    fn passive(self, node: u8, peer: u8, added: bool) -> Self {
        self.push(node, EventPayload::PassiveViewChange { peer: addr(peer), added })
    }

    fn timeline(self) -> Timeline {
        Timeline::from_events(self.events)
    }
}

/// Twenty valid events: node-1 joins under node-0, views churn, node-4 leaves
fn twenty_events() -> Timeline {
    let mut script = Script::default();
    for n in 0..5 {
        script = script.hello(n);
    }
    script
        .active(1, 0, true)
        .active(2, 0, true)
        .tree(1, TreeState::ParentConnecting, Some(0), &[])
        .child(0, 1, ChildState::Connected)
        .tree(1, TreeState::ParentConnected, Some(0), &[])
        .child(0, 1, ChildState::Sync)
        .tree(1, TreeState::ParentSync, Some(0), &[])
        .child(0, 1, ChildState::Ready)
        .tree(1, TreeState::ParentReady, Some(0), &[])
        .push(1, EventPayload::ParentMetadataUpdate { metadata: vec!["m0".into(), "m1".into()] })
        .push(0, EventPayload::ChildMetadataUpdate { child: addr(1), metadata: "m1".into() })
        .passive(3, 2, true)
        .push(0, EventPayload::ManagerStateChange { state: ManagerState::Active })
        .active(1, 0, false)
        .push(4, EventPayload::Goodbye)
        .timeline()
}

fn edge(origin: u8, destination: u8, kind: EdgeKind) -> EdgeData {
    EdgeData {
        origin: name(origin),
        destination: name(destination),
        kind,
    }
}

fn log_line(millis: u32, rest: &str) -> String {
    format!("INFO 2024/02/01-10:00:00,{millis:03} [main] Overlay {rest}")
}

#[tokio::test]
async fn test_two_node_corpus() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("node-a.log"),
        [
            log_line(0, "Hello from node node-a 10.0.0.1"),
            log_line(10, "ACTIVE Added 10.0.0.2"),
        ]
        .join("\n"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("node-b.log"),
        log_line(5, "Hello from node node-b 10.0.0.2"),
    )
    .unwrap();

    let timeline = build_timeline(dir.path(), &IngestConfig::default()).await.unwrap();
    let mut engine = ReplayEngine::new(timeline);
    engine.seek(2).unwrap();

    let data = engine.snapshot().to_data();
    assert_eq!(data.vertices.len(), 2);
    assert_eq!(
        data.edges,
        vec![EdgeData {
            origin: "node-a".into(),
            destination: "node-b".into(),
            kind: EdgeKind::ActiveView,
        }]
    );
}

#[test]
fn test_parent_and_child_progressions() {
    let mut engine = ReplayEngine::new(twenty_events());

    engine.seek(7).unwrap();
    assert!(engine.snapshot().to_data().edges.contains(&edge(1, 0, EdgeKind::ConnectingParent)));

    engine.seek(13).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(
        data.edges,
        vec![
            edge(0, 1, EdgeKind::ReadyChild),
            edge(1, 0, EdgeKind::ReadyParent),
            edge(1, 0, EdgeKind::ActiveView),
            edge(2, 0, EdgeKind::ActiveView),
        ]
    );
    let node1 = &data.vertices[1];
    assert_eq!(node1.tree_state, TreeState::ParentReady);
    assert_eq!(node1.parent.as_deref(), Some("node-0"));
    assert_eq!(data.vertices[0].children.get("node-1").map(String::as_str), Some(""));
}

#[test]
fn test_end_state() {
    let mut engine = ReplayEngine::new(twenty_events());
    engine.seek(19).unwrap();
    let data = engine.snapshot().to_data();

    // Retained by default even though it left.
    assert_eq!(data.vertices.len(), 5);
    assert!(!data.vertices[4].alive);
    assert_eq!(data.vertices[0].manager_state, ManagerState::Active);
    assert_eq!(data.vertices[1].parent_metadata, vec!["m0".to_string(), "m1".to_string()]);
    assert_eq!(data.vertices[0].children.get("node-1").map(String::as_str), Some("m1"));
    assert!(data.vertices[1].active.is_empty());
    assert_eq!(data.vertices[3].passive, vec!["node-2".to_string()]);
    assert!(data.edges.contains(&edge(3, 2, EdgeKind::PassiveView)));
    assert!(!data.edges.contains(&edge(1, 0, EdgeKind::ActiveView)));

    let text = engine.describe("node-0").unwrap();
    assert!(text.contains("manager: ACTIVE\n"));
    assert!(text.contains("  node-1 m1\n"));
}

#[test]
fn test_seek_forward_back_forward() {
    let mut engine = ReplayEngine::new(twenty_events());
    engine.seek(10).unwrap();
    let first = engine.snapshot().to_data();
    engine.seek(3).unwrap();
    assert_eq!(engine.snapshot().vertex_count(), 4);
    engine.seek(10).unwrap();
    assert_eq!(engine.snapshot().to_data(), first);
}

#[test]
fn test_checkpoints_match_full_replay() {
    let timeline = std::sync::Arc::new(twenty_events());
    let mut plain = ReplayEngine::new(timeline.clone());
    let mut checkpointed = ReplayEngine::with_config(
        timeline,
        ReplayConfig {
            checkpoint_interval: 3,
            ..ReplayConfig::default()
        },
    );

    checkpointed.seek(19).unwrap();
    for target in (0..20).rev() {
        plain.seek(target).unwrap();
        checkpointed.seek(target).unwrap();
        assert_eq!(checkpointed.snapshot().to_data(), plain.snapshot().to_data());
    }
}

#[test]
fn test_child_ready_before_hello_fails() {
    let timeline = Script::default()
        .hello(0)
        .child(0, 1, ChildState::Ready)
        .hello(1)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    let err = engine.seek(2).unwrap_err();
    assert!(matches!(err, ReplayError::Invariant { index: 1, .. }));
    assert!(matches!(engine.seek(0), Err(ReplayError::Poisoned { index: 1 })));
}

#[test]
fn test_child_ready_without_sync_fails() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .child(0, 1, ChildState::Connected)
        .child(0, 1, ChildState::Ready)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    let Err(ReplayError::Invariant { source, .. }) = engine.seek(3) else {
        panic!("expected an invariant violation");
    };
    assert_eq!(
        source,
        InvariantViolation::MissingEdge {
            origin: "node-0".into(),
            destination: "node-1".into(),
            kind: EdgeKind::SyncChild,
        }
    );
}

#[test]
fn test_disconnect_removes_exactly_one_child_edge() {
    let base = || {
        Script::default()
            .hello(0)
            .hello(1)
            .child(0, 1, ChildState::Connected)
            .child(0, 1, ChildState::Sync)
    };

    let mut engine = ReplayEngine::new(base().child(0, 1, ChildState::Disconnected).timeline());
    engine.seek(4).unwrap();
    let data = engine.snapshot().to_data();
    assert!(data.edges.is_empty());
    assert!(data.vertices[0].children.is_empty());

    // Connected only: neither sync nor ready edge exists.
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .child(0, 1, ChildState::Connected)
        .child(0, 1, ChildState::Disconnected)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);
    let Err(ReplayError::Invariant { source, .. }) = engine.seek(3) else {
        panic!("expected an invariant violation");
    };
    assert!(matches!(source, InvariantViolation::AmbiguousDisconnect { removed: 0, .. }));
}

#[test]
fn test_disconnect_from_ready_child() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .child(0, 1, ChildState::Connected)
        .child(0, 1, ChildState::Sync)
        .child(0, 1, ChildState::Ready)
        .child(0, 1, ChildState::Disconnected)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(4).unwrap();
    assert_eq!(engine.snapshot().to_data().edges, vec![edge(0, 1, EdgeKind::ReadyChild)]);

    engine.seek(5).unwrap();
    let data = engine.snapshot().to_data();
    assert!(data.edges.is_empty());
    assert!(data.vertices[0].children.is_empty());
}

/// Replay up to `index` and return the invariant it breaks there
fn violation_at(timeline: Timeline, index: usize) -> InvariantViolation {
    let mut engine = ReplayEngine::new(timeline);
    match engine.seek(index as i64) {
        Err(ReplayError::Invariant { index: at, source, .. }) if at == index => source,
        other => panic!("expected an invariant violation at {index}, got {other:?}"),
    }
}

#[test]
fn test_removing_absent_view_fails() {
    let active = Script::default().hello(0).hello(1).active(0, 1, false).timeline();
    assert_eq!(
        violation_at(active, 2),
        InvariantViolation::MissingEdge {
            origin: "node-0".into(),
            destination: "node-1".into(),
            kind: EdgeKind::ActiveView,
        }
    );

    let passive = Script::default().hello(0).hello(1).passive(0, 1, false).timeline();
    assert_eq!(
        violation_at(passive, 2),
        InvariantViolation::MissingEdge {
            origin: "node-0".into(),
            destination: "node-1".into(),
            kind: EdgeKind::PassiveView,
        }
    );
}

#[test]
fn test_metadata_for_unregistered_child_fails() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .push(0, EventPayload::ChildMetadataUpdate { child: addr(1), metadata: "m0".into() })
        .timeline();
    assert_eq!(
        violation_at(timeline, 2),
        InvariantViolation::UnknownChild {
            parent: "node-0".into(),
            child: "node-1".into(),
        }
    );
}

#[test]
fn test_parent_state_without_parent_fails() {
    let timeline = Script::default()
        .hello(0)
        .tree(0, TreeState::ParentConnecting, None, &[])
        .timeline();
    assert_eq!(
        violation_at(timeline, 1),
        InvariantViolation::MissingParent {
            node: "node-0".into(),
            state: TreeState::ParentConnecting,
        }
    );
}

#[test]
fn test_reparenting_from_datacenter_fails() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .hello(2)
        .tree(2, TreeState::ParentConnecting, Some(0), &[])
        .tree(2, TreeState::Datacenter, None, &[])
        .tree(2, TreeState::ParentConnecting, Some(1), &[])
        .timeline();
    assert_eq!(
        violation_at(timeline, 5),
        InvariantViolation::NoParentEdgeForState {
            node: "node-2".into(),
            state: TreeState::Datacenter,
        }
    );
}

#[test]
fn test_edges_progress_in_order() {
    let mut engine = ReplayEngine::new(twenty_events());
    let mut previous: Vec<EdgeData> = Vec::new();
    let mut installed = Vec::new();
    let mut removed = Vec::new();
    for index in 0..20 {
        engine.seek(index).unwrap();
        let edges = engine.snapshot().to_data().edges;
        installed.extend(
            edges
                .iter()
                .filter(|e| !previous.contains(e))
                .map(|e| (index, e.clone())),
        );
        removed.extend(
            previous
                .iter()
                .filter(|e| !edges.contains(e))
                .map(|e| (index, e.clone())),
        );
        previous = edges;
    }

    let chains = [
        (
            EdgeKind::ReadyParent,
            vec![EdgeKind::ConnectingParent, EdgeKind::ConnectedParent, EdgeKind::SyncParent],
        ),
        (EdgeKind::ReadyChild, vec![EdgeKind::ConnectedChild, EdgeKind::SyncChild]),
    ];
    let mut checked = 0;
    for (ready_at, ready) in &installed {
        let Some((_, chain)) = chains.iter().find(|(kind, _)| *kind == ready.kind) else {
            continue;
        };
        for kind in chain {
            let step = EdgeData { kind: *kind, ..ready.clone() };
            let installs: Vec<i64> = installed
                .iter()
                .filter(|(_, e)| *e == step)
                .map(|(i, _)| *i)
                .collect();
            let removals: Vec<i64> = removed
                .iter()
                .filter(|(_, e)| *e == step)
                .map(|(i, _)| *i)
                .collect();
            assert_eq!(installs.len(), 1, "{kind:?} installed once");
            assert_eq!(removals.len(), 1, "{kind:?} removed once");
            assert!(installs[0] < removals[0] && removals[0] <= *ready_at, "{kind:?} out of order");
        }
        checked += 1;
    }
    assert_eq!(checked, 2);
}

#[test]
fn test_reparenting_and_ready_refresh() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .hello(2)
        .tree(2, TreeState::ParentConnecting, Some(0), &[])
        .tree(2, TreeState::ParentConnected, Some(0), &[])
        .tree(2, TreeState::ParentSync, Some(0), &[])
        .tree(2, TreeState::ParentReady, Some(0), &[])
        .tree(2, TreeState::ParentReady, Some(0), &[1])
        .tree(2, TreeState::ParentConnecting, Some(1), &[0])
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(7).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(data.edges, vec![edge(2, 0, EdgeKind::ReadyParent)]);
    assert_eq!(data.vertices[2].grandparents, vec!["node-1".to_string()]);

    engine.seek(8).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(data.edges, vec![edge(2, 1, EdgeKind::ConnectingParent)]);
    assert_eq!(data.vertices[2].parent.as_deref(), Some("node-1"));
    assert_eq!(data.vertices[2].grandparents, vec!["node-0".to_string()]);
}

#[test]
fn test_inactive_and_datacenter() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .tree(1, TreeState::ParentConnecting, Some(0), &[])
        .push(1, EventPayload::ParentMetadataUpdate { metadata: vec!["x".into()] })
        .tree(1, TreeState::Inactive, None, &[])
        .tree(0, TreeState::Datacenter, None, &[])
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(5).unwrap();
    let data = engine.snapshot().to_data();
    assert!(data.edges.is_empty());
    assert_eq!(data.vertices[1].parent, None);
    assert!(data.vertices[1].parent_metadata.is_empty());
    assert_eq!(data.vertices[0].tree_state, TreeState::Datacenter);
}

#[test]
fn test_goodbye_drops_outgoing_edges_only() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .active(0, 1, true)
        .active(1, 0, true)
        .push(0, EventPayload::Goodbye)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(4).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(data.edges, vec![edge(1, 0, EdgeKind::ActiveView)]);
    assert!(!data.vertices[0].alive);
}

#[test]
fn test_purge_isolated_policy() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .active(1, 0, true)
        .push(0, EventPayload::Goodbye)
        .active(1, 0, false)
        .timeline();
    let config = ReplayConfig {
        deletion_policy: DeletionPolicy::PurgeIsolated,
        ..ReplayConfig::default()
    };
    let mut engine = ReplayEngine::with_config(timeline, config);

    // Still pointed at by node-1's active view.
    engine.seek(3).unwrap();
    assert_eq!(engine.snapshot().vertex_count(), 2);

    engine.seek(4).unwrap();
    // View removals never purge.
    assert_eq!(engine.snapshot().vertex_count(), 2);
}

#[test]
fn test_purge_on_goodbye_when_unreferenced() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .active(0, 1, true)
        .push(1, EventPayload::Goodbye)
        .push(0, EventPayload::Goodbye)
        .timeline();
    let config = ReplayConfig {
        deletion_policy: DeletionPolicy::PurgeIsolated,
        ..ReplayConfig::default()
    };
    let mut engine = ReplayEngine::with_config(timeline, config);

    engine.seek(3).unwrap();
    assert_eq!(engine.snapshot().vertex_count(), 2);
    engine.seek(4).unwrap();
    assert_eq!(engine.snapshot().vertex_count(), 0);
}

#[test]
fn test_rejoin_after_goodbye() {
    let timeline = Script::default()
        .hello(0)
        .push(0, EventPayload::Goodbye)
        .hello(0)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(2).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(data.vertices.len(), 1);
    assert!(data.vertices[0].alive);
    assert!(engine.snapshot().vertex_by_name("node-0").unwrap().alive);
}

#[test]
fn test_rejoined_node_keeps_peer_edges() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .active(0, 1, true)
        .push(1, EventPayload::Goodbye)
        .hello(1)
        .active(0, 1, false)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(4).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(data.vertices.len(), 2);
    assert!(data.vertices[1].alive);
    assert_eq!(data.edges, vec![edge(0, 1, EdgeKind::ActiveView)]);

    engine.seek(5).unwrap();
    let data = engine.snapshot().to_data();
    assert!(data.edges.is_empty());
    assert!(data.vertices[0].active.is_empty());
}

#[test]
fn test_rejoined_child_can_disconnect() {
    let timeline = Script::default()
        .hello(0)
        .hello(1)
        .child(0, 1, ChildState::Connected)
        .child(0, 1, ChildState::Sync)
        .push(1, EventPayload::Goodbye)
        .hello(1)
        .child(0, 1, ChildState::Disconnected)
        .timeline();
    let mut engine = ReplayEngine::new(timeline);

    engine.seek(6).unwrap();
    let data = engine.snapshot().to_data();
    assert_eq!(data.vertices.len(), 2);
    assert!(data.edges.is_empty());
    assert!(data.vertices[0].children.is_empty());
}

#[test]
fn test_duplicate_hello_fails() {
    let timeline = Script::default().hello(0).hello(0).timeline();
    let mut engine = ReplayEngine::new(timeline);
    assert!(matches!(
        engine.seek(1),
        Err(ReplayError::Invariant {
            source: InvariantViolation::DuplicateVertex { .. },
            ..
        })
    ));
}

proptest! {
    #[test]
    fn prop_seek_is_path_independent(i in 0i64..20, j in 0i64..20, interval in 0usize..6) {
        let timeline = std::sync::Arc::new(twenty_events());
        let config = ReplayConfig { checkpoint_interval: interval, ..ReplayConfig::default() };

        let mut direct = ReplayEngine::with_config(timeline.clone(), config.clone());
        direct.seek(i).unwrap();

        let mut detour = ReplayEngine::with_config(timeline, config);
        detour.seek(j).unwrap();
        detour.seek(i).unwrap();

        prop_assert_eq!(detour.current_index(), direct.current_index());
        prop_assert_eq!(detour.snapshot().to_data(), direct.snapshot().to_data());
    }
}
