//! Failover tests.
//!
//! Tests for what happens when a probed path gives up:
//! - Primary election and path status notifications
//! - Re-routing of stranded chunks
//! - Total loss of connectivity

use std::net::SocketAddr;
use std::time::Duration;

use sctp_ap::association::{Association, AssociationCoordinator, AssociationEvent, DataChunk, Outbound};
use sctp_ap::config::{AssociationConfig, ProbingConfig};
use sctp_ap::error::Error;
use sctp_ap::probing::{FailoverOutcome, TimeoutOutcome};
use sctp_ap::types::{AssociationId, AssociationState, PathId, Tsn};
use tokio::sync::broadcast;

// ============================================================================
// Test Infrastructure
// ============================================================================

const GIVE_UP: Duration = Duration::from_secs(5);

fn probing() -> ProbingConfig {
    ProbingConfig {
        period: Duration::from_secs(1),
        give_up_timeout: GIVE_UP,
        burst_limit: Some(3),
        ..Default::default()
    }
}

fn association(paths: u16, probing: ProbingConfig) -> Association {
    let mut assoc = Association::simulated(AssociationId(9), AssociationConfig::default(), probing);
    for n in 0..paths {
        assoc
            .add_path(SocketAddr::from(([192, 168, n as u8, 1], 5000)))
            .unwrap();
    }
    assoc
}

/// Fire everything due up to `until`, collecting give-up outcomes.
fn run_until(assoc: &mut Association, until: Duration) -> Vec<FailoverOutcome> {
    let mut outcomes = Vec::new();
    while let Some(timer) = assoc.timers_mut().pop_due(until) {
        if let TimeoutOutcome::GaveUp(outcome) = assoc.process_timeout(timer.handle) {
            outcomes.push(outcome);
        }
    }
    assoc.timers_mut().advance_clock(until);
    outcomes
}

fn drain(rx: &mut broadcast::Receiver<AssociationEvent>) -> Vec<AssociationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn retransmissions(outbound: &[Outbound]) -> Vec<(PathId, Tsn)> {
    outbound
        .iter()
        .filter_map(|out| match out {
            Outbound::Retransmission { path, tsn, .. } => Some((*path, *tsn)),
            Outbound::Heartbeat { .. } => None,
        })
        .collect()
}

// ============================================================================
// Primary election
// ============================================================================

#[test]
fn test_primary_fails_over_to_next_path() {
    let mut assoc = association(3, probing());
    let mut events = assoc.subscribe();

    assoc.activate_probing(PathId(0)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    assert_eq!(
        outcomes,
        vec![FailoverOutcome::FailedOver {
            successor: PathId(1),
            was_active: true,
            rerouted: 0,
        }]
    );
    assert_eq!(assoc.primary_path(), Some(PathId(1)));
    assert_eq!(assoc.paths().filter(|p| p.is_primary()).count(), 1);
    assert_eq!(assoc.stats().failovers, 1);
    assert_eq!(assoc.state(), AssociationState::Established);

    assert_eq!(
        drain(&mut events),
        vec![
            AssociationEvent::PrimaryPathChanged {
                from: Some(PathId(0)),
                to: PathId(1),
            },
            AssociationEvent::PathStatusChanged {
                path: PathId(0),
                active: false,
            },
        ]
    );
}

#[test]
fn test_secondary_failure_keeps_primary() {
    let mut assoc = association(3, probing());
    let mut events = assoc.subscribe();

    assoc.activate_probing(PathId(2)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    // Successor selection wraps around to the first path.
    assert!(matches!(
        outcomes[..],
        [FailoverOutcome::FailedOver { successor: PathId(0), .. }]
    ));
    assert_eq!(assoc.primary_path(), Some(PathId(0)));
    assert_eq!(
        drain(&mut events),
        vec![AssociationEvent::PathStatusChanged {
            path: PathId(2),
            active: false,
        }]
    );
}

#[test]
fn test_already_inactive_path_is_not_reported_again() {
    let mut assoc = association(2, probing());
    assoc.activate_probing(PathId(1)).unwrap();
    assoc.set_path_active(PathId(1), false);
    let mut events = assoc.subscribe();

    let outcomes = run_until(&mut assoc, GIVE_UP);

    assert!(matches!(
        outcomes[..],
        [FailoverOutcome::FailedOver { was_active: false, .. }]
    ));
    assert!(drain(&mut events).is_empty());
    assert_eq!(assoc.stats().failovers, 0);
}

#[test]
fn test_recovered_path_reports_active() {
    let mut assoc = association(2, probing());
    assoc.activate_probing(PathId(0)).unwrap();
    run_until(&mut assoc, GIVE_UP);
    let mut events = assoc.subscribe();

    assoc.on_heartbeat_ack(PathId(0)).unwrap();

    assert!(assoc.get_path(PathId(0)).unwrap().is_active());
    // The successor keeps the primary role.
    assert_eq!(assoc.primary_path(), Some(PathId(1)));
    assert_eq!(
        drain(&mut events),
        vec![AssociationEvent::PathStatusChanged {
            path: PathId(0),
            active: true,
        }]
    );
}

// ============================================================================
// Re-routing
// ============================================================================

#[test]
fn test_only_stranded_chunks_move() {
    let mut assoc = association(3, probing());
    assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();
    assoc
        .enqueue_chunk(DataChunk::new(Tsn(2), PathId(0), 100).acknowledged())
        .unwrap();
    assoc
        .enqueue_chunk(DataChunk::new(Tsn(3), PathId(0), 100).acknowledged().reneged())
        .unwrap();
    assoc.enqueue_chunk(DataChunk::new(Tsn(4), PathId(1), 200)).unwrap();
    assoc
        .enqueue_chunk(DataChunk::new(Tsn(5), PathId(0), 100).not_outstanding())
        .unwrap();
    assoc.enqueue_chunk(DataChunk::new(Tsn(6), PathId(2), 50)).unwrap();

    let untouched: Vec<DataChunk> = [2, 4, 5, 6]
        .iter()
        .map(|&n| assoc.payload_queue().get(Tsn(n)).unwrap().clone())
        .collect();

    assoc.activate_probing(PathId(0)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    assert!(matches!(
        outcomes[..],
        [FailoverOutcome::FailedOver { successor: PathId(1), rerouted: 2, .. }]
    ));

    let queue = assoc.payload_queue();
    assert_eq!(queue.get(Tsn(1)).unwrap().last_destination(), PathId(1));
    assert_eq!(queue.get(Tsn(3)).unwrap().last_destination(), PathId(1));
    assert!(queue.get(Tsn(3)).unwrap().is_reneged());
    for chunk in &untouched {
        assert_eq!(queue.get(chunk.tsn()).unwrap(), chunk);
    }

    let failed = assoc.get_path(PathId(0)).unwrap();
    assert_eq!(failed.stats().timer_based_retransmissions, 2);
    assert_eq!(failed.outstanding_bytes(), 0);
    assert_eq!(assoc.stats().rtx_timeouts, 2);

    // The re-routed outstanding chunk now counts against its new path.
    assert_eq!(assoc.get_path(PathId(1)).unwrap().outstanding_bytes(), 300);

    let outbound = assoc.drain_outbound();
    assert_eq!(
        retransmissions(&outbound),
        vec![(PathId(1), Tsn(1)), (PathId(1), Tsn(3))]
    );
    assert_eq!(assoc.pending_retransmissions().count(), 0);
    assert_eq!(assoc.stats().retransmissions_sent, 2);
}

#[test]
fn test_reroute_can_be_disabled() {
    let config = ProbingConfig {
        reroute_on_give_up: false,
        ..probing()
    };
    let mut assoc = association(2, config);
    assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();

    assoc.activate_probing(PathId(0)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    // Demotion and primary election still happen.
    assert!(matches!(
        outcomes[..],
        [FailoverOutcome::FailedOver { rerouted: 0, .. }]
    ));
    assert_eq!(assoc.primary_path(), Some(PathId(1)));
    assert_eq!(
        assoc.payload_queue().get(Tsn(1)).unwrap().last_destination(),
        PathId(0)
    );
    assert!(retransmissions(&assoc.drain_outbound()).is_empty());
    assert_eq!(assoc.stats().rtx_timeouts, 0);
}

#[test]
fn test_reroute_skips_inactive_successor() {
    let mut assoc = association(3, probing());
    assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();
    assoc.set_path_active(PathId(1), false);

    assoc.activate_probing(PathId(0)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    assert!(matches!(
        outcomes[..],
        [FailoverOutcome::FailedOver { successor: PathId(2), rerouted: 1, .. }]
    ));
    assert_eq!(assoc.primary_path(), Some(PathId(2)));
    assert_eq!(
        assoc.payload_queue().get(Tsn(1)).unwrap().last_destination(),
        PathId(2)
    );
    assert_eq!(
        retransmissions(&assoc.drain_outbound()),
        vec![(PathId(2), Tsn(1))]
    );

    assoc.ack_chunk(Tsn(1)).unwrap();
    assert_eq!(assoc.get_path(PathId(2)).unwrap().outstanding_bytes(), 0);
}

// ============================================================================
// Connection loss
// ============================================================================

#[test]
fn test_every_path_failing_loses_connection_once() {
    let mut assoc = association(2, probing());
    assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();
    let mut events = assoc.subscribe();

    assoc.activate_probing(PathId(0)).unwrap();
    assoc.activate_probing(PathId(1)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1], FailoverOutcome::ConnectionLost);
    assert!(assoc.all_paths_inactive());
    assert!(assoc.state().is_terminal());
    assert_eq!(assoc.stats().connection_lost_notifications, 1);

    let lost = drain(&mut events)
        .into_iter()
        .filter(|e| *e == AssociationEvent::ConnectionLost)
        .count();
    assert_eq!(lost, 1);

    // Terminal: probing stays off and nothing is left to fire.
    assert_eq!(assoc.timers().pending_count(), 0);
    assert!(!assoc.activate_probing(PathId(0)).unwrap());
    assert!(matches!(
        assoc.on_heartbeat_ack(PathId(0)),
        Err(Error::ConnectionLost)
    ));
    run_until(&mut assoc, Duration::from_secs(60));
    assert!(drain(&mut events).is_empty());
}

#[test]
fn test_single_path_loss_skips_rerouting() {
    let mut assoc = association(1, probing());
    assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();

    assoc.activate_probing(PathId(0)).unwrap();
    let outcomes = run_until(&mut assoc, GIVE_UP);

    assert_eq!(outcomes, vec![FailoverOutcome::ConnectionLost]);
    assert_eq!(
        assoc.payload_queue().get(Tsn(1)).unwrap().last_destination(),
        PathId(0)
    );
    assert!(assoc.drain_outbound().iter().all(|o| matches!(o, Outbound::Heartbeat { .. })));
    assert_eq!(assoc.stats().failovers, 0);
}
