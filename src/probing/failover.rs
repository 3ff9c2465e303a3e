//! Failover procedure run when a probed path gives up.

use tracing::{info, warn};

use super::FailoverOutcome;
use crate::association::{DataChunk, ProbeHost, RetransmissionQueue};
use crate::types::{PathId, Tsn};

/// Demote `failed`, elect a successor, detect connectivity loss and move
/// stranded chunks. The caller has already deactivated the failed path's
/// probing session.
pub(super) fn run<H: ProbeHost>(failed: PathId, reroute: bool, host: &mut H) -> FailoverOutcome {
    let was_active = host.path(failed).is_some_and(|p| p.is_active());
    host.set_path_active(failed, false);

    let successor = host.next_path(failed);
    if host.primary_path() == Some(failed) {
        if let Some(next) = successor {
            host.set_primary_path(next);
        }
    }

    // Terminal: nothing else may run, the successor is unusable.
    if host.all_paths_inactive() {
        warn!(
            association = %host.association_id(),
            path = %failed,
            "All paths inactive, connection lost"
        );
        host.notify_connection_lost();
        return FailoverOutcome::ConnectionLost;
    }

    if was_active {
        host.notify_path_status_changed(failed, false);
    }

    let Some(successor) = successor else {
        warn!(path = %failed, "Paths remain active but none follows the failed path");
        return FailoverOutcome::NoSuccessor;
    };

    let rerouted = if reroute {
        let moved = requeue_stranded(failed, successor, host);
        host.flush_pending_data(successor);
        moved
    } else {
        0
    };

    info!(
        association = %host.association_id(),
        path = %failed,
        successor = %successor,
        rerouted,
        "Path failed over"
    );

    FailoverOutcome::FailedOver {
        successor,
        was_active,
        rerouted,
    }
}

/// Move every chunk still owed by `failed` to `successor`.
fn requeue_stranded<H: ProbeHost>(failed: PathId, successor: PathId, host: &mut H) -> usize {
    let mut stranded: Vec<Tsn> = Vec::new();
    host.retransmission_queue().for_each_chunk(&mut |chunk: &DataChunk| {
        if chunk.last_destination() == failed && chunk.needs_retransmission() {
            stranded.push(chunk.tsn());
        }
    });

    let mut moved = 0;
    for tsn in stranded {
        if host.retransmission_queue().move_chunk(tsn, successor) {
            host.record_timer_based_retransmission(failed, tsn);
            moved += 1;
        }
    }
    moved
}
