//! Multi-homed association hosting one probing controller per path.
//!
//! The [`Association`] owns the path arena, the retransmission queue, the
//! timer substrate and the upper-layer event channel. It implements
//! [`AssociationCoordinator`] so that controllers can drive failover against
//! it, and dispatches fired timers back to the controller that owns them.

mod coordinator;
mod path;
mod retransmission;

pub use coordinator::{AssociationCoordinator, ProbeHost};
pub use path::{PathStats, PathView};
pub use retransmission::{DataChunk, PayloadQueue, RetransmissionQueue};

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::ops::Bound;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::config::{AssociationConfig, ProbingConfig};
use crate::error::{Error, Result};
use crate::probing::{ActiveProbing, TimeoutOutcome};
use crate::timer::{EventQueue, TimerHandle, TimerService};
use crate::types::{AssociationId, AssociationState, PathId, Tsn};

/// Notifications delivered to the upper layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationEvent {
    /// A path changed between active and inactive.
    PathStatusChanged { path: PathId, active: bool },
    /// Primary path reassigned.
    PrimaryPathChanged { from: Option<PathId>, to: PathId },
    /// Every path is inactive. Sent once.
    ConnectionLost,
}

/// Something the association handed to the transport stack for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    Heartbeat { path: PathId, at: Duration },
    Retransmission { path: PathId, tsn: Tsn, at: Duration },
}

/// Association-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationStats {
    /// Probe heartbeats sent on all paths.
    pub heartbeats_sent: u64,
    /// Chunks re-routed by give-up timeouts.
    pub rtx_timeouts: u64,
    /// Retransmitted chunks sent.
    pub retransmissions_sent: u64,
    /// Give-ups that left the association usable.
    pub failovers: u64,
    /// Connection-lost notifications delivered.
    pub connection_lost_notifications: u64,
}

struct PathSlot {
    view: PathView,
    /// `None` while the controller is executing a callback.
    probing: Option<ActiveProbing>,
}

/// A multi-homed association.
pub struct Association<T: TimerService = EventQueue> {
    id: AssociationId,
    config: AssociationConfig,
    probing: ProbingConfig,
    paths: BTreeMap<PathId, PathSlot>,
    next_path_id: u16,
    primary: Option<PathId>,
    queue: PayloadQueue,
    /// Re-routed chunks waiting to be sent again.
    pending_rtx: VecDeque<Tsn>,
    outbound: Vec<Outbound>,
    timers: T,
    stats: AssociationStats,
    state: AssociationState,
    event_tx: broadcast::Sender<AssociationEvent>,
}

impl Association<EventQueue> {
    /// Create an association driven by its own virtual-time queue.
    pub fn simulated(id: AssociationId, config: AssociationConfig, probing: ProbingConfig) -> Self {
        Self::new(id, config, probing, EventQueue::new())
    }

    /// Fire every timer due up to `until`, then move the clock there.
    ///
    /// Returns the number of timers dispatched.
    pub fn advance_to(&mut self, until: Duration) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.timers.pop_due(until) {
            self.process_timeout(timer.handle);
            fired += 1;
        }
        self.timers.advance_clock(until);
        fired
    }

    pub fn advance_by(&mut self, delta: Duration) -> usize {
        let until = self.timers.now().saturating_add(delta);
        self.advance_to(until)
    }
}

impl<T: TimerService> Association<T> {
    /// Create an association scheduling on `timers`.
    pub fn new(id: AssociationId, config: AssociationConfig, probing: ProbingConfig, timers: T) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            id,
            config,
            probing,
            paths: BTreeMap::new(),
            next_path_id: 0,
            primary: None,
            queue: PayloadQueue::new(),
            pending_rtx: VecDeque::new(),
            outbound: Vec::new(),
            timers,
            stats: AssociationStats::default(),
            state: AssociationState::Established,
            event_tx,
        }
    }

    pub fn id(&self) -> AssociationId {
        self.id
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn stats(&self) -> AssociationStats {
        self.stats
    }

    /// Subscribe to upper-layer notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AssociationEvent> {
        self.event_tx.subscribe()
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// All paths in enumeration order.
    pub fn paths(&self) -> impl Iterator<Item = &PathView> {
        self.paths.values().map(|slot| &slot.view)
    }

    pub fn payload_queue(&self) -> &PayloadQueue {
        &self.queue
    }

    /// Chunks re-routed and not yet sent again.
    pub fn pending_retransmissions(&self) -> impl Iterator<Item = Tsn> + '_ {
        self.pending_rtx.iter().copied()
    }

    /// Take everything queued for the transport since the last drain.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    /// Add a destination path. The first path becomes primary.
    pub fn add_path(&mut self, remote_addr: SocketAddr) -> Result<PathId> {
        if self.state.is_terminal() {
            return Err(Error::ConnectionLost);
        }

        if self.paths.len() >= self.config.max_paths {
            return Err(Error::PathLimit(self.config.max_paths));
        }

        if self.paths.values().any(|s| s.view.remote_addr() == remote_addr) {
            return Err(Error::DuplicatePath(remote_addr));
        }

        let id = PathId(self.next_path_id);
        self.next_path_id = self
            .next_path_id
            .checked_add(1)
            .ok_or(Error::PathLimit(usize::from(u16::MAX)))?;

        let tag = format!("{}:{}", self.id, remote_addr);
        let slot = PathSlot {
            view: PathView::new(id, remote_addr, self.config.initial_cwnd),
            probing: Some(ActiveProbing::new(id, tag, &self.probing)),
        };
        self.paths.insert(id, slot);

        if self.primary.is_none() {
            self.set_primary_path(id);
        }

        debug!(association = %self.id, path = %id, addr = %remote_addr, "Path added");
        Ok(id)
    }

    /// Remove a path, cancelling its probing timers.
    ///
    /// Chunks last sent to the path move to the next active path and are
    /// queued for retransmission; with no active path left they are dropped.
    pub fn remove_path(&mut self, id: PathId) -> Result<PathView> {
        let mut slot = self.paths.remove(&id).ok_or(Error::PathNotFound(id))?;
        if let Some(probing) = slot.probing.as_mut() {
            probing.release(&mut self.timers);
        }

        if self.primary == Some(id) {
            self.primary = None;
            let replacement = self
                .paths
                .iter()
                .find(|(_, s)| s.view.is_active())
                .map(|(pid, _)| *pid);
            if let Some(next) = replacement {
                self.set_primary_path(next);
            }
        }

        self.reroute_from_removed(id);

        slot.view.set_primary(false);
        debug!(association = %self.id, path = %id, "Path removed");
        Ok(slot.view)
    }

    pub fn get_path(&self, id: PathId) -> Result<&PathView> {
        self.paths
            .get(&id)
            .map(|slot| &slot.view)
            .ok_or(Error::PathNotFound(id))
    }

    /// Update a path's congestion window.
    pub fn set_cwnd(&mut self, id: PathId, cwnd: u32) -> Result<()> {
        self.slot_mut(id)?.view.set_cwnd(cwnd);
        Ok(())
    }

    /// Override a path's outstanding byte count.
    pub fn set_outstanding_bytes(&mut self, id: PathId, bytes: u32) -> Result<()> {
        self.slot_mut(id)?.view.set_outstanding_bytes(bytes);
        Ok(())
    }

    /// Track a chunk sent by the transport stack.
    pub fn enqueue_chunk(&mut self, chunk: DataChunk) -> Result<()> {
        let destination = chunk.last_destination();
        let outstanding = (chunk.counts_as_outstanding() && !chunk.is_acknowledged())
            .then_some(chunk.length());
        let slot = self
            .paths
            .get_mut(&destination)
            .ok_or(Error::PathNotFound(destination))?;
        self.queue.insert(chunk)?;
        if let Some(bytes) = outstanding {
            slot.view.add_outstanding(bytes);
        }
        Ok(())
    }

    /// Record a SACK for one chunk.
    pub fn ack_chunk(&mut self, tsn: Tsn) -> Result<()> {
        if let Some((path, bytes)) = self.queue.acknowledge(tsn)? {
            if let Some(slot) = self.paths.get_mut(&path) {
                slot.view.release_outstanding(bytes);
            }
        }
        self.pending_rtx.retain(|pending| *pending != tsn);
        Ok(())
    }

    /// Record that the receiver reneged on a chunk.
    ///
    /// Returns false if the chunk was never acknowledged.
    pub fn renege_chunk(&mut self, tsn: Tsn) -> Result<bool> {
        self.queue.renege(tsn)
    }

    /// Failure-suspicion signal: start probing `id` if it is not already.
    pub fn activate_probing(&mut self, id: PathId) -> Result<bool> {
        self.with_probing(id, |probing, assoc| probing.activate_if_needed(assoc))
    }

    pub fn deactivate_probing_on(&mut self, id: PathId) -> Result<()> {
        self.with_probing(id, |probing, assoc| probing.deactivate(&mut assoc.timers))
    }

    /// Turn probing off on every path.
    pub fn deactivate_probing_on_all_paths(&mut self) {
        let Some(first) = self.paths.keys().next().copied() else {
            return;
        };
        if let Err(e) = self.with_probing(first, |probing, assoc| probing.deactivate_on_all_paths(assoc)) {
            warn!(association = %self.id, error = %e, "Failed to deactivate probing");
        }
    }

    pub fn is_probing(&self, id: PathId) -> bool {
        self.paths
            .get(&id)
            .and_then(|slot| slot.probing.as_ref())
            .is_some_and(ActiveProbing::is_activated)
    }

    /// Borrow a path's probing controller.
    pub fn probing(&self, id: PathId) -> Option<&ActiveProbing> {
        self.paths.get(&id).and_then(|slot| slot.probing.as_ref())
    }

    /// Which path's controller owns `handle`.
    pub fn timer_owner(&self, handle: TimerHandle) -> Option<PathId> {
        self.paths
            .iter()
            .find(|(_, slot)| slot.probing.as_ref().is_some_and(|p| p.is_own_timer(handle)))
            .map(|(id, _)| *id)
    }

    /// Dispatch a fired timer to the controller that owns it.
    pub fn process_timeout(&mut self, handle: TimerHandle) -> TimeoutOutcome {
        let Some(owner) = self.timer_owner(handle) else {
            warn!(association = %self.id, timer = %handle, "Timeout for unknown timer");
            return TimeoutOutcome::Unknown;
        };

        match self.with_probing(owner, |probing, assoc| probing.process_timeout(handle, assoc)) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(association = %self.id, timer = %handle, error = %e, "Timeout not dispatched");
                TimeoutOutcome::Unknown
            }
        }
    }

    /// A HEARTBEAT-ACK arrived on `id`: the path answers again.
    pub fn on_heartbeat_ack(&mut self, id: PathId) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::ConnectionLost);
        }

        self.deactivate_probing_on(id)?;

        let slot = self.slot_mut(id)?;
        if !slot.view.is_active() {
            slot.view.set_active(true);
            info!(association = %self.id, path = %id, "Path active again");
            self.notify_path_status_changed(id, true);
            if self.primary.is_none() {
                self.set_primary_path(id);
            }
        }
        Ok(())
    }

    /// A SACK arrived: the peer is reachable, stop all probing.
    pub fn on_sack(&mut self, acked: &[Tsn]) -> Result<()> {
        for tsn in acked {
            self.ack_chunk(*tsn)?;
        }
        self.deactivate_probing_on_all_paths();
        Ok(())
    }

    fn reroute_from_removed(&mut self, removed: PathId) {
        let stranded: Vec<Tsn> = self.queue.chunks_on(removed).map(DataChunk::tsn).collect();
        if stranded.is_empty() {
            return;
        }

        let Some(successor) = self.next_path(removed) else {
            for tsn in &stranded {
                self.queue.remove(*tsn);
            }
            self.pending_rtx.retain(|tsn| !stranded.contains(tsn));
            warn!(
                association = %self.id,
                path = %removed,
                dropped = stranded.len(),
                "No active path left, dropping chunks of removed path"
            );
            return;
        };

        for tsn in &stranded {
            self.queue.move_chunk(*tsn, successor);
            let owed = self.queue.get(*tsn).is_some_and(DataChunk::needs_retransmission);
            if owed && !self.pending_rtx.contains(tsn) {
                self.pending_rtx.push_back(*tsn);
            }
        }
        debug!(
            association = %self.id,
            path = %removed,
            successor = %successor,
            moved = stranded.len(),
            "Chunks of removed path re-routed"
        );
        self.flush_pending_data(successor);
    }

    fn slot_mut(&mut self, id: PathId) -> Result<&mut PathSlot> {
        self.paths.get_mut(&id).ok_or(Error::PathNotFound(id))
    }

    /// Run `f` with the path's controller checked out of its slot, so the
    /// controller can take the association mutably.
    fn with_probing<R>(
        &mut self,
        id: PathId,
        f: impl FnOnce(&mut ActiveProbing, &mut Self) -> R,
    ) -> Result<R> {
        let mut probing = self
            .slot_mut(id)?
            .probing
            .take()
            .ok_or_else(|| Error::Other(anyhow::anyhow!("probing on path {id} is busy")))?;

        let result = f(&mut probing, self);

        match self.paths.get_mut(&id) {
            Some(slot) => slot.probing = Some(probing),
            None => probing.release(&mut self.timers),
        }
        Ok(result)
    }

    fn emit(&self, event: AssociationEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl<T: TimerService> TimerService for Association<T> {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.timers.schedule(delay)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.cancel(handle);
    }

    fn now(&self) -> Duration {
        self.timers.now()
    }
}

impl<T: TimerService> AssociationCoordinator for Association<T> {
    type Queue = PayloadQueue;

    fn association_id(&self) -> AssociationId {
        self.id
    }

    fn path(&self, id: PathId) -> Option<&PathView> {
        self.paths.get(&id).map(|slot| &slot.view)
    }

    fn path_ids(&self) -> Vec<PathId> {
        self.paths.keys().copied().collect()
    }

    fn primary_path(&self) -> Option<PathId> {
        self.primary
    }

    fn set_primary_path(&mut self, id: PathId) {
        if !self.paths.contains_key(&id) || self.primary == Some(id) {
            return;
        }

        let previous = self.primary;
        for (pid, slot) in &mut self.paths {
            slot.view.set_primary(*pid == id);
        }
        self.primary = Some(id);

        debug!(association = %self.id, from = ?previous, to = %id, "Primary path changed");
        self.emit(AssociationEvent::PrimaryPathChanged { from: previous, to: id });
    }

    fn next_path(&self, after: PathId) -> Option<PathId> {
        self.paths
            .range((Bound::Excluded(after), Bound::Unbounded))
            .chain(self.paths.range(..after))
            .find(|(_, slot)| slot.view.is_active())
            .map(|(id, _)| *id)
    }

    fn all_paths_inactive(&self) -> bool {
        self.paths.values().all(|slot| !slot.view.is_active())
    }

    fn is_connection_lost(&self) -> bool {
        self.state.is_terminal()
    }

    fn set_path_active(&mut self, id: PathId, active: bool) {
        if let Some(slot) = self.paths.get_mut(&id) {
            slot.view.set_active(active);
        }
    }

    fn send_heartbeat(&mut self, id: PathId) {
        let at = self.timers.now();
        let Some(slot) = self.paths.get_mut(&id) else {
            return;
        };
        slot.view.stats_mut().heartbeats_sent += 1;
        self.stats.heartbeats_sent += 1;
        self.outbound.push(Outbound::Heartbeat { path: id, at });
        trace!(association = %self.id, path = %id, ?at, "Probe heartbeat");
    }

    fn deactivate_probing(&mut self, id: PathId) {
        if let Some(probing) = self.paths.get_mut(&id).and_then(|slot| slot.probing.as_mut()) {
            probing.deactivate(&mut self.timers);
        }
    }

    fn notify_connection_lost(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = AssociationState::ConnectionLost;
        self.stats.connection_lost_notifications += 1;

        // Nothing may fire on a dead association.
        for slot in self.paths.values_mut() {
            if let Some(probing) = slot.probing.as_mut() {
                probing.release(&mut self.timers);
            }
        }

        warn!(association = %self.id, "Connection lost");
        self.emit(AssociationEvent::ConnectionLost);
    }

    fn notify_path_status_changed(&mut self, id: PathId, active: bool) {
        if !active {
            self.stats.failovers += 1;
        }
        info!(association = %self.id, path = %id, active, "Path status changed");
        self.emit(AssociationEvent::PathStatusChanged { path: id, active });
    }

    fn record_timer_based_retransmission(&mut self, from: PathId, tsn: Tsn) {
        let released = self
            .queue
            .get(tsn)
            .filter(|c| c.counts_as_outstanding() && !c.is_acknowledged())
            .map(DataChunk::length);

        if let Some(slot) = self.paths.get_mut(&from) {
            slot.view.stats_mut().timer_based_retransmissions += 1;
            if let Some(bytes) = released {
                slot.view.release_outstanding(bytes);
            }
        }
        self.stats.rtx_timeouts += 1;
        if !self.pending_rtx.contains(&tsn) {
            self.pending_rtx.push_back(tsn);
        }
        trace!(association = %self.id, path = %from, %tsn, "Timer-based retransmission");
    }

    fn retransmission_queue(&mut self) -> &mut PayloadQueue {
        &mut self.queue
    }

    fn flush_pending_data(&mut self, from: PathId) {
        if self.pending_rtx.is_empty() {
            return;
        }

        let mut order = vec![from];
        order.extend(
            self.paths
                .range((Bound::Excluded(from), Bound::Unbounded))
                .chain(self.paths.range(..from))
                .map(|(id, _)| *id),
        );

        let at = self.timers.now();
        for path in order {
            let Some(slot) = self.paths.get_mut(&path) else {
                continue;
            };
            if !slot.view.is_active() {
                continue;
            }

            let queue = &self.queue;
            let (ready, waiting): (VecDeque<Tsn>, VecDeque<Tsn>) = self
                .pending_rtx
                .drain(..)
                .partition(|tsn| queue.get(*tsn).is_some_and(|c| c.last_destination() == path));
            self.pending_rtx = waiting;

            for tsn in ready {
                if let Some(chunk) = self.queue.get(tsn) {
                    if chunk.counts_as_outstanding() && !chunk.is_acknowledged() {
                        slot.view.add_outstanding(chunk.length());
                    }
                }
                slot.view.stats_mut().retransmissions_sent += 1;
                self.stats.retransmissions_sent += 1;
                self.outbound.push(Outbound::Retransmission { path, tsn, at });
            }
        }

        debug!(
            association = %self.id,
            from = %from,
            remaining = self.pending_rtx.len(),
            "Flushed pending data"
        );
    }
}

impl<T: TimerService> Drop for Association<T> {
    fn drop(&mut self) {
        for slot in self.paths.values_mut() {
            if let Some(probing) = slot.probing.as_mut() {
                probing.release(&mut self.timers);
            }
        }
    }
}

// Intentionally abbreviated Debug output
#[allow(clippy::missing_fields_in_debug)]
impl<T: TimerService> std::fmt::Debug for Association<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("paths", &self.paths.len())
            .field("primary", &self.primary)
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, n], 5000))
    }

    fn association(paths: u8) -> Association {
        let probing = ProbingConfig {
            burst_limit: Some(3),
            ..Default::default()
        };
        let mut assoc = Association::simulated(AssociationId(1), AssociationConfig::default(), probing);
        for n in 1..=paths {
            assoc.add_path(addr(n)).unwrap();
        }
        assoc
    }

    #[test]
    fn test_first_path_is_primary() {
        let assoc = association(3);
        assert_eq!(assoc.primary_path(), Some(PathId(0)));
        assert_eq!(assoc.paths().filter(|p| p.is_primary()).count(), 1);
    }

    #[test]
    fn test_add_path_limits() {
        let mut assoc = association(1);
        assert!(matches!(assoc.add_path(addr(1)), Err(Error::DuplicatePath(_))));

        let config = AssociationConfig {
            max_paths: 1,
            ..Default::default()
        };
        let mut small = Association::simulated(AssociationId(2), config, ProbingConfig::default());
        small.add_path(addr(1)).unwrap();
        assert!(matches!(small.add_path(addr(2)), Err(Error::PathLimit(1))));
    }

    #[test]
    fn test_next_path_wraps_and_skips_inactive() {
        let mut assoc = association(4);
        assert_eq!(assoc.next_path(PathId(1)), Some(PathId(2)));
        assert_eq!(assoc.next_path(PathId(3)), Some(PathId(0)));

        assoc.set_path_active(PathId(2), false);
        assoc.set_path_active(PathId(3), false);
        assert_eq!(assoc.next_path(PathId(1)), Some(PathId(0)));
        assert_eq!(assoc.next_path(PathId(0)), Some(PathId(1)));

        assoc.set_path_active(PathId(0), false);
        assert_eq!(assoc.next_path(PathId(1)), None);
    }

    #[test]
    fn test_remove_path_cancels_timers() {
        let mut assoc = association(2);
        assert!(assoc.activate_probing(PathId(0)).unwrap());
        assert_eq!(assoc.timers().pending_count(), 2);

        let removed = assoc.remove_path(PathId(0)).unwrap();
        assert!(!removed.is_primary());
        assert_eq!(assoc.timers().pending_count(), 0);
        assert_eq!(assoc.primary_path(), Some(PathId(1)));
        assert!(matches!(assoc.activate_probing(PathId(0)), Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_remove_path_reroutes_its_chunks() {
        let mut assoc = association(3);
        assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();
        assoc
            .enqueue_chunk(DataChunk::new(Tsn(2), PathId(0), 100).acknowledged())
            .unwrap();
        assoc.enqueue_chunk(DataChunk::new(Tsn(3), PathId(1), 200)).unwrap();

        assoc.remove_path(PathId(0)).unwrap();

        assert_eq!(assoc.payload_queue().get(Tsn(1)).unwrap().last_destination(), PathId(1));
        assert_eq!(assoc.payload_queue().get(Tsn(2)).unwrap().last_destination(), PathId(1));
        assert_eq!(
            assoc.drain_outbound(),
            vec![Outbound::Retransmission { path: PathId(1), tsn: Tsn(1), at: Duration::ZERO }]
        );
        assert_eq!(assoc.pending_retransmissions().count(), 0);
        assert_eq!(assoc.get_path(PathId(1)).unwrap().outstanding_bytes(), 300);

        // Acknowledging releases from the path that now holds the chunk.
        assoc.ack_chunk(Tsn(1)).unwrap();
        assert_eq!(assoc.get_path(PathId(1)).unwrap().outstanding_bytes(), 200);
    }

    #[test]
    fn test_remove_last_path_drops_its_chunks() {
        let mut assoc = association(1);
        assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();

        assoc.remove_path(PathId(0)).unwrap();

        assert!(assoc.payload_queue().is_empty());
        assert!(assoc.drain_outbound().is_empty());
        assert!(matches!(assoc.ack_chunk(Tsn(1)), Err(Error::ChunkNotFound(_))));
    }

    #[test]
    fn test_renege_only_after_ack() {
        let mut assoc = association(1);
        assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 100)).unwrap();

        assert!(!assoc.renege_chunk(Tsn(1)).unwrap());
        assoc.ack_chunk(Tsn(1)).unwrap();
        assert!(assoc.renege_chunk(Tsn(1)).unwrap());
        assert!(assoc.payload_queue().get(Tsn(1)).unwrap().is_reneged());
    }

    #[test]
    fn test_process_unknown_timer() {
        let mut assoc = association(2);
        let stray = assoc.timers_mut().schedule(Duration::from_secs(1));
        assert_eq!(assoc.process_timeout(stray), TimeoutOutcome::Unknown);
        assert_eq!(assoc.stats(), AssociationStats::default());
    }

    #[test]
    fn test_chunk_outstanding_accounting() {
        let mut assoc = association(2);
        assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(0), 500)).unwrap();
        assoc.enqueue_chunk(DataChunk::new(Tsn(2), PathId(0), 300)).unwrap();
        assert_eq!(assoc.get_path(PathId(0)).unwrap().outstanding_bytes(), 800);

        assoc.ack_chunk(Tsn(1)).unwrap();
        assert_eq!(assoc.get_path(PathId(0)).unwrap().outstanding_bytes(), 300);

        assert!(assoc.enqueue_chunk(DataChunk::new(Tsn(3), PathId(9), 1)).is_err());
    }

    #[test]
    fn test_heartbeat_ack_stops_probing() {
        let mut assoc = association(2);
        assoc.activate_probing(PathId(1)).unwrap();
        assoc.advance_to(Duration::from_secs(1));
        assert_eq!(assoc.probing(PathId(1)).unwrap().sent_count(), 2);

        assoc.on_heartbeat_ack(PathId(1)).unwrap();
        assert!(!assoc.is_probing(PathId(1)));
        assert_eq!(assoc.timers().pending_count(), 0);
    }

    #[test]
    fn test_sack_stops_probing_everywhere() {
        let mut assoc = association(3);
        assoc.enqueue_chunk(DataChunk::new(Tsn(1), PathId(2), 100)).unwrap();
        for id in [PathId(0), PathId(2)] {
            assoc.activate_probing(id).unwrap();
        }

        assoc.on_sack(&[Tsn(1)]).unwrap();
        assert!(!assoc.is_probing(PathId(0)));
        assert!(!assoc.is_probing(PathId(2)));
        assert_eq!(assoc.timers().pending_count(), 0);
        assert!(assoc.payload_queue().get(Tsn(1)).unwrap().is_acknowledged());
    }

    #[test]
    fn test_drop_releases_shared_timers() {
        let mut queue = EventQueue::new();
        {
            let mut assoc = Association::new(
                AssociationId(7),
                AssociationConfig::default(),
                ProbingConfig::default(),
                &mut queue,
            );
            let id = assoc.add_path(addr(1)).unwrap();
            assert!(assoc.activate_probing(id).unwrap());
        }
        assert_eq!(queue.pending_count(), 0);
    }
}
