//! Association surface consumed by the probing controllers.

use super::path::PathView;
use super::retransmission::RetransmissionQueue;
use crate::timer::TimerService;
use crate::types::{AssociationId, PathId, Tsn};

/// Operations a probing controller needs from its association.
///
/// Path state is reached through [`PathId`] indices; the controller never
/// holds references into the association between calls.
pub trait AssociationCoordinator {
    type Queue: RetransmissionQueue;

    fn association_id(&self) -> AssociationId;

    /// Look up a path.
    fn path(&self, id: PathId) -> Option<&PathView>;

    /// All paths, in enumeration order.
    fn path_ids(&self) -> Vec<PathId>;

    fn primary_path(&self) -> Option<PathId>;

    fn set_primary_path(&mut self, id: PathId);

    /// First active path after `after` in enumeration order, wrapping around
    /// and skipping `after` itself.
    fn next_path(&self, after: PathId) -> Option<PathId>;

    fn all_paths_inactive(&self) -> bool;

    /// The association reached its terminal state.
    fn is_connection_lost(&self) -> bool;

    fn set_path_active(&mut self, id: PathId, active: bool);

    /// Emit one probe heartbeat on a path.
    fn send_heartbeat(&mut self, id: PathId);

    /// Turn off probing on another path's controller.
    fn deactivate_probing(&mut self, id: PathId);

    fn notify_connection_lost(&mut self);

    fn notify_path_status_changed(&mut self, id: PathId, active: bool);

    /// Account for a chunk re-routed away from `from` after a give-up.
    fn record_timer_based_retransmission(&mut self, from: PathId, tsn: Tsn);

    fn retransmission_queue(&mut self) -> &mut Self::Queue;

    /// Send pending data on every active path, starting with `from`.
    fn flush_pending_data(&mut self, from: PathId);
}

/// Everything a controller callback touches: the association and the timer
/// substrate.
pub trait ProbeHost: AssociationCoordinator + TimerService {}

impl<T: AssociationCoordinator + TimerService> ProbeHost for T {}
