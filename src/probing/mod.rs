//! Active probing of suspect paths.
//!
//! Each destination path carries one [`ActiveProbing`] controller. When the
//! path falls under suspicion the controller sends a bounded burst of
//! heartbeats, one per period, and arms a give-up timer. If nothing
//! acknowledges the path before the give-up timer fires, the controller runs
//! the failover procedure against its association:
//!
//! ```text
//!            activate_if_needed            period fires (sent < burst)
//!  ┌──────┐ ─────────────────────► ┌───────────┐ ◄───────┐
//!  │ Idle │                        │ Activated │ ────────┘
//!  └──────┘ ◄───────────────────── └───────────┘
//!            deactivate / give-up fires (failover)
//! ```

mod controller;
mod failover;

pub use controller::ActiveProbing;

use crate::types::PathId;

/// Result of handing a fired timer to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// The handle does not belong to this controller.
    Unknown,
    /// Session disabled, idle, or association already lost.
    Ignored,
    /// Period timer sent another probe; `sent` probes so far.
    ProbeSent { sent: u32 },
    /// Period timer fired with the burst already exhausted.
    BurstComplete,
    /// Give-up timer fired and the failover procedure ran.
    GaveUp(FailoverOutcome),
}

/// What the failover procedure did to the association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// No path is left active; the upper layer was told once.
    ConnectionLost,
    /// Traffic moved to a surviving path.
    FailedOver {
        successor: PathId,
        /// The failed path was active before the give-up.
        was_active: bool,
        /// Chunks re-routed to the successor.
        rerouted: usize,
    },
    /// Some path is active but the coordinator named no successor.
    ///
    /// [`Association`](crate::association::Association) always finds one
    /// once any path is active; this only guards other
    /// [`AssociationCoordinator`](crate::association::AssociationCoordinator)
    /// implementations whose `next_path` is narrower.
    NoSuccessor,
}
