//! Timer abstraction consumed by the probing controllers.
//!
//! Controllers never block. They schedule a one-shot callback on a
//! [`TimerService`] and later receive the fired [`TimerHandle`] back through
//! `process_timeout`. Cancelling a handle that already fired, or that was
//! never scheduled, is a no-op.

mod queue;

pub use queue::{EventQueue, FiredTimer};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque, cancelable identifier of a scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

/// Which of a probing session's two timers a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Paces the probes of a burst.
    Period,
    /// Declares the path failed when no acknowledgment arrived in time.
    GiveUp,
}

impl TimerKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Period => "AP_PERIOD",
            Self::GiveUp => "AP_GIVEUP",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Schedule/cancel substrate owned outside the probing core.
pub trait TimerService {
    /// Schedule a timer that fires `delay` from now.
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Cancel a pending timer. Idempotent.
    fn cancel(&mut self, handle: TimerHandle);

    /// Current time of the substrate's clock, relative to its epoch.
    fn now(&self) -> Duration;
}

impl<T: TimerService + ?Sized> TimerService for &mut T {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        (**self).schedule(delay)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        (**self).cancel(handle);
    }

    fn now(&self) -> Duration {
        (**self).now()
    }
}
