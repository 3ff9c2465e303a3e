//! Per-path active probing controller.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::{failover, TimeoutOutcome};
use crate::association::ProbeHost;
use crate::config::ProbingConfig;
use crate::timer::{TimerHandle, TimerKind, TimerService};
use crate::types::PathId;

/// Active probing session bound to one destination path.
///
/// `enabled` and the burst parameters are fixed at construction. A disabled
/// controller never schedules a timer and every operation on it is a no-op.
#[derive(Debug)]
pub struct ActiveProbing {
    path: PathId,
    /// `<association>:<remote address>`, used in timer labels.
    tag: String,

    // Configuration
    enabled: bool,
    period: Duration,
    give_up_timeout: Duration,
    burst_limit: u32,
    probe_size_bytes: u32,
    capacity_gating: bool,
    reroute_on_give_up: bool,

    // Session
    activated: bool,
    sent: u32,
    period_timer: Option<TimerHandle>,
    give_up_timer: Option<TimerHandle>,
}

impl ActiveProbing {
    /// Create the controller for `path`.
    pub fn new(path: PathId, tag: impl Into<String>, config: &ProbingConfig) -> Self {
        Self {
            path,
            tag: tag.into(),
            enabled: config.enabled,
            period: config.period,
            give_up_timeout: config.give_up_timeout,
            burst_limit: config.effective_burst_limit(),
            probe_size_bytes: config.probe_size_bytes,
            capacity_gating: config.capacity_gating,
            reroute_on_give_up: config.reroute_on_give_up,
            activated: false,
            sent: 0,
            period_timer: None,
            give_up_timer: None,
        }
    }

    pub fn path(&self) -> PathId {
        self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a probing burst is running on this path.
    pub fn is_activated(&self) -> bool {
        self.enabled && self.activated
    }

    /// Probes sent in the current activation.
    pub fn sent_count(&self) -> u32 {
        self.sent
    }

    pub fn burst_limit(&self) -> u32 {
        self.burst_limit
    }

    /// Congestion window bytes a full burst needs.
    pub fn max_reserved_bytes(&self) -> u64 {
        u64::from(self.probe_size_bytes) * u64::from(self.burst_limit)
    }

    /// Bytes spent on probes in the current activation.
    pub fn probe_bytes_in_flight(&self) -> u64 {
        u64::from(self.probe_size_bytes) * u64::from(self.sent)
    }

    /// Label of one of this controller's timers, e.g. `AP_GIVEUP 1:10.0.0.2:9899`.
    pub fn timer_label(&self, kind: TimerKind) -> String {
        format!("{} {}", kind.label(), self.tag)
    }

    pub fn is_own_timer(&self, handle: TimerHandle) -> bool {
        self.timer_kind(handle).is_some()
    }

    /// Which of this controller's pending timers `handle` is.
    pub fn timer_kind(&self, handle: TimerHandle) -> Option<TimerKind> {
        if self.period_timer == Some(handle) {
            Some(TimerKind::Period)
        } else if self.give_up_timer == Some(handle) {
            Some(TimerKind::GiveUp)
        } else {
            None
        }
    }

    /// Start a probing burst unless one is already running.
    ///
    /// Returns true only if this call activated the session.
    pub fn activate_if_needed<H: ProbeHost>(&mut self, host: &mut H) -> bool {
        if !self.enabled || self.activated {
            return false;
        }

        if host.is_connection_lost() {
            return false;
        }

        let Some(allowance) = host.path(self.path).map(|p| p.congestion_allowance()) else {
            warn!(path = %self.tag, "Probing requested for unknown path");
            return false;
        };

        if self.capacity_gating {
            let needed = self.max_reserved_bytes();
            if allowance < 0 || allowance.unsigned_abs() < needed {
                debug!(
                    path = %self.tag,
                    allowance,
                    needed,
                    "Not enough congestion window for a probe burst"
                );
                return false;
            }
        }

        host.send_heartbeat(self.path);
        self.sent = 1;

        if self.sent < self.burst_limit {
            self.period_timer = Some(host.schedule(self.period));
        }
        self.give_up_timer = Some(host.schedule(self.give_up_timeout));
        self.activated = true;

        debug!(
            path = %self.tag,
            burst = self.burst_limit,
            reserved = self.max_reserved_bytes(),
            "Active probing on"
        );
        true
    }

    /// Stop the burst and cancel both timers. Idempotent.
    pub fn deactivate<T: TimerService + ?Sized>(&mut self, timers: &mut T) {
        if !self.enabled || !self.activated {
            return;
        }

        self.cancel_timers(timers);
        self.activated = false;
        self.sent = 0;

        debug!(path = %self.tag, "Active probing off");
    }

    /// Turn probing off on every path of the association.
    pub fn deactivate_on_all_paths<H: ProbeHost>(&mut self, host: &mut H) {
        if !self.enabled {
            return;
        }

        debug!(path = %self.tag, "Active probing off on all paths");
        for id in host.path_ids() {
            if id == self.path {
                self.deactivate(host);
            } else {
                host.deactivate_probing(id);
            }
        }
    }

    /// Release both timers regardless of state. Used on path teardown.
    pub fn release<T: TimerService + ?Sized>(&mut self, timers: &mut T) {
        self.cancel_timers(timers);
        self.activated = false;
        self.sent = 0;
    }

    /// Handle a fired timer.
    pub fn process_timeout<H: ProbeHost>(&mut self, handle: TimerHandle, host: &mut H) -> TimeoutOutcome {
        match self.timer_kind(handle) {
            Some(TimerKind::Period) => self.on_period(host),
            Some(TimerKind::GiveUp) => self.on_give_up(host),
            None => {
                warn!(path = %self.tag, timer = %handle, "Asked to process unknown timer");
                TimeoutOutcome::Unknown
            }
        }
    }

    fn on_period<H: ProbeHost>(&mut self, host: &mut H) -> TimeoutOutcome {
        self.period_timer = None;
        trace!(
            timer = %self.timer_label(TimerKind::Period),
            burst = self.burst_limit,
            sent = self.sent,
            "Period timeout"
        );

        if !self.enabled || !self.activated || host.is_connection_lost() {
            return TimeoutOutcome::Ignored;
        }

        if self.sent >= self.burst_limit {
            return TimeoutOutcome::BurstComplete;
        }

        host.send_heartbeat(self.path);
        self.sent += 1;
        if self.sent < self.burst_limit {
            self.period_timer = Some(host.schedule(self.period));
        }

        TimeoutOutcome::ProbeSent { sent: self.sent }
    }

    fn on_give_up<H: ProbeHost>(&mut self, host: &mut H) -> TimeoutOutcome {
        self.give_up_timer = None;
        debug!(timer = %self.timer_label(TimerKind::GiveUp), sent = self.sent, "Give-up timeout");

        if !self.enabled || !self.activated {
            return TimeoutOutcome::Ignored;
        }

        if host.is_connection_lost() {
            self.deactivate(host);
            return TimeoutOutcome::Ignored;
        }

        self.deactivate(host);
        TimeoutOutcome::GaveUp(failover::run(self.path, self.reroute_on_give_up, host))
    }

    fn cancel_timers<T: TimerService + ?Sized>(&mut self, timers: &mut T) {
        if let Some(handle) = self.period_timer.take() {
            timers.cancel(handle);
        }
        if let Some(handle) = self.give_up_timer.take() {
            timers.cancel(handle);
        }
    }
}
