//! Deterministic virtual-time timer queue.
//!
//! Timers are processed in order of fire time, ties broken by handle
//! (registration order). Cancellation is lazy: the handle is dropped from the
//! live set and its heap entry is skipped when it reaches the top.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use super::{TimerHandle, TimerService};

/// A timer popped from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub at: Duration,
}

/// Virtual-time event queue implementing [`TimerService`].
#[derive(Debug, Default)]
pub struct EventQueue {
    now: Duration,
    next_id: u64,
    heap: BinaryHeap<Reverse<(Duration, TimerHandle)>>,
    live: HashSet<TimerHandle>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer at an absolute virtual time.
    ///
    /// Times in the past fire at the current instant.
    pub fn schedule_at(&mut self, at: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let at = at.max(self.now);
        self.heap.push(Reverse((at, handle)));
        self.live.insert(handle);
        handle
    }

    /// Check whether a handle is still pending.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.live.contains(&handle)
    }

    /// Number of timers still pending.
    pub fn pending_count(&self) -> usize {
        self.live.len()
    }

    /// Fire time of the earliest pending timer.
    pub fn next_fire_time(&mut self) -> Option<Duration> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse((at, _))| *at)
    }

    /// Pop the earliest timer due at or before `until`, advancing the clock to
    /// its fire time.
    pub fn pop_due(&mut self, until: Duration) -> Option<FiredTimer> {
        self.discard_cancelled();
        let Reverse((at, handle)) = *self.heap.peek()?;
        if at > until {
            return None;
        }
        self.heap.pop();
        self.live.remove(&handle);
        self.now = self.now.max(at);
        Some(FiredTimer { handle, at })
    }

    /// Move the clock forward without firing anything.
    ///
    /// The clock never runs backwards.
    pub fn advance_clock(&mut self, to: Duration) {
        self.now = self.now.max(to);
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, handle))) = self.heap.peek() {
            if self.live.contains(handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl TimerService for EventQueue {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.schedule_at(self.now.saturating_add(delay))
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.live.remove(&handle);
    }

    fn now(&self) -> Duration {
        self.now
    }
}
