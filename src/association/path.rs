//! Per-destination path state.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::types::PathId;

/// Counters kept per path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStats {
    /// Probe heartbeats sent on this path.
    pub heartbeats_sent: u64,
    /// Chunks re-routed away from this path after a give-up.
    pub timer_based_retransmissions: u64,
    /// Retransmitted chunks sent on this path.
    pub retransmissions_sent: u64,
}

/// View of one destination path of an association.
///
/// Only the owning association writes these fields; controllers go through
/// the coordinator's mutation methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathView {
    id: PathId,
    remote_addr: SocketAddr,
    active: bool,
    primary: bool,
    cwnd: u32,
    outstanding_bytes: u32,
    stats: PathStats,
}

impl PathView {
    pub(crate) fn new(id: PathId, remote_addr: SocketAddr, cwnd: u32) -> Self {
        Self {
            id,
            remote_addr,
            active: true,
            primary: false,
            cwnd,
            outstanding_bytes: 0,
            stats: PathStats::default(),
        }
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Congestion window in bytes.
    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    /// Bytes sent on this path and not yet acknowledged.
    pub fn outstanding_bytes(&self) -> u32 {
        self.outstanding_bytes
    }

    pub fn stats(&self) -> PathStats {
        self.stats
    }

    /// Room left in the congestion window. Negative when overcommitted.
    pub fn congestion_allowance(&self) -> i64 {
        i64::from(self.cwnd) - i64::from(self.outstanding_bytes)
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    pub(crate) fn set_cwnd(&mut self, cwnd: u32) {
        self.cwnd = cwnd;
    }

    pub(crate) fn set_outstanding_bytes(&mut self, bytes: u32) {
        self.outstanding_bytes = bytes;
    }

    pub(crate) fn add_outstanding(&mut self, bytes: u32) {
        self.outstanding_bytes = self.outstanding_bytes.saturating_add(bytes);
    }

    pub(crate) fn release_outstanding(&mut self, bytes: u32) {
        self.outstanding_bytes = self.outstanding_bytes.saturating_sub(bytes);
    }

    pub(crate) fn stats_mut(&mut self) -> &mut PathStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> PathView {
        PathView::new(PathId(0), "10.0.0.1:5000".parse().unwrap(), 1000)
    }

    #[test]
    fn test_new_path_is_active() {
        let path = view();
        assert!(path.is_active());
        assert!(!path.is_primary());
        assert_eq!(path.congestion_allowance(), 1000);
    }

    #[test]
    fn test_allowance_goes_negative() {
        let mut path = view();
        path.set_outstanding_bytes(1200);
        assert_eq!(path.congestion_allowance(), -200);

        path.release_outstanding(5000);
        assert_eq!(path.outstanding_bytes(), 0);
    }
}
