//! Core identifier types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an association (used in timer labels and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AssociationId(pub u32);

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a destination path inside its association's path arena.
///
/// Ids are handed out in insertion order and never reused, so enumeration
/// order is the order in which paths were added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub u16);

impl PathId {
    pub fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transmission sequence number of a DATA chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tsn(pub u32);

impl Tsn {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Tsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tsn:{}", self.0)
    }
}

/// Lifecycle of an association as seen by the probing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssociationState {
    /// At least one path is active.
    #[default]
    Established,
    /// Every path went inactive; terminal.
    ConnectionLost,
}

impl AssociationState {
    pub fn is_terminal(self) -> bool {
        self == Self::ConnectionLost
    }
}

impl fmt::Display for AssociationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Established => write!(f, "established"),
            Self::ConnectionLost => write!(f, "connection lost"),
        }
    }
}
