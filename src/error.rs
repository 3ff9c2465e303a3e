//! Error types for the active probing crate.

use std::io;

use thiserror::Error;

use crate::types::{PathId, Tsn};

/// Result type alias for association and configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
///
/// Probing controller operations never fail: disabled sessions, unknown
/// timers and double deactivation are no-ops. Errors only surface from the
/// association surface (lookups by path id, chunk bookkeeping) and from
/// configuration handling.
#[derive(Error, Debug)]
pub enum Error {
    // Association errors
    #[error("path {0} not found")]
    PathNotFound(PathId),

    #[error("path to {0} already exists")]
    DuplicatePath(std::net::SocketAddr),

    #[error("maximum paths ({0}) reached")]
    PathLimit(usize),

    #[error("chunk {0} not found in retransmission queue")]
    ChunkNotFound(Tsn),

    #[error("chunk {0} already queued")]
    DuplicateChunk(Tsn),

    #[error("association lost connectivity")]
    ConnectionLost,

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error leaves the association usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConnectionLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PathNotFound(PathId(3));
        assert_eq!(err.to_string(), "path #3 not found");

        let err = Error::ChunkNotFound(Tsn(42));
        assert_eq!(err.to_string(), "chunk tsn:42 not found in retransmission queue");
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::PathLimit(4).is_recoverable());
        assert!(!Error::ConnectionLost.is_recoverable());
    }
}
