//! # sctp-ap
//!
//! Active probing and failover for multi-homed, SCTP-style associations.
//!
//! When a destination path falls under suspicion, its probing controller
//! sends a short burst of heartbeats and arms a give-up timer. If no
//! acknowledgment arrives in time the path is demoted, a successor takes
//! over as primary, stranded chunks are re-routed, and total loss of
//! connectivity is reported to the upper layer exactly once.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Upper Layer                             │
//! │              (AssociationEvent broadcast channel)               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                         Association                             │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐   ┌────────────────┐  │
//! │  │  Path 0  │  │  Path 1  │  │  Path N  │   │ Retransmission │  │
//! │  │ + Active │  │ + Active │  │ + Active │   │     Queue      │  │
//! │  │  Probing │  │  Probing │  │  Probing │   │                │  │
//! │  └──────────┘  └──────────┘  └──────────┘   └────────────────┘  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │              Timer Service (virtual-time EventQueue)            │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::struct_excessive_bools)]   // Policy flags are plain booleans
#![allow(clippy::return_self_not_must_use)] // Builder methods don't need must_use

pub mod association;
pub mod config;
pub mod error;
pub mod probing;
pub mod timer;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::association::{
        Association, AssociationCoordinator, AssociationEvent, DataChunk, Outbound,
        PathView, RetransmissionQueue,
    };
    pub use crate::config::{AssociationConfig, Config, ProbingConfig};
    pub use crate::error::{Error, Result};
    pub use crate::probing::{ActiveProbing, FailoverOutcome, TimeoutOutcome};
    pub use crate::timer::{EventQueue, TimerHandle, TimerService};
    pub use crate::types::*;
}
