//! core data model and event engine for cellcast

use thiserror::Error;

pub mod engine;
pub mod multicast;
pub mod topology;
pub mod trace;
pub mod types;

pub use engine::{EventHandle, EventHandler, EventQueue};
pub use multicast::{ForwardingEntry, ForwardingTable, SourceMatch};
pub use topology::{Interface, Node, Topology};
pub use trace::{RecordKind, TraceRecord, TraceRecorder};
pub use types::{Destination, GroupAddress, InterfaceId, NodeId, Packet, Position, Role};

/// Setup-time validation failures. Raised synchronously while a simulation
/// is being configured, never mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("traffic interval must be non-zero")]
    ZeroInterval,

    #[error("packet size must be non-zero")]
    ZeroPacketSize,

    #[error("frame duration must be non-zero")]
    ZeroFrameDuration,

    #[error("a frame needs at least one resource block")]
    ZeroBlocksPerFrame,

    #[error("packet loss probability {0} outside [0, 1]")]
    LossOutOfRange(f32),

    #[error("invalid noise distribution parameters")]
    InvalidNoise,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}
