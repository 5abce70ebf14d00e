//! Peer-side protocol plumbing shared by every role: datagram transport,
//! reliable delivery with acknowledgments and retransmission, liveness
//! bookkeeping, and the lifecycle object that owns a role's task set.

pub mod error;
pub mod lifecycle;
pub mod node;
pub mod transport;

pub use error::NodeError;
pub use lifecycle::{Lifecycle, StopSignal};
pub use node::{Node, PendingMessage, Session, Snapshot};
pub use transport::{receive_loop, Transport, TransportConfig};

/// Period of the Master's discovery announcement.
pub const ANNOUNCE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
