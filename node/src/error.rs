use shared::CodecError;
use std::net::{SocketAddr, SocketAddrV4};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot join multicast group {group}: {source}")]
    JoinMulticast {
        group: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
    #[error("send to {addr} failed: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("message of {size} bytes exceeds the datagram limit")]
    Oversized { size: usize },
    #[error("no multicast group configured")]
    NoMulticastGroup,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
