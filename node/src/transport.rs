//! Datagram endpoints: one unicast socket for game traffic, optionally one
//! socket joined to the discovery multicast group.

use crate::error::NodeError;
use crate::lifecycle::StopSignal;
use log::{debug, error, info};
use shared::{GameMessage, MAX_DATAGRAM_SIZE, MULTICAST_IP, MULTICAST_PORT};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// `None` disables discovery traffic entirely.
    pub multicast_group: Option<SocketAddrV4>,
    pub interface: Ipv4Addr,
    pub unicast_bind: SocketAddr,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            multicast_group: Some(SocketAddrV4::new(MULTICAST_IP, MULTICAST_PORT)),
            interface: Ipv4Addr::UNSPECIFIED,
            unicast_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        }
    }
}

impl TransportConfig {
    pub fn loopback() -> Self {
        Self {
            multicast_group: None,
            interface: Ipv4Addr::LOCALHOST,
            unicast_bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    unicast: Arc<UdpSocket>,
    multicast: Option<Arc<UdpSocket>>,
    group: Option<SocketAddrV4>,
}

impl Transport {
    pub async fn bind(config: &TransportConfig) -> Result<Self, NodeError> {
        let unicast = UdpSocket::bind(config.unicast_bind)
            .await
            .map_err(|source| NodeError::Bind {
                addr: config.unicast_bind,
                source,
            })?;

        let multicast = match config.multicast_group {
            Some(group) => {
                let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, group.port()));
                let socket = UdpSocket::bind(bind_addr)
                    .await
                    .map_err(|source| NodeError::Bind {
                        addr: bind_addr,
                        source,
                    })?;
                socket
                    .join_multicast_v4(*group.ip(), config.interface)
                    .map_err(|source| NodeError::JoinMulticast { group, source })?;
                socket
                    .set_multicast_loop_v4(true)
                    .map_err(|source| NodeError::JoinMulticast { group, source })?;
                info!("Joined multicast group {} on {}", group, config.interface);
                Some(Arc::new(socket))
            }
            None => None,
        };

        let transport = Self {
            unicast: Arc::new(unicast),
            multicast,
            group: config.multicast_group,
        };
        info!("Unicast endpoint bound to {}", transport.local_addr()?);
        Ok(transport)
    }

    pub async fn loopback() -> Result<Self, NodeError> {
        Self::bind(&TransportConfig::loopback()).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.unicast.local_addr()?)
    }

    pub fn multicast_group(&self) -> Option<SocketAddrV4> {
        self.group
    }

    pub fn unicast_socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.unicast)
    }

    pub fn multicast_socket(&self) -> Option<Arc<UdpSocket>> {
        self.multicast.as_ref().map(Arc::clone)
    }

    pub async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), NodeError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(NodeError::Oversized { size: bytes.len() });
        }
        self.unicast
            .send_to(bytes, addr)
            .await
            .map_err(|source| NodeError::Send { addr, source })?;
        Ok(())
    }

    /// Sends to the group from the unicast socket, so receivers learn the
    /// sender's game address from the datagram source.
    pub async fn send_multicast(&self, bytes: &[u8]) -> Result<(), NodeError> {
        let group = self.group.ok_or(NodeError::NoMulticastGroup)?;
        self.send_to(bytes, SocketAddr::V4(group)).await
    }
}

/// Reads datagrams from `socket` until `stop` is raised, handing every
/// decodable message to `handler`. Undecodable datagrams are dropped.
pub async fn receive_loop<F, Fut>(
    socket: Arc<UdpSocket>,
    mut stop: StopSignal,
    label: &'static str,
    mut handler: F,
) where
    F: FnMut(GameMessage, SocketAddr) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            _ = stop.raised() => break,
            received = socket.recv_from(&mut buffer) => match received {
                Ok((len, addr)) => match GameMessage::decode(&buffer[..len]) {
                    Ok(message) => handler(message, addr).await,
                    Err(e) => debug!("Dropping datagram from {} on {}: {}", addr, label, e),
                },
                Err(e) => {
                    error!("Error receiving on {}: {}", label, e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }
    }

    debug!("Receive loop {} stopped", label);
}
