//! Games learned from announcement traffic, and the probes that solicit it.

use crate::JoinError;
use log::{debug, info};
use node::{receive_loop, Lifecycle, Transport};
use shared::{GameAnnouncement, GameConfig, GameMessage, GamePlayer, Payload, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Gap between repeated discovery requests while probing.
const PROBE_RETRY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredGame {
    pub name: String,
    pub config: GameConfig,
    pub players: Vec<GamePlayer>,
    pub can_join: bool,
    pub master_addr: SocketAddr,
}

impl DiscoveredGame {
    pub fn from_announcement(game: &GameAnnouncement, master_addr: SocketAddr) -> Self {
        Self {
            name: game.game_name.clone(),
            config: game.config,
            players: game.players.clone(),
            can_join: game.can_join,
            master_addr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryUpdate {
    New,
    MasterChanged { previous: SocketAddr },
    Unchanged,
}

/// Discovered games keyed by name.
#[derive(Debug, Clone, Default)]
pub struct GameDirectory {
    games: Arc<RwLock<Vec<DiscoveredGame>>>,
}

impl GameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, game: &GameAnnouncement, from: SocketAddr) -> DirectoryUpdate {
        let mut games = self.games.write().await;
        match games.iter_mut().find(|g| g.name == game.game_name) {
            Some(known) => {
                let previous = known.master_addr;
                *known = DiscoveredGame::from_announcement(game, from);
                if previous != from {
                    info!(
                        "Master of game '{}' moved from {} to {}",
                        game.game_name, previous, from
                    );
                    DirectoryUpdate::MasterChanged { previous }
                } else {
                    DirectoryUpdate::Unchanged
                }
            }
            None => {
                info!("Discovered game '{}' at {}", game.game_name, from);
                games.push(DiscoveredGame::from_announcement(game, from));
                DirectoryUpdate::New
            }
        }
    }

    pub async fn record_all(&self, message: &GameMessage, from: SocketAddr) -> Vec<(String, DirectoryUpdate)> {
        let mut updates = Vec::new();
        if let Payload::Announcement { games } = &message.payload {
            for game in games {
                updates.push((game.game_name.clone(), self.record(game, from).await));
            }
        }
        updates
    }

    pub async fn list(&self) -> Vec<DiscoveredGame> {
        self.games.read().await.clone()
    }

    pub async fn find(&self, name: &str) -> Option<DiscoveredGame> {
        self.games
            .read()
            .await
            .iter()
            .find(|g| g.name == name)
            .cloned()
    }

    /// The named game, or the first joinable one when no name is given.
    pub async fn choose(&self, name: Option<&str>) -> Result<DiscoveredGame, JoinError> {
        let games = self.games.read().await;
        match name {
            Some(name) => games
                .iter()
                .find(|g| g.name == name)
                .cloned()
                .ok_or_else(|| JoinError::NoSuchGame(name.to_string())),
            None => games
                .iter()
                .find(|g| g.can_join)
                .or_else(|| games.first())
                .cloned()
                .ok_or(JoinError::NoGames),
        }
    }
}

/// Multicasts Discover and collects announcements on both endpoints for
/// `window`.
pub async fn discover(
    transport: &Transport,
    directory: &GameDirectory,
    window: Duration,
) -> Result<Vec<DiscoveredGame>, JoinError> {
    let mut lifecycle = Lifecycle::new();

    let mut sockets = vec![transport.unicast_socket()];
    sockets.extend(transport.multicast_socket());
    for socket in sockets {
        let directory = directory.clone();
        lifecycle.spawn(
            "discovery-listen",
            receive_loop(socket, lifecycle.signal(), "discovery", move |message, from| {
                let directory = directory.clone();
                async move {
                    directory.record_all(&message, from).await;
                }
            }),
        );
    }

    let request = GameMessage::new(Payload::Discover).encode()?;
    transport.send_multicast(&request).await?;
    debug!("Sent discovery request to {:?}", transport.multicast_group());

    tokio::time::sleep(window).await;
    lifecycle.shutdown().await;
    Ok(directory.list().await)
}

/// Asks one master directly for its announcement. Used before any task
/// reads the unicast socket.
pub async fn probe(
    transport: &Transport,
    master_addr: SocketAddr,
    timeout: Duration,
) -> Result<DiscoveredGame, JoinError> {
    let socket = transport.unicast_socket();
    let request = GameMessage::new(Payload::Discover).encode()?;
    let deadline = Instant::now() + timeout;
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    while Instant::now() < deadline {
        transport.send_to(&request, master_addr).await?;
        let retry_at = (Instant::now() + PROBE_RETRY).min(deadline);

        while let Ok(received) = tokio::time::timeout_at(retry_at, socket.recv_from(&mut buffer)).await {
            let (len, from) = received.map_err(node::NodeError::from)?;
            let Ok(message) = GameMessage::decode(&buffer[..len]) else {
                continue;
            };
            if let Payload::Announcement { games } = message.payload {
                if let Some(game) = games.first() {
                    return Ok(DiscoveredGame::from_announcement(game, from));
                }
            }
        }
    }

    Err(JoinError::Timeout)
}
