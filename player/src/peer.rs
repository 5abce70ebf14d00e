//! One process in the game, whichever role it currently holds. A joined
//! player runs the player task set until it is promoted, at which point the
//! tasks are joined and a master task set takes over the same sockets.

use crate::discovery::{DiscoveredGame, GameDirectory};
use crate::network::{JoinRequest, Player, PlayerEvent};
use crate::JoinError;
use log::{error, info, warn};
use master::Master;
use node::{Lifecycle, Snapshot, Transport};
use shared::{Direction, GameConfig, NodeRole, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerExit {
    /// The master removed this node.
    Removed { reason: String },
    /// This node was master and handed the game over.
    LeftGame,
    /// The task set ended without a usable successor.
    Lost,
}

#[derive(Clone)]
enum Active {
    Player(Arc<Player>),
    Master(Arc<Master>),
}

pub struct Peer {
    transport: Transport,
    directory: GameDirectory,
    active: RwLock<Active>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl Peer {
    /// Starts a new game with this process as master.
    pub fn host(transport: Transport, config: GameConfig, name: &str) -> Self {
        let master = Arc::new(Master::host(transport.clone(), config, name));
        let lifecycle = master.start();
        Self {
            transport,
            directory: GameDirectory::new(),
            active: RwLock::new(Active::Master(master)),
            lifecycle: Mutex::new(Some(lifecycle)),
        }
    }

    /// Joins `game` and returns once the master has assigned an id.
    pub async fn join(
        transport: Transport,
        game: DiscoveredGame,
        directory: GameDirectory,
        request: JoinRequest,
        timeout: Duration,
    ) -> Result<Self, JoinError> {
        let player = Arc::new(Player::new(transport.clone(), game, directory.clone(), request).await);
        let lifecycle = player.start();

        if let Err(e) = player.join(timeout).await {
            lifecycle.shutdown().await;
            return Err(e);
        }

        Ok(Self {
            transport,
            directory,
            active: RwLock::new(Active::Player(player)),
            lifecycle: Mutex::new(Some(lifecycle)),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        match &*self.active.read().await {
            Active::Player(player) => player.snapshot().await,
            Active::Master(master) => master.snapshot().await,
        }
    }

    /// Waits until the active node holds its first game state.
    pub async fn wait_for_state(&self) {
        let node = match &*self.active.read().await {
            Active::Player(player) => Arc::clone(player.node()),
            Active::Master(master) => Arc::clone(master.node()),
        };
        node.wait_for_state().await;
    }

    pub async fn is_master(&self) -> bool {
        matches!(&*self.active.read().await, Active::Master(_))
    }

    pub async fn id(&self) -> PlayerId {
        match &*self.active.read().await {
            Active::Player(player) => player.node().id(),
            Active::Master(master) => master.node().id(),
        }
    }

    pub async fn discovered_games(&self) -> Vec<DiscoveredGame> {
        self.directory.list().await
    }

    pub async fn steer(&self, direction: Direction) -> bool {
        let active = self.active.read().await.clone();
        match active {
            Active::Player(player) => match player.steer(direction).await {
                Ok(sent) => sent,
                Err(e) => {
                    warn!("Steer failed: {}", e);
                    false
                }
            },
            Active::Master(master) => master.steer(direction).await,
        }
    }

    pub async fn request_role(&self, role: NodeRole) {
        let active = self.active.read().await.clone();
        match active {
            Active::Player(player) => {
                if let Err(e) = player.request_role(role).await {
                    warn!("Role request failed: {}", e);
                }
            }
            Active::Master(master) => master.request_role(role),
        }
    }

    /// Drives role transitions until this node leaves the game.
    pub async fn run(&self) -> PeerExit {
        loop {
            let active = self.active.read().await.clone();
            match active {
                Active::Player(player) => match player.next_event().await {
                    Some(PlayerEvent::Promote {
                        old_master,
                        old_master_left,
                    }) => {
                        if !self.promote(&player, old_master, old_master_left).await {
                            self.stop().await;
                            return PeerExit::Lost;
                        }
                    }
                    Some(PlayerEvent::Terminate { reason }) => {
                        self.stop().await;
                        return PeerExit::Removed { reason };
                    }
                    None => {
                        self.stop().await;
                        return PeerExit::Lost;
                    }
                },
                Active::Master(master) => {
                    let exit = master.wait_exit().await;
                    info!("Master task set exited: {:?}", exit);
                    self.stop().await;
                    return PeerExit::LeftGame;
                }
            }
        }
    }

    async fn promote(
        &self,
        player: &Arc<Player>,
        old_master: Option<PlayerId>,
        old_master_left: bool,
    ) -> bool {
        if let Some(lifecycle) = self.lifecycle.lock().await.take() {
            lifecycle.shutdown().await;
        }

        let snapshot = player.snapshot().await;
        let Some(state) = snapshot.state else {
            error!("Cannot take over without a game state");
            return false;
        };

        let master = Arc::new(
            Master::promote(
                self.transport.clone(),
                snapshot.config,
                snapshot.me,
                state,
                Some(player.game_name().to_string()),
                old_master,
                old_master_left,
                player.node().next_seq(),
            )
            .await,
        );
        master.announce().await;
        let lifecycle = master.start();

        *self.lifecycle.lock().await = Some(lifecycle);
        *self.active.write().await = Active::Master(master);
        info!("Now serving as master");
        true
    }

    /// Stops whichever task set is running.
    pub async fn stop(&self) {
        if let Some(lifecycle) = self.lifecycle.lock().await.take() {
            lifecycle.shutdown().await;
        }
    }
}
