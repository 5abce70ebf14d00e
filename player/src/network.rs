//! Non-master task set: receive loops, master liveness checks, resends and
//! pings. Promotion and removal are reported as [`PlayerEvent`]s so the
//! owner can swap this task set for a master one.

use crate::discovery::{DiscoveredGame, GameDirectory};
use crate::JoinError;
use log::{debug, info, warn};
use node::{receive_loop, Lifecycle, Node, NodeError, Snapshot, StopSignal, Transport};
use shared::{
    Direction, GameMessage, GamePlayer, NodeRole, Payload, PlayerId, PlayerType, MASTER_PLAYER_ID,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Gap between discovery requests while waiting for the join to land.
const JOIN_RETRY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// This node has to take over as master.
    Promote {
        old_master: Option<PlayerId>,
        old_master_left: bool,
    },
    /// The master removed this node from the game.
    Terminate { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JoinStatus {
    Pending,
    Joined(PlayerId),
    Refused(String),
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub player_name: String,
    pub player_type: PlayerType,
    pub requested_role: NodeRole,
}

impl JoinRequest {
    pub fn new(player_name: &str, requested_role: NodeRole) -> Self {
        Self {
            player_name: player_name.to_string(),
            player_type: PlayerType::Human,
            requested_role,
        }
    }
}

pub struct Player {
    pub(crate) node: Arc<Node>,
    pub(crate) directory: GameDirectory,
    pub(crate) game: DiscoveredGame,
    pub(crate) request: JoinRequest,
    pub(crate) join_sent: AtomicBool,
    pub(crate) master_id: AtomicI32,
    pub(crate) promoting: AtomicBool,
    pub(crate) join_tx: watch::Sender<JoinStatus>,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<PlayerEvent>>,
}

impl Player {
    pub async fn new(
        transport: Transport,
        game: DiscoveredGame,
        directory: GameDirectory,
        request: JoinRequest,
    ) -> Self {
        let mut me = GamePlayer::new(&request.player_name, 0, request.requested_role, None);
        me.player_type = request.player_type;

        let master_id = game
            .players
            .iter()
            .find(|p| p.role == NodeRole::Master)
            .map_or(MASTER_PLAYER_ID, |p| p.id);

        let node = Node::new(transport, game.config, me, None, Some(game.name.clone()));
        node.set_master_addr(Some(game.master_addr)).await;

        let (join_tx, _) = watch::channel(JoinStatus::Pending);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            node: Arc::new(node),
            directory,
            game,
            request,
            join_sent: AtomicBool::new(false),
            master_id: AtomicI32::new(master_id),
            promoting: AtomicBool::new(false),
            join_tx,
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn directory(&self) -> &GameDirectory {
        &self.directory
    }

    pub fn game_name(&self) -> &str {
        &self.game.name
    }

    pub fn master_id(&self) -> PlayerId {
        self.master_id.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.node.snapshot().await
    }

    pub fn start(self: &Arc<Self>) -> Lifecycle {
        let mut lifecycle = Lifecycle::new();

        let player = Arc::clone(self);
        lifecycle.spawn(
            "player-unicast",
            receive_loop(
                self.node.transport().unicast_socket(),
                lifecycle.signal(),
                "unicast",
                move |message, from| {
                    let player = Arc::clone(&player);
                    async move { player.handle_message(message, from).await }
                },
            ),
        );

        if let Some(socket) = self.node.transport().multicast_socket() {
            let player = Arc::clone(self);
            lifecycle.spawn(
                "player-multicast",
                receive_loop(socket, lifecycle.signal(), "multicast", move |message, from| {
                    let player = Arc::clone(&player);
                    async move { player.handle_multicast(message, from).await }
                }),
            );
        }

        lifecycle.spawn(
            "player-liveness",
            Arc::clone(self).run_liveness(lifecycle.signal()),
        );
        lifecycle.spawn(
            "player-resend",
            Arc::clone(&self.node).run_resend(lifecycle.signal()),
        );
        lifecycle.spawn(
            "player-ping",
            Arc::clone(&self.node).run_pings(lifecycle.signal()),
        );

        info!("Player started with {} tasks", lifecycle.task_count());
        lifecycle
    }

    /// Asks the master for its announcement and waits for the join it
    /// triggers to be accepted or refused. The task set must be running.
    pub async fn join(&self, timeout: Duration) -> Result<PlayerId, JoinError> {
        let deadline = Instant::now() + timeout;
        let mut status = self.join_tx.subscribe();
        self.node.touch(self.master_id());

        loop {
            let current = status.borrow_and_update().clone();
            match current {
                JoinStatus::Joined(id) => return Ok(id),
                JoinStatus::Refused(reason) => return Err(JoinError::Refused(reason)),
                JoinStatus::Pending => {}
            }
            if Instant::now() >= deadline {
                return Err(JoinError::Timeout);
            }

            if !self.join_sent.load(Ordering::SeqCst) {
                debug!("Requesting announcement from {}", self.game.master_addr);
                self.node
                    .send(GameMessage::new(Payload::Discover), self.game.master_addr)
                    .await?;
            }

            let wait_until = (Instant::now() + JOIN_RETRY).min(deadline);
            if let Ok(Err(_)) = tokio::time::timeout_at(wait_until, status.changed()).await {
                return Err(JoinError::Timeout);
            }
        }
    }

    pub(crate) async fn send_join(&self, master_addr: SocketAddr) {
        if self.join_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        let message = GameMessage::new(Payload::Join {
            player_name: self.request.player_name.clone(),
            player_type: self.request.player_type,
            game_name: self.game.name.clone(),
            requested_role: self.request.requested_role,
        });
        match self.node.send(message, master_addr).await {
            Ok(seq) => info!("Join #{} sent to {}", seq, master_addr),
            Err(e) => {
                warn!("Failed to send join to {}: {}", master_addr, e);
                self.join_sent.store(false, Ordering::SeqCst);
            }
        }
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        if self.events_tx.send(event).is_err() {
            warn!("Player event dropped, nobody is listening");
        }
    }

    /// Next promotion or removal notice.
    pub async fn next_event(&self) -> Option<PlayerEvent> {
        self.events_rx.lock().await.recv().await
    }

    /// Sends a steer request to the master. Viewers and nodes without a
    /// master send nothing.
    pub async fn steer(&self, direction: Direction) -> Result<bool, NodeError> {
        let (role, master_addr) = {
            let session = self.node.session().await;
            (session.me.role, session.master_addr)
        };
        let Some(addr) = master_addr else {
            return Ok(false);
        };
        if role == NodeRole::Viewer || self.node.id() == 0 {
            return Ok(false);
        }
        self.node
            .send(GameMessage::new(Payload::Steer { direction }), addr)
            .await?;
        Ok(true)
    }

    /// Asks the master for a role change. Becoming a viewer also takes
    /// effect locally right away.
    pub async fn request_role(&self, role: NodeRole) -> Result<(), NodeError> {
        let (current, master_addr) = {
            let session = self.node.session().await;
            (session.me.role, session.master_addr)
        };
        let Some(addr) = master_addr else {
            return Ok(());
        };
        let message = GameMessage::new(Payload::RoleChange {
            sender_role: current,
            receiver_role: role,
        })
        .to(self.master_id());
        self.node.send(message, addr).await?;

        if role == NodeRole::Viewer {
            self.node.set_role(NodeRole::Viewer).await;
        }
        Ok(())
    }

    /// Points this node at a master found at `addr`. A normal player also
    /// asks the new master to make it deputy.
    pub(crate) async fn follow_master(&self, addr: SocketAddr, master_id: Option<PlayerId>) {
        let role = {
            let mut session = self.node.session().await;
            if session.master_addr == Some(addr) {
                return;
            }
            session.master_addr = Some(addr);
            session.me.role
        };

        info!("Following master at {}", addr);
        self.node.clear_tables();
        let id = master_id.unwrap_or_else(|| self.master_id());
        self.master_id.store(id, Ordering::SeqCst);
        self.node.touch(id);

        if role == NodeRole::Normal {
            let message = GameMessage::new(Payload::RoleChange {
                sender_role: NodeRole::Normal,
                receiver_role: NodeRole::Deputy,
            })
            .to(id);
            if let Err(e) = self.node.send(message, addr).await {
                warn!("Failed to introduce to new master {}: {}", addr, e);
            }
        }
    }

    async fn run_liveness(self: Arc<Self>, mut stop: StopSignal) {
        let timeout = self.node.config().liveness_timeout();
        let mut ticker = interval(timeout);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.raised() => break,
                _ = ticker.tick() => self.check_master(timeout).await,
            }
        }
    }

    /// Reacts to a master that has been silent for longer than `timeout`:
    /// the deputy takes over, everyone else looks for a moved master.
    pub async fn check_master(&self, timeout: Duration) {
        if self.promoting.load(Ordering::SeqCst) || self.node.id() == 0 {
            return;
        }
        let master_id = self.master_id();
        let silent = self
            .node
            .last_interaction(master_id)
            .map_or(true, |at| at.elapsed() > timeout);
        if !silent {
            return;
        }

        if self.node.role().await == NodeRole::Deputy {
            if !self.promoting.swap(true, Ordering::SeqCst) {
                warn!("Master {} is silent, deputy taking over", master_id);
                self.emit(PlayerEvent::Promote {
                    old_master: Some(master_id),
                    old_master_left: false,
                });
            }
            return;
        }

        let Some(game) = self.directory.find(&self.game.name).await else {
            debug!("Master {} is silent, waiting for a new one", master_id);
            return;
        };
        if Some(game.master_addr) != self.node.master_addr().await {
            let new_master = game
                .players
                .iter()
                .find(|p| p.role == NodeRole::Master)
                .map(|p| p.id);
            self.follow_master(game.master_addr, new_master).await;
        }
    }
}
