//! Master task set: announcements, receive loops, liveness checks, the
//! simulation tick with state broadcast, and the handoff when the master
//! itself leaves the game.

use crate::game::{self, SpawnRules};
use crate::roster;
use chrono::Local;
use log::{debug, error, info, warn};
use node::{receive_loop, Lifecycle, Node, NodeError, Snapshot, StopSignal, Transport, ANNOUNCE_INTERVAL};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    Direction, GameAnnouncement, GameConfig, GameMessage, GamePlayer, GameState, NodeRole,
    Payload, PlayerId, CRASHED_MESSAGE,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Why a master task set asks its owner to shut it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterExit {
    /// The master's own snake died or it stepped down; control was handed
    /// to the deputy, if there was one.
    Evicted,
}

pub fn generate_game_name() -> String {
    format!("game_{}", Local::now().format("%Y%m%d_%H%M%S"))
}

pub struct Master {
    pub(crate) node: Arc<Node>,
    pub(crate) rules: SpawnRules,
    pub(crate) can_join: AtomicBool,
    pub(crate) last_state_order: AtomicI32,
    stepping_down: AtomicBool,
    evicted: AtomicBool,
    seed: Option<u64>,
    exit_tx: mpsc::UnboundedSender<MasterExit>,
    exit_rx: Mutex<mpsc::UnboundedReceiver<MasterExit>>,
}

impl Master {
    fn from_node(node: Node, rules: SpawnRules) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            node: Arc::new(node),
            rules,
            can_join: AtomicBool::new(true),
            last_state_order: AtomicI32::new(0),
            stepping_down: AtomicBool::new(false),
            evicted: AtomicBool::new(false),
            seed: None,
            exit_tx,
            exit_rx: Mutex::new(exit_rx),
        }
    }

    /// Hosts a fresh game with this process as player 1.
    pub fn host(transport: Transport, config: GameConfig, name: &str) -> Self {
        let state = game::initial_state(&config, name);
        let me = state.players[0].clone();
        let game_name = generate_game_name();
        info!("Hosting {} ({}x{}) as {}", game_name, config.width, config.height, name);

        let node = Node::new(transport, config, me, Some(state), Some(game_name));
        Self::from_node(node, SpawnRules::default())
    }

    /// Takes over a running game from the last known state. `old_master_left`
    /// is set when the previous master handed control over itself.
    /// Numbering resumes at `first_seq`, the next number of the node this
    /// master replaces on the same socket.
    #[allow(clippy::too_many_arguments)]
    pub async fn promote(
        transport: Transport,
        config: GameConfig,
        me: GamePlayer,
        mut state: GameState,
        game_name: Option<String>,
        old_master: Option<PlayerId>,
        old_master_left: bool,
        first_seq: i64,
    ) -> Self {
        let my_id = me.id;
        let new_deputy = roster::promote(&mut state, my_id, old_master, old_master_left);
        let peers: Vec<PlayerId> = state
            .players
            .iter()
            .map(|p| p.id)
            .filter(|id| *id != my_id)
            .collect();

        let mut me = me;
        me.role = NodeRole::Master;
        info!(
            "Player {} promoted to master of {} at order {}",
            my_id,
            game_name.as_deref().unwrap_or("<unnamed>"),
            state.state_order
        );

        let node = Node::new(transport, config, me, Some(state), game_name).with_first_seq(first_seq);
        for id in peers {
            node.touch(id);
        }

        let master = Self::from_node(node, SpawnRules::default());
        if let Some(id) = new_deputy {
            master.notify_role(id, NodeRole::Deputy).await;
        }
        master
    }

    pub fn with_rules(mut self, rules: SpawnRules) -> Self {
        self.rules = rules;
        self
    }

    /// Seeds the simulation's random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        self.node.transport().local_addr()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.node.snapshot().await
    }

    pub async fn game_name(&self) -> Option<String> {
        self.node.session().await.game_name.clone()
    }

    /// Steers the master's own snake under the session lock.
    pub async fn steer(&self, direction: Direction) -> bool {
        let my_id = self.node.id();
        let mut session = self.node.session().await;
        session
            .state
            .as_mut()
            .and_then(|state| state.snake_mut(my_id))
            .map_or(false, |snake| snake.is_alive() && snake.steer(direction))
    }

    /// Only stepping down to viewer is meaningful for the master: it hands
    /// the game to the deputy on the next tick.
    pub fn request_role(&self, role: NodeRole) {
        if role == NodeRole::Viewer {
            info!("Master stepping down");
            self.stepping_down.store(true, Ordering::SeqCst);
        } else {
            warn!("Master cannot switch to {:?}", role);
        }
    }

    /// Waits until the task set asks to be shut down.
    pub async fn wait_exit(&self) -> MasterExit {
        match self.exit_rx.lock().await.recv().await {
            Some(exit) => exit,
            None => MasterExit::Evicted,
        }
    }

    pub fn start(self: &Arc<Self>) -> Lifecycle {
        let mut lifecycle = Lifecycle::new();

        let master = Arc::clone(self);
        lifecycle.spawn(
            "master-unicast",
            receive_loop(
                self.node.transport().unicast_socket(),
                lifecycle.signal(),
                "unicast",
                move |message, from| {
                    let master = Arc::clone(&master);
                    async move { master.handle_message(message, from).await }
                },
            ),
        );

        if let Some(socket) = self.node.transport().multicast_socket() {
            let master = Arc::clone(self);
            lifecycle.spawn(
                "master-multicast",
                receive_loop(socket, lifecycle.signal(), "multicast", move |message, from| {
                    let master = Arc::clone(&master);
                    async move { master.handle_multicast(message, from).await }
                }),
            );
        }

        lifecycle.spawn(
            "master-announce",
            Arc::clone(self).run_announcements(lifecycle.signal()),
        );
        lifecycle.spawn(
            "master-liveness",
            Arc::clone(self).run_liveness(lifecycle.signal()),
        );
        lifecycle.spawn("master-tick", Arc::clone(self).run_ticks(lifecycle.signal()));
        lifecycle.spawn(
            "master-resend",
            Arc::clone(&self.node).run_resend(lifecycle.signal()),
        );
        lifecycle.spawn(
            "master-ping",
            Arc::clone(&self.node).run_pings(lifecycle.signal()),
        );

        info!("Master started with {} tasks", lifecycle.task_count());
        lifecycle
    }

    pub(crate) async fn announcement(&self) -> Option<GameMessage> {
        let session = self.node.session().await;
        let state = session.state.as_ref()?;
        let game = GameAnnouncement {
            players: state.players.clone(),
            config: self.node.config(),
            can_join: self.can_join.load(Ordering::SeqCst),
            game_name: session.game_name.clone().unwrap_or_default(),
        };
        Some(GameMessage::new(Payload::Announcement { games: vec![game] }))
    }

    pub(crate) async fn send_announcement(&self, dest: SocketAddr) {
        if let Some(message) = self.announcement().await {
            if let Err(e) = self.node.send(message, dest).await {
                warn!("Failed to answer discovery from {}: {}", dest, e);
            }
        }
    }

    /// Recomputes `can_join` and multicasts the announcement.
    pub async fn announce(&self) {
        {
            let session = self.node.session().await;
            if let Some(state) = session.state.as_ref() {
                let open = game::can_join(state, &self.node.config(), &self.rules);
                self.can_join.store(open, Ordering::SeqCst);
            }
        }

        if self.node.transport().multicast_group().is_none() {
            return;
        }
        if let Some(message) = self.announcement().await {
            if let Err(e) = self.node.send_multicast(message).await {
                warn!("Failed to send announcement: {}", e);
            }
        }
    }

    async fn run_announcements(self: Arc<Self>, mut stop: StopSignal) {
        let mut ticker = interval(ANNOUNCE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.raised() => break,
                _ = ticker.tick() => {
                    if !self.evicted.load(Ordering::SeqCst) {
                        self.announce().await;
                    }
                }
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
                _ = ticker.tick() => {
                    if self.evicted.load(Ordering::SeqCst) {
                        continue;
                    }
                    let my_id = self.node.id();
                    for id in self.node.silent_peers(timeout) {
                        if id == my_id {
                            continue;
                        }
                        info!("Player {} timed out", id);
                        self.expel(id, None).await;
                    }
                }
            }
        }
    }

    /// Removes a player through the standard path and, when `notice` is
    /// given, tells it to leave.
    pub async fn expel(&self, id: PlayerId, notice: Option<&str>) {
        let removal = {
            let mut session = self.node.session().await;
            match session.state.as_mut() {
                Some(state) => roster::remove_player(state, id),
                None => None,
            }
        };

        let Some(removal) = removal else {
            self.node.forget_peer(id, None);
            return;
        };
        self.node.forget_peer(id, removal.removed.addr);

        if let (Some(text), Some(addr)) = (notice, removal.removed.addr) {
            let message = GameMessage::new(Payload::Error {
                error_message: text.to_string(),
            })
            .to(id);
            if let Err(e) = self.node.send(message, addr).await {
                warn!("Failed to notify player {}: {}", id, e);
            }
        }

        if let Some(deputy) = removal.new_deputy {
            self.notify_role(deputy, NodeRole::Deputy).await;
        }
    }

    /// Sends RoleChange{Master -> role} to a player in the current state.
    pub async fn notify_role(&self, id: PlayerId, role: NodeRole) {
        let addr = {
            let session = self.node.session().await;
            session
                .state
                .as_ref()
                .and_then(|state| state.player(id))
                .and_then(|p| p.addr)
        };
        let Some(addr) = addr else {
            warn!("No address known for player {}", id);
            return;
        };

        let message = GameMessage::new(Payload::RoleChange {
            sender_role: NodeRole::Master,
            receiver_role: role,
        })
        .to(id);
        match self.node.send(message, addr).await {
            Ok(_) => info!("Player {} assigned as {:?}", id, role),
            Err(e) => warn!("Failed to send role change to {}: {}", id, e),
        }
    }

    async fn run_ticks(self: Arc<Self>, mut stop: StopSignal) {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let period = self.node.config().tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.raised() => return,
                _ = ticker.tick() => {
                    if !self.step(&mut rng).await {
                        break;
                    }
                }
            }
        }

        // Keep answering for one announcement period so the handoff lands.
        tokio::select! {
            _ = stop.raised() => {}
            _ = tokio::time::sleep(ANNOUNCE_INTERVAL) => {}
        }
        if self.exit_tx.send(MasterExit::Evicted).is_err() {
            error!("Nobody is waiting for the master to exit");
        }
    }

    /// Runs one tick and broadcasts the result. Returns false once the
    /// master has left the game.
    pub async fn step(&self, rng: &mut StdRng) -> bool {
        let my_id = self.node.id();
        let config = self.node.config();

        let crashed: Vec<PlayerId> = {
            let mut session = self.node.session().await;
            let Some(state) = session.state.as_mut() else {
                return true;
            };
            let outcome = game::tick(state, &config, rng);
            outcome.crashed_players().collect()
        };

        let mut own_death = false;
        for id in crashed {
            if id == my_id {
                own_death = true;
            } else {
                info!("Player {} crashed", id);
                self.expel(id, Some(CRASHED_MESSAGE)).await;
            }
        }

        if own_death || self.stepping_down.load(Ordering::SeqCst) {
            // The final tick reaches the deputy before it is asked to take over.
            self.broadcast_state().await;
            self.hand_off().await;
            return false;
        }

        self.broadcast_state().await;
        true
    }

    /// Sends the current state to every other player with an address.
    pub async fn broadcast_state(&self) {
        let my_id = self.node.id();
        let (state, targets) = {
            let session = self.node.session().await;
            let Some(state) = session.state.clone() else {
                return;
            };
            let targets: Vec<(PlayerId, SocketAddr)> = state
                .players
                .iter()
                .filter(|p| p.id != my_id)
                .filter_map(|p| p.addr.map(|addr| (p.id, addr)))
                .collect();
            (state, targets)
        };

        debug!("Broadcasting state {} to {} players", state.state_order, targets.len());
        for (id, addr) in targets {
            let message = GameMessage::new(Payload::State {
                state: state.clone(),
            })
            .to(id);
            if let Err(e) = self.node.send(message, addr).await {
                warn!("Failed to send state to player {}: {}", id, e);
            }
        }
    }

    /// Drops the master's own record and asks the deputy to take over.
    async fn hand_off(&self) {
        self.evicted.store(true, Ordering::SeqCst);
        let my_id = self.node.id();

        let deputy = {
            let mut session = self.node.session().await;
            match session.state.as_mut() {
                Some(state) => {
                    state.players.retain(|p| p.id != my_id);
                    roster::make_snake_zombie(state, my_id);
                    state
                        .with_role(NodeRole::Deputy)
                        .and_then(|p| p.addr.map(|addr| (p.id, addr)))
                }
                None => None,
            }
        };

        let Some((deputy_id, addr)) = deputy else {
            warn!("Master leaving with no deputy, the game ends here");
            return;
        };

        let message = GameMessage::new(Payload::RoleChange {
            sender_role: NodeRole::Master,
            receiver_role: NodeRole::Master,
        })
        .to(deputy_id);
        match self.node.send(message, addr).await {
            Ok(_) => info!("Handing the game to deputy {}", deputy_id),
            Err(e) => error!("Handoff to deputy {} failed: {}", deputy_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Coord;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    fn test_config() -> GameConfig {
        GameConfig {
            width: 10,
            height: 10,
            food_static: 0,
            state_delay_ms: 100,
        }
    }

    async fn recv_message(socket: &UdpSocket) -> GameMessage {
        let mut buffer = vec![0u8; 65_507];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        GameMessage::decode(&buffer[..len]).unwrap()
    }

    #[test]
    fn test_game_name_format() {
        let name = generate_game_name();
        assert!(name.starts_with("game_"));
        assert_eq!(name.len(), "game_20240101_120000".len());
        assert_eq!(&name[13..14], "_");
    }

    #[tokio::test]
    async fn test_host_builds_fresh_game() {
        let transport = Transport::loopback().await.unwrap();
        let master = Master::host(transport, test_config(), "host");

        let snapshot = master.snapshot().await;
        assert_eq!(snapshot.me.role, NodeRole::Master);
        assert_eq!(snapshot.me.id, 1);
        assert_eq!(snapshot.state.unwrap().state_order, 1);
        assert!(master.node().is_ready());
        assert!(master.game_name().await.unwrap().starts_with("game_"));
        tokio_test::assert_pending!(tokio_test::task::spawn(master.wait_exit()).poll());
    }

    #[tokio::test]
    async fn test_local_steer_rejects_reversal() {
        let transport = Transport::loopback().await.unwrap();
        let master = Master::host(transport, test_config(), "host");

        assert!(!master.steer(Direction::Left).await);
        assert!(master.steer(Direction::Up).await);
        let state = master.snapshot().await.state.unwrap();
        assert_eq!(state.snake(1).unwrap().head_direction, Direction::Up);
    }

    #[tokio::test]
    async fn test_step_broadcasts_state() {
        let transport = Transport::loopback().await.unwrap();
        let master = Master::host(transport, test_config(), "host");
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        {
            let mut session = master.node().session().await;
            let state = session.state.as_mut().unwrap();
            state.players.push(GamePlayer::new(
                "watcher",
                2,
                NodeRole::Viewer,
                Some(peer.local_addr().unwrap()),
            ));
        }

        let mut rng = StdRng::seed_from_u64(1);
        assert!(master.step(&mut rng).await);

        let message = recv_message(&peer).await;
        assert_eq!(message.receiver_id, Some(2));
        match message.payload {
            Payload::State { state } => {
                assert_eq!(state.state_order, 2);
                assert_eq!(state.foods.len(), 1);
            }
            other => panic!("Expected state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expel_notifies_and_reassigns_deputy() {
        let transport = Transport::loopback().await.unwrap();
        let master = Master::host(transport, test_config(), "host");
        let deputy = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let normal = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        {
            let mut session = master.node().session().await;
            let state = session.state.as_mut().unwrap();
            state.players.push(GamePlayer::new(
                "d",
                2,
                NodeRole::Deputy,
                Some(deputy.local_addr().unwrap()),
            ));
            state.players.push(GamePlayer::new(
                "n",
                3,
                NodeRole::Normal,
                Some(normal.local_addr().unwrap()),
            ));
        }

        master.expel(2, Some(CRASHED_MESSAGE)).await;

        match recv_message(&deputy).await.payload {
            Payload::Error { error_message } => assert_eq!(error_message, CRASHED_MESSAGE),
            other => panic!("Expected error, got {:?}", other),
        }
        match recv_message(&normal).await.payload {
            Payload::RoleChange {
                sender_role,
                receiver_role,
            } => {
                assert_eq!(sender_role, NodeRole::Master);
                assert_eq!(receiver_role, NodeRole::Deputy);
            }
            other => panic!("Expected role change, got {:?}", other),
        }

        let state = master.snapshot().await.state.unwrap();
        assert!(state.player(2).is_none());
        assert_eq!(state.player(3).unwrap().role, NodeRole::Deputy);

        // A second removal of the same id changes nothing.
        master.expel(2, Some(CRASHED_MESSAGE)).await;
        assert_eq!(master.snapshot().await.state.unwrap(), state);
    }

    #[tokio::test]
    async fn test_step_down_hands_off_to_deputy() {
        let transport = Transport::loopback().await.unwrap();
        let master = Master::host(transport, test_config(), "host");
        let deputy = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        {
            let mut session = master.node().session().await;
            let state = session.state.as_mut().unwrap();
            state.players.push(GamePlayer::new(
                "d",
                2,
                NodeRole::Deputy,
                Some(deputy.local_addr().unwrap()),
            ));
        }

        master.request_role(NodeRole::Viewer);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!master.step(&mut rng).await);

        match recv_message(&deputy).await.payload {
            Payload::State { state } => assert_eq!(state.state_order, 2),
            other => panic!("Expected final state, got {:?}", other),
        }
        let message = recv_message(&deputy).await;
        assert_eq!(message.receiver_id, Some(2));
        assert_eq!(
            message.payload,
            Payload::RoleChange {
                sender_role: NodeRole::Master,
                receiver_role: NodeRole::Master,
            }
        );
        let state = master.snapshot().await.state.unwrap();
        assert!(state.player(1).is_none());
        assert!(state.is_zombie(1));
    }

    #[tokio::test]
    async fn test_final_tick_reaches_players_before_handoff() {
        let transport = Transport::loopback().await.unwrap();
        let master = Master::host(transport, test_config(), "host");
        let deputy = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let normal = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        {
            let mut session = master.node().session().await;
            let state = session.state.as_mut().unwrap();
            // Heading down into its own body.
            state.snakes[0].points = vec![
                Coord::new(5, 5),
                Coord::new(4, 5),
                Coord::new(4, 6),
                Coord::new(5, 6),
                Coord::new(6, 6),
            ];
            state.snakes[0].head_direction = Direction::Down;
            state.players.push(GamePlayer::new(
                "d",
                2,
                NodeRole::Deputy,
                Some(deputy.local_addr().unwrap()),
            ));
            state.players.push(GamePlayer::new(
                "n",
                3,
                NodeRole::Normal,
                Some(normal.local_addr().unwrap()),
            ));
        }

        let mut rng = StdRng::seed_from_u64(1);
        assert!(!master.step(&mut rng).await);

        for socket in [&deputy, &normal] {
            match recv_message(socket).await.payload {
                Payload::State { state } => {
                    assert_eq!(state.state_order, 2);
                    assert!(state.snake(1).is_none());
                }
                other => panic!("Expected final state, got {:?}", other),
            }
        }
        assert_eq!(
            recv_message(&deputy).await.payload,
            Payload::RoleChange {
                sender_role: NodeRole::Master,
                receiver_role: NodeRole::Master,
            }
        );
    }

    #[tokio::test]
    async fn test_promoted_master_ignores_earlier_acks() {
        let transport = Transport::loopback().await.unwrap();
        let normal = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let normal_addr = normal.local_addr().unwrap();
        let config = test_config();
        let mut state = game::initial_state(&config, "old");
        state.players.push(GamePlayer::new("d", 2, NodeRole::Deputy, None));
        state
            .players
            .push(GamePlayer::new("n", 3, NodeRole::Normal, Some(normal_addr)));
        let me = state.player(2).unwrap().clone();

        // The deputy's player side already used numbers 1..40.
        let master = Master::promote(transport, config, me, state, None, Some(1), false, 40).await;

        let introduction = recv_message(&normal).await;
        assert_eq!(introduction.msg_seq, 40);
        assert!(master.node().is_pending(40));

        let mut lifecycle = Lifecycle::new();
        lifecycle.spawn(
            "resend",
            Arc::clone(master.node()).run_resend(lifecycle.signal()),
        );
        for seq in 1..40 {
            master
                .handle_message(GameMessage::ack(seq, Some(2)), normal_addr)
                .await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(master.node().is_pending(40));
        assert_eq!(master.node().pending_len(), 1);
        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn test_promote_notifies_new_deputy() {
        let transport = Transport::loopback().await.unwrap();
        let normal = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = test_config();
        let mut state = game::initial_state(&config, "old");
        state.players.push(GamePlayer::new("d", 2, NodeRole::Deputy, None));
        state.players.push(GamePlayer::new(
            "n",
            3,
            NodeRole::Normal,
            Some(normal.local_addr().unwrap()),
        ));
        let me = state.player(2).unwrap().clone();

        let master = Master::promote(
            transport,
            config,
            me,
            state,
            Some("game_x".to_string()),
            Some(1),
            false,
            1,
        )
        .await;

        let snapshot = master.snapshot().await;
        assert_eq!(snapshot.me.role, NodeRole::Master);
        let state = snapshot.state.unwrap();
        assert_eq!(state.player(1).unwrap().role, NodeRole::Viewer);
        assert!(state.is_zombie(1));
        assert_eq!(state.player(3).unwrap().role, NodeRole::Deputy);
        assert!(master.node().last_interaction(3).is_some());

        let message = recv_message(&normal).await;
        assert_eq!(
            message.payload,
            Payload::RoleChange {
                sender_role: NodeRole::Master,
                receiver_role: NodeRole::Deputy,
            }
        );
        assert_eq!(message.sender_id, 2);
    }
}
