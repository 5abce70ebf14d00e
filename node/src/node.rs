//! Reliable messaging over the unicast endpoint.
//!
//! Every outbound message that is not ack-exempt gets the next sequence
//! number and stays in the pending table until the peer acknowledges it; the
//! resend task retransmits entries older than one resend interval with their
//! sequence number unchanged. Liveness bookkeeping (last interaction per
//! peer id, last send per address) lives here too, along with the session
//! state shared by the role-specific dispatchers.

use crate::error::NodeError;
use crate::lifecycle::StopSignal;
use crate::transport::Transport;
use dashmap::DashMap;
use log::{debug, info, warn};
use shared::{GameConfig, GameMessage, GamePlayer, GameState, NodeRole, Payload, PlayerId};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex, MutexGuard};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub message: GameMessage,
    pub dest: SocketAddr,
    pub sent_at: Instant,
}

/// Mutable per-process game view, guarded by one lock.
#[derive(Debug)]
pub struct Session {
    pub me: GamePlayer,
    pub state: Option<GameState>,
    pub game_name: Option<String>,
    pub master_addr: Option<SocketAddr>,
}

/// Read-only copy handed to front ends.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: GameConfig,
    pub state: Option<GameState>,
    pub me: GamePlayer,
}

pub struct Node {
    transport: Transport,
    config: GameConfig,
    msg_seq: AtomicI64,
    my_id: AtomicI32,
    pending: DashMap<i64, PendingMessage>,
    last_interaction: DashMap<PlayerId, Instant>,
    last_sent: DashMap<SocketAddr, Instant>,
    session: Mutex<Session>,
    ready_tx: watch::Sender<bool>,
    ack_tx: mpsc::UnboundedSender<i64>,
    ack_rx: Mutex<Option<mpsc::UnboundedReceiver<i64>>>,
}

impl Node {
    /// A node constructed with a state is ready immediately.
    pub fn new(
        transport: Transport,
        config: GameConfig,
        me: GamePlayer,
        state: Option<GameState>,
        game_name: Option<String>,
    ) -> Self {
        let (ready_tx, _) = watch::channel(state.is_some());
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        Self {
            transport,
            config,
            msg_seq: AtomicI64::new(1),
            my_id: AtomicI32::new(me.id),
            pending: DashMap::new(),
            last_interaction: DashMap::new(),
            last_sent: DashMap::new(),
            session: Mutex::new(Session {
                me,
                state,
                game_name,
                master_addr: None,
            }),
            ready_tx,
            ack_tx,
            ack_rx: Mutex::new(Some(ack_rx)),
        }
    }

    /// Continues numbering after `seq`, so acks still in flight for an
    /// earlier node on the same socket cannot match new messages.
    pub fn with_first_seq(self, seq: i64) -> Self {
        self.msg_seq.store(seq.max(1), Ordering::SeqCst);
        self
    }

    /// The sequence number the next tracked message will carry.
    pub fn next_seq(&self) -> i64 {
        self.msg_seq.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn id(&self) -> PlayerId {
        self.my_id.load(Ordering::SeqCst)
    }

    pub async fn set_id(&self, id: PlayerId) {
        self.my_id.store(id, Ordering::SeqCst);
        self.session.lock().await.me.id = id;
    }

    pub async fn role(&self) -> NodeRole {
        self.session.lock().await.me.role
    }

    pub async fn set_role(&self, role: NodeRole) {
        self.session.lock().await.me.role = role;
    }

    pub async fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    pub async fn snapshot(&self) -> Snapshot {
        let session = self.session.lock().await;
        Snapshot {
            config: self.config,
            state: session.state.clone(),
            me: session.me.clone(),
        }
    }

    pub async fn master_addr(&self) -> Option<SocketAddr> {
        self.session.lock().await.master_addr
    }

    pub async fn set_master_addr(&self, addr: Option<SocketAddr>) {
        self.session.lock().await.master_addr = addr;
    }

    /// Replaces the current snapshot if `state` is strictly newer.
    pub async fn adopt_state(&self, state: GameState) -> bool {
        let mut session = self.session.lock().await;
        let newer = session
            .state
            .as_ref()
            .map_or(true, |current| state.state_order > current.state_order);
        if !newer {
            return false;
        }
        if let Some(me) = state.player(self.id()) {
            session.me.role = me.role;
            session.me.score = me.score;
        }
        session.state = Some(state);
        drop(session);
        self.mark_ready();
        true
    }

    pub fn mark_ready(&self) {
        self.ready_tx.send_if_modified(|ready| {
            let changed = !*ready;
            *ready = true;
            changed
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Waits until the first snapshot has been stored.
    pub async fn wait_for_state(&self) {
        let mut rx = self.ready_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stamps, tracks and transmits `message`. Returns the sequence number
    /// carried on the wire.
    pub async fn send(&self, mut message: GameMessage, dest: SocketAddr) -> Result<i64, NodeError> {
        message.sender_id = self.id();
        let tracked = !message.payload.is_ack_exempt();
        if tracked {
            message.msg_seq = self.msg_seq.fetch_add(1, Ordering::SeqCst);
        }
        let seq = message.msg_seq;
        let bytes = message.encode()?;

        if tracked {
            self.pending.insert(
                seq,
                PendingMessage {
                    message,
                    dest,
                    sent_at: Instant::now(),
                },
            );
        }

        if let Err(e) = self.transport.send_to(&bytes, dest).await {
            if tracked {
                self.pending.remove(&seq);
            }
            return Err(e);
        }

        self.last_sent.insert(dest, Instant::now());
        Ok(seq)
    }

    /// Sends an exempt message to the discovery group.
    pub async fn send_multicast(&self, mut message: GameMessage) -> Result<(), NodeError> {
        message.sender_id = self.id();
        let bytes = message.encode()?;
        self.transport.send_multicast(&bytes).await
    }

    pub fn acknowledge(&self, seq: i64) -> bool {
        self.pending.remove(&seq).is_some()
    }

    /// Queues an inbound acknowledgment for the resend task.
    pub fn deliver_ack(&self, seq: i64) {
        if self.ack_tx.send(seq).is_err() {
            self.acknowledge(seq);
        }
    }

    /// Resolves who sent `message`: the player registered at `from`, or the
    /// embedded sender id when it is set.
    pub async fn resolve_sender(&self, message: &GameMessage, from: SocketAddr) -> Option<PlayerId> {
        let by_addr = {
            let session = self.session.lock().await;
            session
                .state
                .as_ref()
                .and_then(|state| state.player_by_addr(from))
                .map(|p| p.id)
        };
        by_addr.or((message.sender_id > 0).then_some(message.sender_id))
    }

    pub async fn send_ack(&self, message: &GameMessage, from: SocketAddr) {
        if message.payload.is_ack_exempt() {
            return;
        }
        let receiver = self.resolve_sender(message, from).await;
        self.send_ack_to(message.msg_seq, receiver, from).await;
    }

    pub async fn send_ack_to(&self, seq: i64, receiver: Option<PlayerId>, dest: SocketAddr) {
        if let Err(e) = self.send(GameMessage::ack(seq, receiver), dest).await {
            warn!("Failed to acknowledge {} to {}: {}", seq, dest, e);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, seq: i64) -> bool {
        self.pending.contains_key(&seq)
    }

    /// Retransmits every pending message at least one resend interval old.
    pub async fn resend_due(&self) -> usize {
        let threshold = self.config.resend_interval();
        let now = Instant::now();
        let due: Vec<(i64, GameMessage, SocketAddr)> = self
            .pending
            .iter()
            .filter(|entry| now.duration_since(entry.sent_at) >= threshold)
            .map(|entry| (*entry.key(), entry.message.clone(), entry.dest))
            .collect();

        let mut resent = 0;
        for (seq, message, dest) in due {
            let bytes = match message.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Dropping unencodable pending message {}: {}", seq, e);
                    self.pending.remove(&seq);
                    continue;
                }
            };
            match self.transport.send_to(&bytes, dest).await {
                Ok(()) => {
                    if let Some(mut entry) = self.pending.get_mut(&seq) {
                        entry.sent_at = Instant::now();
                    }
                    self.last_sent.insert(dest, Instant::now());
                    debug!("Resent {} #{} to {}", message.kind(), seq, dest);
                    resent += 1;
                }
                Err(e) => warn!("Resend of #{} to {} failed: {}", seq, dest, e),
            }
        }
        resent
    }

    /// Drains acknowledgments and retransmits on every resend interval
    /// until stopped, then clears all tables.
    pub async fn run_resend(self: std::sync::Arc<Self>, mut stop: StopSignal) {
        let Some(mut ack_rx) = self.ack_rx.lock().await.take() else {
            warn!("Resend task already running");
            return;
        };
        let mut ticker = interval(self.config.resend_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.raised() => break,
                Some(seq) = ack_rx.recv() => {
                    if self.acknowledge(seq) {
                        debug!("Message #{} acknowledged", seq);
                    }
                }
                _ = ticker.tick() => {
                    self.resend_due().await;
                }
            }
        }

        self.clear_tables();
        *self.ack_rx.lock().await = Some(ack_rx);
        debug!("Resend task stopped");
    }

    fn sent_within(&self, addr: SocketAddr, period: Duration) -> bool {
        self.last_sent
            .get(&addr)
            .map_or(false, |at| at.elapsed() < period)
    }

    /// Pings every peer this node has been quiet towards for a full period.
    pub async fn ping_idle_peers(&self) {
        let period = self.config.resend_interval();
        let targets: Vec<SocketAddr> = {
            let session = self.session.lock().await;
            if session.me.role == NodeRole::Master {
                match &session.state {
                    Some(state) => state
                        .players
                        .iter()
                        .filter(|p| p.id != session.me.id && !state.is_zombie(p.id))
                        .filter_map(|p| p.addr)
                        .collect(),
                    None => Vec::new(),
                }
            } else {
                session.master_addr.into_iter().collect()
            }
        };

        for addr in targets {
            if self.sent_within(addr, period) {
                continue;
            }
            if let Err(e) = self.send(GameMessage::new(Payload::Ping), addr).await {
                warn!("Ping to {} failed: {}", addr, e);
            }
        }
    }

    pub async fn run_pings(self: std::sync::Arc<Self>, mut stop: StopSignal) {
        let mut ticker = interval(self.config.resend_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.raised() => break,
                _ = ticker.tick() => self.ping_idle_peers().await,
            }
        }
        debug!("Ping task stopped");
    }

    pub fn touch(&self, id: PlayerId) {
        if id > 0 {
            self.last_interaction.insert(id, Instant::now());
        }
    }

    pub fn last_interaction(&self, id: PlayerId) -> Option<Instant> {
        self.last_interaction.get(&id).map(|at| *at)
    }

    /// Peers whose last interaction is older than `timeout`.
    pub fn silent_peers(&self, timeout: Duration) -> Vec<PlayerId> {
        self.last_interaction
            .iter()
            .filter(|entry| entry.elapsed() > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drops every trace of a departed peer, including messages still
    /// waiting for its acknowledgment.
    pub fn forget_peer(&self, id: PlayerId, addr: Option<SocketAddr>) {
        self.last_interaction.remove(&id);
        if let Some(addr) = addr {
            self.last_sent.remove(&addr);
            self.pending.retain(|_, pending| pending.dest != addr);
        }
    }

    pub fn clear_pending(&self) {
        self.pending.clear();
    }

    pub fn clear_tables(&self) {
        self.pending.clear();
        self.last_interaction.clear();
        self.last_sent.clear();
        info!("Cleared messaging tables of node {}", self.id());
    }
}
