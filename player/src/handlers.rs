use crate::discovery::DirectoryUpdate;
use crate::network::{JoinStatus, Player, PlayerEvent};
use log::{debug, info, warn};
use shared::{GameMessage, NodeRole, Payload, CRASHED_MESSAGE, NO_SPACE_MESSAGE};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;

impl Player {
    pub(crate) async fn handle_message(&self, message: GameMessage, from: SocketAddr) {
        let sender_id = message.sender_id;
        let master_addr = self.node.master_addr().await;

        // Only traffic from the master's address counts towards its liveness.
        if Some(from) == master_addr {
            self.node.touch(sender_id);
        }
        self.node.send_ack(&message, from).await;

        match message.payload {
            Payload::Ack => {
                if let Some(id) = message.receiver_id.filter(|id| *id > 0) {
                    if self.node.id() == 0 {
                        info!("Joined {} as player {}", self.game.name, id);
                        self.node.set_id(id).await;
                        self.join_tx.send_replace(JoinStatus::Joined(id));
                    }
                }
                self.node.deliver_ack(message.msg_seq);
            }

            Payload::Announcement { ref games } => {
                for game in games {
                    self.directory.record(game, from).await;
                }
                if Some(from) == master_addr && self.node.id() == 0 {
                    self.send_join(from).await;
                }
            }

            Payload::State { state } => {
                let state_master = state.with_role(NodeRole::Master).map(|p| p.id);
                if Some(from) != master_addr {
                    if state_master != Some(sender_id) {
                        debug!("Ignoring state from non-master {}", from);
                        return;
                    }
                    self.follow_master(from, state_master).await;
                }

                let order = state.state_order;
                if self.node.adopt_state(state).await {
                    if let Some(id) = state_master {
                        self.master_id.store(id, Ordering::SeqCst);
                    }
                } else {
                    debug!("Ignoring stale state {}", order);
                }
            }

            Payload::Error { error_message } => {
                if error_message == NO_SPACE_MESSAGE && self.node.id() == 0 {
                    warn!("Join refused: {}", error_message);
                    self.join_tx
                        .send_replace(JoinStatus::Refused(error_message));
                } else if error_message == CRASHED_MESSAGE {
                    warn!("{}", error_message);
                    self.emit(PlayerEvent::Terminate {
                        reason: error_message,
                    });
                } else {
                    warn!("Error from {}: {}", from, error_message);
                }
            }

            Payload::RoleChange {
                sender_role,
                receiver_role,
            } => {
                if sender_role == NodeRole::Master && Some(from) != master_addr {
                    // The new master introduces itself; no deputy request.
                    self.node.set_master_addr(Some(from)).await;
                    self.node.clear_pending();
                    self.master_id.store(sender_id, Ordering::SeqCst);
                    self.node.touch(sender_id);
                }

                match receiver_role {
                    NodeRole::Master => {
                        if !self.promoting.swap(true, Ordering::SeqCst) {
                            info!("Master {} handed the game over", sender_id);
                            self.emit(PlayerEvent::Promote {
                                old_master: (sender_id > 0).then_some(sender_id),
                                old_master_left: true,
                            });
                        }
                    }
                    role => {
                        info!("Role changed to {:?} by {:?}", role, sender_role);
                        self.node.set_role(role).await;
                    }
                }
            }

            Payload::Ping => {}

            Payload::Discover | Payload::Join { .. } | Payload::Steer { .. } => {
                debug!("Ignoring {} from {}", message.payload.kind(), from);
            }
        }
    }

    /// Announcements only; a moved master of our game is followed.
    pub(crate) async fn handle_multicast(&self, message: GameMessage, from: SocketAddr) {
        for (name, update) in self.directory.record_all(&message, from).await {
            if name != self.game.name || !matches!(update, DirectoryUpdate::MasterChanged { .. }) {
                continue;
            }
            if self.node.id() == 0 || self.promoting.load(Ordering::SeqCst) {
                continue;
            }
            let new_master = self.directory.find(&name).await.and_then(|game| {
                game.players
                    .iter()
                    .find(|p| p.role == NodeRole::Master)
                    .map(|p| p.id)
            });
            self.follow_master(from, new_master).await;
        }
    }
}
