//! Master-side dispatch of inbound messages.

use crate::network::Master;
use crate::roster::{self, JoinOutcome};
use log::{debug, info, warn};
use shared::{Direction, GameMessage, NodeRole, Payload, PlayerId, NO_SPACE_MESSAGE};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;

impl Master {
    /// Id of the player registered at `from`, if any.
    async fn known_sender(&self, from: SocketAddr) -> Option<PlayerId> {
        let session = self.node.session().await;
        session
            .state
            .as_ref()
            .and_then(|state| state.player_by_addr(from))
            .map(|p| p.id)
    }

    pub async fn handle_message(&self, message: GameMessage, from: SocketAddr) {
        let known = self.known_sender(from).await;
        if let Some(id) = known {
            self.node.touch(id);
        }
        debug!("Master received {} #{} from {}", message.kind(), message.msg_seq, from);

        match &message.payload {
            Payload::Discover => {
                debug!("Discovery request from {} via unicast", from);
                self.send_announcement(from).await;
            }
            Payload::Join {
                player_name,
                player_type,
                requested_role,
                ..
            } => {
                self.handle_join(&message, from, player_name, *player_type, *requested_role)
                    .await;
            }
            Payload::Steer { direction } => {
                let sender = known.or((message.sender_id > 0).then_some(message.sender_id));
                match sender {
                    Some(id) => {
                        self.apply_steer(id, *direction).await;
                        self.node.send_ack(&message, from).await;
                    }
                    None => warn!("Steer from unknown address {}", from),
                }
            }
            Payload::RoleChange {
                sender_role,
                receiver_role,
            } => {
                let sender = known.or((message.sender_id > 0).then_some(message.sender_id));
                self.handle_role_change(sender, *sender_role, *receiver_role)
                    .await;
                self.node.send_ack(&message, from).await;
            }
            Payload::Ping => self.node.send_ack(&message, from).await,
            Payload::Ack => self.node.deliver_ack(message.msg_seq),
            Payload::State { state } => {
                let last = self.last_state_order.load(Ordering::SeqCst);
                if state.state_order > last {
                    self.last_state_order
                        .store(state.state_order, Ordering::SeqCst);
                    self.node.send_ack(&message, from).await;
                } else {
                    warn!("Ignoring stale state {} from {}", state.state_order, from);
                }
            }
            Payload::Error { error_message } => {
                warn!("Error from {}: {}", from, error_message);
                self.node.send_ack(&message, from).await;
            }
            Payload::Announcement { .. } => {
                debug!("Master ignores announcement from {}", from);
            }
        }
    }

    /// Discovery traffic on the multicast endpoint.
    pub async fn handle_multicast(&self, message: GameMessage, from: SocketAddr) {
        if let Payload::Discover = message.payload {
            debug!("Discovery request from {} via multicast", from);
            self.send_announcement(from).await;
        }
    }

    async fn handle_join(
        &self,
        message: &GameMessage,
        from: SocketAddr,
        player_name: &str,
        player_type: shared::PlayerType,
        requested_role: NodeRole,
    ) {
        let config = self.node.config();
        let outcome = {
            let mut session = self.node.session().await;
            match session.state.as_mut() {
                Some(state) => roster::admit(
                    state,
                    &config,
                    &self.rules,
                    player_name,
                    player_type,
                    requested_role,
                    from,
                ),
                None => JoinOutcome::Refused,
            }
        };

        match outcome {
            JoinOutcome::Accepted { id, new_deputy } => {
                self.node.touch(id);
                self.node.send_ack_to(message.msg_seq, Some(id), from).await;
                if let Some(deputy) = new_deputy {
                    self.notify_role(deputy, NodeRole::Deputy).await;
                }
            }
            JoinOutcome::Existing { id } => {
                debug!("Repeated join from {}, already player {}", from, id);
                self.node.send_ack_to(message.msg_seq, Some(id), from).await;
            }
            JoinOutcome::Refused => {
                self.can_join.store(false, Ordering::SeqCst);
                warn!("Player cannot join: no available space");
                let refusal = GameMessage::new(Payload::Error {
                    error_message: NO_SPACE_MESSAGE.to_string(),
                });
                if let Err(e) = self.node.send(refusal, from).await {
                    warn!("Failed to refuse join from {}: {}", from, e);
                }
                self.node.send_ack_to(message.msg_seq, None, from).await;
            }
        }
    }

    async fn apply_steer(&self, id: PlayerId, direction: Direction) {
        let mut session = self.node.session().await;
        let Some(snake) = session.state.as_mut().and_then(|s| s.snake_mut(id)) else {
            warn!("No snake found for player {}", id);
            return;
        };
        if !snake.is_alive() {
            debug!("Ignoring steer for zombie snake of player {}", id);
        } else if snake.steer(direction) {
            debug!("Player {} turned {:?}", id, direction);
        } else {
            debug!("Invalid direction change from player {}", id);
        }
    }

    async fn handle_role_change(
        &self,
        sender: Option<PlayerId>,
        sender_role: NodeRole,
        receiver_role: NodeRole,
    ) {
        let new_deputy = {
            let mut session = self.node.session().await;
            let Some(state) = session.state.as_mut() else {
                return;
            };
            match (sender, sender_role, receiver_role) {
                (Some(id), _, NodeRole::Viewer) => {
                    info!("Player {} switches to viewer", id);
                    roster::become_viewer(state, id).flatten()
                }
                (_, NodeRole::Normal, NodeRole::Deputy) => roster::assign_deputy_if_absent(state),
                _ => {
                    warn!(
                        "Unsupported role change {:?} -> {:?} from {:?}",
                        sender_role, receiver_role, sender
                    );
                    None
                }
            }
        };

        if let Some(id) = new_deputy {
            self.notify_role(id, NodeRole::Deputy).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::network::Master;
    use node::Transport;
    use shared::{
        Coord, Direction, GameConfig, GameMessage, GameState, NodeRole, Payload, PlayerType,
        NO_SPACE_MESSAGE,
    };
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    fn small_config() -> GameConfig {
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

    fn join_message(seq: i64, role: NodeRole) -> GameMessage {
        GameMessage {
            msg_seq: seq,
            sender_id: 0,
            receiver_id: None,
            payload: Payload::Join {
                player_name: "alice".to_string(),
                player_type: PlayerType::Human,
                game_name: "game".to_string(),
                requested_role: role,
            },
        }
    }

    async fn peer() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn state_of(master: &Master) -> GameState {
        master.snapshot().await.state.unwrap()
    }

    #[tokio::test]
    async fn test_join_accepted_with_assigned_id() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        let (socket, addr) = peer().await;

        master.handle_message(join_message(7, NodeRole::Normal), addr).await;

        let ack = recv_message(&socket).await;
        assert_eq!(ack.payload, Payload::Ack);
        assert_eq!(ack.msg_seq, 7);
        assert_eq!(ack.receiver_id, Some(2));

        // First normal player also becomes deputy.
        let role_change = recv_message(&socket).await;
        assert_eq!(
            role_change.payload,
            Payload::RoleChange {
                sender_role: NodeRole::Master,
                receiver_role: NodeRole::Deputy,
            }
        );

        let state = state_of(&master).await;
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.snakes.len(), 2);
        assert_eq!(state.player(2).unwrap().addr, Some(addr));
    }

    #[tokio::test]
    async fn test_join_refused_without_space() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        {
            let mut session = master.node().session().await;
            let state = session.state.as_mut().unwrap();
            let mut points: Vec<Coord> = (0..10).map(|y| Coord::new(4, y)).collect();
            points.extend((0..10).map(|y| Coord::new(9, y)));
            state.snakes[0].points = points;
        }
        let (socket, addr) = peer().await;

        master.handle_message(join_message(3, NodeRole::Normal), addr).await;

        match recv_message(&socket).await.payload {
            Payload::Error { error_message } => assert_eq!(error_message, NO_SPACE_MESSAGE),
            other => panic!("Expected error, got {:?}", other),
        }
        let ack = recv_message(&socket).await;
        assert_eq!(ack.msg_seq, 3);
        assert_eq!(ack.receiver_id, None);

        let state = state_of(&master).await;
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.snakes.len(), 1);
        assert!(!master.can_join.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_steer_applied_and_acknowledged() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        let (socket, addr) = peer().await;
        master.handle_message(join_message(1, NodeRole::Normal), addr).await;
        recv_message(&socket).await;
        recv_message(&socket).await;

        let heading = state_of(&master).await.snake(2).unwrap().head_direction;
        let turn = match heading {
            Direction::Up | Direction::Down => Direction::Left,
            Direction::Left | Direction::Right => Direction::Up,
        };

        for (seq, direction) in [(10, turn), (11, turn.opposite())] {
            let steer = GameMessage {
                msg_seq: seq,
                sender_id: 2,
                receiver_id: None,
                payload: Payload::Steer { direction },
            };
            master.handle_message(steer, addr).await;
            let ack = recv_message(&socket).await;
            assert_eq!(ack.payload, Payload::Ack);
            assert_eq!(ack.msg_seq, seq);
        }

        assert_eq!(state_of(&master).await.snake(2).unwrap().head_direction, turn);
    }

    #[tokio::test]
    async fn test_viewer_request_zombifies_snake() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        let (socket, addr) = peer().await;
        master.handle_message(join_message(1, NodeRole::Normal), addr).await;
        recv_message(&socket).await;
        recv_message(&socket).await;

        let request = GameMessage {
            msg_seq: 2,
            sender_id: 2,
            receiver_id: None,
            payload: Payload::RoleChange {
                sender_role: NodeRole::Deputy,
                receiver_role: NodeRole::Viewer,
            },
        };
        master.handle_message(request, addr).await;
        assert_eq!(recv_message(&socket).await.msg_seq, 2);

        let state = state_of(&master).await;
        assert_eq!(state.player(2).unwrap().role, NodeRole::Viewer);
        assert!(state.is_zombie(2));
        assert!(state.with_role(NodeRole::Deputy).is_none());
    }

    #[tokio::test]
    async fn test_stale_state_echo_not_acknowledged() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        let (socket, addr) = peer().await;

        let echo = |seq: i64, order: i32| GameMessage {
            msg_seq: seq,
            sender_id: 0,
            receiver_id: None,
            payload: Payload::State {
                state: GameState {
                    state_order: order,
                    ..GameState::default()
                },
            },
        };

        master.handle_message(echo(1, 5), addr).await;
        assert_eq!(recv_message(&socket).await.msg_seq, 1);

        master.handle_message(echo(2, 5), addr).await;
        master.handle_message(echo(3, 4), addr).await;
        let mut buffer = vec![0u8; 1024];
        assert!(
            tokio::time::timeout(Duration::from_millis(50), socket.recv_from(&mut buffer))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_error_notice_is_acknowledged() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        let (socket, addr) = peer().await;

        let notice = GameMessage {
            msg_seq: 14,
            sender_id: 0,
            receiver_id: Some(1),
            payload: Payload::Error {
                error_message: "something went wrong".to_string(),
            },
        };
        master.handle_message(notice, addr).await;

        let ack = recv_message(&socket).await;
        assert_eq!(ack.payload, Payload::Ack);
        assert_eq!(ack.msg_seq, 14);
    }

    #[tokio::test]
    async fn test_discover_answered_with_announcement() {
        let master = Master::host(Transport::loopback().await.unwrap(), small_config(), "m");
        let (socket, addr) = peer().await;

        master
            .handle_multicast(GameMessage::new(Payload::Discover), addr)
            .await;

        match recv_message(&socket).await.payload {
            Payload::Announcement { games } => {
                assert_eq!(games.len(), 1);
                assert!(games[0].can_join);
                assert_eq!(games[0].players.len(), 1);
                assert_eq!(games[0].config, small_config());
            }
            other => panic!("Expected announcement, got {:?}", other),
        }
        assert_eq!(master.node().pending_len(), 0);
    }
}
