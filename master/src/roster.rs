//! Player-record bookkeeping on the authoritative state: admission, role
//! changes, removal and deputy selection. Callers send the notifications
//! the returned outcomes describe.

use crate::game::{place_snake, SpawnRules};
use log::{info, warn};
use shared::{
    GameConfig, GamePlayer, GameState, NodeRole, PlayerId, PlayerType, SnakeState,
};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Accepted {
        id: PlayerId,
        new_deputy: Option<PlayerId>,
    },
    /// The address already owns a record; a retransmitted Join.
    Existing { id: PlayerId },
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub removed: GamePlayer,
    pub new_deputy: Option<PlayerId>,
}

/// Lowest id at or above `players + 1` that nobody holds.
pub fn next_player_id(state: &GameState) -> PlayerId {
    let mut id = state.players.len() as PlayerId + 1;
    while state.player(id).is_some() {
        id += 1;
    }
    id
}

pub fn admit(
    state: &mut GameState,
    config: &GameConfig,
    rules: &SpawnRules,
    name: &str,
    player_type: PlayerType,
    requested_role: NodeRole,
    addr: SocketAddr,
) -> JoinOutcome {
    if let Some(existing) = state.player_by_addr(addr) {
        return JoinOutcome::Existing { id: existing.id };
    }

    let id = next_player_id(state);
    let role = if requested_role == NodeRole::Viewer {
        NodeRole::Viewer
    } else {
        match place_snake(state, config, id, rules) {
            Some(snake) => {
                state.snakes.push(snake);
                NodeRole::Normal
            }
            None => return JoinOutcome::Refused,
        }
    };

    let mut player = GamePlayer::new(name, id, role, Some(addr));
    player.player_type = player_type;
    state.players.push(player);
    info!("Player {} ({}) joined as {:?} from {}", id, name, role, addr);

    JoinOutcome::Accepted {
        id,
        new_deputy: assign_deputy_if_absent(state),
    }
}

/// Promotes the first Normal player when nobody is Deputy.
pub fn assign_deputy_if_absent(state: &mut GameState) -> Option<PlayerId> {
    if state.with_role(NodeRole::Deputy).is_some() {
        return None;
    }
    let candidate = state
        .players
        .iter_mut()
        .find(|p| p.role == NodeRole::Normal)?;
    candidate.role = NodeRole::Deputy;
    info!("Player {} is the new deputy", candidate.id);
    Some(candidate.id)
}

pub fn make_snake_zombie(state: &mut GameState, id: PlayerId) -> bool {
    match state.snake_mut(id) {
        Some(snake) => {
            snake.state = SnakeState::Zombie;
            info!("Snake of player {} is now a zombie", id);
            true
        }
        None => false,
    }
}

/// Deletes the record, zombifies the snake and refills the deputy slot.
pub fn remove_player(state: &mut GameState, id: PlayerId) -> Option<Removal> {
    let Some(index) = state.players.iter().position(|p| p.id == id) else {
        warn!("Player {} not found for removal", id);
        return None;
    };
    let removed = state.players.remove(index);
    make_snake_zombie(state, id);
    info!("Player {} removed", id);

    Some(Removal {
        removed,
        new_deputy: assign_deputy_if_absent(state),
    })
}

/// Turns a player into a viewer. Returns the new deputy, if one had to be
/// chosen, or `None` when the id is unknown.
pub fn become_viewer(state: &mut GameState, id: PlayerId) -> Option<Option<PlayerId>> {
    let player = state.player_mut(id)?;
    player.role = NodeRole::Viewer;
    make_snake_zombie(state, id);
    info!("Player {} is now a viewer", id);
    Some(assign_deputy_if_absent(state))
}

/// Rewrites roles after `new_master` took over from `old_master`. Returns
/// the deputy chosen for the new master.
pub fn promote(
    state: &mut GameState,
    new_master: PlayerId,
    old_master: Option<PlayerId>,
    old_master_left: bool,
) -> Option<PlayerId> {
    if let Some(old) = old_master.filter(|old| *old != new_master) {
        if old_master_left {
            state.players.retain(|p| p.id != old);
        } else if let Some(player) = state.player_mut(old) {
            player.role = NodeRole::Viewer;
        }
        make_snake_zombie(state, old);
    }

    for player in state.players.iter_mut() {
        if player.id == new_master {
            player.role = NodeRole::Master;
        } else if player.role == NodeRole::Master {
            player.role = NodeRole::Viewer;
        }
    }

    assign_deputy_if_absent(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::initial_state;
    use shared::{Coord, Direction, Snake};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn small_config() -> GameConfig {
        GameConfig {
            width: 10,
            height: 10,
            food_static: 0,
            state_delay_ms: 200,
        }
    }

    fn join(state: &mut GameState, name: &str, role: NodeRole, port: u16) -> JoinOutcome {
        admit(
            state,
            &small_config(),
            &SpawnRules::default(),
            name,
            PlayerType::Human,
            role,
            addr(port),
        )
    }

    #[test]
    fn test_next_id_skips_taken() {
        let mut state = initial_state(&small_config(), "m");
        state.players.push(GamePlayer::new("x", 2, NodeRole::Normal, None));
        state.players.push(GamePlayer::new("y", 4, NodeRole::Normal, None));
        // Three players: 4 is taken, so 5.
        assert_eq!(next_player_id(&state), 5);

        state.players.retain(|p| p.id != 2);
        assert_eq!(next_player_id(&state), 3);
    }

    #[test]
    fn test_first_join_becomes_deputy() {
        let mut state = initial_state(&small_config(), "m");

        let outcome = join(&mut state, "alice", NodeRole::Normal, 4000);
        assert_eq!(
            outcome,
            JoinOutcome::Accepted {
                id: 2,
                new_deputy: Some(2)
            }
        );
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.player(2).unwrap().role, NodeRole::Deputy);
        assert!(state.snake(2).is_some());

        let outcome = join(&mut state, "bob", NodeRole::Normal, 4001);
        assert!(matches!(
            outcome,
            JoinOutcome::Accepted {
                id: 3,
                new_deputy: None
            }
        ));
        assert_eq!(state.player(3).unwrap().role, NodeRole::Normal);
    }

    #[test]
    fn test_duplicate_join_keeps_single_record() {
        let mut state = initial_state(&small_config(), "m");
        join(&mut state, "alice", NodeRole::Normal, 4000);
        let again = join(&mut state, "alice", NodeRole::Normal, 4000);
        assert_eq!(again, JoinOutcome::Existing { id: 2 });
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.snakes.len(), 2);
    }

    #[test]
    fn test_viewer_join_needs_no_space() {
        let config = small_config();
        let mut state = initial_state(&config, "m");
        let mut points: Vec<Coord> = (0..10).map(|y| Coord::new(4, y)).collect();
        points.extend((0..10).map(|y| Coord::new(9, y)));
        state.snakes[0].points = points;

        assert_eq!(join(&mut state, "late", NodeRole::Normal, 4002), JoinOutcome::Refused);
        assert_eq!(state.players.len(), 1);

        let outcome = join(&mut state, "watcher", NodeRole::Viewer, 4003);
        assert!(matches!(outcome, JoinOutcome::Accepted { id: 2, new_deputy: None }));
        assert_eq!(state.player(2).unwrap().role, NodeRole::Viewer);
        assert!(state.snake(2).is_none());
    }

    #[test]
    fn test_removing_deputy_reassigns() {
        let mut state = initial_state(&small_config(), "m");
        join(&mut state, "alice", NodeRole::Normal, 4000);
        join(&mut state, "bob", NodeRole::Normal, 4001);

        let removal = remove_player(&mut state, 2).unwrap();
        assert_eq!(removal.removed.role, NodeRole::Deputy);
        assert_eq!(removal.new_deputy, Some(3));
        assert!(state.player(2).is_none());
        assert!(state.is_zombie(2));
        assert_eq!(state.player(3).unwrap().role, NodeRole::Deputy);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut state = initial_state(&small_config(), "m");
        let before = state.clone();
        assert!(remove_player(&mut state, 42).is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn test_become_viewer_zombifies() {
        let mut state = initial_state(&small_config(), "m");
        join(&mut state, "alice", NodeRole::Normal, 4000);
        join(&mut state, "bob", NodeRole::Normal, 4001);

        assert_eq!(become_viewer(&mut state, 2), Some(Some(3)));
        assert_eq!(state.player(2).unwrap().role, NodeRole::Viewer);
        assert!(state.is_zombie(2));
        assert_eq!(become_viewer(&mut state, 99), None);
    }

    #[test]
    fn test_promote_after_silent_master() {
        let mut state = initial_state(&small_config(), "m");
        join(&mut state, "alice", NodeRole::Normal, 4000);
        join(&mut state, "bob", NodeRole::Normal, 4001);

        let deputy = promote(&mut state, 2, Some(1), false);
        assert_eq!(deputy, Some(3));
        assert_eq!(state.player(1).unwrap().role, NodeRole::Viewer);
        assert!(state.is_zombie(1));
        assert_eq!(state.player(2).unwrap().role, NodeRole::Master);
        assert_eq!(state.with_role(NodeRole::Deputy).unwrap().id, 3);
    }

    #[test]
    fn test_promote_after_handoff_drops_old_master() {
        let mut state = initial_state(&small_config(), "m");
        join(&mut state, "alice", NodeRole::Normal, 4000);
        state.snakes.retain(|s| s.player_id != 1);
        state
            .snakes
            .push(Snake::new(1, Coord::new(8, 8), Coord::new(7, 8), Direction::Right));

        let deputy = promote(&mut state, 2, Some(1), true);
        assert_eq!(deputy, None);
        assert!(state.player(1).is_none());
        assert!(state.is_zombie(1));
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].role, NodeRole::Master);
    }
}
