use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

mod config;

pub use config::{ConfigBounds, ConfigError, GameConfig};

pub type PlayerId = i32;

pub const MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(239, 192, 0, 4);
pub const MULTICAST_PORT: u16 = 9192;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
pub const MASTER_PLAYER_ID: PlayerId = 1;
pub const SPAWN_SQUARE_SIZE: i32 = 5;

pub const CRASHED_MESSAGE: &str = "You have crashed and been removed from the game. Exiting...";
pub const NO_SPACE_MESSAGE: &str = "Cannot join: no available space";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Moves one cell in `direction` on a `width` x `height` torus.
    pub fn step(self, direction: Direction, width: i32, height: i32) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: (self.x + dx).rem_euclid(width),
            y: (self.y + dy).rem_euclid(height),
        }
    }
}

/// Screen orientation: y grows downwards, so `Up` decreases y.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SnakeState {
    Alive,
    Zombie,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Snake {
    pub player_id: PlayerId,
    /// Index 0 is the head.
    pub points: Vec<Coord>,
    pub state: SnakeState,
    pub head_direction: Direction,
}

impl Snake {
    pub fn new(player_id: PlayerId, head: Coord, tail: Coord, head_direction: Direction) -> Self {
        Self {
            player_id,
            points: vec![head, tail],
            state: SnakeState::Alive,
            head_direction,
        }
    }

    pub fn head(&self) -> Coord {
        self.points[0]
    }

    pub fn is_alive(&self) -> bool {
        self.state == SnakeState::Alive
    }

    pub fn occupies(&self, cell: Coord) -> bool {
        self.points.contains(&cell)
    }

    /// Applies a heading change unless it reverses the snake onto itself.
    /// Returns whether the heading was accepted.
    pub fn steer(&mut self, direction: Direction) -> bool {
        if direction == self.head_direction.opposite() {
            return false;
        }
        self.head_direction = direction;
        true
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Normal,
    Master,
    Deputy,
    Viewer,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PlayerType {
    Human,
    Robot,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GamePlayer {
    pub name: String,
    pub id: PlayerId,
    pub addr: Option<SocketAddr>,
    pub role: NodeRole,
    pub player_type: PlayerType,
    pub score: i32,
}

impl GamePlayer {
    pub fn new(name: &str, id: PlayerId, role: NodeRole, addr: Option<SocketAddr>) -> Self {
        Self {
            name: name.to_string(),
            id,
            addr,
            role,
            player_type: PlayerType::Human,
            score: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct GameState {
    pub state_order: i32,
    pub snakes: Vec<Snake>,
    pub foods: Vec<Coord>,
    pub players: Vec<GamePlayer>,
}

impl GameState {
    pub fn player(&self, id: PlayerId) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut GamePlayer> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_by_addr(&self, addr: SocketAddr) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.addr == Some(addr))
    }

    pub fn snake(&self, player_id: PlayerId) -> Option<&Snake> {
        self.snakes.iter().find(|s| s.player_id == player_id)
    }

    pub fn snake_mut(&mut self, player_id: PlayerId) -> Option<&mut Snake> {
        self.snakes.iter_mut().find(|s| s.player_id == player_id)
    }

    pub fn with_role(&self, role: NodeRole) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.role == role)
    }

    pub fn alive_snakes(&self) -> usize {
        self.snakes.iter().filter(|s| s.is_alive()).count()
    }

    pub fn has_food(&self, cell: Coord) -> bool {
        self.foods.contains(&cell)
    }

    pub fn is_snake_cell(&self, cell: Coord) -> bool {
        self.snakes.iter().any(|s| s.occupies(cell))
    }

    /// True when neither a snake segment nor food sits on the cell.
    pub fn is_cell_empty(&self, cell: Coord) -> bool {
        !self.is_snake_cell(cell) && !self.has_food(cell)
    }

    pub fn is_zombie(&self, player_id: PlayerId) -> bool {
        self.snake(player_id)
            .map(|s| s.state == SnakeState::Zombie)
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameAnnouncement {
    pub players: Vec<GamePlayer>,
    pub config: GameConfig,
    pub can_join: bool,
    pub game_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Payload {
    Ping,
    Ack,
    Discover,
    Announcement {
        games: Vec<GameAnnouncement>,
    },
    Join {
        player_name: String,
        player_type: PlayerType,
        game_name: String,
        requested_role: NodeRole,
    },
    Steer {
        direction: Direction,
    },
    RoleChange {
        sender_role: NodeRole,
        receiver_role: NodeRole,
    },
    Error {
        error_message: String,
    },
    State {
        state: GameState,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Ping => "Ping",
            Payload::Ack => "Ack",
            Payload::Discover => "Discover",
            Payload::Announcement { .. } => "Announcement",
            Payload::Join { .. } => "Join",
            Payload::Steer { .. } => "Steer",
            Payload::RoleChange { .. } => "RoleChange",
            Payload::Error { .. } => "Error",
            Payload::State { .. } => "State",
        }
    }

    /// Kinds that never get a fresh sequence number, are never tracked for
    /// acknowledgment and are never acknowledged themselves.
    pub fn is_ack_exempt(&self) -> bool {
        matches!(
            self,
            Payload::Announcement { .. } | Payload::Discover | Payload::Ack
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameMessage {
    pub msg_seq: i64,
    /// Zero until the sender has been assigned an id by a master.
    pub sender_id: PlayerId,
    pub receiver_id: Option<PlayerId>,
    pub payload: Payload,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Encode(bincode::Error),
    #[error("decoding failed: {0}")]
    Decode(bincode::Error),
}

impl GameMessage {
    pub fn new(payload: Payload) -> Self {
        Self {
            msg_seq: 0,
            sender_id: 0,
            receiver_id: None,
            payload,
        }
    }

    pub fn ack(msg_seq: i64, receiver_id: Option<PlayerId>) -> Self {
        Self {
            msg_seq,
            sender_id: 0,
            receiver_id,
            payload: Payload::Ack,
        }
    }

    pub fn to(mut self, receiver_id: PlayerId) -> Self {
        self.receiver_id = Some(receiver_id);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(CodecError::Encode)
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(data).map_err(CodecError::Decode)
    }
}
