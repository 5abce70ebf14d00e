//! Authoritative simulation: movement, collisions, kills, food and spawning.
//!
//! Everything here is synchronous and works on a borrowed [`GameState`];
//! the caller holds the session lock and owns the random source.

use log::{debug, info, warn};
use rand::Rng;
use shared::{
    Coord, Direction, GameConfig, GamePlayer, GameState, NodeRole, PlayerId, Snake, SnakeState,
    MASTER_PLAYER_ID, SPAWN_SQUARE_SIZE,
};
use std::collections::{HashMap, HashSet};

/// Chance that a dead snake's cell turns into food.
pub const CORPSE_FOOD_CHANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRules {
    pub square_size: i32,
    /// Heading used when no neighbour of the spawn cell can hold the tail.
    pub default_heading: Direction,
}

impl Default for SpawnRules {
    fn default() -> Self {
        Self {
            square_size: SPAWN_SQUARE_SIZE,
            default_heading: Direction::Up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Death {
    pub victim: PlayerId,
    /// Equal to `victim` for self-inflicted deaths.
    pub killer: PlayerId,
    pub was_zombie: bool,
}

#[derive(Debug, Default, Clone)]
pub struct TickOutcome {
    pub deaths: Vec<Death>,
    pub food_shortfall: usize,
}

impl TickOutcome {
    /// Owners of alive snakes that died and must leave the game.
    pub fn crashed_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.deaths
            .iter()
            .filter(|d| !d.was_zombie)
            .map(|d| d.victim)
    }
}

/// State of a freshly hosted game: the host alone, centred, heading right.
pub fn initial_state(config: &GameConfig, master_name: &str) -> GameState {
    let head = Coord::new(config.width / 2, config.height / 2);
    let tail = Coord::new(config.width / 2 - 1, config.height / 2);

    GameState {
        state_order: 1,
        snakes: vec![Snake::new(MASTER_PLAYER_ID, head, tail, Direction::Right)],
        foods: Vec::new(),
        players: vec![GamePlayer::new(
            master_name,
            MASTER_PLAYER_ID,
            NodeRole::Master,
            None,
        )],
    }
}

/// Advances the game by one step and bumps `state_order`.
pub fn tick<R: Rng + ?Sized>(state: &mut GameState, config: &GameConfig, rng: &mut R) -> TickOutcome {
    move_snakes(state, config);
    let deaths = detect_collisions(state);
    apply_deaths(state, &deaths, rng);
    let food_shortfall = replenish_food(state, config, rng);
    state.state_order += 1;

    debug!(
        "Tick {}: {} snakes, {} food, {} deaths",
        state.state_order,
        state.snakes.len(),
        state.foods.len(),
        deaths.len()
    );

    TickOutcome {
        deaths,
        food_shortfall,
    }
}

pub fn move_snakes(state: &mut GameState, config: &GameConfig) {
    let GameState {
        snakes,
        foods,
        players,
        ..
    } = state;

    for snake in snakes.iter_mut() {
        let new_head = snake
            .head()
            .step(snake.head_direction, config.width, config.height);
        snake.points.insert(0, new_head);

        match foods.iter().position(|food| *food == new_head) {
            Some(index) => {
                foods.swap_remove(index);
                if let Some(owner) = players.iter_mut().find(|p| p.id == snake.player_id) {
                    owner.score += 1;
                }
            }
            None => {
                snake.points.pop();
            }
        }
    }
}

/// Judges every snake against the post-move board. Heads sharing a cell
/// all die first; the rest die if their head sits on any body cell.
pub fn detect_collisions(state: &GameState) -> Vec<Death> {
    let mut heads: HashMap<Coord, Vec<PlayerId>> = HashMap::new();
    for snake in &state.snakes {
        heads.entry(snake.head()).or_default().push(snake.player_id);
    }

    let mut deaths = Vec::new();
    let mut judged = HashSet::new();

    for snake in &state.snakes {
        let sharing = &heads[&snake.head()];
        if sharing.len() > 1 {
            judged.insert(snake.player_id);
            deaths.push(Death {
                victim: snake.player_id,
                killer: snake.player_id,
                was_zombie: snake.state == SnakeState::Zombie,
            });
        }
    }

    for snake in &state.snakes {
        if judged.contains(&snake.player_id) {
            continue;
        }
        let head = snake.head();
        let hit = state.snakes.iter().find(|other| {
            let body = if other.player_id == snake.player_id {
                &other.points[1..]
            } else {
                &other.points[..]
            };
            body.contains(&head)
        });

        if let Some(other) = hit {
            deaths.push(Death {
                victim: snake.player_id,
                killer: other.player_id,
                was_zombie: snake.state == SnakeState::Zombie,
            });
        }
    }

    deaths
}

/// Removes the dead snakes, scatters corpse food and credits killers that
/// remain in the game.
pub fn apply_deaths<R: Rng + ?Sized>(state: &mut GameState, deaths: &[Death], rng: &mut R) {
    if deaths.is_empty() {
        return;
    }

    let victims: HashSet<PlayerId> = deaths.iter().map(|d| d.victim).collect();
    let leaving: HashSet<PlayerId> = deaths
        .iter()
        .filter(|d| !d.was_zombie)
        .map(|d| d.victim)
        .collect();

    let (dead, alive): (Vec<Snake>, Vec<Snake>) = std::mem::take(&mut state.snakes)
        .into_iter()
        .partition(|s| victims.contains(&s.player_id));
    state.snakes = alive;

    for corpse in dead {
        for cell in corpse.points {
            if rng.gen_bool(CORPSE_FOOD_CHANCE) && state.is_cell_empty(cell) {
                state.foods.push(cell);
            }
        }
    }

    for death in deaths {
        info!("Snake of player {} crashed", death.victim);
        if death.killer == death.victim || leaving.contains(&death.killer) {
            continue;
        }
        if let Some(killer) = state.player_mut(death.killer) {
            killer.score += 1;
            info!("Player {} credited with a kill", killer.id);
        }
    }
}

/// Tops food up to `food_static` plus one per alive snake. Returns how many
/// pieces could not be placed.
pub fn replenish_food<R: Rng + ?Sized>(
    state: &mut GameState,
    config: &GameConfig,
    rng: &mut R,
) -> usize {
    let target = (config.food_static.max(0) as usize) + state.alive_snakes();
    let mut placed_all = true;

    while state.foods.len() < target {
        match find_empty_cell(state, config, rng) {
            Some(cell) => state.foods.push(cell),
            None => {
                placed_all = false;
                break;
            }
        }
    }

    let shortfall = target.saturating_sub(state.foods.len());
    if !placed_all {
        warn!("No empty cells left, {} food could not be placed", shortfall);
    }
    shortfall
}

/// Random probing bounded by the cell count, then an exhaustive pick so a
/// crowded board still fills every remaining empty cell.
fn find_empty_cell<R: Rng + ?Sized>(
    state: &GameState,
    config: &GameConfig,
    rng: &mut R,
) -> Option<Coord> {
    if config.width <= 0 || config.height <= 0 {
        return None;
    }
    for _ in 0..config.cell_count() {
        let cell = Coord::new(rng.gen_range(0..config.width), rng.gen_range(0..config.height));
        if state.is_cell_empty(cell) {
            return Some(cell);
        }
    }

    let empty: Vec<Coord> = (0..config.width)
        .flat_map(|x| (0..config.height).map(move |y| Coord::new(x, y)))
        .filter(|cell| state.is_cell_empty(*cell))
        .collect();
    if empty.is_empty() {
        None
    } else {
        Some(empty[rng.gen_range(0..empty.len())])
    }
}

/// Centre of the first square block free of snakes whose centre, and not
/// all of whose centre neighbours, hold food. Blocks do not wrap.
pub fn find_free_square(state: &GameState, config: &GameConfig, rules: &SpawnRules) -> Option<Coord> {
    let size = rules.square_size;
    if size <= 0 || size > config.width || size > config.height {
        return None;
    }

    let occupied: HashSet<Coord> = state
        .snakes
        .iter()
        .flat_map(|s| s.points.iter().copied())
        .collect();
    let food: HashSet<Coord> = state.foods.iter().copied().collect();

    for start_x in 0..=(config.width - size) {
        for start_y in 0..=(config.height - size) {
            let blocked = (start_x..start_x + size)
                .any(|x| (start_y..start_y + size).any(|y| occupied.contains(&Coord::new(x, y))));
            if blocked {
                continue;
            }

            let centre = Coord::new(start_x + size / 2, start_y + size / 2);
            if food.contains(&centre) {
                continue;
            }
            let neighbours = [(-1, 0), (1, 0), (0, -1), (0, 1)]
                .map(|(dx, dy)| Coord::new(centre.x + dx, centre.y + dy));
            if neighbours.iter().all(|cell| food.contains(cell)) {
                continue;
            }

            return Some(centre);
        }
    }
    None
}

/// Tail cell next to `head` and the heading pointing from it to the head.
pub fn choose_tail(
    state: &GameState,
    config: &GameConfig,
    head: Coord,
    rules: &SpawnRules,
) -> (Coord, Direction) {
    for toward_tail in [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ] {
        let cell = head.step(toward_tail, config.width, config.height);
        if state.is_cell_empty(cell) {
            return (cell, toward_tail.opposite());
        }
    }

    (
        head.step(Direction::Down, config.width, config.height),
        rules.default_heading,
    )
}

/// Builds a snake for `player_id` in the first free block, if any.
pub fn place_snake(
    state: &GameState,
    config: &GameConfig,
    player_id: PlayerId,
    rules: &SpawnRules,
) -> Option<Snake> {
    let head = find_free_square(state, config, rules)?;
    let (tail, heading) = choose_tail(state, config, head, rules);
    Some(Snake::new(player_id, head, tail, heading))
}

pub fn can_join(state: &GameState, config: &GameConfig, rules: &SpawnRules) -> bool {
    find_free_square(state, config, rules).is_some()
}
