//! # Master
//!
//! The authoritative peer of a snake game. It owns the canonical
//! [`GameState`](shared::GameState), advances it once per configured tick,
//! and pushes every new snapshot to the other players.
//!
//! ## Modules
//!
//! ### Game (`game`)
//! Pure simulation over a borrowed state: toroidal movement, growth on food,
//! collision rules, corpse-to-food conversion, food replenishment and the
//! free-square search used to place newly joining snakes.
//!
//! ### Roster (`roster`)
//! Player records: id assignment, admission, viewer transitions, removal and
//! deputy selection. Functions return what changed so the caller can notify
//! the affected peers.
//!
//! ### Network (`network`) and handlers
//! The [`Master`] controller. It spawns the announcement, receive, liveness,
//! tick, resend and ping tasks through a [`node::Lifecycle`] and dispatches
//! inbound messages per kind.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use master::Master;
//! use node::{Transport, TransportConfig};
//! use shared::GameConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Transport::bind(&TransportConfig::default()).await?;
//!     let master = Arc::new(Master::host(transport, GameConfig::default(), "host"));
//!     let lifecycle = master.start();
//!
//!     master.wait_exit().await;
//!     lifecycle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod game;
mod handlers;
pub mod network;
pub mod roster;

pub use game::{SpawnRules, TickOutcome};
pub use network::{generate_game_name, Master, MasterExit};
