//! # Player
//!
//! Everything a non-master peer needs: finding games, joining one, keeping
//! the latest state, and taking over when the master goes away.
//!
//! ## Modules
//!
//! ### Discovery (`discovery`)
//! A [`GameDirectory`] fed by announcement traffic. [`discover`] multicasts a
//! request and listens for a while; [`probe`] asks a single known master
//! directly, which is all that works without multicast.
//!
//! ### Network (`network`) and handlers
//! The [`Player`] task set: receive loops, a liveness check on the master,
//! resends and pings. The dispatcher adopts newer states, follows a master
//! that moved, and turns handoffs and removals into [`PlayerEvent`]s.
//!
//! ### Peer (`peer`)
//! [`Peer`] owns whichever task set is active and performs the switch from
//! player to master on promotion.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use node::{Transport, TransportConfig};
//! use player::{discover, GameDirectory, JoinRequest, Peer};
//! use shared::NodeRole;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Transport::bind(&TransportConfig::default()).await?;
//!     let directory = GameDirectory::new();
//!     discover(&transport, &directory, Duration::from_secs(2)).await?;
//!
//!     let game = directory.choose(None).await?;
//!     let request = JoinRequest::new("alice", NodeRole::Normal);
//!     let peer = Peer::join(transport, game, directory, request, Duration::from_secs(5)).await?;
//!
//!     let exit = peer.run().await;
//!     println!("left the game: {:?}", exit);
//!     Ok(())
//! }
//! ```

pub mod discovery;
mod handlers;
pub mod network;
pub mod peer;

pub use discovery::{discover, probe, DirectoryUpdate, DiscoveredGame, GameDirectory};
pub use network::{JoinRequest, Player, PlayerEvent};
pub use peer::{Peer, PeerExit};

use node::NodeError;
use shared::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("no games discovered")]
    NoGames,
    #[error("game '{0}' not found")]
    NoSuchGame(String),
    #[error("join refused: {0}")]
    Refused(String),
    #[error("timed out waiting for the master")]
    Timeout,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Node(#[from] NodeError),
}
