use clap::Parser;
use log::{info, warn};
use node::{Transport, TransportConfig};
use player::{discover, probe, GameDirectory, JoinRequest, Peer};
use shared::{NodeRole, MULTICAST_IP, MULTICAST_PORT};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Joins a snake game headlessly and logs what it sees.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Player name
    #[arg(short, long, default_value = "Player")]
    name: String,

    /// Game to join; the first joinable one when omitted
    #[arg(short, long)]
    game: Option<String>,

    /// Master address to ask directly instead of multicast discovery
    #[arg(short, long)]
    master: Option<SocketAddr>,

    /// Join as a viewer without a snake
    #[arg(long)]
    viewer: bool,

    /// Multicast group used for discovery
    #[arg(long, default_value_t = SocketAddrV4::new(MULTICAST_IP, MULTICAST_PORT))]
    group: SocketAddrV4,

    /// Interface address to join the group on
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Seconds spent listening for announcements
    #[arg(long, default_value_t = 3)]
    discover_secs: u64,

    /// Seconds to wait for the join to be accepted
    #[arg(long, default_value_t = 5)]
    join_timeout_secs: u64,

    /// Seconds between status lines
    #[arg(long, default_value_t = 5)]
    report_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let join_timeout = Duration::from_secs(args.join_timeout_secs);

    let transport = Transport::bind(&TransportConfig {
        multicast_group: Some(args.group),
        interface: args.interface,
        ..TransportConfig::default()
    })
    .await?;
    let directory = GameDirectory::new();

    let game = match args.master {
        Some(addr) => probe(&transport, addr, join_timeout).await?,
        None => {
            let games = discover(&transport, &directory, Duration::from_secs(args.discover_secs)).await?;
            info!("Discovered {} games", games.len());
            directory.choose(args.game.as_deref()).await?
        }
    };

    info!(
        "Joining {} at {} ({}x{}, {} ms)",
        game.name, game.master_addr, game.config.width, game.config.height, game.config.state_delay_ms
    );
    let role = if args.viewer {
        NodeRole::Viewer
    } else {
        NodeRole::Normal
    };
    let peer = Arc::new(
        Peer::join(
            transport,
            game,
            directory,
            JoinRequest::new(&args.name, role),
            join_timeout,
        )
        .await?,
    );
    info!("Joined as player {}", peer.id().await);
    peer.wait_for_state().await;

    let mut runner = {
        let peer = Arc::clone(&peer);
        tokio::spawn(async move { peer.run().await })
    };

    let mut report = interval(Duration::from_secs(args.report_secs.max(1)));
    loop {
        tokio::select! {
            _ = report.tick() => {
                let snapshot = peer.snapshot().await;
                let order = snapshot.state.as_ref().map_or(0, |s| s.state_order);
                info!(
                    "{:?} #{} score {} at order {}",
                    snapshot.me.role, snapshot.me.id, snapshot.me.score, order
                );
            }
            exit = &mut runner => {
                match exit {
                    Ok(exit) => warn!("Left the game: {:?}", exit),
                    Err(e) => warn!("Peer task failed: {}", e),
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                peer.stop().await;
                break;
            }
        }
    }

    Ok(())
}
