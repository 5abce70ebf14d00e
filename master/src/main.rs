use clap::Parser;
use log::{info, warn};
use master::Master;
use node::{Transport, TransportConfig};
use shared::{GameConfig, MULTICAST_IP, MULTICAST_PORT};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Hosts a snake game headlessly and logs the scoreboard.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Player name of the host
    #[arg(short, long, default_value = "Master")]
    name: String,

    /// Field width in cells
    #[arg(long, default_value_t = 25)]
    width: i32,

    /// Field height in cells
    #[arg(long, default_value_t = 25)]
    height: i32,

    /// Food kept on the field besides one per alive snake
    #[arg(long, default_value_t = 10)]
    food: i32,

    /// Tick period in milliseconds
    #[arg(short, long, default_value_t = 180)]
    delay: i32,

    /// Multicast group used for discovery
    #[arg(long, default_value_t = SocketAddrV4::new(MULTICAST_IP, MULTICAST_PORT))]
    group: SocketAddrV4,

    /// Interface address to join the group on
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Seconds between scoreboard lines
    #[arg(long, default_value_t = 5)]
    report_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if std::env::var("RUST_LOG").is_err() {
        println!("Tip: Set RUST_LOG=info or RUST_LOG=debug for detailed logs");
    }

    let config = GameConfig {
        width: args.width,
        height: args.height,
        food_static: args.food,
        state_delay_ms: args.delay,
    };
    config.validate()?;

    let transport = Transport::bind(&TransportConfig {
        multicast_group: Some(args.group),
        interface: args.interface,
        ..TransportConfig::default()
    })
    .await?;

    let master = Arc::new(Master::host(transport, config, &args.name));
    info!(
        "Game {} listening on {}",
        master.game_name().await.unwrap_or_default(),
        master.local_addr()?
    );
    let lifecycle = master.start();

    let mut report = interval(Duration::from_secs(args.report_secs.max(1)));
    loop {
        tokio::select! {
            _ = report.tick() => {
                let snapshot = master.snapshot().await;
                if let Some(state) = snapshot.state {
                    let scores: Vec<String> = state
                        .players
                        .iter()
                        .map(|p| format!("{}#{}={}", p.name, p.id, p.score))
                        .collect();
                    info!("Order {}: {}", state.state_order, scores.join(", "));
                }
            }
            exit = master.wait_exit() => {
                warn!("Master left the game: {:?}", exit);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    lifecycle.shutdown().await;
    Ok(())
}
