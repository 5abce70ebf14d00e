//! Performance benchmarks for critical game systems

use master::game::{self, SpawnRules};
use node::{Node, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{GameConfig, GameMessage, GamePlayer, GameState, NodeRole, Payload};
use std::time::Instant;

fn crowded_state(config: &GameConfig, snakes: i32) -> GameState {
    let mut state = game::initial_state(config, "host");
    let rules = SpawnRules::default();
    for id in 2..snakes + 2 {
        match game::place_snake(&state, config, id, &rules) {
            Some(snake) => {
                state.snakes.push(snake);
                state
                    .players
                    .push(GamePlayer::new(&format!("p{}", id), id, NodeRole::Normal, None));
            }
            None => break,
        }
    }
    state
}

fn encoded_len<T: serde::Serialize>(value: &T) -> usize {
    bincode::serialize(value).unwrap().len()
}

/// Benchmarks simulation ticks on a large, busy board
#[test]
fn benchmark_simulation_tick() {
    let config = GameConfig {
        width: 100,
        height: 100,
        food_static: 50,
        state_delay_ms: 100,
    };
    let mut state = crowded_state(&config, 100);
    let snakes = state.snakes.len();
    let mut rng = StdRng::seed_from_u64(42);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        game::tick(&mut state, &config, &mut rng);
    }

    let duration = start.elapsed();
    println!(
        "Simulation: {} snakes × {} ticks in {:?} ({:.2} μs/tick)",
        snakes,
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(state.state_order, 1 + iterations);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the free-square search used for every join
#[test]
fn benchmark_free_square_search() {
    let config = GameConfig {
        width: 100,
        height: 100,
        food_static: 0,
        state_delay_ms: 100,
    };
    let state = crowded_state(&config, 60);
    let rules = SpawnRules::default();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = game::find_free_square(&state, &config, &rules);
    }

    let duration = start.elapsed();
    println!(
        "Free square search: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks state message serialization and checks it fits a datagram
#[test]
fn benchmark_state_serialization() {
    let config = GameConfig {
        width: 100,
        height: 100,
        food_static: 100,
        state_delay_ms: 100,
    };
    let mut state = crowded_state(&config, 100);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        game::tick(&mut state, &config, &mut rng);
    }
    let message = GameMessage::new(Payload::State { state }).to(2);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = message.encode().unwrap();
        let _ = GameMessage::decode(&bytes).unwrap();
    }

    let duration = start.elapsed();
    let size = encoded_len(&message);
    println!(
        "State serialization: {} bytes, {} round trips in {:?} ({:.2} μs/iter)",
        size,
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(size < shared::MAX_DATAGRAM_SIZE);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks pending-table bookkeeping for tracked sends and their acks
#[test]
fn benchmark_pending_table() {
    tokio_test::block_on(async {
        let transport = Transport::loopback().await.unwrap();
        let sink = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest = sink.local_addr().unwrap();
        let me = GamePlayer::new("bench", 2, NodeRole::Normal, None);
        let node = Node::new(transport, GameConfig::default(), me, None, None);

        let iterations = 5_000;
        let start = Instant::now();

        let mut seqs = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            seqs.push(node.send(GameMessage::new(Payload::Ping), dest).await.unwrap());
        }
        assert_eq!(node.pending_len(), iterations);
        for seq in seqs {
            assert!(node.acknowledge(seq));
        }

        let duration = start.elapsed();
        println!(
            "Pending table: {} sends + acks in {:?} ({:.2} μs/iter)",
            iterations,
            duration,
            duration.as_micros() as f64 / iterations as f64
        );

        assert_eq!(node.pending_len(), 0);
        // Should complete in under 5 seconds
        assert!(duration.as_millis() < 5000);
    });
}
