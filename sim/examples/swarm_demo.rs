//! Demonstration of a single swarm hunting a wandering target.
//!
//! Run with: RUST_LOG=swarm_sim=debug cargo run --example swarm_demo

use swarm_sim::{MinionRole, Position, SwarmConfig, SwarmWorld, TargetId};
use tracing_subscriber::EnvFilter;

const PLAYER: TargetId = TargetId(1);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swarm_sim=info")))
        .init();

    println!("=== Swarm Demo ===\n");

    let config = SwarmConfig {
        population_cap: 4,
        ..SwarmConfig::default()
    };
    let mut sim = SwarmWorld::with_config(config);
    sim.set_anchor(Position::new(0.0, 0.0));

    // The player walks past the nest, lingers, then leaves.
    println!("Running simulation for 300 ticks (10 seconds at 30 ticks/sec)...\n");
    let mut total_hits = 0;
    for frame in 0..300 {
        let t = frame as f32 / 30.0;
        let player = if t < 7.0 {
            Position::new(-15.0 + t * 3.0, 4.0)
        } else {
            Position::new(6.0 + (t - 7.0) * 8.0, 4.0)
        };
        if let Some(roster) = sim.targets_mut() {
            roster.upsert(PLAYER, player);
        }

        if frame == 180 {
            if let Some(aggressor) = sim.aggressor() {
                println!("--- Player kills aggressor {aggressor} ---\n");
                sim.release(aggressor);
            }
        }

        sim.step(1.0 / 30.0);
        total_hits += sim.drain_projectile_hits().len();

        if (frame + 1) % 30 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_swarm(&sim);
        }
    }

    println!("\nDamaging hits reported: {total_hits}");

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("snapshot failed: {err}"),
    }
}

fn print_swarm(sim: &SwarmWorld) {
    let snapshot = sim.snapshot();
    for agent in &snapshot.agents {
        let marker = match agent.role {
            MinionRole::Attacking => "*",
            MinionRole::Supporting => "+",
            _ => " ",
        };
        println!(
            "  {marker} agent#{:<3} {:<10} pos=({:6.1},{:6.1}) side={:+}",
            agent.id,
            format!("{:?}", agent.role),
            agent.x,
            agent.y,
            agent.side
        );
    }
    println!("  projectiles in flight: {}", snapshot.projectiles.len());
}
