//! ECS systems for the swarm simulation.
//!
//! ## Tick phases
//!
//! One fixed update runs these in a strict chain:
//!
//! **Logic**
//! - `coordinator_system` - housekeeping: dead-aggressor cleanup, target
//!   memory, spawn top-up, promotion, role forcing
//! - `minion_system` - each active agent's logic tick, in spawn order
//!
//! **Physics**
//! - `movement_system` - integrates steering through the physics port
//! - `projectile_system` - flies bullets and returns spent ones to the pool
//!
//! Everything runs single-threaded; agent order is the coordinator's active
//! order, so a claim made earlier in the tick is visible to later agents.

pub mod movement;
pub mod swarm;

pub use movement::*;
pub use swarm::*;
