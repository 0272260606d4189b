//! Swarm Simulation Core
//!
//! A deterministic, fixed-timestep swarm coordination engine: pooled minion
//! agents orbit a shared anchor, one of them holds the exclusive aggressor
//! role against a sensed target and the rest flank it.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod minion;
pub mod orbit;
pub mod pool;
pub mod ports;
pub mod projectile;
pub mod sensor;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::{SwarmPorts, SwarmWorld};
pub use components::*;
pub use config::{EngagementTuning, OrbitTuning, ProjectileTuning, SwarmConfig};
pub use coordinator::{ClaimOutcome, SideRegistry, SwarmAnchor, SwarmCoordinator};
pub use error::{SwarmError, SwarmResult};
pub use orbit::OrbitMotion;
pub use pool::AgentPool;
pub use ports::*;
pub use projectile::{ProjectileHit, ProjectileKind, ProjectilePool, ReturnReason};
pub use sensor::TargetRoster;
pub use spatial::{TargetEntry, TargetGrid};
pub use world::{AgentSnapshot, SwarmSnapshot};
