//! Snapshot types.
//!
//! `SwarmSnapshot` is a serializable, read-only view of one swarm for
//! debugging and visualization. It is never loaded back into a world.

use crate::components::*;
use crate::coordinator::{SwarmAnchor, SwarmCoordinator};
use crate::projectile::ProjectilePool;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single active agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub role: MinionRole,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub target: Option<TargetId>,
    /// -1, 0 or +1.
    pub side: i8,
}

/// Snapshot of a bullet in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub kind: u16,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Complete swarm state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Simulation clock time in seconds.
    pub time: f64,
    pub anchor: Position,
    /// Id of the current aggressor.
    pub aggressor: Option<u32>,
    pub last_seen_target: Option<TargetId>,
    /// Active agents in spawn order.
    pub agents: Vec<AgentSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

impl SwarmSnapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &World, tick: u64, time: f64) -> Self {
        let Some(coordinator) = world.get_resource::<SwarmCoordinator>() else {
            return Self {
                tick,
                time,
                ..Default::default()
            };
        };

        let agents = coordinator
            .active()
            .iter()
            .filter_map(|handle| {
                let entity = handle.entity();
                let minion = world.get::<Minion>(entity)?;
                let pos = world.get::<Position>(entity)?;
                let vel = world.get::<Velocity>(entity)?;
                Some(AgentSnapshot {
                    id: handle.id(),
                    role: minion.role,
                    x: pos.x,
                    y: pos.y,
                    vx: vel.vx,
                    vy: vel.vy,
                    target: minion.target,
                    side: minion.support_side.as_i8(),
                })
            })
            .collect();

        let projectiles = world
            .get_resource::<ProjectilePool>()
            .map(|pool| {
                pool.live()
                    .map(|p| ProjectileSnapshot {
                        kind: p.kind.0,
                        x: p.position.x,
                        y: p.position.y,
                        vx: p.velocity.vx,
                        vy: p.velocity.vy,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            tick,
            time,
            anchor: world.get_resource::<SwarmAnchor>().map(|a| a.0).unwrap_or_default(),
            aggressor: coordinator.aggressor().map(|h| h.id()),
            last_seen_target: coordinator.last_seen_target(),
            agents,
            projectiles,
        }
    }

    /// Agents currently Attacking. More than one means arbitration broke.
    pub fn attacking(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.agents.iter().filter(|a| a.role == MinionRole::Attacking)
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
