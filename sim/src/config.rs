//! Swarm configuration.
//!
//! All tuning for a swarm instance lives in one [`SwarmConfig`] resource. It
//! can be built in code (every field has a default) or loaded from JSON, and
//! is checked with [`SwarmConfig::validate`] before a world is built from it.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Position;
use crate::error::{SwarmError, SwarmResult};

/// Top-level configuration for a swarm.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,

    /// Maximum number of simultaneously active agents.
    pub population_cap: usize,
    /// Minimum time between two spawns (seconds).
    pub spawn_interval: f64,
    /// Hard ceiling on pooled agents. `None` = grow on demand.
    pub pool_hard_cap: Option<usize>,
    /// Agents constructed up-front into the free list.
    pub prewarm: usize,

    /// Range at which the anchor senses targets (gates spawning).
    pub detection_range: f32,
    /// Range at which an individual agent senses targets.
    pub sense_range: f32,
    /// Agent field of view in degrees (360 = omnidirectional).
    pub fov_degrees: f32,
    /// Distance from an engaged agent beyond which its target counts as lost.
    pub target_loss_range: f32,
    /// Distance from the anchor beyond which a remembered target is forgotten.
    pub memory_range: f32,

    pub orbit: OrbitTuning,
    pub engagement: EngagementTuning,
    pub projectiles: ProjectileTuning,

    /// Seed for the swarm's RNG (support fire intervals).
    pub rng_seed: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            population_cap: 3,
            spawn_interval: 0.5,
            pool_hard_cap: None,
            prewarm: 0,
            detection_range: 12.0,
            sense_range: 10.0,
            fov_degrees: 360.0,
            target_loss_range: 16.0,
            memory_range: 14.0,
            orbit: OrbitTuning::default(),
            engagement: EngagementTuning::default(),
            projectiles: ProjectileTuning::default(),
            rng_seed: 0x5EED,
        }
    }
}

/// Orbit-keeping parameters shared by every agent of a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitTuning {
    pub radius: f32,
    pub tangential_speed: f32,
    pub clockwise: bool,
    pub radial_stiffness: f32,
    /// Keep below 1.0 so a velocity-tracking physics step stays stable.
    pub radial_damping: f32,
    /// Outward speed added along the surface normal after a collision.
    pub escape_nudge: f32,
}

impl Default for OrbitTuning {
    fn default() -> Self {
        Self {
            radius: 3.0,
            tangential_speed: 2.5,
            clockwise: true,
            radial_stiffness: 4.0,
            radial_damping: 0.5,
            escape_nudge: 1.5,
        }
    }
}

/// Attack and support behavior parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementTuning {
    pub attack_desired_distance: f32,
    /// Half-width of the hold band around a desired distance.
    pub hysteresis: f32,
    pub approach_speed: f32,
    pub back_off_speed: f32,
    /// Maximum distance at which agents fire.
    pub fire_range: f32,
    /// Cooldown of the default weapon (seconds).
    pub weapon_cooldown: f64,

    /// Distance supporters keep from the target along the target-agent axis.
    pub support_distance: f32,
    pub support_lateral_offset: f32,
    pub support_approach_speed: f32,
    pub support_back_off_speed: f32,
    pub fire_interval_min: f64,
    pub fire_interval_max: f64,
}

impl Default for EngagementTuning {
    fn default() -> Self {
        Self {
            attack_desired_distance: 4.0,
            hysteresis: 0.5,
            approach_speed: 4.5,
            back_off_speed: 3.0,
            fire_range: 8.0,
            weapon_cooldown: 0.35,
            support_distance: 5.0,
            support_lateral_offset: 2.5,
            support_approach_speed: 3.5,
            support_back_off_speed: 2.5,
            fire_interval_min: 0.8,
            fire_interval_max: 1.6,
        }
    }
}

/// Bullet parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    pub speed: f32,
    /// Seconds before an unspent bullet returns to the pool.
    pub lifetime: f64,
    pub damage: f32,
    /// Collision radius used for sweeps.
    pub radius: f32,
    /// Per-kind hard ceiling on pooled bullets. `None` = grow on demand.
    pub hard_cap_per_kind: Option<usize>,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 12.0,
            lifetime: 2.0,
            damage: 1.0,
            radius: 0.1,
            hard_cap_per_kind: None,
        }
    }
}

impl SwarmConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(data: &str) -> SwarmResult<Self> {
        let config: SwarmConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> SwarmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether an agent at `agent` can stay engaged with a target at
    /// `target`. Promotion, role forcing and target loss all use this test.
    pub fn within_engagement_reach(&self, agent: Position, target: Position) -> bool {
        agent.distance_to(&target) <= self.target_loss_range
    }

    /// Replace a non-positive timestep with the default one. Returns whether
    /// the value was changed.
    pub fn repair_timestep(&mut self) -> bool {
        if self.fixed_timestep > 0.0 {
            return false;
        }
        self.fixed_timestep = Self::default().fixed_timestep;
        true
    }

    /// Check the invariants the simulation relies on.
    pub fn validate(&self) -> SwarmResult<()> {
        fn invalid(msg: &str) -> SwarmResult<()> {
            Err(SwarmError::InvalidConfig(msg.to_string()))
        }

        if !(self.fixed_timestep > 0.0) {
            return invalid("fixed_timestep must be positive");
        }
        if !(self.spawn_interval > 0.0) {
            return invalid("spawn_interval must be positive");
        }
        if !(self.orbit.radius > 0.0) {
            return invalid("orbit.radius must be positive");
        }
        if self.orbit.radial_stiffness < 0.0 || self.orbit.radial_damping < 0.0 {
            return invalid("orbit stiffness and damping must be non-negative");
        }
        let e = &self.engagement;
        let speeds = [
            self.orbit.tangential_speed,
            e.approach_speed,
            e.back_off_speed,
            e.support_approach_speed,
            e.support_back_off_speed,
            self.projectiles.speed,
        ];
        if speeds.iter().any(|s| *s < 0.0) {
            return invalid("speeds must be non-negative");
        }
        if e.hysteresis < 0.0 {
            return invalid("engagement.hysteresis must be non-negative");
        }
        if e.fire_interval_min < 0.0 || e.fire_interval_min > e.fire_interval_max {
            return invalid("engagement fire interval must satisfy 0 <= min <= max");
        }
        if !(self.projectiles.lifetime > 0.0) {
            return invalid("projectiles.lifetime must be positive");
        }
        if let Some(cap) = self.pool_hard_cap {
            if cap < self.prewarm {
                return invalid("pool_hard_cap must not be below prewarm");
            }
        }
        Ok(())
    }
}
