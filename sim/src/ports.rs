//! Collaborator interfaces consumed by the swarm core.
//!
//! Sensing, physics, weapons, time and projectile geometry are owned by the
//! embedding game. The core only talks to them through these traits, stored
//! in the ECS world as boxed resources. Each trait ships with a small default
//! implementation so a swarm can run standalone.

use bevy_ecs::prelude::*;
use std::any::Any;
use std::collections::HashMap;

use crate::components::{AgentHandle, Position, TargetId, TargetRef, Velocity};

// ============================================================================
// SENSOR
// ============================================================================

/// Viewing cone used to filter sensor queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    /// Direction the observer faces. A zero vector disables the cone.
    pub facing: Velocity,
    /// Full cone angle in degrees. 360 or more is omnidirectional.
    pub degrees: f32,
}

impl FieldOfView {
    pub fn new(facing: Velocity, degrees: f32) -> Self {
        Self { facing, degrees }
    }

    pub fn omni() -> Self {
        Self::new(Velocity::UNIT_X, 360.0)
    }

    /// Whether `point` lies inside the cone seen from `origin`.
    pub fn contains(&self, origin: Position, point: Position) -> bool {
        if self.degrees >= 360.0 {
            return true;
        }
        let to_point = point - origin;
        let dist = to_point.magnitude();
        let facing = self.facing.normalized();
        if dist < 0.0001 || facing == Velocity::ZERO {
            return true;
        }
        let half_angle = (self.degrees * 0.5).to_radians();
        facing.dot(to_point * (1.0 / dist)) >= half_angle.cos()
    }
}

/// Vision sensor: finds eligible targets and resolves known ones.
pub trait Sensor: Send + Sync + 'static {
    /// Closest eligible target within `range` of `origin` and inside `fov`.
    fn try_get_closest_target(&self, origin: Position, range: f32, fov: FieldOfView) -> Option<TargetRef>;

    /// Current position of a known target, `None` once it is destroyed or
    /// otherwise inactive.
    fn target_position(&self, target: TargetId) -> Option<Position>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Resource)]
pub struct SensorPort(pub Box<dyn Sensor>);

// ============================================================================
// PHYSICS
// ============================================================================

/// Physics collaborator. Position and velocity live in the agent's
/// components; the core hands over the desired velocity each physics phase.
pub trait Physics: Send + Sync + 'static {
    fn integrate(
        &mut self,
        agent: AgentHandle,
        position: &mut Position,
        velocity: &mut Velocity,
        desired: Velocity,
        dt: f32,
    );
}

/// Default physics: velocity chases the desired velocity under an
/// acceleration limit, position integrates explicitly.
#[derive(Debug, Clone, Copy)]
pub struct KinematicPhysics {
    pub max_acceleration: f32,
}

impl Default for KinematicPhysics {
    fn default() -> Self {
        Self {
            max_acceleration: 60.0,
        }
    }
}

impl Physics for KinematicPhysics {
    fn integrate(
        &mut self,
        _agent: AgentHandle,
        position: &mut Position,
        velocity: &mut Velocity,
        desired: Velocity,
        dt: f32,
    ) {
        let change = (desired - *velocity).clamped(self.max_acceleration * dt);
        *velocity = *velocity + change;
        *position = *position + *velocity * dt;
    }
}

#[derive(Resource)]
pub struct PhysicsPort(pub Box<dyn Physics>);

// ============================================================================
// WEAPON
// ============================================================================

/// Weapon trigger. Returns `false` while the shooter's weapon is cooling down.
pub trait WeaponPort: Send + Sync + 'static {
    fn try_fire_at(&mut self, shooter: AgentHandle, origin: Position, target_pos: Position, now: f64) -> bool;

    /// Called when a shooter returns to the pool.
    fn forget(&mut self, _shooter: AgentHandle) {}
}

/// Default weapon: a fixed per-shooter cooldown.
#[derive(Debug, Clone, Default)]
pub struct CooldownWeapons {
    pub cooldown: f64,
    ready_at: HashMap<AgentHandle, f64>,
}

impl CooldownWeapons {
    pub fn new(cooldown: f64) -> Self {
        Self {
            cooldown,
            ready_at: HashMap::new(),
        }
    }
}

impl WeaponPort for CooldownWeapons {
    fn try_fire_at(&mut self, shooter: AgentHandle, _origin: Position, _target_pos: Position, now: f64) -> bool {
        let ready = self.ready_at.get(&shooter).copied().unwrap_or(f64::NEG_INFINITY);
        if now < ready {
            return false;
        }
        self.ready_at.insert(shooter, now + self.cooldown);
        true
    }

    fn forget(&mut self, shooter: AgentHandle) {
        self.ready_at.remove(&shooter);
    }
}

#[derive(Resource)]
pub struct WeaponsPort(pub Box<dyn WeaponPort>);

// ============================================================================
// CLOCK
// ============================================================================

/// Monotonic simulation clock with a fixed delta per tick.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
    fn delta(&self) -> f32;
    /// Move time forward by one tick.
    fn advance(&mut self);
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: f64,
    dt: f32,
}

impl FixedClock {
    pub fn new(dt: f32) -> Self {
        Self { now: 0.0, dt }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn delta(&self) -> f32 {
        self.dt
    }

    fn advance(&mut self) {
        self.now += self.dt as f64;
    }
}

#[derive(Resource)]
pub struct ClockPort(pub Box<dyn Clock>);

// ============================================================================
// PROJECTILE GEOMETRY
// ============================================================================

/// Identity of a collider reported by the collision world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderKind {
    /// Trigger volume that takes damage (player, destructible).
    Damageable,
    /// Level geometry.
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderHit {
    pub collider: ColliderId,
    pub kind: ColliderKind,
    pub point: Position,
}

/// Collision queries for bullets in flight.
pub trait CollisionWorld: Send + Sync + 'static {
    /// Colliders touched by a circle of `radius` swept from `from` to `to`,
    /// ordered along the path. May report a collider more than once.
    fn sweep(&self, from: Position, to: Position, radius: f32) -> Vec<ColliderHit>;
}

/// Empty level: nothing to hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl CollisionWorld for OpenField {
    fn sweep(&self, _from: Position, _to: Position, _radius: f32) -> Vec<ColliderHit> {
        Vec::new()
    }
}

#[derive(Resource)]
pub struct CollisionPort(pub Box<dyn CollisionWorld>);
