//! ECS components for the swarm simulation.
//!
//! Components are pure data containers attached to pooled minion entities.
//! Arbitration lives in the coordinator; per-agent behavior lives in the
//! minion tick.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::orbit::OrbitMotion;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position in world units.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Unit direction from `self` toward `other`, or `fallback` when the two
    /// points coincide.
    pub fn direction_to(&self, other: &Position, fallback: Velocity) -> Velocity {
        let delta = *other - *self;
        if delta.magnitude() < 0.0001 {
            fallback
        } else {
            delta.normalized()
        }
    }
}

impl Sub for Position {
    type Output = Velocity;

    fn sub(self, rhs: Position) -> Velocity {
        Velocity::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Velocity> for Position {
    type Output = Position;

    fn add(self, rhs: Velocity) -> Position {
        Position::new(self.x + rhs.vx, self.y + rhs.vy)
    }
}

/// 2D velocity vector. Also used as a general-purpose direction vector.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { vx: 0.0, vy: 0.0 };
    pub const UNIT_X: Velocity = Velocity { vx: 1.0, vy: 0.0 };

    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }

    pub fn dot(&self, other: Velocity) -> f32 {
        self.vx * other.vx + self.vy * other.vy
    }

    /// Rotated 90 degrees clockwise (y-up convention).
    pub fn perp_cw(&self) -> Self {
        Self::new(self.vy, -self.vx)
    }

    /// Rotated 90 degrees counter-clockwise (y-up convention).
    pub fn perp_ccw(&self) -> Self {
        Self::new(-self.vy, self.vx)
    }

    /// Clamp the magnitude to `max`, keeping direction.
    pub fn clamped(&self, max: f32) -> Self {
        let mag = self.magnitude();
        if mag > max && mag > 0.0 {
            *self * (max / mag)
        } else {
            *self
        }
    }
}

impl Add for Velocity {
    type Output = Velocity;

    fn add(self, rhs: Velocity) -> Velocity {
        Velocity::new(self.vx + rhs.vx, self.vy + rhs.vy)
    }
}

impl Sub for Velocity {
    type Output = Velocity;

    fn sub(self, rhs: Velocity) -> Velocity {
        Velocity::new(self.vx - rhs.vx, self.vy - rhs.vy)
    }
}

impl Mul<f32> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f32) -> Velocity {
        Velocity::new(self.vx * rhs, self.vy * rhs)
    }
}

impl Neg for Velocity {
    type Output = Velocity;

    fn neg(self) -> Velocity {
        Velocity::new(-self.vx, -self.vy)
    }
}

/// Desired velocity issued by the swarm core each logic phase.
///
/// The physics collaborator owns `Position`/`Velocity`; the core only writes
/// this command and lets the physics phase decide how to reach it.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringCommand {
    pub desired: Velocity,
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Handle to a pooled minion agent. Stable across acquire/release cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentHandle(pub Entity);

impl AgentHandle {
    /// Numeric id used in snapshots and logs.
    pub fn id(&self) -> u32 {
        self.0.index()
    }

    pub fn entity(&self) -> Entity {
        self.0
    }
}

impl fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0.index())
    }
}

/// Identity of an external target (player, decoy, ...). Owned by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// A sensed target and where it was seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRef {
    pub id: TargetId,
    pub position: Position,
}

// ============================================================================
// MINION STATE
// ============================================================================

/// Role of a minion within its swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MinionRole {
    /// Circling the swarm anchor. The neutral state.
    #[default]
    Orbiting,
    /// Holding a provisional target while its aggressor claim is resolved.
    Seeking,
    /// The swarm's single aggressor, pursuing its target.
    Attacking,
    /// Flanking the aggressor's target.
    Supporting,
}

/// Flank a supporter holds relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupportSide {
    #[default]
    Unassigned,
    Positive,
    Negative,
}

impl SupportSide {
    /// Side for the `n`th supporter (zero-based) bound to the same target.
    pub fn for_ordinal(n: u32) -> Self {
        if n % 2 == 0 {
            SupportSide::Positive
        } else {
            SupportSide::Negative
        }
    }

    pub fn sign(&self) -> f32 {
        match self {
            SupportSide::Unassigned => 0.0,
            SupportSide::Positive => 1.0,
            SupportSide::Negative => -1.0,
        }
    }

    pub fn as_i8(&self) -> i8 {
        match self {
            SupportSide::Unassigned => 0,
            SupportSide::Positive => 1,
            SupportSide::Negative => -1,
        }
    }
}

/// Per-agent behavioral state.
///
/// `role` and `target` are written only by the agent's own tick or by
/// coordinator-issued commands.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Minion {
    pub role: MinionRole,
    /// Set only while Seeking, Attacking or Supporting.
    pub target: Option<TargetId>,
    pub support_side: SupportSide,
    /// Next time a supporting shot is allowed. `None` until scheduled.
    pub next_support_fire_at: Option<f64>,
    /// Unit facing, used for field-of-view checks.
    pub facing: Velocity,
}

impl Default for Minion {
    fn default() -> Self {
        Self {
            role: MinionRole::Orbiting,
            target: None,
            support_side: SupportSide::Unassigned,
            next_support_fire_at: None,
            facing: Velocity::UNIT_X,
        }
    }
}

impl Minion {
    /// Full reset to the neutral Orbiting state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop any engagement and return to Orbiting, keeping facing.
    pub fn disengage(&mut self) {
        self.role = MinionRole::Orbiting;
        self.target = None;
        self.support_side = SupportSide::Unassigned;
        self.next_support_fire_at = None;
    }

    pub fn is_engaged(&self) -> bool {
        matches!(self.role, MinionRole::Attacking | MinionRole::Supporting)
    }
}

/// Marker for agents currently checked out of the pool.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Active;

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for constructing a pooled minion entity.
#[derive(Bundle)]
pub struct MinionBundle {
    pub minion: Minion,
    pub orbit: OrbitMotion,
    pub position: Position,
    pub velocity: Velocity,
    pub steering: SteeringCommand,
}

impl MinionBundle {
    pub fn new(orbit: OrbitMotion) -> Self {
        Self {
            minion: Minion::default(),
            orbit,
            position: Position::default(),
            velocity: Velocity::default(),
            steering: SteeringCommand::default(),
        }
    }
}
