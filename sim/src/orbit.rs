//! Orbit-keeping motion model.
//!
//! Agents circulate around a (possibly moving) anchor at a fixed radius. The
//! tangential component drives circulation; a radial spring-damper pulls the
//! agent back onto the ring without snapping.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Position, Velocity};
use crate::config::OrbitTuning;

/// Below this distance from the anchor the radial direction is undefined.
const DEGENERATE_RADIUS: f32 = 0.0001;

/// Per-agent orbit parameters.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitMotion {
    pub radius: f32,
    pub tangential_speed: f32,
    /// Circulation sense. Flips only on a collision event.
    pub clockwise: bool,
    pub radial_stiffness: f32,
    pub radial_damping: f32,
    pub escape_nudge: f32,
}

impl Default for OrbitMotion {
    fn default() -> Self {
        Self::from_tuning(&OrbitTuning::default())
    }
}

impl OrbitMotion {
    pub fn from_tuning(tuning: &OrbitTuning) -> Self {
        Self {
            radius: tuning.radius,
            tangential_speed: tuning.tangential_speed,
            clockwise: tuning.clockwise,
            radial_stiffness: tuning.radial_stiffness,
            radial_damping: tuning.radial_damping,
            escape_nudge: tuning.escape_nudge,
        }
    }

    /// Tangent for the given outward radial direction.
    pub fn tangent(&self, radial_dir: Velocity) -> Velocity {
        if self.clockwise {
            radial_dir.perp_cw()
        } else {
            radial_dir.perp_ccw()
        }
    }

    /// Desired velocity for an agent at `position` moving at `velocity`,
    /// orbiting `anchor`, integrated over a step of `dt` seconds.
    pub fn desired_velocity(
        &self,
        position: Position,
        velocity: Velocity,
        anchor: Position,
        dt: f32,
    ) -> Velocity {
        let offset = position - anchor;
        let dist = offset.magnitude();
        let radial_dir = radial_direction(position, anchor);
        let tangent = self.tangent(radial_dir);

        let error = dist - self.radius;
        let accel = -error * self.radial_stiffness - velocity.dot(radial_dir) * self.radial_damping;
        let radial_delta = accel * dt;
        let radial_speed = if dt > 0.0 { radial_delta / dt } else { 0.0 };

        tangent * self.tangential_speed + radial_dir * radial_speed
    }

    /// Escape response to a hard collision: reverse circulation, re-project
    /// the current speed onto the new tangent and push off the surface.
    ///
    /// Returns the velocity the agent should take immediately.
    pub fn on_collision(
        &mut self,
        position: Position,
        velocity: Velocity,
        anchor: Position,
        surface_normal: Velocity,
    ) -> Velocity {
        self.clockwise = !self.clockwise;

        let radial_dir = radial_direction(position, anchor);
        let speed = velocity.magnitude();
        let mut normal = surface_normal.normalized();
        if normal == Velocity::ZERO {
            normal = radial_dir;
        }

        self.tangent(radial_dir) * speed + normal * self.escape_nudge
    }
}

/// Unit vector from `anchor` toward `position`, +X when they coincide.
pub fn radial_direction(position: Position, anchor: Position) -> Velocity {
    let offset = position - anchor;
    if offset.magnitude() < DEGENERATE_RADIUS {
        Velocity::UNIT_X
    } else {
        offset.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 30.0;

    fn simulate(orbit: &OrbitMotion, start: Position, anchor: impl Fn(usize) -> Position, steps: usize) -> (Position, Velocity) {
        let mut pos = start;
        let mut vel = Velocity::ZERO;
        for i in 0..steps {
            vel = orbit.desired_velocity(pos, vel, anchor(i), DT);
            pos = pos + vel * DT;
        }
        (pos, vel)
    }

    #[test]
    fn test_converges_to_radius_from_outside() {
        let orbit = OrbitMotion::default();
        let anchor = Position::new(0.0, 0.0);
        let (pos, _) = simulate(&orbit, Position::new(9.0, 0.0), |_| anchor, 600);
        let dist = pos.distance_to(&anchor);
        assert!((dist - orbit.radius).abs() < 0.25, "dist = {}", dist);
    }

    #[test]
    fn test_converges_to_radius_from_anchor() {
        let orbit = OrbitMotion::default();
        let anchor = Position::new(5.0, -2.0);
        let (pos, _) = simulate(&orbit, anchor, |_| anchor, 600);
        let dist = pos.distance_to(&anchor);
        assert!((dist - orbit.radius).abs() < 0.25, "dist = {}", dist);
    }

    #[test]
    fn test_follows_moving_anchor() {
        let orbit = OrbitMotion::default();
        let anchor_at = |i: usize| Position::new(i as f32 * 0.01, 0.0);
        let (pos, _) = simulate(&orbit, Position::new(3.0, 0.0), anchor_at, 900);
        let dist = pos.distance_to(&anchor_at(899));
        assert!((dist - orbit.radius).abs() < 0.5, "dist = {}", dist);
    }

    #[test]
    fn test_on_ring_velocity_is_tangential() {
        let orbit = OrbitMotion::default();
        let v = orbit.desired_velocity(Position::new(3.0, 0.0), Velocity::ZERO, Position::default(), DT);
        assert!(v.vx.abs() < 0.0001);
        // Clockwise at +X heads toward -Y.
        assert!((v.vy + orbit.tangential_speed).abs() < 0.0001);
    }

    #[test]
    fn test_collision_flips_direction_and_keeps_speed() {
        let mut orbit = OrbitMotion {
            escape_nudge: 0.0,
            ..OrbitMotion::default()
        };
        let pos = Position::new(0.0, 3.0);
        let before = orbit.clockwise;
        let vel = Velocity::new(2.5, 0.0);

        let after = orbit.on_collision(pos, vel, Position::default(), Velocity::new(0.0, 1.0));

        assert_ne!(orbit.clockwise, before);
        assert!((after.magnitude() - 2.5).abs() < 0.0001);
        // Was heading +X (clockwise at +Y), now heads -X.
        assert!(after.vx < 0.0);
    }

    #[test]
    fn test_collision_nudges_along_normal() {
        let mut orbit = OrbitMotion::default();
        let normal = Velocity::new(0.0, 2.0);
        let after = orbit.on_collision(Position::new(3.0, 0.0), Velocity::ZERO, Position::default(), normal);
        assert!((after.vy - orbit.escape_nudge).abs() < 0.0001);
    }

    #[test]
    fn test_collision_with_degenerate_normal_pushes_outward() {
        let mut orbit = OrbitMotion::default();
        let after = orbit.on_collision(Position::new(3.0, 0.0), Velocity::ZERO, Position::default(), Velocity::ZERO);
        assert!((after.vx - orbit.escape_nudge).abs() < 0.0001);
    }
}
