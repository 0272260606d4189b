//! Projectile pool.
//!
//! Bullets live in slots grouped by [`ProjectileKind`]. A fired bullet flies
//! in a straight line at its kind's speed and returns to the pool on its own
//! when its lifetime runs out, when it hits a damageable collider, or when it
//! hits solid geometry.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use crate::components::{Position, Velocity};
use crate::config::ProjectileTuning;
use crate::error::{SwarmError, SwarmResult};
use crate::ports::{ClockPort, ColliderId, ColliderKind, CollisionPort, CollisionWorld};

/// Bullet prefab/type key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileKind(pub u16);

impl ProjectileKind {
    /// Fired by the aggressor.
    pub const AGGRESSOR_BOLT: ProjectileKind = ProjectileKind(0);
    /// Fired by supporters on their randomized interval.
    pub const SUPPORT_BOLT: ProjectileKind = ProjectileKind(1);
}

/// Slot index into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectileId(pub usize);

/// Why a bullet went back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnReason {
    Expired,
    HitDamageable,
    HitSolid,
}

/// A damaging hit, drained by the embedder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileHit {
    pub kind: ProjectileKind,
    pub collider: ColliderId,
    pub point: Position,
    pub damage: f32,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub position: Position,
    pub velocity: Velocity,
    pub expires_at: f64,
    pub damage: f32,
    pub radius: f32,
    pub live: bool,
    /// Colliders already resolved during this flight.
    resolved: Vec<ColliderId>,
}

impl Projectile {
    fn new(kind: ProjectileKind) -> Self {
        Self {
            kind,
            position: Position::default(),
            velocity: Velocity::ZERO,
            expires_at: 0.0,
            damage: 0.0,
            radius: 0.0,
            live: false,
            resolved: Vec::new(),
        }
    }

    pub fn has_resolved(&self, collider: ColliderId) -> bool {
        self.resolved.contains(&collider)
    }
}

/// Slots plus a per-kind free list.
#[derive(Resource, Debug, Default)]
pub struct ProjectilePool {
    slots: Vec<Projectile>,
    free: HashMap<ProjectileKind, Vec<usize>>,
    per_kind: HashMap<ProjectileKind, usize>,
    hard_cap_per_kind: Option<usize>,
    hits: Vec<ProjectileHit>,
    returned: Vec<(ProjectileId, ReturnReason)>,
}

impl ProjectilePool {
    pub fn new(hard_cap_per_kind: Option<usize>) -> Self {
        Self {
            hard_cap_per_kind,
            ..Default::default()
        }
    }

    /// Launch a bullet of `kind` from `origin` along `direction`.
    pub fn fire(
        &mut self,
        kind: ProjectileKind,
        origin: Position,
        direction: Velocity,
        now: f64,
        tuning: &ProjectileTuning,
    ) -> SwarmResult<ProjectileId> {
        let index = self.acquire_slot(kind)?;
        let projectile = &mut self.slots[index];
        projectile.position = origin;
        projectile.velocity = direction.normalized() * tuning.speed;
        projectile.expires_at = now + tuning.lifetime;
        projectile.damage = tuning.damage;
        projectile.radius = tuning.radius;
        projectile.live = true;
        projectile.resolved.clear();
        trace!(kind = ?kind, slot = index, "projectile fired");
        Ok(ProjectileId(index))
    }

    /// Return a bullet to its kind's free list. No-op if not live.
    pub fn release(&mut self, id: ProjectileId) -> bool {
        let Some(projectile) = self.slots.get_mut(id.0) else {
            return false;
        };
        if !projectile.live {
            return false;
        }
        projectile.live = false;
        projectile.velocity = Velocity::ZERO;
        projectile.resolved.clear();
        self.free.entry(projectile.kind).or_default().push(id.0);
        true
    }

    /// Fly every live bullet one step and apply return rules.
    pub fn advance(&mut self, now: f64, dt: f32, collisions: &dyn CollisionWorld) {
        self.hits.clear();
        self.returned.clear();
        for index in 0..self.slots.len() {
            if !self.slots[index].live {
                continue;
            }
            if let Some(reason) = self.step_projectile(index, now, dt, collisions) {
                self.release(ProjectileId(index));
                self.returned.push((ProjectileId(index), reason));
            }
        }
    }

    fn step_projectile(
        &mut self,
        index: usize,
        now: f64,
        dt: f32,
        collisions: &dyn CollisionWorld,
    ) -> Option<ReturnReason> {
        let projectile = &mut self.slots[index];
        if now >= projectile.expires_at {
            return Some(ReturnReason::Expired);
        }

        let from = projectile.position;
        let to = from + projectile.velocity * dt;
        for hit in collisions.sweep(from, to, projectile.radius) {
            if projectile.resolved.contains(&hit.collider) {
                continue;
            }
            projectile.resolved.push(hit.collider);
            match hit.kind {
                ColliderKind::Damageable => {
                    self.hits.push(ProjectileHit {
                        kind: projectile.kind,
                        collider: hit.collider,
                        point: hit.point,
                        damage: projectile.damage,
                    });
                    projectile.position = hit.point;
                    return Some(ReturnReason::HitDamageable);
                }
                ColliderKind::Solid => {
                    projectile.position = hit.point;
                    return Some(ReturnReason::HitSolid);
                }
            }
        }
        projectile.position = to;
        None
    }

    fn acquire_slot(&mut self, kind: ProjectileKind) -> SwarmResult<usize> {
        if let Some(index) = self.free.get_mut(&kind).and_then(|free| free.pop()) {
            return Ok(index);
        }
        let count = self.per_kind.entry(kind).or_insert(0);
        if let Some(capacity) = self.hard_cap_per_kind {
            if *count >= capacity {
                return Err(SwarmError::ProjectilePoolExhausted { kind, capacity });
            }
        }
        *count += 1;
        self.slots.push(Projectile::new(kind));
        Ok(self.slots.len() - 1)
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.slots.get(id.0)
    }

    pub fn live(&self) -> impl Iterator<Item = &Projectile> {
        self.slots.iter().filter(|p| p.live)
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Slots ever constructed for `kind`.
    pub fn pooled(&self, kind: ProjectileKind) -> usize {
        self.per_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Damaging hits from the last advance.
    pub fn drain_hits(&mut self) -> Vec<ProjectileHit> {
        std::mem::take(&mut self.hits)
    }

    /// Bullets returned during the last advance, with the reason.
    pub fn drain_returns(&mut self) -> Vec<(ProjectileId, ReturnReason)> {
        std::mem::take(&mut self.returned)
    }
}

/// Physics-phase system that flies bullets.
pub fn projectile_system(
    clock: Res<ClockPort>,
    collisions: Res<CollisionPort>,
    mut pool: ResMut<ProjectilePool>,
) {
    pool.advance(clock.0.now(), clock.0.delta(), collisions.0.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ColliderHit, OpenField};

    const DT: f32 = 0.1;

    /// Vertical wall at x = `x`.
    struct Wall {
        x: f32,
        kind: ColliderKind,
        /// Report the same collider this many times per sweep.
        repeats: usize,
    }

    impl CollisionWorld for Wall {
        fn sweep(&self, from: Position, to: Position, _radius: f32) -> Vec<ColliderHit> {
            if from.x <= self.x && to.x >= self.x {
                let hit = ColliderHit {
                    collider: ColliderId(42),
                    kind: self.kind,
                    point: Position::new(self.x, from.y),
                };
                vec![hit; self.repeats]
            } else {
                Vec::new()
            }
        }
    }

    fn tuning() -> ProjectileTuning {
        ProjectileTuning {
            speed: 10.0,
            lifetime: 1.0,
            ..ProjectileTuning::default()
        }
    }

    #[test]
    fn test_expires_after_lifetime() {
        let mut pool = ProjectilePool::default();
        let id = pool
            .fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();

        pool.advance(0.5, DT, &OpenField);
        assert!(pool.get(id).unwrap().live);
        pool.advance(1.0, DT, &OpenField);
        assert!(!pool.get(id).unwrap().live);
        assert_eq!(pool.drain_returns(), vec![(id, ReturnReason::Expired)]);
    }

    #[test]
    fn test_moves_at_fixed_speed() {
        let mut pool = ProjectilePool::default();
        let id = pool
            .fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::new(0.0, 5.0), 0.0, &tuning())
            .unwrap();
        pool.advance(0.1, DT, &OpenField);
        let p = pool.get(id).unwrap();
        assert!((p.position.y - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_solid_hit_returns_without_damage() {
        let mut pool = ProjectilePool::default();
        let wall = Wall { x: 0.5, kind: ColliderKind::Solid, repeats: 1 };
        let id = pool
            .fire(ProjectileKind::SUPPORT_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        pool.advance(0.1, DT, &wall);

        assert!(!pool.get(id).unwrap().live);
        assert!(pool.drain_hits().is_empty());
        assert_eq!(pool.drain_returns(), vec![(id, ReturnReason::HitSolid)]);
    }

    #[test]
    fn test_damageable_collider_is_hit_once() {
        let mut pool = ProjectilePool::default();
        let target = Wall { x: 0.5, kind: ColliderKind::Damageable, repeats: 3 };
        pool.fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        pool.advance(0.1, DT, &target);

        let hits = pool.drain_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].collider, ColliderId(42));
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_undrained_hits_do_not_accumulate() {
        let mut pool = ProjectilePool::default();
        let target = Wall { x: 0.5, kind: ColliderKind::Damageable, repeats: 1 };
        for _ in 0..4 {
            pool.fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
                .unwrap();
            pool.advance(0.1, DT, &target);
        }
        assert_eq!(pool.drain_hits().len(), 1);

        pool.fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        pool.advance(0.1, DT, &target);
        pool.advance(0.2, DT, &OpenField);
        assert!(pool.drain_hits().is_empty());
    }

    #[test]
    fn test_slots_are_recycled_per_kind() {
        let mut pool = ProjectilePool::default();
        let a = pool
            .fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        pool.release(a);

        // A different kind does not reuse the slot.
        let b = pool
            .fire(ProjectileKind::SUPPORT_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        assert_ne!(a, b);

        let c = pool
            .fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        assert_eq!(a, c);
        assert!(!pool.get(c).unwrap().has_resolved(ColliderId(42)));
        assert_eq!(pool.pooled(ProjectileKind::AGGRESSOR_BOLT), 1);
    }

    #[test]
    fn test_hard_cap_per_kind() {
        let mut pool = ProjectilePool::new(Some(1));
        pool.fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        let err = pool
            .fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap_err();
        assert!(matches!(err, SwarmError::ProjectilePoolExhausted { capacity: 1, .. }));
        assert!(pool
            .fire(ProjectileKind::SUPPORT_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = ProjectilePool::default();
        let id = pool
            .fire(ProjectileKind::AGGRESSOR_BOLT, Position::default(), Velocity::UNIT_X, 0.0, &tuning())
            .unwrap();
        assert!(pool.release(id));
        assert!(!pool.release(id));
        assert!(!pool.release(ProjectileId(99)));
    }
}
