//! Per-agent behavior: role resolution, steering and fire requests.
//!
//! An agent tick never touches coordinator fields directly. It asks the
//! coordinator for claims, side allocations and the current aggressor, then
//! writes its own `Minion` state and `SteeringCommand`.

use bevy_ecs::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::components::*;
use crate::config::{EngagementTuning, SwarmConfig};
use crate::coordinator::{ClaimOutcome, SwarmAnchor, SwarmCoordinator};
use crate::orbit::OrbitMotion;
use crate::ports::{ClockPort, FieldOfView, Sensor, SensorPort, WeaponsPort};
use crate::projectile::{ProjectileKind, ProjectilePool};

/// Deterministic RNG for support fire timing.
#[derive(Resource, Debug, Clone)]
pub struct SwarmRng(pub ChaCha8Rng);

impl SwarmRng {
    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Delay until a supporter's next shot.
    pub fn next_fire_interval(&mut self, tuning: &EngagementTuning) -> f64 {
        if tuning.fire_interval_max <= tuning.fire_interval_min {
            return tuning.fire_interval_min;
        }
        self.0.gen_range(tuning.fire_interval_min..=tuning.fire_interval_max)
    }
}

/// Component values an agent tick reads up-front.
struct AgentState {
    position: Position,
    velocity: Velocity,
    minion: Minion,
    orbit: OrbitMotion,
}

impl AgentState {
    fn read(world: &World, handle: AgentHandle) -> Option<Self> {
        let entity = handle.entity();
        Some(Self {
            position: *world.get::<Position>(entity)?,
            velocity: *world.get::<Velocity>(entity)?,
            minion: world.get::<Minion>(entity)?.clone(),
            orbit: *world.get::<OrbitMotion>(entity)?,
        })
    }
}

/// One logic tick for an active agent. Invalid handles are ignored and
/// reported once.
pub fn agent_tick(world: &mut World, handle: AgentHandle) {
    if !world.resource::<SwarmCoordinator>().is_active(handle) {
        world
            .resource_mut::<SwarmCoordinator>()
            .warn_invalid_once(handle, "agent_tick");
        return;
    }
    let Some(state) = AgentState::read(world, handle) else {
        return;
    };

    let config = *world.resource::<SwarmConfig>();
    let anchor = world.resource::<SwarmAnchor>().0;
    let (now, dt) = {
        let clock = &world.resource::<ClockPort>().0;
        (clock.now(), clock.delta())
    };

    let mut minion = state.minion;
    let target = world.resource_scope(|world, mut coordinator: Mut<SwarmCoordinator>| {
        let sensor = world.resource::<SensorPort>().0.as_ref();
        resolve_role(sensor, &mut coordinator, &config, handle, state.position, &mut minion)
    });

    let desired = match (minion.role, target) {
        (MinionRole::Attacking, Some(target)) => {
            minion.facing = state.position.direction_to(&target.position, minion.facing);
            attack_velocity(state.position, target.position, &config.engagement)
        }
        (MinionRole::Supporting, Some(target)) => {
            minion.facing = state.position.direction_to(&target.position, minion.facing);
            support_velocity(state.position, target.position, minion.support_side, &config.engagement, dt)
        }
        _ => {
            let desired = state.orbit.desired_velocity(state.position, state.velocity, anchor, dt);
            let heading = if state.velocity.magnitude() > 0.0001 { state.velocity } else { desired };
            if heading.magnitude() > 0.0001 {
                minion.facing = heading.normalized();
            }
            desired
        }
    };

    if let Some(target) = target {
        request_fire(world, handle, &config, &mut minion, state.position, target, now);
    }

    let entity = handle.entity();
    if let Some(mut stored) = world.get_mut::<Minion>(entity) {
        *stored = minion;
    }
    if let Some(mut steering) = world.get_mut::<SteeringCommand>(entity) {
        steering.desired = desired;
    }
}

/// Embedder-initiated claim on behalf of `handle`. A denied claimant supports
/// its proposed target.
pub fn claim(world: &mut World, handle: AgentHandle, target: TargetId) -> ClaimOutcome {
    let Some(mut minion) = world.get::<Minion>(handle.entity()).cloned() else {
        world
            .resource_mut::<SwarmCoordinator>()
            .warn_invalid_once(handle, "try_claim_aggressor");
        return ClaimOutcome::Denied;
    };
    let outcome = world.resource_scope(|_, mut coordinator: Mut<SwarmCoordinator>| {
        if !coordinator.is_active(handle) {
            coordinator.warn_invalid_once(handle, "try_claim_aggressor");
            return None;
        }
        if minion.role == MinionRole::Attacking {
            // Already the aggressor; a second claim changes nothing.
            return Some(ClaimOutcome::Denied);
        }
        Some(settle_claim(&mut coordinator, handle, &mut minion, target))
    });
    let Some(outcome) = outcome else {
        return ClaimOutcome::Denied;
    };
    if let Some(mut stored) = world.get_mut::<Minion>(handle.entity()) {
        *stored = minion;
    }
    outcome
}

/// Hard collision: reverse the orbit and push off the surface immediately.
pub fn collide(world: &mut World, handle: AgentHandle, surface_normal: Velocity) {
    if !world.resource::<SwarmCoordinator>().is_active(handle) {
        world
            .resource_mut::<SwarmCoordinator>()
            .warn_invalid_once(handle, "on_collision");
        return;
    }
    let anchor = world.resource::<SwarmAnchor>().0;
    let mut entity = world.entity_mut(handle.entity());
    let (Some(position), Some(velocity)) = (entity.get::<Position>().copied(), entity.get::<Velocity>().copied())
    else {
        return;
    };
    let Some(escape) = entity
        .get_mut::<OrbitMotion>()
        .map(|mut orbit| orbit.on_collision(position, velocity, anchor, surface_normal))
    else {
        return;
    };
    if let Some(mut velocity) = entity.get_mut::<Velocity>() {
        *velocity = escape;
    }
    if let Some(mut steering) = entity.get_mut::<SteeringCommand>() {
        steering.desired = escape;
    }
    trace!(agent = %handle, "orbit reversed on collision");
}

// ============================================================================
// ROLE RESOLUTION
// ============================================================================

fn set_role(handle: AgentHandle, minion: &mut Minion, role: MinionRole) {
    if minion.role != role {
        debug!(agent = %handle, from = ?minion.role, to = ?role, target = ?minion.target, "role transition");
        minion.role = role;
    }
}

fn disengage(handle: AgentHandle, minion: &mut Minion, reason: &str) {
    debug!(agent = %handle, from = ?minion.role, target = ?minion.target, reason, "disengaged");
    minion.disengage();
}

/// Walk the transition table for one tick. Returns the target the agent is
/// engaged with after resolution, if any.
fn resolve_role(
    sensor: &dyn Sensor,
    coordinator: &mut SwarmCoordinator,
    config: &SwarmConfig,
    handle: AgentHandle,
    position: Position,
    minion: &mut Minion,
) -> Option<TargetRef> {
    let resolve = |id: TargetId| {
        sensor
            .target_position(id)
            .filter(|pos| config.within_engagement_reach(position, *pos))
            .map(|pos| TargetRef { id, position: pos })
    };

    match minion.role {
        MinionRole::Attacking => {
            if coordinator.aggressor() != Some(handle) {
                disengage(handle, minion, "aggressor role revoked");
                return None;
            }
            let resolved = minion.target.and_then(&resolve);
            if resolved.is_none() {
                coordinator.relinquish(handle);
                disengage(handle, minion, "target lost");
            }
            resolved
        }
        MinionRole::Supporting => {
            if let (Some(_), Some(engaged)) = (coordinator.aggressor(), coordinator.engaged_target()) {
                if minion.target != Some(engaged) {
                    minion.target = Some(engaged);
                    minion.support_side = coordinator.allocate_side(engaged);
                    minion.next_support_fire_at = None;
                    debug!(agent = %handle, target = %engaged, side = minion.support_side.as_i8(), "support re-bound");
                }
            }
            let resolved = minion.target.and_then(&resolve);
            if resolved.is_none() {
                disengage(handle, minion, "target lost");
            }
            resolved
        }
        MinionRole::Seeking => match minion.target.and_then(&resolve) {
            Some(target) => {
                settle_claim(coordinator, handle, minion, target.id);
                Some(target)
            }
            None => {
                disengage(handle, minion, "proposed target lost");
                None
            }
        },
        MinionRole::Orbiting => {
            if let (Some(aggressor), Some(engaged)) = (coordinator.aggressor(), coordinator.engaged_target()) {
                if aggressor != handle {
                    let resolved = resolve(engaged)?;
                    minion.target = Some(engaged);
                    minion.support_side = coordinator.allocate_side(engaged);
                    set_role(handle, minion, MinionRole::Supporting);
                    return Some(resolved);
                }
            }

            let fov = FieldOfView::new(minion.facing, config.fov_degrees);
            let sighting = sensor.try_get_closest_target(position, config.sense_range, fov)?;
            coordinator.report_sighting(sighting.id);
            minion.target = Some(sighting.id);
            set_role(handle, minion, MinionRole::Seeking);
            settle_claim(coordinator, handle, minion, sighting.id);
            Some(sighting)
        }
    }
}

/// Propose `target` and apply the outcome: Attacking when granted,
/// Supporting the proposed target when denied.
fn settle_claim(
    coordinator: &mut SwarmCoordinator,
    handle: AgentHandle,
    minion: &mut Minion,
    target: TargetId,
) -> ClaimOutcome {
    let outcome = coordinator.try_claim_aggressor(handle, target);
    minion.target = Some(target);
    minion.next_support_fire_at = None;
    match outcome {
        ClaimOutcome::Granted => {
            minion.support_side = SupportSide::Unassigned;
            set_role(handle, minion, MinionRole::Attacking);
        }
        ClaimOutcome::Denied => {
            minion.support_side = coordinator.allocate_side(target);
            set_role(handle, minion, MinionRole::Supporting);
        }
    }
    outcome
}

// ============================================================================
// STEERING
// ============================================================================

/// Signed speed toward a goal for the approach/hold/back-off band.
/// Positive approaches, negative backs off, zero holds.
pub fn band_speed(distance: f32, desired: f32, hysteresis: f32, approach: f32, back_off: f32) -> f32 {
    if distance > desired + hysteresis {
        approach
    } else if distance < desired - hysteresis {
        -back_off
    } else {
        0.0
    }
}

fn attack_velocity(position: Position, target: Position, tuning: &EngagementTuning) -> Velocity {
    let toward = position.direction_to(&target, Velocity::ZERO);
    let speed = band_speed(
        position.distance_to(&target),
        tuning.attack_desired_distance,
        tuning.hysteresis,
        tuning.approach_speed,
        tuning.back_off_speed,
    );
    toward * speed
}

/// Flank slot for a supporter: `support_distance` out along the
/// target-to-agent `axis`, shifted sideways by the side's lateral offset.
pub fn support_position(target: Position, axis: Velocity, side: SupportSide, tuning: &EngagementTuning) -> Position {
    target + axis * tuning.support_distance + axis.perp_ccw() * (tuning.support_lateral_offset * side.sign())
}

fn support_velocity(
    position: Position,
    target: Position,
    side: SupportSide,
    tuning: &EngagementTuning,
    dt: f32,
) -> Velocity {
    let axis = target.direction_to(&position, Velocity::UNIT_X);
    if position.distance_to(&target) < tuning.support_distance - tuning.hysteresis {
        return axis * tuning.support_back_off_speed;
    }

    let slot = support_position(target, axis, side, tuning);
    let error = slot - position;
    let gap = error.magnitude();
    if gap <= tuning.hysteresis {
        return Velocity::ZERO;
    }
    // Do not overshoot the slot within one step.
    let speed = if dt > 0.0 {
        tuning.support_approach_speed.min(gap / dt)
    } else {
        tuning.support_approach_speed
    };
    error.normalized() * speed
}

// ============================================================================
// FIRING
// ============================================================================

fn request_fire(
    world: &mut World,
    handle: AgentHandle,
    config: &SwarmConfig,
    minion: &mut Minion,
    origin: Position,
    target: TargetRef,
    now: f64,
) {
    if origin.distance_to(&target.position) > config.engagement.fire_range {
        return;
    }

    let kind = match minion.role {
        MinionRole::Attacking => ProjectileKind::AGGRESSOR_BOLT,
        MinionRole::Supporting => match minion.next_support_fire_at {
            None => {
                let delay = world.resource_mut::<SwarmRng>().next_fire_interval(&config.engagement);
                minion.next_support_fire_at = Some(now + delay);
                return;
            }
            Some(at) if now < at => return,
            Some(_) => ProjectileKind::SUPPORT_BOLT,
        },
        _ => return,
    };

    let fired = world
        .resource_mut::<WeaponsPort>()
        .0
        .try_fire_at(handle, origin, target.position, now);
    if !fired {
        return;
    }

    if kind == ProjectileKind::SUPPORT_BOLT {
        let delay = world.resource_mut::<SwarmRng>().next_fire_interval(&config.engagement);
        minion.next_support_fire_at = Some(now + delay);
    }

    let direction = origin.direction_to(&target.position, minion.facing);
    let launched = world
        .resource_mut::<ProjectilePool>()
        .fire(kind, origin, direction, now, &config.projectiles);
    match launched {
        Ok(id) => trace!(agent = %handle, target = %target.id, projectile = id.0, "fired"),
        Err(err) => trace!(agent = %handle, error = %err, "shot dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_speed() {
        assert_eq!(band_speed(10.0, 4.0, 0.5, 3.0, 2.0), 3.0);
        assert_eq!(band_speed(4.3, 4.0, 0.5, 3.0, 2.0), 0.0);
        assert_eq!(band_speed(1.0, 4.0, 0.5, 3.0, 2.0), -2.0);
    }

    #[test]
    fn test_attack_holds_inside_band() {
        let tuning = EngagementTuning::default();
        let target = Position::new(0.0, 0.0);

        let far = attack_velocity(Position::new(10.0, 0.0), target, &tuning);
        assert!((far.vx + tuning.approach_speed).abs() < 0.0001);

        let close = attack_velocity(Position::new(1.0, 0.0), target, &tuning);
        assert!((close.vx - tuning.back_off_speed).abs() < 0.0001);

        let held = attack_velocity(Position::new(tuning.attack_desired_distance, 0.0), target, &tuning);
        assert_eq!(held, Velocity::ZERO);
    }

    #[test]
    fn test_support_slots_mirror_across_axis() {
        let tuning = EngagementTuning::default();
        let target = Position::new(0.0, 0.0);
        let axis = Velocity::new(1.0, 0.0);

        let plus = support_position(target, axis, SupportSide::Positive, &tuning);
        let minus = support_position(target, axis, SupportSide::Negative, &tuning);

        assert!((plus.x - tuning.support_distance).abs() < 0.0001);
        assert!((plus.y - tuning.support_lateral_offset).abs() < 0.0001);
        assert!((minus.y + tuning.support_lateral_offset).abs() < 0.0001);
        assert_eq!(plus.x, minus.x);
    }

    #[test]
    fn test_support_velocity_does_not_overshoot() {
        let tuning = EngagementTuning::default();
        let target = Position::new(0.0, 0.0);
        let axis = Velocity::new(1.0, 0.0);
        let slot = support_position(target, axis, SupportSide::Positive, &tuning);
        // Just outside the hold band.
        let position = Position::new(slot.x, slot.y - (tuning.hysteresis + 0.01));

        let dt = 0.1;
        let v = support_velocity(position, target, SupportSide::Positive, &tuning, dt);
        assert!(v.magnitude() * dt <= slot.distance_to(&position) + 0.0001);
    }

    #[test]
    fn test_support_backs_off_when_crowding_target() {
        let tuning = EngagementTuning::default();
        let v = support_velocity(Position::new(1.0, 0.0), Position::new(0.0, 0.0), SupportSide::Positive, &tuning, 0.1);
        assert!((v.vx - tuning.support_back_off_speed).abs() < 0.0001);
    }

    #[test]
    fn test_fire_intervals_are_seeded_and_bounded() {
        let tuning = EngagementTuning::default();
        let mut a = SwarmRng::seeded(7);
        let mut b = SwarmRng::seeded(7);
        for _ in 0..32 {
            let x = a.next_fire_interval(&tuning);
            assert_eq!(x, b.next_fire_interval(&tuning));
            assert!(x >= tuning.fire_interval_min && x <= tuning.fire_interval_max);
        }
    }

    #[test]
    fn test_denied_claim_supports_proposed_target() {
        let mut coordinator = SwarmCoordinator::new();
        let (a, b) = (AgentHandle(Entity::from_raw(1)), AgentHandle(Entity::from_raw(2)));
        // Not active: denied regardless of slot state.
        let mut minion = Minion::default();
        assert_eq!(settle_claim(&mut coordinator, a, &mut minion, TargetId(4)), ClaimOutcome::Denied);
        assert_eq!(minion.role, MinionRole::Supporting);
        assert_eq!(minion.target, Some(TargetId(4)));
        assert_eq!(minion.support_side, SupportSide::Positive);

        let mut other = Minion::default();
        settle_claim(&mut coordinator, b, &mut other, TargetId(4));
        assert_eq!(other.support_side, SupportSide::Negative);
    }
}
