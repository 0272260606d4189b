//! Swarm coordinator and aggressor arbitration.
//!
//! The coordinator owns the active set, the aggressor slot, target memory,
//! spawn timing and the support-side registry. It is the only component that
//! grants or revokes the aggressor role. Agents interact with it exclusively
//! through its methods.
//!
//! ## Tick ordering
//!
//! [`spawn_tick`] (housekeeping) runs before any agent tick:
//! 1. drop a dead or disengaged aggressor
//! 2. refresh target memory from the anchor's sensor sweep
//! 3. top up the population while a target is in detection range
//! 4. promote an aggressor if the slot is empty and a target is known
//! 5. force every other active agent in reach to support the aggressor's target
//! 6. forget side counters for targets nobody is bound to anymore

use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

use crate::components::*;
use crate::config::SwarmConfig;
use crate::error::SwarmError;
use crate::pool::AgentPool;
use crate::ports::{ClockPort, FieldOfView, SensorPort, WeaponsPort};

/// Golden angle, spreads successive spawns around the ring.
const SPAWN_ANGLE_STEP: f32 = 2.399_963;

/// The point the swarm orbits. Moved by the embedder.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SwarmAnchor(pub Position);

/// Result of an aggressor claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted,
    Denied,
}

// ============================================================================
// SIDE REGISTRY
// ============================================================================

/// Per-target alternating counter for support flanks.
///
/// The first supporter bound to a target gets `+1`, the next `-1`, and so on.
/// Entries are dropped once the target is disengaged.
#[derive(Debug, Clone, Default)]
pub struct SideRegistry {
    counters: HashMap<TargetId, u32>,
}

impl SideRegistry {
    pub fn allocate(&mut self, target: TargetId) -> SupportSide {
        let counter = self.counters.entry(target).or_insert(0);
        let side = SupportSide::for_ordinal(*counter);
        *counter += 1;
        side
    }

    pub fn disengage(&mut self, target: TargetId) {
        self.counters.remove(&target);
    }

    /// Keep only entries for targets in `engaged`.
    pub fn retain_engaged(&mut self, engaged: &HashSet<TargetId>) {
        self.counters.retain(|target, _| engaged.contains(target));
    }

    pub fn is_tracking(&self, target: TargetId) -> bool {
        self.counters.contains_key(&target)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Arbitration state for one swarm.
#[derive(Resource, Debug, Default)]
pub struct SwarmCoordinator {
    /// Spawned agents in spawn order.
    active: Vec<AgentHandle>,
    /// At most one; always a member of `active`.
    aggressor: Option<AgentHandle>,
    /// What the aggressor pursues; what supporters bind to.
    engaged_target: Option<TargetId>,
    last_seen_target: Option<TargetId>,
    next_spawn_at: f64,
    spawned_total: u64,
    sides: SideRegistry,
    /// Invalid handles already reported.
    warned: HashSet<AgentHandle>,
}

impl SwarmCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[AgentHandle] {
        &self.active
    }

    pub fn is_active(&self, handle: AgentHandle) -> bool {
        self.active.contains(&handle)
    }

    pub fn aggressor(&self) -> Option<AgentHandle> {
        self.aggressor
    }

    pub fn engaged_target(&self) -> Option<TargetId> {
        self.engaged_target
    }

    pub fn last_seen_target(&self) -> Option<TargetId> {
        self.last_seen_target
    }

    pub fn next_spawn_at(&self) -> f64 {
        self.next_spawn_at
    }

    pub fn sides(&self) -> &SideRegistry {
        &self.sides
    }

    /// Record a sighting. Replaces any older memory.
    pub fn report_sighting(&mut self, target: TargetId) {
        if self.last_seen_target != Some(target) {
            trace!(target = %target, "target remembered");
        }
        self.last_seen_target = Some(target);
    }

    pub fn forget_target(&mut self) {
        if let Some(target) = self.last_seen_target.take() {
            debug!(target = %target, "target forgotten");
        }
    }

    /// Request the aggressor role. Granted only when the slot is empty and
    /// the requester is active; the check and the set are one step.
    pub fn try_claim_aggressor(&mut self, handle: AgentHandle, target: TargetId) -> ClaimOutcome {
        if self.aggressor.is_some() || !self.is_active(handle) {
            debug!(agent = %handle, target = %target, holder = ?self.aggressor, "aggressor claim denied");
            return ClaimOutcome::Denied;
        }
        self.set_aggressor(handle, target);
        debug!(agent = %handle, target = %target, "aggressor claim granted");
        ClaimOutcome::Granted
    }

    /// Give the role to a specific agent chosen by the coordinator.
    pub fn assign_specific_aggressor(&mut self, handle: AgentHandle, target: TargetId) -> bool {
        if self.aggressor.is_some() || !self.is_active(handle) {
            return false;
        }
        self.set_aggressor(handle, target);
        debug!(agent = %handle, target = %target, "aggressor assigned");
        true
    }

    fn set_aggressor(&mut self, handle: AgentHandle, target: TargetId) {
        self.aggressor = Some(handle);
        self.engaged_target = Some(target);
        self.last_seen_target = Some(target);
    }

    /// Empty the aggressor slot. Returns the previous holder.
    pub fn clear_aggressor(&mut self) -> Option<AgentHandle> {
        self.engaged_target = None;
        self.aggressor.take()
    }

    /// Called by an aggressor that lost its target. Ignored from anyone else.
    pub fn relinquish(&mut self, handle: AgentHandle) -> bool {
        if self.aggressor == Some(handle) {
            self.clear_aggressor();
            debug!(agent = %handle, "aggressor relinquished role");
            true
        } else {
            false
        }
    }

    /// Support flank for the next agent bound to `target`.
    pub fn allocate_side(&mut self, target: TargetId) -> SupportSide {
        self.sides.allocate(target)
    }

    /// Active agent closest to `target_pos`. Ties keep the first in order.
    pub fn closest_to(
        candidates: impl IntoIterator<Item = (AgentHandle, Position)>,
        target_pos: Position,
    ) -> Option<AgentHandle> {
        let mut best: Option<(AgentHandle, f32)> = None;
        for (handle, position) in candidates {
            let dist = position.distance_to(&target_pos);
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((handle, dist)),
            }
        }
        best.map(|(handle, _)| handle)
    }

    /// Log an invalid handle, once per handle.
    pub fn warn_invalid_once(&mut self, handle: AgentHandle, operation: &str) {
        if self.warned.insert(handle) {
            let err = SwarmError::UnknownHandle(handle);
            warn!(agent = %handle, operation, "{err}; ignoring");
        }
    }

    fn add_active(&mut self, handle: AgentHandle) {
        self.warned.remove(&handle);
        self.active.push(handle);
        self.spawned_total += 1;
    }

    /// Remove from the active set. Clears the slot first when `handle` is the
    /// aggressor. Returns `Some(was_aggressor)`, or `None` if not active.
    fn remove_active(&mut self, handle: AgentHandle) -> Option<bool> {
        let index = self.active.iter().position(|h| *h == handle)?;
        let was_aggressor = self.relinquish(handle);
        self.active.remove(index);
        Some(was_aggressor)
    }
}

// ============================================================================
// HOUSEKEEPING
// ============================================================================

/// Coordinator housekeeping for one tick.
pub fn spawn_tick(world: &mut World) {
    let config = *world.resource::<SwarmConfig>();
    let anchor = world.resource::<SwarmAnchor>().0;
    let now = world.resource::<ClockPort>().0.now();

    world.resource_scope(|world, mut coordinator: Mut<SwarmCoordinator>| {
        clear_dead_aggressor(world, &mut coordinator);
        let sensed = refresh_target_memory(world, &mut coordinator, &config, anchor);
        if sensed {
            top_up_population(world, &mut coordinator, &config, anchor, now);
        }
        arbitrate_with(world, &mut coordinator, &config);
    });
}

/// Promotion and role forcing without spawning or sensing from the anchor.
pub fn arbitrate(world: &mut World) {
    let config = *world.resource::<SwarmConfig>();
    world.resource_scope(|world, mut coordinator: Mut<SwarmCoordinator>| {
        arbitrate_with(world, &mut coordinator, &config);
    });
}

fn arbitrate_with(world: &mut World, coordinator: &mut SwarmCoordinator, config: &SwarmConfig) {
    if coordinator.aggressor.is_none() {
        promote_support_to_aggressor(world, coordinator, config);
    }
    if coordinator.aggressor.is_some() {
        force_support_roles(world, coordinator, config);
    }
    prune_side_registry(world, coordinator);
}

fn clear_dead_aggressor(world: &World, coordinator: &mut SwarmCoordinator) {
    let Some(handle) = coordinator.aggressor else {
        return;
    };
    let still_attacking = coordinator.is_active(handle)
        && world
            .get::<Minion>(handle.entity())
            .is_some_and(|m| m.role == MinionRole::Attacking);
    if !still_attacking {
        coordinator.clear_aggressor();
        debug!(agent = %handle, "aggressor slot cleared");
    }
}

/// Sweep from the anchor and validate memory. Returns whether a target is
/// currently in detection range.
fn refresh_target_memory(
    world: &World,
    coordinator: &mut SwarmCoordinator,
    config: &SwarmConfig,
    anchor: Position,
) -> bool {
    let sensor = &world.resource::<SensorPort>().0;

    if let Some(sighting) = sensor.try_get_closest_target(anchor, config.detection_range, FieldOfView::omni()) {
        coordinator.report_sighting(sighting.id);
        return true;
    }

    if let Some(remembered) = coordinator.last_seen_target {
        let valid = sensor
            .target_position(remembered)
            .is_some_and(|pos| pos.distance_to(&anchor) <= config.memory_range);
        if !valid {
            coordinator.forget_target();
        }
    }
    false
}

fn top_up_population(
    world: &mut World,
    coordinator: &mut SwarmCoordinator,
    config: &SwarmConfig,
    anchor: Position,
    now: f64,
) {
    if coordinator.active.len() >= config.population_cap || now < coordinator.next_spawn_at {
        return;
    }

    let acquired = world.resource_scope(|world, mut pool: Mut<AgentPool>| pool.acquire(world));
    let handle = match acquired {
        Ok(handle) => handle,
        Err(err) => {
            // Hard cap reached: drop the request until a slot frees.
            trace!(error = %err, "spawn dropped");
            return;
        }
    };

    let angle = coordinator.spawned_total as f32 * SPAWN_ANGLE_STEP;
    let offset = Velocity::new(angle.cos(), angle.sin()) * config.orbit.radius;
    if let Some(mut position) = world.get_mut::<Position>(handle.entity()) {
        *position = anchor + offset;
    }

    coordinator.add_active(handle);
    coordinator.next_spawn_at = now + config.spawn_interval;
    debug!(agent = %handle, active = coordinator.active.len(), "minion spawned");
}

/// Fill an empty aggressor slot: prefer the remembered target, otherwise
/// re-query the sensor from each active agent in order. Only agents within
/// engagement reach of the target are eligible; with none, the slot stays
/// empty.
fn promote_support_to_aggressor(world: &mut World, coordinator: &mut SwarmCoordinator, config: &SwarmConfig) {
    if coordinator.active.is_empty() {
        return;
    }

    let candidates: Vec<(AgentHandle, Position, Velocity)> = coordinator
        .active
        .iter()
        .filter_map(|handle| {
            let position = world.get::<Position>(handle.entity())?;
            let facing = world.get::<Minion>(handle.entity())?.facing;
            Some((*handle, *position, facing))
        })
        .collect();
    let in_reach = |target: &TargetRef| {
        candidates
            .iter()
            .any(|(_, position, _)| config.within_engagement_reach(*position, target.position))
    };

    let target = {
        let sensor = &world.resource::<SensorPort>().0;
        let remembered = coordinator
            .last_seen_target
            .and_then(|id| sensor.target_position(id).map(|pos| TargetRef { id, position: pos }))
            .filter(|target| in_reach(target));
        remembered.or_else(|| {
            candidates.iter().find_map(|(_, position, facing)| {
                sensor
                    .try_get_closest_target(*position, config.sense_range, FieldOfView::new(*facing, config.fov_degrees))
                    .filter(|target| in_reach(target))
            })
        })
    };
    let Some(target) = target else {
        return;
    };

    let chosen = SwarmCoordinator::closest_to(
        candidates
            .iter()
            .filter(|(_, position, _)| config.within_engagement_reach(*position, target.position))
            .map(|(handle, position, _)| (*handle, *position)),
        target.position,
    );
    let Some(chosen) = chosen else {
        return;
    };

    if coordinator.assign_specific_aggressor(chosen, target.id) {
        if let Some(mut minion) = world.get_mut::<Minion>(chosen.entity()) {
            minion.role = MinionRole::Attacking;
            minion.target = Some(target.id);
            minion.support_side = SupportSide::Unassigned;
            minion.next_support_fire_at = None;
        }
    }
}

/// Every other active agent within engagement reach supports the engaged
/// target. Agents out of reach are left to their own tick.
fn force_support_roles(world: &mut World, coordinator: &mut SwarmCoordinator, config: &SwarmConfig) {
    let (Some(aggressor), Some(engaged)) = (coordinator.aggressor, coordinator.engaged_target) else {
        return;
    };
    let Some(target_pos) = world.resource::<SensorPort>().0.target_position(engaged) else {
        return;
    };

    for index in 0..coordinator.active.len() {
        let handle = coordinator.active[index];
        if handle == aggressor {
            continue;
        }
        let Some(position) = world.get::<Position>(handle.entity()).copied() else {
            continue;
        };
        if !config.within_engagement_reach(position, target_pos) {
            continue;
        }
        let Some(mut minion) = world.get_mut::<Minion>(handle.entity()) else {
            continue;
        };
        if minion.role == MinionRole::Supporting && minion.target == Some(engaged) {
            continue;
        }
        let rebinding = minion.role == MinionRole::Supporting;
        minion.role = MinionRole::Supporting;
        minion.target = Some(engaged);
        minion.support_side = coordinator.sides.allocate(engaged);
        trace!(
            agent = %handle,
            target = %engaged,
            side = minion.support_side.as_i8(),
            rebinding,
            "bound to support"
        );
    }
}

fn prune_side_registry(world: &World, coordinator: &mut SwarmCoordinator) {
    let engaged: HashSet<TargetId> = coordinator
        .active
        .iter()
        .filter_map(|handle| world.get::<Minion>(handle.entity()))
        .filter(|minion| minion.is_engaged())
        .filter_map(|minion| minion.target)
        .collect();
    coordinator.sides.retain_engaged(&engaged);
}

// ============================================================================
// RELEASE / TEARDOWN
// ============================================================================

/// Take an agent out of the swarm and return it to the pool. If it was the
/// aggressor, the slot is cleared first and promotion is attempted at once.
pub fn release_agent(world: &mut World, handle: AgentHandle) {
    let removed = world.resource_mut::<SwarmCoordinator>().remove_active(handle);
    let Some(was_aggressor) = removed else {
        world
            .resource_mut::<SwarmCoordinator>()
            .warn_invalid_once(handle, "release");
        return;
    };

    world.resource_mut::<WeaponsPort>().0.forget(handle);
    world.resource_scope(|world, mut pool: Mut<AgentPool>| {
        pool.release(world, handle);
    });
    debug!(agent = %handle, was_aggressor, "minion released");

    if was_aggressor {
        arbitrate(world);
    }
}

/// Release every active agent and reset arbitration state.
pub fn despawn_all(world: &mut World) {
    let handles = {
        let mut coordinator = world.resource_mut::<SwarmCoordinator>();
        coordinator.clear_aggressor();
        coordinator.last_seen_target = None;
        coordinator.sides.clear();
        std::mem::take(&mut coordinator.active)
    };

    for handle in &handles {
        world.resource_mut::<WeaponsPort>().0.forget(*handle);
    }
    world.resource_scope(|world, mut pool: Mut<AgentPool>| {
        for handle in &handles {
            pool.release(world, *handle);
        }
    });
    info!(released = handles.len(), "swarm despawned");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: u32) -> AgentHandle {
        AgentHandle(Entity::from_raw(n))
    }

    fn coordinator_with(active: &[AgentHandle]) -> SwarmCoordinator {
        let mut coordinator = SwarmCoordinator::new();
        for h in active {
            coordinator.add_active(*h);
        }
        coordinator
    }

    #[test]
    fn test_only_one_of_two_claims_is_granted() {
        let (a, b) = (handle(1), handle(2));
        let mut coordinator = coordinator_with(&[a, b]);

        let first = coordinator.try_claim_aggressor(a, TargetId(7));
        let second = coordinator.try_claim_aggressor(b, TargetId(7));

        assert_eq!(first, ClaimOutcome::Granted);
        assert_eq!(second, ClaimOutcome::Denied);
        assert_eq!(coordinator.aggressor(), Some(a));
        assert_eq!(coordinator.engaged_target(), Some(TargetId(7)));
        assert_eq!(coordinator.last_seen_target(), Some(TargetId(7)));
    }

    #[test]
    fn test_inactive_claimant_is_denied() {
        let mut coordinator = coordinator_with(&[handle(1)]);
        assert_eq!(coordinator.try_claim_aggressor(handle(5), TargetId(1)), ClaimOutcome::Denied);
        assert_eq!(coordinator.aggressor(), None);
    }

    #[test]
    fn test_relinquish_only_from_holder() {
        let (a, b) = (handle(1), handle(2));
        let mut coordinator = coordinator_with(&[a, b]);
        coordinator.try_claim_aggressor(a, TargetId(1));

        assert!(!coordinator.relinquish(b));
        assert_eq!(coordinator.aggressor(), Some(a));
        assert!(coordinator.relinquish(a));
        assert_eq!(coordinator.aggressor(), None);
        assert_eq!(coordinator.engaged_target(), None);
        // Memory survives the aggressor.
        assert_eq!(coordinator.last_seen_target(), Some(TargetId(1)));
    }

    #[test]
    fn test_removing_aggressor_clears_slot() {
        let (a, b) = (handle(1), handle(2));
        let mut coordinator = coordinator_with(&[a, b]);
        coordinator.try_claim_aggressor(a, TargetId(1));

        assert_eq!(coordinator.remove_active(a), Some(true));
        assert_eq!(coordinator.aggressor(), None);
        assert_eq!(coordinator.remove_active(a), None);
        assert_eq!(coordinator.remove_active(b), Some(false));
    }

    #[test]
    fn test_side_allocation_alternates_per_target() {
        let mut sides = SideRegistry::default();
        let t = TargetId(3);
        let u = TargetId(4);

        let for_t: Vec<i8> = (0..5).map(|_| sides.allocate(t).as_i8()).collect();
        assert_eq!(for_t, vec![1, -1, 1, -1, 1]);
        // Independent counter per target.
        assert_eq!(sides.allocate(u), SupportSide::Positive);

        // A new engagement starts over.
        sides.disengage(t);
        assert_eq!(sides.allocate(t), SupportSide::Positive);
    }

    #[test]
    fn test_side_registry_retain_engaged() {
        let mut sides = SideRegistry::default();
        sides.allocate(TargetId(1));
        sides.allocate(TargetId(2));

        let engaged: HashSet<TargetId> = [TargetId(2)].into_iter().collect();
        sides.retain_engaged(&engaged);

        assert!(!sides.is_tracking(TargetId(1)));
        assert!(sides.is_tracking(TargetId(2)));
        assert_eq!(sides.len(), 1);
    }

    #[test]
    fn test_closest_tie_break_is_first_enumerated() {
        let target = Position::new(0.0, 0.0);
        let candidates = vec![
            (handle(1), Position::new(5.0, 0.0)),
            (handle(2), Position::new(0.0, 3.0)),
            (handle(3), Position::new(-3.0, 0.0)),
        ];
        assert_eq!(SwarmCoordinator::closest_to(candidates, target), Some(handle(2)));
        assert_eq!(SwarmCoordinator::closest_to(Vec::new(), target), None);
    }
}
