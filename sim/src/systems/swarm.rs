//! Logic-phase systems.
//!
//! Both are exclusive systems: arbitration needs the coordinator and the
//! agent components at once, and claims must be visible immediately.

use bevy_ecs::prelude::*;

use crate::coordinator::{spawn_tick, SwarmCoordinator};
use crate::minion::agent_tick;

/// Coordinator housekeeping for this tick.
pub fn coordinator_system(world: &mut World) {
    spawn_tick(world);
}

/// Logic tick for every active agent, in spawn order.
pub fn minion_system(world: &mut World) {
    let active = world.resource::<SwarmCoordinator>().active().to_vec();
    for handle in active {
        // An earlier agent's tick can release this one.
        if world.resource::<SwarmCoordinator>().is_active(handle) {
            agent_tick(world, handle);
        }
    }
}
