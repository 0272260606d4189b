//! Pooled agent store.
//!
//! Minion entities are constructed once and recycled forever. Acquire hands
//! out a neutral Orbiting agent; release resets it and puts it back on the
//! free list. Entities are never despawned.

use bevy_ecs::prelude::*;
use tracing::trace;

use crate::components::*;
use crate::error::{SwarmError, SwarmResult};
use crate::orbit::OrbitMotion;

/// Free list and membership of the swarm's minion entities.
#[derive(Resource, Debug)]
pub struct AgentPool {
    members: Vec<AgentHandle>,
    free: Vec<AgentHandle>,
    hard_cap: Option<usize>,
    /// Orbit parameters every recycled agent starts from.
    template: OrbitMotion,
}

impl AgentPool {
    pub fn new(template: OrbitMotion, hard_cap: Option<usize>) -> Self {
        Self {
            members: Vec::new(),
            free: Vec::new(),
            hard_cap,
            template,
        }
    }

    /// Construct `count` agents straight onto the free list, stopping at the
    /// hard cap. Returns how many were created.
    pub fn prewarm(&mut self, world: &mut World, count: usize) -> usize {
        let mut created = 0;
        for _ in 0..count {
            match self.construct(world) {
                Ok(handle) => {
                    self.free.push(handle);
                    created += 1;
                }
                Err(_) => break,
            }
        }
        created
    }

    /// Check out an agent in the default Orbiting state: zero velocity, no
    /// target, no support side. Recycles before constructing.
    pub fn acquire(&mut self, world: &mut World) -> SwarmResult<AgentHandle> {
        let handle = match self.free.pop() {
            Some(handle) => handle,
            None => self.construct(world)?,
        };
        self.reset(world, handle);
        world.entity_mut(handle.entity()).insert(Active);
        trace!(agent = %handle, "acquired from pool");
        Ok(handle)
    }

    /// Return an agent to the free list. Releasing a free or foreign handle
    /// is a no-op and returns `false`.
    pub fn release(&mut self, world: &mut World, handle: AgentHandle) -> bool {
        if !self.members.contains(&handle) || self.free.contains(&handle) {
            return false;
        }
        self.reset(world, handle);
        world.entity_mut(handle.entity()).remove::<Active>();
        self.free.push(handle);
        trace!(agent = %handle, "released to pool");
        true
    }

    pub fn contains(&self, handle: AgentHandle) -> bool {
        self.members.contains(&handle)
    }

    pub fn is_free(&self, handle: AgentHandle) -> bool {
        self.free.contains(&handle)
    }

    /// Agents ever constructed.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn hard_cap(&self) -> Option<usize> {
        self.hard_cap
    }

    fn construct(&mut self, world: &mut World) -> SwarmResult<AgentHandle> {
        if let Some(capacity) = self.hard_cap {
            if self.members.len() >= capacity {
                return Err(SwarmError::PoolExhausted { capacity });
            }
        }
        let handle = AgentHandle(world.spawn(MinionBundle::new(self.template)).id());
        self.members.push(handle);
        Ok(handle)
    }

    fn reset(&self, world: &mut World, handle: AgentHandle) {
        let mut entity = world.entity_mut(handle.entity());
        if let Some(mut minion) = entity.get_mut::<Minion>() {
            minion.reset();
        }
        if let Some(mut velocity) = entity.get_mut::<Velocity>() {
            *velocity = Velocity::ZERO;
        }
        if let Some(mut steering) = entity.get_mut::<SteeringCommand>() {
            steering.desired = Velocity::ZERO;
        }
        if let Some(mut orbit) = entity.get_mut::<OrbitMotion>() {
            *orbit = self.template;
        }
    }
}
