//! Public API for the swarm simulation.
//!
//! This module provides the embedding surface: a game engine (or a test)
//! creates a [`SwarmWorld`], wires its collaborators through [`SwarmPorts`],
//! moves the anchor and targets, and either calls [`SwarmWorld::step`] every
//! frame or drives the tick phases by hand.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When
//! `step(dt)` is called, the world accumulates time and runs fixed updates as
//! needed. Each fixed update runs the logic phase (coordinator housekeeping,
//! then every agent in spawn order) followed by the physics phase.
//!
//! ## Manual ticking
//!
//! `spawn_tick()`, `agent_tick(handle)` and `physics_tick()` expose the same
//! phases individually for hosts that own their own frame loop.

use bevy_ecs::prelude::*;
use tracing::{debug, warn};

use crate::components::*;
use crate::config::SwarmConfig;
use crate::coordinator::{self, ClaimOutcome, SwarmAnchor, SwarmCoordinator};
use crate::error::SwarmResult;
use crate::minion::{self, SwarmRng};
use crate::orbit::OrbitMotion;
use crate::pool::AgentPool;
use crate::ports::*;
use crate::projectile::{projectile_system, ProjectileHit, ProjectilePool};
use crate::sensor::TargetRoster;
use crate::systems::*;
use crate::world::SwarmSnapshot;

/// External collaborators a swarm is wired to at construction.
pub struct SwarmPorts {
    pub sensor: Box<dyn Sensor>,
    pub physics: Box<dyn Physics>,
    pub weapons: Box<dyn WeaponPort>,
    pub clock: Box<dyn Clock>,
    pub collisions: Box<dyn CollisionWorld>,
}

impl SwarmPorts {
    /// Standalone defaults: a target roster, kinematic physics, cooldown
    /// weapons, a fixed clock and an empty collision world.
    pub fn defaults(config: &SwarmConfig) -> Self {
        Self {
            sensor: Box::new(TargetRoster::default()),
            physics: Box::new(KinematicPhysics::default()),
            weapons: Box::new(CooldownWeapons::new(config.engagement.weapon_cooldown)),
            clock: Box::new(FixedClock::new(config.fixed_timestep)),
            collisions: Box::new(OpenField),
        }
    }

    pub fn with_sensor(mut self, sensor: impl Sensor) -> Self {
        self.sensor = Box::new(sensor);
        self
    }

    pub fn with_physics(mut self, physics: impl Physics) -> Self {
        self.physics = Box::new(physics);
        self
    }

    pub fn with_weapons(mut self, weapons: impl WeaponPort) -> Self {
        self.weapons = Box::new(weapons);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_collisions(mut self, collisions: impl CollisionWorld) -> Self {
        self.collisions = Box::new(collisions);
        self
    }
}

/// The main swarm container.
///
/// Holds the ECS world and the two phase schedules, providing a clean API
/// for:
/// - Stepping the simulation forward
/// - Driving the tick phases manually
/// - Releasing agents and issuing claims
/// - Extracting state snapshots
pub struct SwarmWorld {
    world: World,
    /// Coordinator housekeeping, then agent logic.
    logic: Schedule,
    /// Movement integration, then projectile flight.
    physics: Schedule,
    tick: u64,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    /// Damaging hits from the last `step` or `physics_tick` call.
    recent_hits: Vec<ProjectileHit>,
}

impl SwarmWorld {
    /// Create a swarm with default configuration and collaborators.
    pub fn new() -> Self {
        Self::with_config(SwarmConfig::default())
    }

    /// Create a swarm with custom configuration and default collaborators.
    pub fn with_config(config: SwarmConfig) -> Self {
        let mut clock_config = config;
        clock_config.repair_timestep();
        let ports = SwarmPorts::defaults(&clock_config);
        Self::with_ports(config, ports)
    }

    /// Like [`SwarmWorld::with_ports`], but rejects an invalid configuration.
    pub fn try_with_ports(config: SwarmConfig, ports: SwarmPorts) -> SwarmResult<Self> {
        config.validate()?;
        Ok(Self::with_ports(config, ports))
    }

    /// Create a swarm wired to the given collaborators. A non-positive
    /// timestep is replaced by the default one.
    pub fn with_ports(mut config: SwarmConfig, ports: SwarmPorts) -> Self {
        if let Err(err) = config.validate() {
            warn!(error = %err, "building swarm from invalid configuration");
        }
        if config.repair_timestep() {
            warn!(fixed_timestep = config.fixed_timestep, "non-positive timestep replaced");
        }

        let mut world = World::new();

        // Core resources
        world.insert_resource(config);
        world.insert_resource(SwarmAnchor::default());
        world.insert_resource(SwarmCoordinator::new());
        world.insert_resource(ProjectilePool::new(config.projectiles.hard_cap_per_kind));
        world.insert_resource(SwarmRng::seeded(config.rng_seed));

        let mut pool = AgentPool::new(OrbitMotion::from_tuning(&config.orbit), config.pool_hard_cap);
        let prewarmed = pool.prewarm(&mut world, config.prewarm);
        world.insert_resource(pool);

        // Collaborators
        world.insert_resource(SensorPort(ports.sensor));
        world.insert_resource(PhysicsPort(ports.physics));
        world.insert_resource(WeaponsPort(ports.weapons));
        world.insert_resource(ClockPort(ports.clock));
        world.insert_resource(CollisionPort(ports.collisions));

        let mut logic = Schedule::default();
        logic.add_systems((coordinator_system, minion_system).chain());

        let mut physics = Schedule::default();
        physics.add_systems((movement_system, projectile_system).chain());

        debug!(
            population_cap = config.population_cap,
            prewarmed,
            hard_cap = ?config.pool_hard_cap,
            "swarm world created"
        );

        Self {
            world,
            logic,
            physics,
            tick: 0,
            time_accumulator: 0.0,
            recent_hits: Vec::new(),
        }
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed
    /// updates as needed. This ensures deterministic behavior regardless of
    /// frame rate.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.world.resource::<SwarmConfig>().fixed_timestep;
        self.recent_hits.clear();
        if !(fixed_dt > 0.0) {
            warn!(fixed_dt, "step skipped: timestep must be positive");
            return;
        }

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update();
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed timestep update: both phases, then the clock.
    fn fixed_update(&mut self) {
        self.logic.run(&mut self.world);
        self.run_physics();
    }

    /// Coordinator housekeeping only.
    pub fn spawn_tick(&mut self) {
        coordinator::spawn_tick(&mut self.world);
    }

    /// Logic tick for one agent. Unknown or released handles are ignored.
    pub fn agent_tick(&mut self, handle: AgentHandle) {
        minion::agent_tick(&mut self.world, handle);
    }

    /// Physics phase, then advance the clock by one tick.
    pub fn physics_tick(&mut self) {
        self.recent_hits.clear();
        self.run_physics();
    }

    fn run_physics(&mut self) {
        self.physics.run(&mut self.world);
        let hits = self.world.resource_mut::<ProjectilePool>().drain_hits();
        self.recent_hits.extend(hits);
        self.world.resource_mut::<ClockPort>().0.advance();
        self.tick += 1;
    }

    /// Return an agent to the pool. If it was the aggressor, a replacement
    /// is promoted before this returns.
    pub fn release(&mut self, handle: AgentHandle) {
        coordinator::release_agent(&mut self.world, handle);
    }

    /// Release every active agent and clear all arbitration state.
    pub fn despawn_all(&mut self) {
        coordinator::despawn_all(&mut self.world);
    }

    /// Claim the aggressor role for `handle`. A denied claimant supports
    /// `target`.
    pub fn try_claim_aggressor(&mut self, handle: AgentHandle, target: TargetId) -> ClaimOutcome {
        minion::claim(&mut self.world, handle, target)
    }

    /// Report a hard collision of an agent against level geometry.
    pub fn on_collision(&mut self, handle: AgentHandle, surface_normal: Velocity) {
        minion::collide(&mut self.world, handle, surface_normal);
    }

    pub fn set_anchor(&mut self, anchor: Position) {
        self.world.resource_mut::<SwarmAnchor>().0 = anchor;
    }

    pub fn anchor(&self) -> Position {
        self.world.resource::<SwarmAnchor>().0
    }

    pub fn config(&self) -> &SwarmConfig {
        self.world.resource::<SwarmConfig>()
    }

    pub fn coordinator(&self) -> &SwarmCoordinator {
        self.world.resource::<SwarmCoordinator>()
    }

    pub fn pool(&self) -> &AgentPool {
        self.world.resource::<AgentPool>()
    }

    pub fn projectiles(&self) -> &ProjectilePool {
        self.world.resource::<ProjectilePool>()
    }

    /// Active agents in spawn order.
    pub fn active(&self) -> &[AgentHandle] {
        self.coordinator().active()
    }

    pub fn aggressor(&self) -> Option<AgentHandle> {
        self.coordinator().aggressor()
    }

    pub fn minion(&self, handle: AgentHandle) -> Option<&Minion> {
        self.world.get::<Minion>(handle.entity())
    }

    pub fn role_of(&self, handle: AgentHandle) -> Option<MinionRole> {
        self.minion(handle).map(|m| m.role)
    }

    pub fn position_of(&self, handle: AgentHandle) -> Option<Position> {
        self.world.get::<Position>(handle.entity()).copied()
    }

    /// Teleport an agent. For hosts whose physics lives outside the world.
    pub fn set_position(&mut self, handle: AgentHandle, position: Position) {
        if let Some(mut pos) = self.world.get_mut::<Position>(handle.entity()) {
            *pos = position;
        }
    }

    /// Desired velocity written in the last logic phase.
    pub fn steering_of(&self, handle: AgentHandle) -> Option<Velocity> {
        self.world.get::<SteeringCommand>(handle.entity()).map(|s| s.desired)
    }

    /// The installed sensor, if it is an `S`.
    pub fn sensor_mut<S: Sensor>(&mut self) -> Option<&mut S> {
        self.world
            .get_resource_mut::<SensorPort>()?
            .into_inner()
            .0
            .as_any_mut()
            .downcast_mut::<S>()
    }

    /// The default target roster, when no custom sensor is installed.
    pub fn targets_mut(&mut self) -> Option<&mut TargetRoster> {
        self.sensor_mut::<TargetRoster>()
    }

    /// Damaging bullet hits from the last `step` or `physics_tick` call.
    /// Hits not drained before the next call are dropped.
    pub fn drain_projectile_hits(&mut self) -> Vec<ProjectileHit> {
        std::mem::take(&mut self.recent_hits)
    }

    /// Get a snapshot of the current swarm state.
    pub fn snapshot(&self) -> SwarmSnapshot {
        SwarmSnapshot::from_world(&self.world, self.tick, self.current_time())
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation clock time in seconds.
    pub fn current_time(&self) -> f64 {
        self.world.resource::<ClockPort>().0.now()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SwarmWorld {
    fn default() -> Self {
        Self::new()
    }
}
