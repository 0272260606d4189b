//! Movement system - hands steering to the physics collaborator.

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::ports::{ClockPort, PhysicsPort};

/// System that integrates each active agent's desired velocity.
///
/// Position and velocity belong to the physics port; the core only supplies
/// the `SteeringCommand` written in the logic phase.
pub fn movement_system(
    clock: Res<ClockPort>,
    mut physics: ResMut<PhysicsPort>,
    mut query: Query<(Entity, &mut Position, &mut Velocity, &SteeringCommand), With<Active>>,
) {
    let dt = clock.0.delta();
    for (entity, mut pos, mut vel, steering) in query.iter_mut() {
        physics
            .0
            .integrate(AgentHandle(entity), &mut *pos, &mut *vel, steering.desired, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, KinematicPhysics};

    fn world_with(physics: KinematicPhysics) -> World {
        let mut world = World::new();
        world.insert_resource(ClockPort(Box::new(FixedClock::new(0.5))));
        world.insert_resource(PhysicsPort(Box::new(physics)));
        world
    }

    fn spawn(world: &mut World, desired: Velocity, active: bool) -> Entity {
        let mut entity = world.spawn((
            Position::default(),
            Velocity::ZERO,
            SteeringCommand { desired },
        ));
        if active {
            entity.insert(Active);
        }
        entity.id()
    }

    #[test]
    fn test_moves_active_agents_only() {
        let mut world = world_with(KinematicPhysics { max_acceleration: 1000.0 });
        let moving = spawn(&mut world, Velocity::new(2.0, 0.0), true);
        let parked = spawn(&mut world, Velocity::new(2.0, 0.0), false);

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);

        assert_eq!(world.get::<Position>(moving).unwrap().x, 1.0);
        assert_eq!(world.get::<Position>(parked).unwrap().x, 0.0);
    }
}
