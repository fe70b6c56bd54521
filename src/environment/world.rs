//! The engine world of an environment, and the hooks plugged into its step.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::config::EnvironmentConfig;
use crate::convert;
use crate::dynamics::collision_set::CollisionFilter;
use crate::dynamics::object::{ObjectHandle, PhysicsObject};
use crate::math::{Real, Vector};
use rapier::data::Arena;
use rapier::prelude::*;

/// Collision groups of static objects and trigger sensors: they never
/// interact with each other.
pub(crate) fn world_group() -> InteractionGroups {
    InteractionGroups::new(Group::GROUP_1, !Group::GROUP_1)
}

/// Orders a collider pair so it can be used as a set key.
pub(crate) fn ordered_pair(a: ColliderHandle, b: ColliderHandle) -> (ColliderHandle, ColliderHandle) {
    if a.into_raw_parts() <= b.into_raw_parts() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Every engine structure needed to simulate one environment.
pub(crate) struct World {
    pub gravity: Vector<Real>,
    pub params: IntegrationParameters,
    pub pipeline: PhysicsPipeline,
    pub islands: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    /// Pairs whose contacts are discarded during the next step.
    pub dropped_pairs: HashSet<(ColliderHandle, ColliderHandle)>,
}

impl World {
    pub fn new(config: &EnvironmentConfig) -> Self {
        let mut params = IntegrationParameters {
            dt: config.timestep,
            ..IntegrationParameters::default()
        };
        if let Some(iterations) = NonZeroUsize::new(config.solver_iterations) {
            params.num_solver_iterations = iterations;
        }

        Self {
            gravity: convert::pos_to_engine(&config.gravity),
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            dropped_pairs: HashSet::new(),
        }
    }

    /// Recomputes the mass properties of a body from its colliders and
    /// its additional mass properties, so they are up to date before the next step.
    pub fn refresh_mass_properties(&mut self, body: RigidBodyHandle) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.recompute_mass_properties_from_colliders(&self.colliders);
        }
    }

    /// The object a collider belongs to (body collider or trigger sensor).
    pub fn object_of_collider(&self, collider: ColliderHandle) -> Option<ObjectHandle> {
        let collider = self.colliders.get(collider)?;
        ObjectHandle::from_user_data(collider.user_data)
    }

    pub fn is_pair_dropped(&self, a: ColliderHandle, b: ColliderHandle) -> bool {
        self.dropped_pairs.contains(&ordered_pair(a, b))
    }

    /// Removes a body and every collider attached to it.
    pub fn remove_body(&mut self, body: RigidBodyHandle) -> Option<RigidBody> {
        self.bodies.remove(
            body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        )
    }

    /// Removes a collider that has no parent body.
    pub fn remove_collider(&mut self, collider: ColliderHandle) -> Option<Collider> {
        self.colliders
            .remove(collider, &mut self.islands, &mut self.bodies, false)
    }

    /// Runs one engine step of `self.params.dt` seconds.
    ///
    /// Pairs marked as dropped are discarded during this step only.
    pub fn step(&mut self, filter: Option<&dyn CollisionFilter>, objects: &Arena<PhysicsObject>, events: &EventCollector) {
        let dropped = std::mem::take(&mut self.dropped_pairs);
        let hooks = FilterHooks {
            objects,
            filter,
            dropped: &dropped,
        };

        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            &hooks,
            events,
        );
    }
}

/// Discards contacts rejected by the collision filter.
struct FilterHooks<'a> {
    objects: &'a Arena<PhysicsObject>,
    filter: Option<&'a dyn CollisionFilter>,
    dropped: &'a HashSet<(ColliderHandle, ColliderHandle)>,
}

impl FilterHooks<'_> {
    fn object(&self, colliders: &ColliderSet, collider: ColliderHandle) -> Option<&PhysicsObject> {
        let handle = ObjectHandle::from_user_data(colliders.get(collider)?.user_data)?;
        self.objects.get(handle.0)
    }
}

impl PhysicsHooks for FilterHooks<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        if self
            .dropped
            .contains(&ordered_pair(context.collider1, context.collider2))
        {
            return None;
        }

        if let Some(filter) = self.filter {
            let a = self.object(context.colliders, context.collider1);
            let b = self.object(context.colliders, context.collider2);
            if let (Some(a), Some(b)) = (a, b) {
                if !filter.needs_collision(a, b) {
                    return None;
                }
            }
        }

        Some(SolverFlags::COMPUTE_IMPULSES)
    }
}

/// Collects the sensor events raised during a step.
#[derive(Default)]
pub(crate) struct EventCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl EventCollector {
    /// Takes every event collected so far.
    pub fn drain(&mut self) -> Vec<CollisionEvent> {
        let events = self
            .events
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(events)
    }
}

impl EventHandler for EventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if !event.sensor() {
            return;
        }
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_order_does_not_matter() {
        let a = ColliderHandle::from_raw_parts(3, 0);
        let b = ColliderHandle::from_raw_parts(1, 2);
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }

    #[test]
    fn world_group_excludes_itself() {
        let group = world_group();
        assert!(!group.test(group));
        assert!(group.test(InteractionGroups::all()));
    }
}
