//! Trigger mode: an object replaced by a same-shape overlap sensor.

use crate::dynamics::object::{ObjectHandle, ObjectMut};
use crate::environment::world::{self, World};
use na::Translation3;
use rapier::prelude::{ActiveCollisionTypes, ActiveEvents, ColliderBuilder, ColliderHandle};

/// The sensor standing in for an object while it is a trigger.
#[derive(Clone, Debug)]
pub(crate) struct TriggerGhost {
    pub(crate) collider: ColliderHandle,
    pub(crate) touching: Vec<ObjectHandle>,
    saved_gravity: bool,
    saved_drag: bool,
}

impl ObjectMut<'_> {
    /// Turns the object into an overlap sensor. No-op if it already is one.
    ///
    /// The body leaves the simulation and a sensor with the same shape takes
    /// its place. Gravity and drag are switched off until [`Self::remove_trigger`].
    pub fn become_trigger(&mut self) {
        if self.object.trigger.is_some() {
            return;
        }

        let saved_gravity = self.view().is_gravity_enabled();
        let saved_drag = self.view().is_drag_enabled();
        self.enable_drag(false);
        self.enable_gravity(false);

        let origin = self.view().engine_origin_pose();
        let shape = self.view().collider().shared_shape().clone();
        let sensor = ColliderBuilder::new(shape)
            .sensor(true)
            .position(origin)
            .collision_groups(world::world_group())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_collision_types(ActiveCollisionTypes::all())
            .user_data(self.handle.to_user_data())
            .build();
        let collider = self.world.colliders.insert(sensor);
        self.rb_mut().set_enabled(false);

        tracing::debug!(object = ?self.handle, ?collider, "object became a trigger");
        self.object.trigger = Some(TriggerGhost {
            collider,
            touching: Vec::new(),
            saved_gravity,
            saved_drag,
        });
    }

    /// Puts a trigger back into the simulation. No-op if it is not a trigger.
    ///
    /// The body takes the sensor's last transform, and gravity and drag go back
    /// to the state they were in before [`Self::become_trigger`].
    pub fn remove_trigger(&mut self) {
        let Some(ghost) = self.object.trigger.take() else {
            return;
        };

        let mass_center = Translation3::from(self.object.mass_center);
        let World {
            bodies,
            colliders,
            islands,
            ..
        } = &mut *self.world;

        let rb = &mut bodies[self.object.body];
        if let Some(sensor) = colliders.get(ghost.collider) {
            rb.set_position(sensor.position() * mass_center, false);
        }
        rb.set_enabled(true);
        colliders.remove(ghost.collider, islands, bodies, false);

        self.enable_gravity(ghost.saved_gravity);
        self.enable_drag(ghost.saved_drag);
        tracing::debug!(object = ?self.handle, "object left trigger mode");
    }
}
