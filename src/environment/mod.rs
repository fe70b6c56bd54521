//! The environment: one engine world and every object simulated in it.

use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::convert;
use crate::dynamics::{
    CollisionFilter, Constraint, ConstraintHandle, DragController, ObjectHandle, ObjectMut,
    ObjectParams, ObjectRef, PhysicsObject, ShadowController, ShadowHandle, ShadowMut, ShadowState,
};
use crate::errors::{PhysicsError, Result};
use crate::math::{GameVector, Isometry, QAngle, Real};
use crate::shapes::CollisionModel;
use crate::surface::SurfacePropsTable;
use rapier::data::Arena;
use rapier::prelude::{CollisionEvent, FixedJointBuilder, GenericJoint, SphericalJointBuilder};
use world::{EventCollector, World};

pub use fluid::{FluidController, FluidHandle, FluidParams};
pub use snapshot::{FrictionContact, FrictionSnapshot};

/// Fluid controller registrations.
pub mod fluid;
mod snapshot;
pub(crate) mod world;

/// An overlap change reported by a trigger during a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// `object` started overlapping `trigger`.
    Entered {
        /// The trigger object.
        trigger: ObjectHandle,
        /// The object entering it.
        object: ObjectHandle,
    },
    /// `object` stopped overlapping `trigger`.
    Exited {
        /// The trigger object.
        trigger: ObjectHandle,
        /// The object leaving it.
        object: ObjectHandle,
    },
}

/// A simulated world and the objects, controllers and constraints living in it.
///
/// Every quantity crossing this API is in game units (inches, degrees, Z-up).
pub struct Environment {
    config: EnvironmentConfig,
    world: World,
    objects: Arena<PhysicsObject>,
    shadows: Arena<ShadowController>,
    constraints: Arena<Constraint>,
    fluids: Arena<FluidController>,
    drag: DragController,
    surfaces: Arc<SurfacePropsTable>,
    collision_filter: Option<Box<dyn CollisionFilter>>,
    events: EventCollector,
    trigger_events: Vec<TriggerEvent>,
    simulation_time: Real,
    step_count: u64,
}

fn split_object_mut<'a>(
    objects: &'a mut Arena<PhysicsObject>,
    world: &'a mut World,
    drag: &'a mut DragController,
    surfaces: &'a SurfacePropsTable,
    handle: ObjectHandle,
) -> Option<ObjectMut<'a>> {
    let object = objects.get_mut(handle.0)?;
    Some(ObjectMut {
        handle,
        object,
        world,
        drag,
        surfaces,
    })
}

impl Environment {
    /// Creates an environment using the built-in surface table.
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        Self::with_surfaces(config, Arc::new(SurfacePropsTable::new()))
    }

    /// Creates an environment sharing an existing surface table.
    pub fn with_surfaces(config: EnvironmentConfig, surfaces: Arc<SurfacePropsTable>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(?config.gravity, config.timestep, "creating physics environment");

        Ok(Self {
            world: World::new(&config),
            objects: Arena::new(),
            shadows: Arena::new(),
            constraints: Arena::new(),
            fluids: Arena::new(),
            drag: DragController::new(config.air_density),
            surfaces,
            collision_filter: None,
            events: EventCollector::default(),
            trigger_events: Vec::new(),
            simulation_time: 0.0,
            step_count: 0,
            config,
        })
    }

    /// The settings this environment was created with.
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// The surface table materials are looked up in.
    pub fn surfaces(&self) -> &Arc<SurfacePropsTable> {
        &self.surfaces
    }

    /// Installs the filter deciding which object pairs may collide.
    pub fn set_collision_filter(&mut self, filter: impl CollisionFilter + 'static) {
        self.collision_filter = Some(Box::new(filter));
    }

    /// Removes the collision filter: every pair may collide again.
    pub fn clear_collision_filter(&mut self) {
        self.collision_filter = None;
    }

    /// Gravity, in inches/s².
    pub fn gravity(&self) -> GameVector {
        convert::pos_to_game(&self.world.gravity)
    }

    /// Sets gravity, in inches/s².
    pub fn set_gravity(&mut self, gravity: &GameVector) {
        self.world.gravity = convert::pos_to_engine(gravity);
    }

    /// Density of the air simulated by the drag controller.
    pub fn air_density(&self) -> Real {
        self.drag.air_density()
    }

    /// Sets the density of the air simulated by the drag controller.
    pub fn set_air_density(&mut self, density: Real) {
        self.drag.set_air_density(density);
    }

    /// Total simulated time, in seconds.
    pub fn simulation_time(&self) -> Real {
        self.simulation_time
    }

    /// Number of steps simulated so far.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /*
     * Objects.
     */

    /// Creates an object from a collision model.
    ///
    /// Static objects ignore the mass, drag and damping parameters. New
    /// objects start asleep.
    pub fn create_object(
        &mut self,
        model: &CollisionModel,
        material_index: usize,
        position: &GameVector,
        angles: &QAngle,
        params: &ObjectParams,
        is_static: bool,
    ) -> ObjectHandle {
        let object = PhysicsObject::build(
            &mut self.world,
            &self.config,
            model,
            position,
            angles,
            params,
            is_static,
        );
        let handle = ObjectHandle(self.objects.insert(object));

        if let Some(mut body) = self.object_mut(handle) {
            body.finish_init(material_index, params);
        }

        tracing::debug!(?handle, is_static, name = ?params.name, "created object");
        handle
    }

    /// Creates a sphere of the given radius (inches).
    pub fn create_sphere(
        &mut self,
        radius: Real,
        material_index: usize,
        position: &GameVector,
        angles: &QAngle,
        params: &ObjectParams,
        is_static: bool,
    ) -> Result<ObjectHandle> {
        let model = CollisionModel::sphere(radius)?;
        Ok(self.create_object(&model, material_index, position, angles, params, is_static))
    }

    /// Destroys an object.
    ///
    /// Its shadow and fluid controllers are destroyed, attached constraints
    /// lose their joint, and triggers it was overlapping forget it.
    pub fn destroy_object(&mut self, handle: ObjectHandle) -> Result<()> {
        self.release_object(handle)?;
        let object = self
            .objects
            .remove(handle.0)
            .ok_or_else(PhysicsError::invalid_object)?;

        if let Some(ghost) = &object.trigger {
            self.world.remove_collider(ghost.collider);
        }
        self.world.remove_body(object.body);
        tracing::debug!(?handle, "destroyed object");
        Ok(())
    }

    /// Detaches everything the environment attached to an object, before it leaves.
    fn release_object(&mut self, handle: ObjectHandle) -> Result<()> {
        let object = self
            .objects
            .get(handle.0)
            .ok_or_else(PhysicsError::invalid_object)?;
        let fluid = object.fluid;
        let constraints = object.constraints.clone();

        self.remove_shadow_controller(handle)?;
        self.drag.remove(handle);
        if let Some(fluid) = fluid {
            self.destroy_fluid_controller(fluid)?;
        }
        for constraint in constraints {
            if let Some(constraint) = self.constraints.get_mut(constraint.0) {
                constraint.object_destroyed(handle, &mut self.world);
            }
        }
        if let Some(object) = self.objects.get_mut(handle.0) {
            object.constraints.clear();
        }

        for (index, other) in self.objects.iter_mut() {
            if other.triggered_objects().contains(&handle) {
                other.trigger_object_exited(handle);
                self.trigger_events.push(TriggerEvent::Exited {
                    trigger: ObjectHandle(index),
                    object: handle,
                });
            }
        }
        Ok(())
    }

    /// Moves an object to another environment and returns its handle there.
    ///
    /// Velocity, sleep state, drag registration, shadow control and trigger mode
    /// are carried over. Constraints and fluid controllers belong to the source
    /// environment and are dropped.
    pub fn transfer_object(&mut self, handle: ObjectHandle, dest: &mut Environment) -> Result<ObjectHandle> {
        let object = self
            .objects
            .get(handle.0)
            .ok_or_else(PhysicsError::invalid_object)?;
        let was_trigger = object.trigger.is_some();
        let shadow = object
            .shadow
            .and_then(|sh| self.shadows.get(sh.0))
            .cloned();

        if was_trigger {
            if let Some(mut body) = self.object_mut(handle) {
                body.remove_trigger();
            }
        }
        let drag_enabled = self.drag.is_controlling(handle);
        self.release_object(handle)?;

        let mut object = self
            .objects
            .remove(handle.0)
            .ok_or_else(PhysicsError::invalid_object)?;
        let collider = self.world.colliders.get(object.collider).cloned();
        let rb = self.world.remove_body(object.body);
        let (Some(rb), Some(collider)) = (rb, collider) else {
            return Err(PhysicsError::InvalidHandle { kind: "engine body" });
        };

        let body = dest.world.bodies.insert(rb);
        object.collider = dest
            .world
            .colliders
            .insert_with_parent(collider, body, &mut dest.world.bodies);
        object.body = body;
        object.shadow = None;
        object.fluid = None;
        let new_handle = ObjectHandle(dest.objects.insert(object));

        if let Some(mut body) = dest.object_mut(new_handle) {
            let user_data = new_handle.to_user_data();
            body.rb_mut().user_data = user_data;
            let collider = body.object.collider;
            if let Some(collider) = body.world.colliders.get_mut(collider) {
                collider.user_data = user_data;
            }
            body.world.refresh_mass_properties(body.object.body);
            if drag_enabled {
                body.enable_drag(true);
            }
        }

        if let Some(shadow) = shadow {
            let (max_speed, max_angular_speed) = shadow.max_speed();
            let sh = dest.set_shadow(
                new_handle,
                max_speed,
                max_angular_speed,
                shadow.allows_translation(),
                shadow.allows_rotation(),
            )?;
            if let Some(mut controller) = dest.shadow_mut(sh) {
                controller.set_teleport_distance(shadow.teleport_distance());
                controller.set_physically_controlled(shadow.is_physically_controlled());
                controller.use_shadow_material(shadow.is_using_shadow_material());
                if shadow.state() != ShadowState::Detached {
                    let (position, angles) = shadow.target_position();
                    controller.update(&position, &angles, shadow.time_offset());
                }
            }
        }

        if was_trigger {
            if let Some(mut body) = dest.object_mut(new_handle) {
                body.become_trigger();
            }
        }

        tracing::debug!(from = ?handle, to = ?new_handle, "transferred object");
        Ok(new_handle)
    }

    /// Read access to an object.
    pub fn object(&self, handle: ObjectHandle) -> Option<ObjectRef<'_>> {
        let object = self.objects.get(handle.0)?;
        Some(ObjectRef {
            handle,
            object,
            world: &self.world,
            drag: &self.drag,
            surfaces: &self.surfaces,
        })
    }

    /// Write access to an object.
    pub fn object_mut(&mut self, handle: ObjectHandle) -> Option<ObjectMut<'_>> {
        split_object_mut(
            &mut self.objects,
            &mut self.world,
            &mut self.drag,
            &self.surfaces,
            handle,
        )
    }

    /// Does `handle` refer to a live object of this environment?
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains(handle.0)
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Handles of every live object.
    pub fn objects(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects.iter().map(|(index, _)| ObjectHandle(index))
    }

    /// The object owning an engine body.
    pub fn object_from_body(&self, body: rapier::prelude::RigidBodyHandle) -> Option<ObjectHandle> {
        let rb = self.world.bodies.get(body)?;
        ObjectHandle::from_user_data(rb.user_data)
    }

    /*
     * Shadow controllers.
     */

    /// Puts an object under shadow control, or reconfigures its existing controller.
    ///
    /// `max_speed` is in inches/s, `max_angular_speed` in degrees/s.
    pub fn set_shadow(
        &mut self,
        handle: ObjectHandle,
        max_speed: Real,
        max_angular_speed: Real,
        allow_translation: bool,
        allow_rotation: bool,
    ) -> Result<ShadowHandle> {
        let horizon = self.config.shadow_arrival_horizon;
        let mut body = split_object_mut(
            &mut self.objects,
            &mut self.world,
            &mut self.drag,
            &self.surfaces,
            handle,
        )
        .ok_or_else(PhysicsError::invalid_object)?;

        if let Some(sh) = body.shadow_controller() {
            if let Some(shadow) = self.shadows.get_mut(sh.0) {
                shadow.set_max_speed(max_speed, max_angular_speed);
                shadow.set_allows_translation(allow_translation);
                shadow.set_allows_rotation(allow_rotation);
                return Ok(sh);
            }
        }

        let shadow = ShadowController::attach(
            &mut body,
            horizon,
            max_speed,
            max_angular_speed,
            allow_translation,
            allow_rotation,
        );
        let sh = ShadowHandle(self.shadows.insert(shadow));
        body.object.shadow = Some(sh);
        tracing::debug!(?handle, shadow = ?sh, "attached shadow controller");
        Ok(sh)
    }

    /// Gives an object's shadow controller a new target. No-op without a controller.
    pub fn update_shadow(
        &mut self,
        handle: ObjectHandle,
        position: &GameVector,
        angles: &QAngle,
        time_offset: Real,
    ) -> Result<()> {
        let object = self
            .objects
            .get(handle.0)
            .ok_or_else(PhysicsError::invalid_object)?;
        if let Some(mut shadow) = object.shadow.and_then(|sh| self.shadow_mut(sh)) {
            shadow.update(position, angles, time_offset);
        }
        Ok(())
    }

    /// Current position of a shadow-controlled object, and the number of ticks
    /// since its controller was last updated.
    pub fn shadow_position(&self, handle: ObjectHandle) -> Option<(GameVector, QAngle, u32)> {
        let object = self.object(handle)?;
        let shadow = self.shadows.get(object.shadow_controller()?.0)?;
        let (position, angles) = object.position();
        Some((position, angles, shadow.ticks_since_update()))
    }

    /// Detaches and destroys an object's shadow controller. No-op without a controller.
    pub fn remove_shadow_controller(&mut self, handle: ObjectHandle) -> Result<()> {
        let mut body = split_object_mut(
            &mut self.objects,
            &mut self.world,
            &mut self.drag,
            &self.surfaces,
            handle,
        )
        .ok_or_else(PhysicsError::invalid_object)?;

        let Some(sh) = body.object.shadow.take() else {
            return Ok(());
        };
        if let Some(mut shadow) = self.shadows.remove(sh.0) {
            shadow.detach(&mut body);
        }
        tracing::debug!(?handle, shadow = ?sh, "removed shadow controller");
        Ok(())
    }

    /// Read access to a shadow controller.
    pub fn shadow(&self, handle: ShadowHandle) -> Option<&ShadowController> {
        self.shadows.get(handle.0)
    }

    /// Write access to a shadow controller and its object.
    pub fn shadow_mut(&mut self, handle: ShadowHandle) -> Option<ShadowMut<'_>> {
        let shadow = self.shadows.get_mut(handle.0)?;
        let body = split_object_mut(
            &mut self.objects,
            &mut self.world,
            &mut self.drag,
            &self.surfaces,
            shadow.object(),
        )?;
        Some(ShadowMut { handle, shadow, body })
    }

    /*
     * Constraints.
     */

    /// Links two objects with an engine joint.
    ///
    /// Joint frames are given relative to each object's mass center, in
    /// engine units. Prefer the game-unit builders below when they fit.
    pub fn create_constraint(
        &mut self,
        object0: ObjectHandle,
        object1: ObjectHandle,
        joint: impl Into<GenericJoint>,
    ) -> Result<ConstraintHandle> {
        let body0 = self.objects.get(object0.0).ok_or_else(PhysicsError::invalid_object)?.body;
        let body1 = self.objects.get(object1.0).ok_or_else(PhysicsError::invalid_object)?.body;

        let joint = self.world.impulse_joints.insert(body0, body1, joint, true);
        let handle = ConstraintHandle(self.constraints.insert(Constraint::new(joint, object0, object1)));

        for object in [object0, object1] {
            if let Some(object) = self.objects.get_mut(object.0) {
                if !object.constraints().contains(&handle) {
                    object.attached_to_constraint(handle);
                }
            }
        }
        Ok(handle)
    }

    fn body_pose(&self, handle: ObjectHandle) -> Result<Isometry<Real>> {
        let object = self.objects.get(handle.0).ok_or_else(PhysicsError::invalid_object)?;
        Ok(*self.world.bodies[object.body].position())
    }

    /// Links two objects by a ball-and-socket joint at a world position (inches).
    pub fn create_ballsocket_constraint(
        &mut self,
        object0: ObjectHandle,
        object1: ObjectHandle,
        world_anchor: &GameVector,
    ) -> Result<ConstraintHandle> {
        let anchor = convert::point_to_engine(world_anchor);
        let local0 = self.body_pose(object0)?.inverse_transform_point(&anchor);
        let local1 = self.body_pose(object1)?.inverse_transform_point(&anchor);
        let joint = SphericalJointBuilder::new()
            .local_anchor1(local0)
            .local_anchor2(local1);
        self.create_constraint(object0, object1, joint)
    }

    /// Welds two objects together in their current relative placement.
    pub fn create_fixed_constraint(
        &mut self,
        object0: ObjectHandle,
        object1: ObjectHandle,
    ) -> Result<ConstraintHandle> {
        let pose0 = self.body_pose(object0)?;
        let pose1 = self.body_pose(object1)?;
        let joint = FixedJointBuilder::new()
            .local_frame1(Isometry::identity())
            .local_frame2(pose1.inverse() * pose0);
        self.create_constraint(object0, object1, joint)
    }

    /// Destroys a constraint and detaches it from its objects.
    pub fn destroy_constraint(&mut self, handle: ConstraintHandle) -> Result<()> {
        let mut constraint = self
            .constraints
            .remove(handle.0)
            .ok_or(PhysicsError::InvalidHandle { kind: "constraint" })?;
        constraint.release(&mut self.world);

        let (object0, object1) = constraint.objects();
        for object in [object0, object1].into_iter().flatten() {
            if let Some(object) = self.objects.get_mut(object.0) {
                object.detached_from_constraint(handle);
            }
        }
        Ok(())
    }

    /// Read access to a constraint.
    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle.0)
    }

    /*
     * Fluids.
     */

    /// Registers an object as a fluid volume. An existing registration gets the new parameters.
    pub fn create_fluid_controller(&mut self, handle: ObjectHandle, params: FluidParams) -> Result<FluidHandle> {
        let object = self
            .objects
            .get_mut(handle.0)
            .ok_or_else(PhysicsError::invalid_object)?;

        if let Some(existing) = object.fluid {
            if let Some(fluid) = self.fluids.get_mut(existing.0) {
                fluid.set_params(params);
                return Ok(existing);
            }
        }

        let fluid = FluidHandle(self.fluids.insert(FluidController::new(handle, params)));
        object.fluid = Some(fluid);
        Ok(fluid)
    }

    /// Unregisters a fluid volume.
    pub fn destroy_fluid_controller(&mut self, handle: FluidHandle) -> Result<()> {
        let fluid = self
            .fluids
            .remove(handle.0)
            .ok_or(PhysicsError::InvalidHandle { kind: "fluid controller" })?;
        if let Some(object) = self.objects.get_mut(fluid.object().0) {
            object.fluid = None;
        }
        Ok(())
    }

    /// Read access to a fluid controller.
    pub fn fluid_controller(&self, handle: FluidHandle) -> Option<&FluidController> {
        self.fluids.get(handle.0)
    }

    /*
     * Simulation.
     */

    /// Advances the simulation by `dt` seconds.
    ///
    /// Local gravity, drag and shadow controllers act first, then the engine
    /// integrates, then trigger overlaps are dispatched.
    pub fn simulate(&mut self, dt: Real) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        self.world.params.dt = dt;

        for (_, object) in self.objects.iter() {
            object.apply_local_gravity(&mut self.world, dt);
        }
        self.drag.tick(&self.objects, &mut self.world, dt);
        for (index, shadow) in self.shadows.iter_mut() {
            let handle = shadow.object();
            let Some(object) = self.objects.get_mut(handle.0) else {
                continue;
            };
            if object.skip_controllers {
                continue;
            }
            let body = ObjectMut {
                handle,
                object,
                world: &mut self.world,
                drag: &mut self.drag,
                surfaces: &self.surfaces,
            };
            ShadowMut {
                handle: ShadowHandle(index),
                shadow,
                body,
            }
            .tick(dt);
        }
        for (_, object) in self.objects.iter_mut() {
            object.skip_controllers = false;
        }

        self.world
            .step(self.collision_filter.as_deref(), &self.objects, &self.events);

        for event in self.events.drain() {
            self.dispatch_trigger_event(event);
        }

        self.simulation_time += dt;
        self.step_count += 1;
    }

    /// Advances the simulation by the configured time step.
    pub fn step(&mut self) {
        self.simulate(self.config.timestep);
    }

    fn trigger_owner(&self, collider: rapier::prelude::ColliderHandle) -> Option<ObjectHandle> {
        let handle = self.world.object_of_collider(collider)?;
        let ghost = self.objects.get(handle.0)?.trigger.as_ref()?;
        (ghost.collider == collider).then_some(handle)
    }

    fn dispatch_trigger_event(&mut self, event: CollisionEvent) {
        let (collider1, collider2) = (event.collider1(), event.collider2());

        for (sensor, other) in [(collider1, collider2), (collider2, collider1)] {
            let Some(trigger) = self.trigger_owner(sensor) else {
                continue;
            };
            let Some(object) = self.world.object_of_collider(other) else {
                continue;
            };
            if trigger == object {
                continue;
            }
            let Some(owner) = self.objects.get_mut(trigger.0) else {
                continue;
            };

            if event.started() {
                owner.trigger_object_entered(object);
                self.trigger_events.push(TriggerEvent::Entered { trigger, object });
            } else {
                owner.trigger_object_exited(object);
                self.trigger_events.push(TriggerEvent::Exited { trigger, object });
            }
        }
    }

    /// Takes the trigger overlap changes recorded since the last call.
    pub fn drain_trigger_events(&mut self) -> Vec<TriggerEvent> {
        std::mem::take(&mut self.trigger_events)
    }

    /// Re-evaluates the collision filter on every existing contact pair.
    ///
    /// Call this after changing state the filter depends on. Pairs the filter
    /// now rejects stop generating contacts from the next step on, and both
    /// of their objects are woken up. Returns the number of rejected pairs.
    pub fn recheck_collision_filter(&mut self) -> usize {
        let Some(filter) = self.collision_filter.as_deref() else {
            return 0;
        };

        let mut rejected = Vec::new();
        for pair in self.world.narrow_phase.contact_pairs() {
            let a = self
                .world
                .object_of_collider(pair.collider1)
                .and_then(|h| self.objects.get(h.0));
            let b = self
                .world
                .object_of_collider(pair.collider2)
                .and_then(|h| self.objects.get(h.0));
            if let (Some(a), Some(b)) = (a, b) {
                if !filter.needs_collision(a, b) {
                    rejected.push((pair.collider1, pair.collider2));
                }
            }
        }

        for (collider1, collider2) in &rejected {
            self.world
                .dropped_pairs
                .insert(world::ordered_pair(*collider1, *collider2));
            for collider in [collider1, collider2] {
                let parent = self.world.colliders.get(*collider).and_then(|c| c.parent());
                if let Some(rb) = parent.and_then(|p| self.world.bodies.get_mut(p)) {
                    rb.wake_up(true);
                }
            }
        }

        tracing::debug!(rejected = rejected.len(), "collision filter rechecked");
        rejected.len()
    }

    /// Reports every contact an object currently has.
    pub fn create_friction_snapshot(&self, handle: ObjectHandle) -> Option<FrictionSnapshot> {
        let object = self.objects.get(handle.0)?;
        Some(FrictionSnapshot::capture(handle, object, &self.world))
    }
}
