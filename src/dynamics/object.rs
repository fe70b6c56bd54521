//! Rigid-body object definition and its game-facing views.
//!
//! A [`PhysicsObject`] owns exactly one engine body (and the collider carrying
//! its shape). The engine body frame sits on the mass center; the game only
//! ever sees the body origin, obtained by removing the mass-center offset on
//! every read and re-applying it on every write.
//!
//! Objects live in an arena owned by the [`Environment`](crate::Environment).
//! Queries go through an [`ObjectRef`], mutations through an [`ObjectMut`]; both
//! borrow the object together with the engine world it lives in.

use std::ops::Deref;

use crate::config::EnvironmentConfig;
use crate::convert::{self, safe_div};
use crate::dynamics::constraint::ConstraintHandle;
use crate::dynamics::drag::{self, DragController};
use crate::dynamics::shadow::ShadowHandle;
use crate::dynamics::trigger::TriggerGhost;
use crate::environment::fluid::FluidHandle;
use crate::environment::world::{self, World};
use crate::errors::{PhysicsError, Result};
use crate::math::{AngularImpulse, GameTransform, GameVector, Isometry, Point, QAngle, Real, Vector};
use crate::shapes::CollisionModel;
use crate::surface::SurfacePropsTable;
use na::Translation3;
use rapier::data::Index;
use rapier::prelude::{
    ActiveHooks, Collider, ColliderBuilder, ColliderHandle, InteractionGroups, MassProperties,
    RigidBody, RigidBodyBuilder, RigidBodyHandle,
};

/// Contents mask given to every new object (solid, moveable, window, monster, grate).
pub const MASK_SOLID: u32 = 0x0200_400B;

bitflags::bitflags! {
    /// Which collision callbacks the game wants for an object.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct CallbackFlags: u16 {
        /// Report every collision.
        const GLOBAL_COLLISION = 0x0001;
        /// Report friction events.
        const GLOBAL_FRICTION = 0x0002;
        /// Report touches.
        const GLOBAL_TOUCH = 0x0004;
        /// Report touches with static objects.
        const GLOBAL_TOUCH_STATIC = 0x0008;
        /// Collisions are handled by the shadow-collision path.
        const SHADOW_COLLISION = 0x0010;
        /// Report collisions with static objects.
        const GLOBAL_COLLIDE_STATIC = 0x0020;
        /// The object is a vehicle wheel.
        const IS_VEHICLE_WHEEL = 0x0040;
        /// Report touches with fluids.
        const FLUID_TOUCH = 0x0100;
        /// The object never goes to sleep.
        const NEVER_DEACTIVATE = 0x0200;
        /// The object is about to be deleted.
        const MARKED_FOR_DELETE = 0x0400;
        /// Collisions are being re-enabled for this object.
        const ENABLING_COLLISION = 0x0800;
        /// Fluid controllers act on this object.
        const DO_FLUID_SIMULATION = 0x1000;
        /// The object is driven by a player controller.
        const IS_PLAYER_CONTROLLER = 0x2000;
        /// Ask the game before disabling collisions.
        const CHECK_COLLISION_DISABLE = 0x4000;
        /// Scratch flag for game-side tests.
        const MARKED_FOR_TEST = 0x8000;
    }
}

impl Default for CallbackFlags {
    fn default() -> Self {
        Self::GLOBAL_COLLISION
            | Self::GLOBAL_FRICTION
            | Self::FLUID_TOUCH
            | Self::GLOBAL_TOUCH
            | Self::GLOBAL_COLLIDE_STATIC
            | Self::DO_FLUID_SIMULATION
    }
}

/// Identifier of an object inside its environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub(crate) Index);

// Marks engine user-data that holds an object handle (as opposed to zero).
const USER_DATA_TAG: u128 = 1 << 64;

impl ObjectHandle {
    pub(crate) fn to_user_data(self) -> u128 {
        let (index, generation) = self.0.into_raw_parts();
        USER_DATA_TAG | ((generation as u128) << 32) | index as u128
    }

    pub(crate) fn from_user_data(data: u128) -> Option<Self> {
        if data & USER_DATA_TAG == 0 {
            return None;
        }
        let index = data as u32;
        let generation = (data >> 32) as u32;
        Some(Self(Index::from_raw_parts(index, generation)))
    }
}

/// Creation parameters of an object, in game units.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectParams {
    /// Mass, in kilograms. Ignored for static objects.
    pub mass: Real,
    /// Multiplier applied to the inertia computed from the shape. Ignored unless positive.
    pub inertia_factor: Real,
    /// Linear damping.
    pub damping: Real,
    /// Angular damping.
    pub rot_damping: Real,
    /// Air drag coefficient. Zero disables drag.
    pub drag_coefficient: Real,
    /// Volume in cubic inches. Zero means "use the shape volume".
    pub volume: Real,
    /// Whether contacts are resolved for this object.
    pub enable_collisions: bool,
    /// Debug name.
    pub name: Option<String>,
    /// Opaque game token.
    pub game_data: u64,
}

impl Default for ObjectParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia_factor: 1.0,
            damping: 0.1,
            rot_damping: 0.1,
            drag_coefficient: 1.0,
            volume: 0.0,
            enable_collisions: true,
            name: None,
            game_data: 0,
        }
    }
}

/// State owned by one simulated object.
#[derive(Clone, Debug)]
pub struct PhysicsObject {
    pub(crate) body: RigidBodyHandle,
    pub(crate) collider: ColliderHandle,
    is_static: bool,
    pub(crate) motion_enabled: bool,
    pub(crate) collision_enabled: bool,
    pub(crate) mass: Real,
    // Cubic meters.
    pub(crate) volume: Real,
    pub(crate) buoyancy_ratio: Real,
    pub(crate) material_index: usize,
    pub(crate) contents: u32,
    // Engine space, body-local.
    pub(crate) mass_center: Vector<Real>,
    pub(crate) drag_coefficient: Real,
    pub(crate) angular_drag_coefficient: Real,
    pub(crate) drag_basis: Vector<Real>,
    pub(crate) angular_drag_basis: Vector<Real>,
    pub(crate) game_data: u64,
    pub(crate) game_index: u16,
    pub(crate) game_flags: u16,
    pub(crate) callback_flags: CallbackFlags,
    pub(crate) name: Option<String>,
    pub(crate) constraints: Vec<ConstraintHandle>,
    pub(crate) shadow: Option<ShadowHandle>,
    pub(crate) fluid: Option<FluidHandle>,
    pub(crate) trigger: Option<TriggerGhost>,
    // Engine units. Replaces world gravity while gravity is enabled.
    pub(crate) local_gravity: Option<Vector<Real>>,
    // Set by `set_velocity_instantaneous`, cleared after the next controller pass.
    pub(crate) skip_controllers: bool,
}

impl PhysicsObject {
    /// Builds the engine body and collider for a new object and inserts them in `world`.
    ///
    /// The returned object is not registered anywhere yet: the environment still
    /// has to insert it in its arena, tag the engine body with the resulting
    /// handle and run [`ObjectMut::finish_init`].
    pub(crate) fn build(
        world: &mut World,
        config: &EnvironmentConfig,
        model: &CollisionModel,
        position: &GameVector,
        angles: &QAngle,
        params: &ObjectParams,
        is_static: bool,
    ) -> Self {
        let mass = if is_static { 0.0 } else { params.mass };
        let mass_center = model.mass_center();

        let mut inertia = Vector::zeros();
        if !is_static {
            inertia = model.mass_properties(mass).principal_inertia();
            if params.inertia_factor > 0.0 {
                inertia *= params.inertia_factor;
            }
        }

        let origin = convert::transform_to_engine(position, angles);
        let builder = if is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
                .additional_mass_properties(MassProperties::new(Point::origin(), mass, inertia))
                .linear_damping(params.damping)
                .angular_damping(params.rot_damping)
                .ccd_enabled(true)
        };
        let mut rb = builder
            .position(origin * Translation3::from(mass_center))
            .sleeping(true)
            .build();
        rb.activation_mut().normalized_linear_threshold =
            convert::distance_to_engine(config.sleep_linear_threshold);
        rb.activation_mut().angular_threshold = config.sleep_angular_threshold.to_radians();

        let mut collider = ColliderBuilder::new(model.shape().clone())
            .position(Isometry::from(Translation3::from(-mass_center)))
            .density(0.0)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS);
        if is_static {
            collider = collider.collision_groups(world::world_group());
        }

        let body = world.bodies.insert(rb);
        let collider = world
            .colliders
            .insert_with_parent(collider.build(), body, &mut world.bodies);
        world.refresh_mass_properties(body);

        let volume = if params.volume > 0.0 {
            convert::volume_to_engine(params.volume)
        } else {
            model.volume()
        };

        Self {
            body,
            collider,
            is_static,
            motion_enabled: !is_static,
            collision_enabled: true,
            mass,
            volume,
            buoyancy_ratio: 0.0,
            material_index: 0,
            contents: 0,
            mass_center,
            drag_coefficient: 0.0,
            angular_drag_coefficient: 0.0,
            drag_basis: Vector::zeros(),
            angular_drag_basis: Vector::zeros(),
            game_data: params.game_data,
            game_index: 0,
            game_flags: 0,
            callback_flags: CallbackFlags::default(),
            name: params.name.clone(),
            constraints: Vec::new(),
            shadow: None,
            fluid: None,
            trigger: None,
            local_gravity: None,
            skip_controllers: false,
        }
    }

    /// Engine handle of the simulated body.
    pub fn body_handle(&self) -> RigidBodyHandle {
        self.body
    }

    /// Engine handle of the collider carrying the object's shape.
    pub fn collider_handle(&self) -> ColliderHandle {
        self.collider
    }

    /// Is this object static (immovable, fixed at creation)?
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Is this object allowed to move?
    pub fn is_motion_enabled(&self) -> bool {
        self.motion_enabled
    }

    /// Can this object be moved by velocities and forces?
    pub fn is_moveable(&self) -> bool {
        !self.is_static && self.motion_enabled
    }

    /// Are contacts involving this object resolved?
    pub fn is_collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    /// Is this object an overlap sensor (trigger or fluid volume)?
    pub fn is_trigger(&self) -> bool {
        self.trigger.is_some() || self.fluid.is_some()
    }

    /// Is this object driven by a fluid controller?
    pub fn is_fluid(&self) -> bool {
        self.fluid.is_some()
    }

    /// Is any constraint attached to this object?
    pub fn is_attached_to_constraint(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Constraints attached to this object.
    pub fn constraints(&self) -> &[ConstraintHandle] {
        &self.constraints
    }

    /// Mass, in kilograms.
    pub fn mass(&self) -> Real {
        self.mass
    }

    /// Inverse mass, zero for massless objects.
    pub fn inv_mass(&self) -> Real {
        safe_div(1.0, self.mass)
    }

    /// Index of the object's material in the surface table.
    pub fn material_index(&self) -> usize {
        self.material_index
    }

    /// Game-defined contents mask.
    pub fn contents(&self) -> u32 {
        self.contents
    }

    /// `(object density) / (material density)`.
    pub fn buoyancy_ratio(&self) -> Real {
        self.buoyancy_ratio
    }

    /// Linear and angular drag coefficients.
    pub fn drag_coefficients(&self) -> (Real, Real) {
        (self.drag_coefficient, self.angular_drag_coefficient)
    }

    /// Per-axis linear drag basis, along the game axes.
    pub fn drag_basis(&self) -> GameVector {
        convert::direction_to_game(&self.drag_basis).abs()
    }

    /// Per-axis angular drag basis, along the game axes.
    pub fn angular_drag_basis(&self) -> GameVector {
        convert::direction_to_game(&self.angular_drag_basis).abs()
    }

    /// Mass center relative to the object origin, in game units.
    pub fn mass_center_local_space(&self) -> GameVector {
        convert::pos_to_game(&self.mass_center)
    }

    /// Opaque game token.
    pub fn game_data(&self) -> u64 {
        self.game_data
    }

    /// Game-defined index.
    pub fn game_index(&self) -> u16 {
        self.game_index
    }

    /// Game-defined flags.
    pub fn game_flags(&self) -> u16 {
        self.game_flags
    }

    /// Requested collision callbacks.
    pub fn callback_flags(&self) -> CallbackFlags {
        self.callback_flags
    }

    /// Debug name given at creation.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The shadow controller attached to this object, if any.
    pub fn shadow_controller(&self) -> Option<ShadowHandle> {
        self.shadow
    }

    /// The fluid controller attached to this object, if any.
    pub fn fluid_controller(&self) -> Option<FluidHandle> {
        self.fluid
    }

    /// Objects currently overlapping this trigger.
    pub fn triggered_objects(&self) -> &[ObjectHandle] {
        self.trigger
            .as_ref()
            .map(|ghost| ghost.touching.as_slice())
            .unwrap_or(&[])
    }

    /// Transform from the engine body frame (mass center) to the object origin.
    pub(crate) fn mass_center_inverse(&self) -> Translation3<Real> {
        Translation3::from(-self.mass_center)
    }

    /// Linear drag for a body-local engine direction (or velocity).
    pub(crate) fn drag_in_direction(&self, local_dir: &Vector<Real>) -> Real {
        self.drag_coefficient * drag::weighted_sum(&self.drag_basis, local_dir)
    }

    /// Angular drag for a body-local engine rotation axis (or angular velocity).
    pub(crate) fn angular_drag_in_direction(&self, local_axis: &Vector<Real>) -> Real {
        self.angular_drag_coefficient * drag::weighted_sum(&self.angular_drag_basis, local_axis)
    }

    /// Swaps world gravity for the local one over the next `dt`.
    ///
    /// The engine keeps integrating world gravity, so only the difference is added.
    pub(crate) fn apply_local_gravity(&self, world: &mut World, dt: Real) {
        let Some(local) = self.local_gravity else {
            return;
        };
        if self.trigger.is_some() || !self.is_moveable() {
            return;
        }
        let world_gravity = world.gravity;
        let Some(rb) = world.bodies.get_mut(self.body) else {
            return;
        };
        if rb.is_sleeping() || rb.gravity_scale() == 0.0 {
            return;
        }

        let linvel = *rb.linvel() + (local - world_gravity) * dt;
        rb.set_linvel(linvel, false);
    }

    pub(crate) fn attached_to_constraint(&mut self, constraint: ConstraintHandle) {
        self.constraints.push(constraint);
    }

    pub(crate) fn detached_from_constraint(&mut self, constraint: ConstraintHandle) {
        self.constraints.retain(|c| *c != constraint);
    }

    pub(crate) fn trigger_object_entered(&mut self, other: ObjectHandle) {
        if let Some(ghost) = &mut self.trigger {
            if !ghost.touching.contains(&other) {
                ghost.touching.push(other);
            }
        }
    }

    pub(crate) fn trigger_object_exited(&mut self, other: ObjectHandle) {
        if let Some(ghost) = &mut self.trigger {
            ghost.touching.retain(|h| *h != other);
        }
    }
}

/// Read access to an object and the engine world it lives in.
#[derive(Copy, Clone)]
pub struct ObjectRef<'a> {
    pub(crate) handle: ObjectHandle,
    pub(crate) object: &'a PhysicsObject,
    pub(crate) world: &'a World,
    pub(crate) drag: &'a DragController,
    pub(crate) surfaces: &'a SurfacePropsTable,
}

impl Deref for ObjectRef<'_> {
    type Target = PhysicsObject;

    fn deref(&self) -> &PhysicsObject {
        self.object
    }
}

impl<'a> ObjectRef<'a> {
    /// The handle of this object.
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub(crate) fn rb(&self) -> &'a RigidBody {
        &self.world.bodies[self.object.body]
    }

    pub(crate) fn collider(&self) -> &'a Collider {
        &self.world.colliders[self.object.collider]
    }

    /// Engine transform of the object origin.
    ///
    /// While the object is a trigger, its sensor is authoritative.
    pub(crate) fn engine_origin_pose(&self) -> Isometry<Real> {
        if let Some(ghost) = &self.object.trigger {
            if let Some(sensor) = self.world.colliders.get(ghost.collider) {
                return *sensor.position();
            }
        }
        self.rb().position() * self.object.mass_center_inverse()
    }

    /// Is the object asleep (or taken out of the simulation)?
    pub fn is_asleep(&self) -> bool {
        let rb = self.rb();
        rb.is_sleeping() || !rb.is_enabled()
    }

    /// Is world gravity applied to this object?
    pub fn is_gravity_enabled(&self) -> bool {
        !self.object.is_static() && self.rb().gravity_scale() != 0.0
    }

    /// Gravity acting on this object, in inches/s².
    ///
    /// This is the local gravity if one was set, world gravity otherwise, and
    /// zero while gravity is disabled.
    pub fn local_gravity(&self) -> GameVector {
        if !self.is_gravity_enabled() {
            return GameVector::zeros();
        }
        convert::pos_to_game(&self.object.local_gravity.unwrap_or(self.world.gravity))
    }

    /// Does the drag controller act on this object?
    pub fn is_drag_enabled(&self) -> bool {
        !self.object.is_static() && self.drag.is_controlling(self.handle)
    }

    /// Hinged objects are not supported.
    pub fn is_hinged(&self) -> Result<bool> {
        Err(PhysicsError::Unimplemented("hinged objects"))
    }

    /// Principal inertia along the game axes.
    pub fn inertia(&self) -> GameVector {
        let inertia = convert::invert_diagonal(&self.engine_inv_inertia());
        convert::direction_to_game(&inertia).abs()
    }

    /// Inverse principal inertia along the game axes.
    pub fn inv_inertia(&self) -> GameVector {
        convert::direction_to_game(&self.engine_inv_inertia()).abs()
    }

    pub(crate) fn engine_inv_inertia(&self) -> Vector<Real> {
        let inertia = self.rb().mass_properties().local_mprops.principal_inertia();
        convert::invert_diagonal(&inertia)
    }

    /// Linear and angular damping.
    pub fn damping(&self) -> (Real, Real) {
        let rb = self.rb();
        (rb.linear_damping(), rb.angular_damping())
    }

    /// Linear (inches/s) and angular (degrees/s) sleep thresholds.
    pub fn sleep_thresholds(&self) -> (Real, Real) {
        let activation = self.rb().activation();
        (
            convert::distance_to_game(activation.normalized_linear_threshold),
            activation.angular_threshold.to_degrees(),
        )
    }

    /// Radius of the object if its shape is a sphere.
    pub fn sphere_radius(&self) -> Option<Real> {
        self.collider()
            .shape()
            .as_ball()
            .map(|ball| convert::distance_to_game(ball.radius))
    }

    /// Kinetic energy (linear and rotational), in game units.
    pub fn energy(&self) -> Real {
        let rb = self.rb();
        let linvel = rb.linvel();
        let local_angvel = rb.position().rotation.inverse_transform_vector(rb.angvel());
        let inertia = convert::invert_diagonal(&self.engine_inv_inertia());

        let linear = 0.5 * self.object.mass * linvel.norm_squared();
        let angular = 0.5 * local_angvel.dot(&inertia.component_mul(&local_angvel));
        convert::energy_to_game(linear + angular)
    }

    /// Position and orientation of the object origin.
    pub fn position(&self) -> (GameVector, QAngle) {
        convert::transform_to_game(&self.engine_origin_pose())
    }

    /// Transform of the object origin as a game-space matrix.
    pub fn position_matrix(&self) -> GameTransform {
        convert::matrix_to_game(&self.engine_origin_pose())
    }

    /// Linear velocity (world) and angular velocity (object-local, degrees/s).
    pub fn velocity(&self) -> (GameVector, AngularImpulse) {
        let rb = self.rb();
        let linear = convert::pos_to_game(rb.linvel());
        let local = rb.position().rotation.inverse_transform_vector(rb.angvel());
        (linear, convert::angular_to_game(&local))
    }

    /// Velocity of the material point currently at `world_position`.
    pub fn velocity_at_point(&self, world_position: &GameVector) -> GameVector {
        let rb = self.rb();
        let local = self.world_to_local(world_position);
        // Offset from the mass center, rotated back to world axes.
        let r = rb.position().rotation * (convert::pos_to_engine(&local) - self.object.mass_center);
        convert::pos_to_game(&(rb.linvel() + rb.angvel().cross(&r)))
    }

    /// The velocity actually travelled during the last step is not tracked.
    pub fn implicit_velocity(&self) -> Result<(GameVector, AngularImpulse)> {
        Err(PhysicsError::Unimplemented("implicit velocity"))
    }

    /// Transforms an object-local position to world space.
    pub fn local_to_world(&self, local_position: &GameVector) -> GameVector {
        self.position_matrix()
            .transform_point(&Point::from(*local_position))
            .coords
    }

    /// Transforms a world position to object-local space.
    pub fn world_to_local(&self, world_position: &GameVector) -> GameVector {
        self.position_matrix()
            .inverse_transform_point(&Point::from(*world_position))
            .coords
    }

    /// Rotates an object-local direction to world space.
    pub fn local_to_world_vector(&self, local_vector: &GameVector) -> GameVector {
        self.position_matrix().transform_vector(local_vector)
    }

    /// Rotates a world direction to object-local space.
    pub fn world_to_local_vector(&self, world_vector: &GameVector) -> GameVector {
        self.position_matrix().inverse_transform_vector(world_vector)
    }

    /// Splits an impulse applied at `world_position` into the equivalent
    /// impulse at the mass center and an angular impulse (world space), ready
    /// for [`ObjectMut::apply_force_center`] and [`ObjectMut::apply_torque_center`].
    pub fn calculate_force_offset(
        &self,
        force: &GameVector,
        world_position: &GameVector,
    ) -> (GameVector, AngularImpulse) {
        let force = convert::force_to_engine(force);
        let r = convert::pos_to_engine(world_position) - self.rb().position().translation.vector;
        let torque = r.cross(&force);

        (convert::force_to_game(&force), convert::angular_to_game(&torque))
    }

    /// Velocity change an impulse applied at `world_position` would cause:
    /// linear (world) and angular (object-local), ready for
    /// [`ObjectMut::add_velocity`].
    pub fn calculate_velocity_offset(
        &self,
        force: &GameVector,
        world_position: &GameVector,
    ) -> (GameVector, AngularImpulse) {
        let rb = self.rb();
        let force = convert::force_to_engine(force);
        let r = convert::pos_to_engine(world_position) - rb.position().translation.vector;
        let torque = r.cross(&force);

        let linear = force * self.object.inv_mass();
        let local_torque = rb.position().rotation.inverse_transform_vector(&torque);
        let angular = self.engine_inv_inertia().component_mul(&local_torque);

        (convert::pos_to_game(&linear), convert::angular_to_game(&angular))
    }

    /// Linear drag the object opposes to motion along a world direction.
    pub fn calculate_linear_drag(&self, unit_direction: &GameVector) -> Real {
        let dir = convert::direction_to_engine(unit_direction);
        let local = self.rb().position().rotation.inverse_transform_vector(&dir);
        self.object.drag_in_direction(&local)
    }

    /// Angular drag the object opposes to rotation about an object-local axis.
    pub fn calculate_angular_drag(&self, object_space_axis: &GameVector) -> Real {
        let axis = convert::direction_to_engine(object_space_axis);
        self.object.angular_drag_in_direction(&axis).to_radians()
    }

    /// Any point where this object currently touches another one, and the
    /// object it touches.
    ///
    /// This scans the contact manifolds and stops at the first one involving
    /// this object; use a [`FrictionSnapshot`](crate::environment::FrictionSnapshot)
    /// for a complete report.
    pub fn contact_point(&self) -> Option<(GameVector, Option<ObjectHandle>)> {
        let own = self.object.collider;

        for pair in self.world.narrow_phase.contact_pairs() {
            if self.world.is_pair_dropped(pair.collider1, pair.collider2) {
                continue;
            }

            let (other, first) = if pair.collider1 == own {
                (pair.collider2, true)
            } else if pair.collider2 == own {
                (pair.collider1, false)
            } else {
                continue;
            };

            let touching = pair
                .manifolds
                .iter()
                .find_map(|m| m.points.iter().find(|p| p.dist <= 0.0));
            let Some(point) = touching else {
                continue;
            };

            let (collider, local) = if first {
                (pair.collider1, point.local_p1)
            } else {
                (pair.collider2, point.local_p2)
            };
            let world_point = self.world.colliders[collider].position() * local;

            return Some((
                convert::point_to_game(&world_point),
                self.world.object_of_collider(other),
            ));
        }

        None
    }

    /// Human-readable dump of the object state.
    pub fn debug_report(&self) -> String {
        self.to_string()
    }

    /// Emits [`Self::debug_report`] through `tracing` at the info level.
    pub fn log_debug_info(&self) {
        tracing::info!(object = ?self.handle, "\n{}", self.debug_report());
    }
}

impl std::fmt::Display for ObjectRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (pos, ang) = self.position();
        let inertia = self.inertia();
        let inv_inertia = self.inv_inertia();
        let (vel, angvel) = self.velocity();
        let (damp, rot_damp) = self.damping();
        let drag = self.object.drag_basis();
        let ang_drag = self.object.angular_drag_basis();

        writeln!(f, "-----------------")?;
        if let Some(name) = self.object.name() {
            writeln!(f, "Object: {name}")?;
        }
        writeln!(f, "Mass: {} (inv {})", self.object.mass(), self.object.inv_mass())?;
        writeln!(f, "Position: {} {} {}", pos.x, pos.y, pos.z)?;
        writeln!(f, "Angle: {} {} {}", ang.pitch, ang.yaw, ang.roll)?;
        writeln!(
            f,
            "Inertia: {} {} {} (inv {} {} {})",
            inertia.x, inertia.y, inertia.z, inv_inertia.x, inv_inertia.y, inv_inertia.z
        )?;
        writeln!(f, "Velocity: {}, {}, {}", vel.x, vel.y, vel.z)?;
        writeln!(f, "Ang Velocity: {}, {}, {}", angvel.x, angvel.y, angvel.z)?;
        writeln!(f, "Damping {damp} linear, {rot_damp} angular")?;
        writeln!(
            f,
            "Linear Drag: {}, {}, {} (factor {})",
            drag.x, drag.y, drag.z, self.object.drag_coefficient
        )?;
        writeln!(
            f,
            "Angular Drag: {}, {}, {} (factor {})",
            ang_drag.x, ang_drag.y, ang_drag.z, self.object.angular_drag_coefficient
        )?;
        writeln!(
            f,
            "State: {}, Collision {}, Motion {}, Drag {}, Flags {:04X} (game {:04x}, index {})",
            if self.is_asleep() { "Asleep" } else { "Awake" },
            if self.object.is_collision_enabled() { "Enabled" } else { "Disabled" },
            if self.object.is_static() {
                "Static"
            } else if self.object.is_motion_enabled() {
                "Enabled"
            } else {
                "Disabled"
            },
            if self.is_drag_enabled() { "Enabled" } else { "Disabled" },
            self.object.callback_flags().bits(),
            self.object.game_flags(),
            self.object.game_index(),
        )?;
        if let Some(surface) = self.surfaces.get(self.object.material_index()) {
            writeln!(
                f,
                "Material: {} : density({}), thickness({}), friction({}), elasticity({})",
                surface.name, surface.density, surface.thickness, surface.friction, surface.elasticity
            )?;
        }
        writeln!(f, "Shape: {:?}", self.collider().shape().shape_type())?;
        Ok(())
    }
}

/// Write access to an object and the engine world it lives in.
pub struct ObjectMut<'a> {
    pub(crate) handle: ObjectHandle,
    pub(crate) object: &'a mut PhysicsObject,
    pub(crate) world: &'a mut World,
    pub(crate) drag: &'a mut DragController,
    pub(crate) surfaces: &'a SurfacePropsTable,
}

impl Deref for ObjectMut<'_> {
    type Target = PhysicsObject;

    fn deref(&self) -> &PhysicsObject {
        &*self.object
    }
}

impl<'a> ObjectMut<'a> {
    /// The handle of this object.
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Read-only view of this object.
    pub fn view(&self) -> ObjectRef<'_> {
        ObjectRef {
            handle: self.handle,
            object: &*self.object,
            world: &*self.world,
            drag: &*self.drag,
            surfaces: self.surfaces,
        }
    }

    pub(crate) fn rb_mut(&mut self) -> &mut RigidBody {
        &mut self.world.bodies[self.object.body]
    }

    fn collider_mut(&mut self) -> &mut Collider {
        &mut self.world.colliders[self.object.collider]
    }

    /// Last creation step: material, collision response and drag model.
    pub(crate) fn finish_init(&mut self, material_index: usize, params: &ObjectParams) {
        let user_data = self.handle.to_user_data();
        self.rb_mut().user_data = user_data;
        self.collider_mut().user_data = user_data;

        self.enable_collisions(params.enable_collisions);
        self.set_material_index(material_index);
        self.set_contents(MASK_SOLID);

        let mut coefficient = params.drag_coefficient;
        if self.object.is_static() {
            coefficient = 0.0;
        }

        if !self.object.is_static() {
            let aabb = self.view().collider().shape().compute_local_aabb();
            let inv_inertia = self.view().engine_inv_inertia();
            let (basis, angular_basis) =
                drag::compute_drag_basis(&aabb, self.object.inv_mass(), &inv_inertia);
            self.object.drag_basis = basis;
            self.object.angular_drag_basis = angular_basis;
        }

        if !self.object.is_static() && coefficient != 0.0 {
            self.enable_drag(true);
        }

        self.object.drag_coefficient = coefficient;
        self.object.angular_drag_coefficient = coefficient;
    }

    /// Enables or disables contact resolution.
    ///
    /// A disabled object still takes part in overlap detection; its contacts are
    /// simply never solved.
    pub fn enable_collisions(&mut self, enable: bool) {
        if self.object.collision_enabled == enable {
            return;
        }

        self.object.collision_enabled = enable;
        let groups = if enable {
            InteractionGroups::all()
        } else {
            InteractionGroups::none()
        };
        self.collider_mut().set_solver_groups(groups);
    }

    /// Enables or disables world gravity. No-op on static objects.
    pub fn enable_gravity(&mut self, enable: bool) {
        if self.object.is_static() || self.view().is_gravity_enabled() == enable {
            return;
        }

        let scale = if enable { 1.0 } else { 0.0 };
        self.rb_mut().set_gravity_scale(scale, false);
    }

    /// Registers or unregisters the object with the drag controller.
    /// No-op on static objects.
    pub fn enable_drag(&mut self, enable: bool) {
        if self.object.is_static() || self.view().is_drag_enabled() == enable {
            return;
        }

        if enable {
            self.drag.add(self.handle);
        } else {
            self.drag.remove(self.handle);
        }
    }

    /// Enables or disables motion. No-op on static objects.
    ///
    /// Disabling zeroes both velocities and locks every degree of freedom, so
    /// the integrator cannot move the body even under forces.
    pub fn enable_motion(&mut self, enable: bool) {
        if self.object.is_static() || self.object.motion_enabled == enable {
            return;
        }
        self.object.motion_enabled = enable;

        let rb = self.rb_mut();
        if !enable {
            rb.set_linvel(Vector::zeros(), false);
            rb.set_angvel(Vector::zeros(), false);
        }
        rb.lock_translations(!enable, false);
        rb.lock_rotations(!enable, false);
        self.world.refresh_mass_properties(self.object.body);
    }

    /// Wakes the object up. No-op on static objects.
    pub fn wake(&mut self) {
        if self.object.is_static() {
            return;
        }
        self.rb_mut().wake_up(true);
    }

    /// Puts the object to sleep. No-op on static objects.
    pub fn sleep(&mut self) {
        if self.object.is_static() {
            return;
        }
        self.rb_mut().sleep();
    }

    fn push_mass_properties(&mut self, inertia: Vector<Real>) {
        let props = MassProperties::new(Point::origin(), self.object.mass, inertia);
        self.rb_mut().set_additional_mass_properties(props, false);
        self.world.refresh_mass_properties(self.object.body);
    }

    /// Sets the mass. No-op on static objects.
    ///
    /// Inertia is left untouched: call [`Self::set_inertia`] afterwards if it
    /// should follow the new mass.
    pub fn set_mass(&mut self, mass: Real) {
        if self.object.is_static() {
            tracing::debug!(object = ?self.handle, "ignoring set_mass on a static object");
            return;
        }

        let inertia = convert::invert_diagonal(&self.view().engine_inv_inertia());
        self.object.mass = mass;
        self.push_mass_properties(inertia);
    }

    /// Sets the principal inertia (game axes). No-op on static objects.
    pub fn set_inertia(&mut self, inertia: &GameVector) {
        if self.object.is_static() {
            return;
        }

        let inertia = convert::direction_to_engine(inertia).abs();
        self.push_mass_properties(inertia);
    }

    /// Recomputes the inertia from the shape and the current mass.
    ///
    /// Undoes any [`Self::set_inertia`] override and the creation-time inertia
    /// factor. No-op on static objects.
    pub fn update_collide(&mut self) {
        if self.object.is_static() {
            return;
        }

        let shape = self.view().collider().shape();
        let volume = shape.mass_properties(1.0).mass();
        let inertia = shape
            .mass_properties(safe_div(self.object.mass, volume))
            .principal_inertia();
        self.push_mass_properties(inertia);
    }

    /// Makes this object fall under its own gravity (inches/s²) instead of
    /// the world's. Disabling gravity still suspends it. No-op on static objects.
    pub fn set_local_gravity(&mut self, gravity: &GameVector) {
        if self.object.is_static() {
            return;
        }
        self.object.local_gravity = Some(convert::pos_to_engine(gravity));
    }

    /// Goes back to world gravity.
    pub fn clear_local_gravity(&mut self) {
        self.object.local_gravity = None;
    }

    /// Sets linear and/or angular damping.
    pub fn set_damping(&mut self, linear: Option<Real>, angular: Option<Real>) {
        let rb = self.rb_mut();
        if let Some(linear) = linear {
            rb.set_linear_damping(linear);
        }
        if let Some(angular) = angular {
            rb.set_angular_damping(angular);
        }
    }

    /// Sets the linear and/or angular drag coefficient.
    pub fn set_drag_coefficient(&mut self, linear: Option<Real>, angular: Option<Real>) {
        if let Some(linear) = linear {
            self.object.drag_coefficient = linear;
        }
        if let Some(angular) = angular {
            self.object.angular_drag_coefficient = angular;
        }
    }

    /// Overrides the buoyancy ratio computed from the material.
    pub fn set_buoyancy_ratio(&mut self, ratio: Real) {
        self.object.buoyancy_ratio = ratio;
    }

    /// Switches the object to another material.
    ///
    /// Friction and elasticity are copied into the engine and the buoyancy
    /// ratio is recomputed. Unknown indices are ignored.
    pub fn set_material_index(&mut self, material_index: usize) {
        let Some(surface) = self.surfaces.get(material_index) else {
            tracing::warn!(object = ?self.handle, material_index, "unknown material index");
            return;
        };
        let (friction, elasticity, density) = (surface.friction, surface.elasticity, surface.density);

        self.object.material_index = material_index;
        let collider = self.collider_mut();
        collider.set_friction(friction);
        collider.set_restitution(elasticity.min(1.0));

        self.object.buoyancy_ratio =
            safe_div(safe_div(self.object.mass, self.object.volume), density);
    }

    /// Sets the game-defined contents mask.
    pub fn set_contents(&mut self, contents: u32) {
        self.object.contents = contents;
    }

    /// Sets the linear (inches/s) and/or angular (degrees/s) sleep thresholds.
    pub fn set_sleep_thresholds(&mut self, linear: Option<Real>, angular: Option<Real>) {
        let activation = self.rb_mut().activation_mut();
        if let Some(linear) = linear {
            activation.normalized_linear_threshold = convert::distance_to_engine(linear);
        }
        if let Some(angular) = angular {
            activation.angular_threshold = angular.to_radians();
        }
    }

    /// Stores an opaque game token.
    pub fn set_game_data(&mut self, game_data: u64) {
        self.object.game_data = game_data;
    }

    /// Sets the game-defined index.
    pub fn set_game_index(&mut self, game_index: u16) {
        self.object.game_index = game_index;
    }

    /// Sets the game-defined flags.
    pub fn set_game_flags(&mut self, game_flags: u16) {
        self.object.game_flags = game_flags;
    }

    /// Replaces the requested collision callbacks.
    pub fn set_callback_flags(&mut self, flags: CallbackFlags) {
        self.object.callback_flags = flags;
    }

    pub(crate) fn add_callback_flags(&mut self, flags: CallbackFlags) {
        self.object.callback_flags.insert(flags);
    }

    pub(crate) fn remove_callback_flags(&mut self, flags: CallbackFlags) {
        self.object.callback_flags.remove(flags);
    }

    /// Moves the object origin to an engine transform.
    pub(crate) fn set_engine_origin_pose(&mut self, origin: Isometry<Real>, wake: bool) {
        if let Some(ghost) = &self.object.trigger {
            if let Some(sensor) = self.world.colliders.get_mut(ghost.collider) {
                sensor.set_position(origin);
            }
        }

        let pose = origin * Translation3::from(self.object.mass_center);
        let wake = wake && !self.object.is_static();
        self.rb_mut().set_position(pose, wake);
    }

    /// Moves the object. A teleport also wakes it up.
    pub fn set_position(&mut self, world_position: &GameVector, angles: &QAngle, is_teleport: bool) {
        let origin = convert::transform_to_engine(world_position, angles);
        self.set_engine_origin_pose(origin, is_teleport);
    }

    /// Moves the object to a game-space transform. A teleport also wakes it up.
    pub fn set_position_matrix(&mut self, matrix: &GameTransform, is_teleport: bool) {
        let origin = convert::matrix_to_engine(matrix);
        self.set_engine_origin_pose(origin, is_teleport);
    }

    /// Writes engine-space velocities (angular in world axes) if the object can move.
    pub(crate) fn set_engine_velocity(&mut self, linear: Option<Vector<Real>>, angular: Option<Vector<Real>>) {
        if !self.object.is_moveable() {
            return;
        }

        let rb = self.rb_mut();
        rb.wake_up(true);
        if let Some(linear) = linear {
            rb.set_linvel(linear, false);
        }
        if let Some(angular) = angular {
            rb.set_angvel(angular, false);
        }
    }

    /// Sets the linear velocity (world) and/or the angular velocity
    /// (object-local, degrees/s). No-op if the object cannot move.
    pub fn set_velocity(&mut self, velocity: Option<&GameVector>, angular_velocity: Option<&AngularImpulse>) {
        if velocity.is_none() && angular_velocity.is_none() {
            return;
        }

        let rotation = self.view().rb().position().rotation;
        let linear = velocity.map(convert::pos_to_engine);
        let angular = angular_velocity.map(|w| rotation * convert::angular_to_engine(w));
        self.set_engine_velocity(linear, angular);
    }

    /// Like [`Self::set_velocity`], but the velocity is also shielded from the
    /// drag and shadow controllers during the next step, so exactly this
    /// velocity is integrated.
    pub fn set_velocity_instantaneous(
        &mut self,
        velocity: Option<&GameVector>,
        angular_velocity: Option<&AngularImpulse>,
    ) {
        if !self.object.is_moveable() || (velocity.is_none() && angular_velocity.is_none()) {
            return;
        }

        self.set_velocity(velocity, angular_velocity);
        self.object.skip_controllers = true;
    }

    /// Adds to the linear velocity (world) and/or the angular velocity
    /// (object-local, degrees/s). No-op if the object cannot move.
    pub fn add_velocity(&mut self, velocity: Option<&GameVector>, angular_velocity: Option<&AngularImpulse>) {
        if velocity.is_none() && angular_velocity.is_none() {
            return;
        }

        let rb = self.view().rb();
        let rotation = rb.position().rotation;
        let linear = velocity.map(|v| rb.linvel() + convert::pos_to_engine(v));
        let angular = angular_velocity.map(|w| rb.angvel() + rotation * convert::angular_to_engine(w));
        self.set_engine_velocity(linear, angular);
    }

    /// Applies a linear impulse at the mass center. No-op if the object cannot move.
    pub fn apply_force_center(&mut self, force: &GameVector) {
        if !self.object.is_moveable() {
            return;
        }
        self.wake();

        let impulse = convert::force_to_engine(force);
        self.rb_mut().apply_impulse(impulse, true);
    }

    /// Applies a linear impulse at a world position. No-op if the object cannot move.
    pub fn apply_force_offset(&mut self, force: &GameVector, world_position: &GameVector) {
        if !self.object.is_moveable() {
            return;
        }
        self.wake();

        let local = self.view().world_to_local(world_position);
        // Offset from the mass center in the body frame.
        let offset = convert::pos_to_engine(&local) - self.object.mass_center;
        let impulse = convert::force_to_engine(force);

        let rb = self.rb_mut();
        let point = rb.position() * Point::from(offset);
        rb.apply_impulse_at_point(impulse, point, true);
    }

    /// Applies an angular impulse (world axes, degrees). No-op if the object cannot move.
    pub fn apply_torque_center(&mut self, torque: &AngularImpulse) {
        if !self.object.is_moveable() {
            return;
        }
        self.wake();

        let torque = convert::angular_to_engine(torque);
        self.rb_mut().apply_torque_impulse(torque, true);
    }

    /// Hinged objects are not supported.
    pub fn become_hinged(&mut self, _local_axis: usize) -> Result<()> {
        Err(PhysicsError::Unimplemented("hinged objects"))
    }

    /// Hinged objects are not supported.
    pub fn remove_hinged(&mut self) -> Result<()> {
        Err(PhysicsError::Unimplemented("hinged objects"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_data_round_trips_handles() {
        let handle = ObjectHandle(Index::from_raw_parts(17, 3));
        let data = handle.to_user_data();
        assert_eq!(ObjectHandle::from_user_data(data), Some(handle));
        assert_eq!(ObjectHandle::from_user_data(0), None);

        let first = ObjectHandle(Index::from_raw_parts(0, 0));
        assert_eq!(ObjectHandle::from_user_data(first.to_user_data()), Some(first));
    }

    #[test]
    fn default_callback_flags() {
        let flags = CallbackFlags::default();
        assert!(flags.contains(CallbackFlags::GLOBAL_FRICTION | CallbackFlags::GLOBAL_COLLIDE_STATIC));
        assert!(!flags.contains(CallbackFlags::SHADOW_COLLISION));
    }
}
