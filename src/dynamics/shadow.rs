//! Goal-tracking controller driving an object toward a target transform.
//!
//! Game code calls [`ShadowMut::update`] with a new target whenever it has one;
//! the environment ticks every controller once per step, before the engine
//! integrates. Each tick commands the velocity that would close the remaining
//! error by the arrival time, clamped to the configured speeds. Targets further
//! away than the teleport distance are reached by snapping instead.

use std::ops::{Deref, DerefMut};

use crate::convert;
use crate::dynamics::object::{CallbackFlags, ObjectHandle, ObjectMut};
use crate::math::{GameVector, Isometry, QAngle, Real, Rotation, Vector};
use na::Translation3;
use rapier::data::Index;

/// Shortest arrival time a controller ever divides by.
const MIN_SECONDS_TO_ARRIVAL: Real = 1.0e-4;

// Callback flags owned by the controller while it is attached.
const MANAGED_CALLBACKS: CallbackFlags = CallbackFlags::SHADOW_COLLISION
    .union(CallbackFlags::GLOBAL_FRICTION)
    .union(CallbackFlags::GLOBAL_COLLIDE_STATIC);

/// Identifier of a shadow controller inside its environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShadowHandle(pub(crate) Index);

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct ShadowFlags: u8 {
        const ALLOW_TRANSLATION = 1 << 0;
        const ALLOW_ROTATION = 1 << 1;
        const PHYSICALLY_CONTROLLED = 1 << 2;
        const USE_SHADOW_MATERIAL = 1 << 3;
    }
}

/// Where a controller is in its target-tracking cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShadowState {
    /// No target yet, or removed from its object: ticks do nothing.
    Detached,
    /// Driving the object toward the target through its velocity.
    Tracking,
    /// The next tick moves the object straight onto the target.
    Teleporting,
}

/// A goal-tracking controller attached to one object.
#[derive(Clone, Debug)]
pub struct ShadowController {
    object: ObjectHandle,
    state: ShadowState,
    target_position: Vector<Real>,
    target_rotation: Rotation<Real>,
    last_position: Vector<Real>,
    // m/s and rad/s.
    max_speed: Real,
    max_angular_speed: Real,
    seconds_to_arrival: Real,
    time_offset: Real,
    arrival_horizon: Real,
    // Meters, disabled when zero.
    teleport_distance: Real,
    current_speed: Vector<Real>,
    flags: ShadowFlags,
    saved_material_index: usize,
    saved_callbacks: CallbackFlags,
    ticks_since_update: u32,
}

impl ShadowController {
    /// Attaches a new controller to `body`. The target starts at the body's
    /// current transform and the controller stays detached until its first update.
    pub(crate) fn attach(
        body: &mut ObjectMut,
        arrival_horizon: Real,
        max_speed: Real,
        max_angular_speed: Real,
        allow_translation: bool,
        allow_rotation: bool,
    ) -> Self {
        let saved_callbacks = body.callback_flags() & MANAGED_CALLBACKS;
        body.remove_callback_flags(CallbackFlags::GLOBAL_FRICTION | CallbackFlags::GLOBAL_COLLIDE_STATIC);
        body.add_callback_flags(CallbackFlags::SHADOW_COLLISION);

        let pose = body.view().engine_origin_pose();
        let mut flags = ShadowFlags::empty();
        flags.set(ShadowFlags::ALLOW_TRANSLATION, allow_translation);
        flags.set(ShadowFlags::ALLOW_ROTATION, allow_rotation);

        let mut controller = Self {
            object: body.handle(),
            state: ShadowState::Detached,
            target_position: pose.translation.vector,
            target_rotation: pose.rotation,
            last_position: pose.translation.vector,
            max_speed: 0.0,
            max_angular_speed: 0.0,
            seconds_to_arrival: MIN_SECONDS_TO_ARRIVAL,
            time_offset: 0.0,
            arrival_horizon,
            teleport_distance: 0.0,
            current_speed: Vector::zeros(),
            flags,
            saved_material_index: body.material_index(),
            saved_callbacks,
            ticks_since_update: 0,
        };
        controller.set_max_speed(max_speed, max_angular_speed);
        controller
    }

    /// Gives `body` back the material and callback flags it had before [`Self::attach`].
    pub(crate) fn detach(&mut self, body: &mut ObjectMut) {
        if self.flags.contains(ShadowFlags::USE_SHADOW_MATERIAL) {
            body.set_material_index(self.saved_material_index);
            self.flags.remove(ShadowFlags::USE_SHADOW_MATERIAL);
        }
        body.remove_callback_flags(MANAGED_CALLBACKS);
        body.add_callback_flags(self.saved_callbacks);
        self.state = ShadowState::Detached;
    }

    /// The controlled object.
    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    /// Current state of the tracking cycle.
    pub fn state(&self) -> ShadowState {
        self.state
    }

    /// Position and orientation the controller is driving toward.
    pub fn target_position(&self) -> (GameVector, QAngle) {
        let pose = Isometry::from_parts(Translation3::from(self.target_position), self.target_rotation);
        convert::transform_to_game(&pose)
    }

    /// The target before the last update.
    pub fn last_position(&self) -> GameVector {
        convert::pos_to_game(&self.last_position)
    }

    /// Linear (inches/s) and angular (degrees/s) speed limits.
    pub fn max_speed(&self) -> (Real, Real) {
        (
            convert::distance_to_game(self.max_speed),
            self.max_angular_speed.to_degrees(),
        )
    }

    /// Sets the linear (inches/s) and angular (degrees/s) speed limits.
    pub fn set_max_speed(&mut self, max_speed: Real, max_angular_speed: Real) {
        self.max_speed = convert::distance_to_engine(max_speed.abs());
        self.max_angular_speed = max_angular_speed.abs().to_radians();
    }

    /// Distance (inches) beyond which a new target is reached by teleporting.
    pub fn teleport_distance(&self) -> Real {
        convert::distance_to_game(self.teleport_distance)
    }

    /// Sets the teleport distance (inches). Zero disables teleporting.
    pub fn set_teleport_distance(&mut self, distance: Real) {
        self.teleport_distance = convert::distance_to_engine(distance.max(0.0));
    }

    /// Does the controller drive the object position?
    pub fn allows_translation(&self) -> bool {
        self.flags.contains(ShadowFlags::ALLOW_TRANSLATION)
    }

    /// Lets the controller drive (or not) the object position.
    pub fn set_allows_translation(&mut self, allow: bool) {
        self.flags.set(ShadowFlags::ALLOW_TRANSLATION, allow);
    }

    /// Does the controller drive the object orientation?
    pub fn allows_rotation(&self) -> bool {
        self.flags.contains(ShadowFlags::ALLOW_ROTATION)
    }

    /// Lets the controller drive (or not) the object orientation.
    pub fn set_allows_rotation(&mut self, allow: bool) {
        self.flags.set(ShadowFlags::ALLOW_ROTATION, allow);
    }

    /// Is the object pushed around by physics rather than purely following the target?
    pub fn is_physically_controlled(&self) -> bool {
        self.flags.contains(ShadowFlags::PHYSICALLY_CONTROLLED)
    }

    /// Marks the object as physically controlled.
    pub fn set_physically_controlled(&mut self, physically_controlled: bool) {
        self.flags.set(ShadowFlags::PHYSICALLY_CONTROLLED, physically_controlled);
    }

    /// Is the shadow material currently applied to the object?
    pub fn is_using_shadow_material(&self) -> bool {
        self.flags.contains(ShadowFlags::USE_SHADOW_MATERIAL)
    }

    /// Linear velocity commanded by the last tick, in inches/s.
    pub fn last_impulse(&self) -> GameVector {
        convert::pos_to_game(&self.current_speed)
    }

    /// Ticks elapsed since the last update.
    pub fn ticks_since_update(&self) -> u32 {
        self.ticks_since_update
    }

    /// Time left to reach the target, in seconds.
    pub fn seconds_to_arrival(&self) -> Real {
        self.seconds_to_arrival
    }

    /// Time offset given to the last update.
    pub fn time_offset(&self) -> Real {
        self.time_offset
    }
}

fn clamp_components(v: Vector<Real>, max: Real) -> Vector<Real> {
    v.map(|c| c.max(-max).min(max))
}

/// Write access to a shadow controller and its object.
pub struct ShadowMut<'a> {
    pub(crate) handle: ShadowHandle,
    pub(crate) shadow: &'a mut ShadowController,
    pub(crate) body: ObjectMut<'a>,
}

impl Deref for ShadowMut<'_> {
    type Target = ShadowController;

    fn deref(&self) -> &ShadowController {
        &*self.shadow
    }
}

impl DerefMut for ShadowMut<'_> {
    fn deref_mut(&mut self) -> &mut ShadowController {
        &mut *self.shadow
    }
}

impl<'a> ShadowMut<'a> {
    /// The handle of this controller.
    pub fn handle(&self) -> ShadowHandle {
        self.handle
    }

    /// The controlled object.
    pub fn body(&mut self) -> &mut ObjectMut<'a> {
        &mut self.body
    }

    /// Sets a new target.
    ///
    /// The controller gets the arrival horizon plus `time_offset` seconds to
    /// reach it. If the object is further than the teleport distance from the
    /// target, the next tick teleports it there instead.
    pub fn update(&mut self, position: &GameVector, angles: &QAngle, time_offset: Real) {
        let current = self.body.view().engine_origin_pose().translation.vector;
        let s = &mut *self.shadow;

        s.last_position = s.target_position;
        s.target_position = convert::pos_to_engine(position);
        s.target_rotation = convert::rotation_to_engine(angles);
        s.time_offset = time_offset;
        s.seconds_to_arrival = (s.arrival_horizon + time_offset.max(0.0)).max(MIN_SECONDS_TO_ARRIVAL);
        s.ticks_since_update = 0;

        let distance = (s.target_position - current).norm();
        s.state = if s.teleport_distance > 0.0 && distance > s.teleport_distance {
            tracing::debug!(object = ?s.object, distance, "shadow target out of reach, teleporting");
            ShadowState::Teleporting
        } else {
            ShadowState::Tracking
        };

        self.body.wake();
    }

    /// Advances the controller by `dt` seconds.
    pub(crate) fn tick(&mut self, dt: Real) {
        let s = &mut *self.shadow;
        s.ticks_since_update = s.ticks_since_update.saturating_add(1);

        match s.state {
            ShadowState::Detached => {}
            ShadowState::Teleporting => {
                let pose = Isometry::from_parts(Translation3::from(s.target_position), s.target_rotation);
                self.body.set_engine_origin_pose(pose, true);
                self.body.set_engine_velocity(Some(Vector::zeros()), Some(Vector::zeros()));
                s.current_speed = Vector::zeros();
                s.state = ShadowState::Tracking;
            }
            ShadowState::Tracking => {
                let origin = self.body.view().engine_origin_pose();
                let horizon = s.seconds_to_arrival.max(dt);

                let linear = s.flags.contains(ShadowFlags::ALLOW_TRANSLATION).then(|| {
                    let delta = s.target_position - origin.translation.vector;
                    clamp_components(delta / horizon, s.max_speed)
                });
                let angular = s.flags.contains(ShadowFlags::ALLOW_ROTATION).then(|| {
                    let error = s.target_rotation * origin.rotation.inverse();
                    clamp_components(error.scaled_axis() / horizon, s.max_angular_speed)
                });

                self.body.set_engine_velocity(linear, angular);
                s.current_speed = linear.unwrap_or_else(Vector::zeros);
                s.seconds_to_arrival = (s.seconds_to_arrival - dt).max(MIN_SECONDS_TO_ARRIVAL);
            }
        }
    }

    /// Raises the object by `height` inches along the game up axis.
    pub fn step_up(&mut self, height: Real) {
        let mut origin = self.body.view().engine_origin_pose();
        origin.translation.vector += convert::pos_to_engine(&GameVector::new(0.0, 0.0, height));
        self.body.set_engine_origin_pose(origin, true);
    }

    /// Swaps the object's material for the shadow material, or restores the
    /// material it had before.
    pub fn use_shadow_material(&mut self, enable: bool) {
        if self.shadow.is_using_shadow_material() == enable {
            return;
        }

        if enable {
            self.shadow.saved_material_index = self.body.material_index();
            let shadow_index = self.body.surfaces.shadow_index();
            self.body.set_material_index(shadow_index);
        } else {
            self.body.set_material_index(self.shadow.saved_material_index);
        }
        self.shadow.flags.set(ShadowFlags::USE_SHADOW_MATERIAL, enable);
    }

    /// Records a material change requested by the game while the controller is
    /// attached. The shadow material stays in place if it is in use, and the
    /// new material is applied when it is removed.
    pub fn object_material_changed(&mut self, material_index: usize) {
        self.shadow.saved_material_index = material_index;
        if !self.shadow.is_using_shadow_material() {
            self.body.set_material_index(material_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_is_per_component() {
        let v = clamp_components(Vector::new(5.0, -7.0, 0.5), 1.0);
        assert_eq!(v, Vector::new(1.0, -1.0, 0.5));
    }

    #[test]
    fn managed_callbacks() {
        assert!(MANAGED_CALLBACKS.contains(CallbackFlags::SHADOW_COLLISION));
        assert!(!MANAGED_CALLBACKS.contains(CallbackFlags::GLOBAL_TOUCH));
    }
}
