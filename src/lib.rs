#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

extern crate nalgebra as na;
/// Re-export of the Rapier 3D physics engine.
///
/// This is available when the `dim3` feature is enabled.
#[cfg(feature = "dim3")]
pub extern crate rapier3d as rapier;

/// Simulation settings shared by every object of an environment.
pub mod config;
/// Conversions between game units/axes and engine units/axes.
pub mod convert;
/// Rigid-body objects, their drag model, shadow controllers and constraints.
///
/// This module provides the game-facing object API layered on top of Rapier
/// bodies: enable/disable semantics, velocity and force application, drag,
/// trigger volumes and goal-tracking shadow control.
pub mod dynamics;
/// The environment owning the engine world and every object living in it,
/// together with the fluid controllers, trigger events and contact snapshots
/// it produces.
pub mod environment;
/// Error types.
pub mod errors;
/// Collision models (shapes) built in game units.
pub mod shapes;
/// Surface-properties (material) registry.
pub mod surface;

pub use crate::config::EnvironmentConfig;
pub use crate::dynamics::{
    CallbackFlags, CollisionFilter, CollisionSet, Constraint, ConstraintHandle, DragController,
    ObjectHandle, ObjectMut, ObjectParams, ObjectRef, PhysicsObject, ShadowController,
    ShadowHandle, ShadowMut, ShadowState, MASK_SOLID,
};
pub use crate::environment::{
    Environment, FluidController, FluidHandle, FluidParams, FrictionContact, FrictionSnapshot,
    TriggerEvent,
};
pub use crate::errors::PhysicsError;
pub use crate::shapes::CollisionModel;
pub use crate::surface::{SurfaceProps, SurfacePropsTable};

/// Mathematical types used on both sides of the game/engine boundary.
///
/// Re-exports Rapier's math types (engine side, meters, Y-up) and defines the
/// game-side aliases (inches, Z-up, degrees).
pub mod math {
    /// Re-export all mathematical types from Rapier (vectors, matrices, etc.)
    pub use rapier::math::*;

    /// A position, velocity, force or impulse in game units (inches, Z-up).
    pub type GameVector = na::Vector3<Real>;
    /// An angular velocity or angular impulse in game units (degrees, Z-up).
    pub type AngularImpulse = na::Vector3<Real>;
    /// A rigid transform expressed in game units (the game's 3x4 position matrix).
    pub type GameTransform = na::Isometry3<Real>;

    /// Euler angles in degrees, following the game convention.
    ///
    /// The rotation they describe is `Rz(yaw) * Ry(pitch) * Rx(roll)` about the
    /// game axes.
    #[derive(Copy, Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    pub struct QAngle {
        /// Rotation about the game Y axis, in degrees.
        pub pitch: Real,
        /// Rotation about the game Z axis, in degrees.
        pub yaw: Real,
        /// Rotation about the game X axis, in degrees.
        pub roll: Real,
    }

    impl QAngle {
        /// Creates a new set of Euler angles (degrees).
        pub const fn new(pitch: Real, yaw: Real, roll: Real) -> Self {
            Self { pitch, yaw, roll }
        }

        /// The identity orientation.
        pub const fn zero() -> Self {
            Self::new(0.0, 0.0, 0.0)
        }
    }
}
