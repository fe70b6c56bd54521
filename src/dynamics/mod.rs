//! Rigid-body objects and the controllers acting on them.

pub use collision_set::{CollisionFilter, CollisionSet};
pub use constraint::{Constraint, ConstraintHandle};
pub use drag::DragController;
pub use object::{
    CallbackFlags, ObjectHandle, ObjectMut, ObjectParams, ObjectRef, PhysicsObject, MASK_SOLID,
};
pub use shadow::{ShadowController, ShadowHandle, ShadowMut, ShadowState};

/// Pairwise collision table and the collision-filter trait.
pub mod collision_set;
/// Joints between objects.
pub mod constraint;
/// Drag basis computation and the drag controller.
pub mod drag;
/// Object state, creation parameters and accessors.
pub mod object;
/// Target-tracking shadow controller.
pub mod shadow;
mod trigger;
