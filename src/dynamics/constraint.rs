//! Constraints between two objects, backed by engine impulse joints.

use crate::dynamics::object::ObjectHandle;
use crate::environment::world::World;
use rapier::data::Index;
use rapier::dynamics::ImpulseJointHandle;

/// Identifier of a constraint inside its environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub(crate) Index);

/// A joint linking two objects.
///
/// When either object is destroyed the joint is dropped from the engine and
/// the constraint keeps only the surviving side.
#[derive(Clone, Debug)]
pub struct Constraint {
    joint: Option<ImpulseJointHandle>,
    object0: Option<ObjectHandle>,
    object1: Option<ObjectHandle>,
}

impl Constraint {
    pub(crate) fn new(joint: ImpulseJointHandle, object0: ObjectHandle, object1: ObjectHandle) -> Self {
        Self {
            joint: Some(joint),
            object0: Some(object0),
            object1: Some(object1),
        }
    }

    /// The engine joint, unless one of the objects was destroyed.
    pub fn joint(&self) -> Option<ImpulseJointHandle> {
        self.joint
    }

    /// The two constrained objects.
    pub fn objects(&self) -> (Option<ObjectHandle>, Option<ObjectHandle>) {
        (self.object0, self.object1)
    }

    /// Is the joint still simulated?
    pub fn is_active(&self) -> bool {
        self.joint.is_some()
    }

    /// Forgets `object` and drops the joint from the engine.
    pub(crate) fn object_destroyed(&mut self, object: ObjectHandle, world: &mut World) {
        if self.object0 == Some(object) {
            self.object0 = None;
        }
        if self.object1 == Some(object) {
            self.object1 = None;
        }
        self.release(world);
    }

    /// Drops the joint from the engine.
    pub(crate) fn release(&mut self, world: &mut World) {
        if let Some(joint) = self.joint.take() {
            world.impulse_joints.remove(joint, true);
        }
    }
}
