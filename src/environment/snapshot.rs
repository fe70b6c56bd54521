//! Per-contact report of an object's current contacts.

use crate::convert;
use crate::dynamics::object::{ObjectHandle, PhysicsObject};
use crate::environment::world::World;
use crate::math::GameVector;

/// One contact point between the snapshot object and another collider.
#[derive(Clone, Debug, PartialEq)]
pub struct FrictionContact {
    /// The touched object, if the collider belongs to one.
    pub other: Option<ObjectHandle>,
    /// Contact point, in world space.
    pub point: GameVector,
    /// Contact normal, pointing from the snapshot object toward the other one.
    pub normal: GameVector,
    /// Normal impulse applied by the solver during the last step, pushing the
    /// snapshot object away from the other one.
    pub impulse: GameVector,
}

/// Every contact an object had after the last step.
///
/// A snapshot is a copy: it does not change when the simulation moves on.
#[derive(Clone, Debug)]
pub struct FrictionSnapshot {
    object: ObjectHandle,
    contacts: Vec<FrictionContact>,
}

impl FrictionSnapshot {
    pub(crate) fn capture(handle: ObjectHandle, object: &PhysicsObject, world: &World) -> Self {
        let own = object.collider;
        let mut contacts = Vec::new();

        for pair in world.narrow_phase.contact_pairs_with(own) {
            if world.is_pair_dropped(pair.collider1, pair.collider2) {
                continue;
            }

            let first = pair.collider1 == own;
            let (own_collider, other_collider) = if first {
                (pair.collider1, pair.collider2)
            } else {
                (pair.collider2, pair.collider1)
            };
            let Some(own_pose) = world.colliders.get(own_collider).map(|c| *c.position()) else {
                continue;
            };
            let other = world.object_of_collider(other_collider);

            for manifold in &pair.manifolds {
                // The manifold normal points from the first collider to the second.
                let normal = if first {
                    manifold.data.normal
                } else {
                    -manifold.data.normal
                };

                for point in &manifold.points {
                    if point.dist > 0.0 {
                        continue;
                    }
                    let local = if first { point.local_p1 } else { point.local_p2 };
                    contacts.push(FrictionContact {
                        other,
                        point: convert::point_to_game(&(own_pose * local)),
                        normal: convert::direction_to_game(&normal),
                        impulse: convert::force_to_game(&(-normal * point.data.impulse)),
                    });
                }
            }
        }

        Self {
            object: handle,
            contacts,
        }
    }

    /// The object this snapshot was taken for.
    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    /// All recorded contacts.
    pub fn contacts(&self) -> &[FrictionContact] {
        &self.contacts
    }

    /// Number of recorded contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Was the object touching nothing?
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Iterates over the recorded contacts.
    pub fn iter(&self) -> std::slice::Iter<'_, FrictionContact> {
        self.contacts.iter()
    }
}

impl<'a> IntoIterator for &'a FrictionSnapshot {
    type Item = &'a FrictionContact;
    type IntoIter = std::slice::Iter<'a, FrictionContact>;

    fn into_iter(self) -> Self::IntoIter {
        self.contacts.iter()
    }
}
