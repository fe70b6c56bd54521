//! Flat-plate drag approximation and the controller applying it every step.

use crate::dynamics::object::{ObjectHandle, PhysicsObject};
use crate::environment::world::World;
use crate::math::{Real, Vector};
use rapier::data::Arena;
use rapier::parry::bounding_volume::Aabb;

/// Integral of the flat-plate drag torque over one face pair of a box.
///
/// `l` is the half-extent along the rotation axis, `w` and `h` the two others.
fn ang_drag_integral(inv_inertia: Real, l: Real, w: Real, h: Real) -> Real {
    let w2 = w * w;
    let l2 = l * l;
    let h2 = h * h;
    inv_inertia * (w2 * l * l2 / 3.0 + 0.5 * w2 * w2 * l + l * w2 * h2)
}

/// Linear and angular drag bases of a body from its local bounding box.
///
/// The linear basis along an axis is the product of the two other half-extents
/// over the mass. Both are expressed along the body axes, in engine units.
pub(crate) fn compute_drag_basis(
    aabb: &Aabb,
    inv_mass: Real,
    inv_inertia: &Vector<Real>,
) -> (Vector<Real>, Vector<Real>) {
    let h = aabb.half_extents().abs();
    let basis = Vector::new(h.y * h.z, h.x * h.z, h.x * h.y) * inv_mass;

    let angular = Vector::new(
        ang_drag_integral(inv_inertia.x, h.x, h.y, h.z) + ang_drag_integral(inv_inertia.x, h.x, h.z, h.y),
        ang_drag_integral(inv_inertia.y, h.y, h.x, h.z) + ang_drag_integral(inv_inertia.y, h.y, h.z, h.x),
        ang_drag_integral(inv_inertia.z, h.z, h.x, h.y) + ang_drag_integral(inv_inertia.z, h.z, h.y, h.x),
    );

    (basis, angular)
}

/// `Σ |basis_i · dir_i|`.
pub(crate) fn weighted_sum(basis: &Vector<Real>, dir: &Vector<Real>) -> Real {
    basis.component_mul(dir).abs().sum()
}

/// Slows down every registered object according to its drag model.
#[derive(Clone, Debug)]
pub struct DragController {
    objects: Vec<ObjectHandle>,
    air_density: Real,
}

impl DragController {
    /// A controller with no registered object.
    pub fn new(air_density: Real) -> Self {
        Self {
            objects: Vec::new(),
            air_density,
        }
    }

    /// Density of the simulated air.
    pub fn air_density(&self) -> Real {
        self.air_density
    }

    /// Changes the density of the simulated air.
    pub fn set_air_density(&mut self, air_density: Real) {
        self.air_density = air_density;
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Is no object registered?
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Is `object` registered with this controller?
    pub fn is_controlling(&self, object: ObjectHandle) -> bool {
        self.objects.contains(&object)
    }

    pub(crate) fn add(&mut self, object: ObjectHandle) {
        if !self.is_controlling(object) {
            self.objects.push(object);
        }
    }

    pub(crate) fn remove(&mut self, object: ObjectHandle) {
        self.objects.retain(|h| *h != object);
    }

    /// Applies one step worth of drag to every awake registered object.
    pub(crate) fn tick(&self, objects: &Arena<PhysicsObject>, world: &mut World, dt: Real) {
        for handle in &self.objects {
            let Some(object) = objects.get(handle.0) else {
                continue;
            };
            if object.skip_controllers || object.trigger.is_some() || !object.is_moveable() {
                continue;
            }
            let Some(rb) = world.bodies.get_mut(object.body) else {
                continue;
            };
            if rb.is_sleeping() {
                continue;
            }

            let rotation = rb.position().rotation;
            let linvel = *rb.linvel();
            let angvel = *rb.angvel();

            let local_vel = rotation.inverse_transform_vector(&linvel);
            let drag = (0.5 * object.drag_in_direction(&local_vel) * self.air_density * dt).min(1.0);
            if drag > 0.0 {
                rb.set_linvel(linvel - linvel * drag, false);
            }

            let local_angvel = rotation.inverse_transform_vector(&angvel);
            let ang_drag = (object.angular_drag_in_direction(&local_angvel) * self.air_density * dt).min(1.0);
            if ang_drag > 0.0 {
                rb.set_angvel(angvel - angvel * ang_drag, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point;
    use approx::assert_relative_eq;

    #[test]
    fn basis_is_half_extent_product_over_mass() {
        let aabb = Aabb::new(Point::new(-1.0, -2.0, -3.0), Point::new(1.0, 2.0, 3.0));
        let (basis, _) = compute_drag_basis(&aabb, 0.5, &Vector::repeat(1.0));
        assert_relative_eq!(basis, Vector::new(2.0 * 3.0, 1.0 * 3.0, 1.0 * 2.0) * 0.5);

        // Off-center boxes only depend on their extents.
        let shifted = Aabb::new(Point::new(0.0, 0.0, 0.0), Point::new(2.0, 4.0, 6.0));
        assert_relative_eq!(compute_drag_basis(&shifted, 0.5, &Vector::repeat(1.0)).0, basis);
    }

    #[test]
    fn angular_basis_follows_inverse_inertia() {
        let aabb = Aabb::new(Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0));
        let (_, angular) = compute_drag_basis(&aabb, 1.0, &Vector::new(1.0, 2.0, 0.0));
        // Unit half-extents: each integral is 1/3 + 1/2 + 1.
        let per_axis = 2.0 * (1.0 / 3.0 + 0.5 + 1.0);
        assert_relative_eq!(angular, Vector::new(per_axis, 2.0 * per_axis, 0.0), epsilon = 1.0e-5);
    }

    #[test]
    fn weighted_sum_ignores_sign() {
        let basis = Vector::new(1.0, 2.0, 3.0);
        assert_relative_eq!(weighted_sum(&basis, &Vector::new(-1.0, 0.0, 1.0)), 4.0);
        assert_eq!(weighted_sum(&Vector::zeros(), &Vector::new(5.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn registration_is_idempotent() {
        let mut drag = DragController::new(2.0);
        let handle = ObjectHandle(rapier::data::Index::from_raw_parts(1, 0));
        drag.add(handle);
        drag.add(handle);
        assert_eq!(drag.len(), 1);
        drag.remove(handle);
        assert!(drag.is_empty());
        assert!(!drag.is_controlling(handle));
    }
}
