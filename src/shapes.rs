//! Collision models built in game units.
//!
//! A [`CollisionModel`] wraps a Rapier/Parry [`SharedShape`] together with the
//! mass center of the geometry. The shape is stored in engine units and is
//! reference-counted, so a trigger sensor can share the exact geometry of the
//! object it replaces.

use crate::convert::{self, METERS_PER_INCH};
use crate::errors::{PhysicsError, Result};
use crate::math::{GameVector, Point, Real, Vector};
use rapier::geometry::{SharedShape, ShapeType};
use rapier::parry::bounding_volume::Aabb;
use rapier::prelude::MassProperties;

/// A collision shape and its mass center, in engine units.
#[derive(Clone)]
pub struct CollisionModel {
    shape: SharedShape,
    mass_center: Vector<Real>,
}

impl std::fmt::Debug for CollisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionModel")
            .field("shape_type", &self.shape.shape_type())
            .field("mass_center", &self.mass_center)
            .finish_non_exhaustive()
    }
}

impl CollisionModel {
    /// Wraps an engine shape. The mass center is taken from the shape geometry.
    pub fn from_shape(shape: SharedShape) -> Self {
        let mass_center = shape.mass_properties(1.0).local_com.coords;
        Self { shape, mass_center }
    }

    /// A sphere of the given radius (inches).
    pub fn sphere(radius: Real) -> Result<Self> {
        if !(radius > 0.0) {
            return Err(PhysicsError::InvalidShape {
                reason: format!("sphere radius must be positive, got {radius}"),
            });
        }
        Ok(Self::from_shape(SharedShape::ball(convert::distance_to_engine(radius))))
    }

    /// An axis-aligned box with the given half-extents along the game axes (inches).
    pub fn cuboid(half_extents: GameVector) -> Result<Self> {
        if half_extents.iter().any(|e| !(*e > 0.0)) {
            return Err(PhysicsError::InvalidShape {
                reason: format!("cuboid half-extents must be positive, got {half_extents:?}"),
            });
        }
        // Half-extents are sizes, not displacements: remap the axes without sign.
        let he = convert::direction_to_engine(&half_extents).abs() * METERS_PER_INCH;
        Ok(Self::from_shape(SharedShape::cuboid(he.x, he.y, he.z)))
    }

    /// A capsule standing along the game Z axis.
    pub fn capsule(half_height: Real, radius: Real) -> Result<Self> {
        if !(half_height >= 0.0 && radius > 0.0) {
            return Err(PhysicsError::InvalidShape {
                reason: format!("invalid capsule ({half_height}, {radius})"),
            });
        }
        Ok(Self::from_shape(SharedShape::capsule_y(
            convert::distance_to_engine(half_height),
            convert::distance_to_engine(radius),
        )))
    }

    /// A cylinder standing along the game Z axis.
    pub fn cylinder(half_height: Real, radius: Real) -> Result<Self> {
        if !(half_height > 0.0 && radius > 0.0) {
            return Err(PhysicsError::InvalidShape {
                reason: format!("invalid cylinder ({half_height}, {radius})"),
            });
        }
        Ok(Self::from_shape(SharedShape::cylinder(
            convert::distance_to_engine(half_height),
            convert::distance_to_engine(radius),
        )))
    }

    /// The convex hull of a point cloud given in game units.
    pub fn convex_hull(points: &[GameVector]) -> Result<Self> {
        let points: Vec<Point<Real>> = points.iter().map(convert::point_to_engine).collect();
        SharedShape::convex_hull(&points)
            .map(Self::from_shape)
            .ok_or_else(|| PhysicsError::InvalidShape {
                reason: format!("degenerate convex hull ({} points)", points.len()),
            })
    }

    /// The engine shape.
    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    /// Mass center of the geometry, relative to the shape origin (engine units).
    pub fn mass_center(&self) -> Vector<Real> {
        self.mass_center
    }

    /// Axis-aligned bounding box of the shape in its own frame (engine units).
    pub fn local_aabb(&self) -> Aabb {
        self.shape.compute_local_aabb()
    }

    /// Volume of the shape, in cubic meters.
    pub fn volume(&self) -> Real {
        // A unit density makes the mass numerically equal to the volume.
        self.shape.mass_properties(1.0).mass()
    }

    /// Mass properties of the shape for a given total mass (kilograms).
    ///
    /// A zero mass yields zero inertia.
    pub fn mass_properties(&self, mass: Real) -> MassProperties {
        let volume = self.volume();
        let density = convert::safe_div(mass, volume);
        self.shape.mass_properties(density)
    }

    /// Radius of the shape in inches if it is a sphere.
    pub fn sphere_radius(&self) -> Option<Real> {
        self.shape
            .as_ball()
            .map(|ball| convert::distance_to_game(ball.radius))
    }

    /// Is this model a sphere?
    pub fn is_sphere(&self) -> bool {
        self.shape.shape_type() == ShapeType::Ball
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_radius_round_trips() {
        let model = CollisionModel::sphere(12.0).unwrap();
        assert!(model.is_sphere());
        assert_relative_eq!(model.sphere_radius().unwrap(), 12.0, max_relative = 1.0e-4);
        assert_relative_eq!(model.mass_center(), Vector::zeros());
    }

    #[test]
    fn cuboid_extents_follow_game_axes() {
        let model = CollisionModel::cuboid(GameVector::new(10.0, 20.0, 40.0)).unwrap();
        let aabb = model.local_aabb();
        let he = aabb.half_extents();
        // game (x, y, z) sizes end up on engine (x, z, y).
        assert_relative_eq!(he.x, 0.254, max_relative = 1.0e-4);
        assert_relative_eq!(he.y, 1.016, max_relative = 1.0e-4);
        assert_relative_eq!(he.z, 0.508, max_relative = 1.0e-4);
        assert!(model.sphere_radius().is_none());
    }

    #[test]
    fn mass_properties_scale_with_mass() {
        let model = CollisionModel::cuboid(GameVector::new(10.0, 10.0, 10.0)).unwrap();
        let props = model.mass_properties(10.0);
        assert_relative_eq!(props.mass(), 10.0, max_relative = 1.0e-3);
        assert_eq!(model.mass_properties(0.0).mass(), 0.0);
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(CollisionModel::sphere(0.0).is_err());
        assert!(CollisionModel::cuboid(GameVector::new(1.0, -1.0, 1.0)).is_err());
    }
}
