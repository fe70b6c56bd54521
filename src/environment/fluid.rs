//! Fluid controllers.
//!
//! A fluid controller marks an object as a volume of liquid. The environment
//! only keeps the registration: the object reports itself as a fluid (and as
//! a trigger) for as long as the controller exists.

use crate::dynamics::object::ObjectHandle;
use crate::math::{GameVector, Real};
use rapier::data::Index;

/// Identifier of a fluid controller inside its environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FluidHandle(pub(crate) Index);

/// Description of a fluid volume, in game units.
#[derive(Clone, Debug, PartialEq)]
pub struct FluidParams {
    /// Normal of the fluid surface plane, pointing out of the fluid.
    pub surface_normal: GameVector,
    /// Signed distance of the surface plane from the origin, in inches.
    pub surface_distance: Real,
    /// Density of the fluid, in kg/m³.
    pub density: Real,
    /// Damping applied to objects moving in the fluid.
    pub damping: Real,
    /// Game-defined contents of the fluid.
    pub contents: u32,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            surface_normal: GameVector::z(),
            surface_distance: 0.0,
            density: 1000.0,
            damping: 0.0,
            contents: 0,
        }
    }
}

/// A fluid volume registered on an object.
#[derive(Clone, Debug)]
pub struct FluidController {
    object: ObjectHandle,
    params: FluidParams,
}

impl FluidController {
    pub(crate) fn new(object: ObjectHandle, params: FluidParams) -> Self {
        Self { object, params }
    }

    /// The object acting as the fluid volume.
    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    /// The fluid description.
    pub fn params(&self) -> &FluidParams {
        &self.params
    }

    /// Surface plane as `(normal, distance)`.
    pub fn surface_plane(&self) -> (GameVector, Real) {
        (self.params.surface_normal, self.params.surface_distance)
    }

    /// Density of the fluid.
    pub fn density(&self) -> Real {
        self.params.density
    }

    /// Game-defined contents of the fluid.
    pub fn contents(&self) -> u32 {
        self.params.contents
    }

    pub(crate) fn set_params(&mut self, params: FluidParams) {
        self.params = params;
    }
}
