//! Environment configuration.

use crate::errors::{PhysicsError, Result};
use crate::math::{GameVector, Real};
use serde::{Deserialize, Serialize};

/// Default linear sleep threshold, in inches per second.
pub const SLEEP_LINEAR_THRESHOLD: Real = 10.0;
/// Default angular sleep threshold, in degrees per second.
pub const SLEEP_ANGULAR_THRESHOLD: Real = 14.0;
/// Default air density used by the drag controller.
pub const DEFAULT_AIR_DENSITY: Real = 2.0;
/// Default fixed simulation step, in seconds.
pub const DEFAULT_TIMESTEP: Real = 1.0 / 66.0;

/// Settings for an [`Environment`](crate::Environment).
///
/// Every value is expressed in game units; conversion to engine units happens
/// when the environment is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Gravity acceleration, in inches per second squared.
    pub gravity: GameVector,
    /// Fixed simulation step used by [`Environment::step`](crate::Environment::step).
    pub timestep: Real,
    /// Density of the air the drag controller simulates.
    pub air_density: Real,
    /// Linear sleep threshold given to new objects (inches per second).
    pub sleep_linear_threshold: Real,
    /// Angular sleep threshold given to new objects (degrees per second).
    pub sleep_angular_threshold: Real,
    /// Time a shadow controller is given to reach a fresh target, on top of the
    /// caller-supplied time offset. Defaults to one simulation step.
    pub shadow_arrival_horizon: Real,
    /// Number of solver iterations per step.
    pub solver_iterations: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            gravity: GameVector::new(0.0, 0.0, -600.0),
            timestep: DEFAULT_TIMESTEP,
            air_density: DEFAULT_AIR_DENSITY,
            sleep_linear_threshold: SLEEP_LINEAR_THRESHOLD,
            sleep_angular_threshold: SLEEP_ANGULAR_THRESHOLD,
            shadow_arrival_horizon: DEFAULT_TIMESTEP,
            solver_iterations: 4,
        }
    }
}

impl EnvironmentConfig {
    /// Parses a configuration from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| PhysicsError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values describe a simulation that can be stepped.
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(PhysicsError::InvalidConfig {
                reason: format!("timestep must be positive and finite, got {}", self.timestep),
            });
        }
        if self.air_density < 0.0 {
            return Err(PhysicsError::InvalidConfig {
                reason: format!("air density must not be negative, got {}", self.air_density),
            });
        }
        if self.shadow_arrival_horizon < 0.0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "shadow arrival horizon must not be negative".to_string(),
            });
        }
        if self.solver_iterations == 0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "at least one solver iteration is required".to_string(),
            });
        }
        Ok(())
    }
}
