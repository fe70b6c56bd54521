//! Surface properties (physical materials).
//!
//! The table is built once, shared read-only by the environment (`Arc`) and
//! consulted whenever an object's material index changes.

use crate::errors::{PhysicsError, Result};
use crate::math::Real;
use serde::{Deserialize, Serialize};

/// Name of the entry every table starts with (index 0).
pub const DEFAULT_SURFACE: &str = "default";
/// Name of the low-friction entry used by shadow-controlled objects.
pub const SHADOW_SURFACE: &str = "shadow";

/// Physical properties of one material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceProps {
    /// Material name.
    pub name: String,
    /// Coulomb friction coefficient.
    pub friction: Real,
    /// Restitution. Values above 1 are clamped when copied into a body.
    pub elasticity: Real,
    /// Density, in kg/m³.
    pub density: Real,
    /// Shell thickness, in inches. Zero for solid materials.
    #[serde(default)]
    pub thickness: Real,
}

impl SurfaceProps {
    /// Creates a solid material.
    pub fn new(name: impl Into<String>, friction: Real, elasticity: Real, density: Real) -> Self {
        Self {
            name: name.into(),
            friction,
            elasticity,
            density,
            thickness: 0.0,
        }
    }
}

/// Registry mapping integer material indices to [`SurfaceProps`].
#[derive(Clone, Debug)]
pub struct SurfacePropsTable {
    entries: Vec<SurfaceProps>,
    shadow_index: usize,
}

impl Default for SurfacePropsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfacePropsTable {
    /// Creates a table holding only the `default` and `shadow` materials.
    pub fn new() -> Self {
        Self {
            entries: vec![
                SurfaceProps::new(DEFAULT_SURFACE, 0.8, 0.25, 2000.0),
                SurfaceProps::new(SHADOW_SURFACE, 0.0, 0.0, 2000.0),
            ],
            shadow_index: 1,
        }
    }

    /// Loads materials from a JSON array of [`SurfaceProps`].
    ///
    /// Entries named `default` or `shadow` replace the built-in ones; every
    /// other entry is appended in order.
    pub fn from_json(json: &str) -> Result<Self> {
        let props: Vec<SurfaceProps> =
            serde_json::from_str(json).map_err(|e| PhysicsError::SurfaceTable {
                reason: e.to_string(),
            })?;

        let mut table = Self::new();
        for surface in props {
            table.insert(surface);
        }
        Ok(table)
    }

    /// Adds a material, or replaces the one with the same name. Returns its index.
    pub fn insert(&mut self, surface: SurfaceProps) -> usize {
        if let Some(index) = self.find(&surface.name) {
            self.entries[index] = surface;
            index
        } else {
            self.entries.push(surface);
            self.entries.len() - 1
        }
    }

    /// Index of the material with the given name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|s| s.name == name)
    }

    /// Properties of the material at `index`.
    pub fn get(&self, index: usize) -> Option<&SurfaceProps> {
        self.entries.get(index)
    }

    /// Index of the low-friction material used by shadow control.
    pub fn shadow_index(&self) -> usize {
        self.shadow_index
    }

    /// Number of registered materials.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is this table empty? Never true, the built-in materials always exist.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_entries() {
        let table = SurfacePropsTable::new();
        assert_eq!(table.find(DEFAULT_SURFACE), Some(0));
        assert_eq!(table.shadow_index(), 1);
        assert_eq!(table.get(table.shadow_index()).unwrap().friction, 0.0);
        assert!(table.get(42).is_none());
    }

    #[test]
    fn json_appends_and_overrides() {
        let table = SurfacePropsTable::from_json(
            r#"[
                { "name": "metal", "friction": 0.4, "elasticity": 0.1, "density": 2700.0 },
                { "name": "default", "friction": 0.5, "elasticity": 0.2, "density": 1000.0, "thickness": 0.5 }
            ]"#,
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.find("metal"), Some(2));
        assert_eq!(table.get(0).unwrap().density, 1000.0);
        assert_eq!(table.get(0).unwrap().thickness, 0.5);
    }

    #[test]
    fn bad_json_is_reported() {
        let err = SurfacePropsTable::from_json("[{").unwrap_err();
        assert!(matches!(err, PhysicsError::SurfaceTable { .. }));
    }
}
