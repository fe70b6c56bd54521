//! Error types for object and environment operations.
//!
//! Most object mutations follow the simulation's no-op policy and never fail;
//! these errors cover construction, handle lookups, bitmask access and the
//! capabilities that are deliberately not implemented.

use thiserror::Error;

/// Errors that can occur while building or addressing simulation objects.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// The capability exists in the object API but has no implementation.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    /// An index into a fixed-capacity table was out of bounds.
    #[error("index {index} out of range (capacity {capacity})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The table capacity.
        capacity: usize,
    },

    /// A fixed-capacity table was requested with more entries than it can hold.
    #[error("capacity {requested} exceeds the maximum of {max}")]
    CapacityExceeded {
        /// Requested capacity.
        requested: usize,
        /// Largest supported capacity.
        max: usize,
    },

    /// A handle does not refer to a live object of the environment.
    #[error("invalid {kind} handle")]
    InvalidHandle {
        /// What kind of handle it was.
        kind: &'static str,
    },

    /// A collision model could not be built from the given geometry.
    #[error("invalid collision shape: {reason}")]
    InvalidShape {
        /// Description of what's wrong.
        reason: String,
    },

    /// A surface-properties table could not be loaded.
    #[error("invalid surface table: {reason}")]
    SurfaceTable {
        /// Description of the loading error.
        reason: String,
    },

    /// A configuration document could not be loaded.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl PhysicsError {
    pub(crate) fn invalid_object() -> Self {
        Self::InvalidHandle { kind: "object" }
    }
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, PhysicsError>;
