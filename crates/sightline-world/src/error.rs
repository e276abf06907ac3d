//! Error types for the `sightline-world` crate.

use sightline_types::{ObjectId, RegionId};

/// Errors that can occur during world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A region id did not resolve to a region of the partition.
    #[error("region not found: {0}")]
    RegionNotFound(RegionId),

    /// A position lies outside the partitioned world.
    #[error("position ({x}, {y}) is outside the world")]
    OutOfBounds {
        /// X coordinate.
        x: i32,
        /// Y coordinate.
        y: i32,
    },

    /// The grid dimensions are unusable.
    #[error("invalid grid dimensions: {reason}")]
    InvalidDimensions {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// The object is not spawned in the world.
    #[error("object {0} is not spawned")]
    NotSpawned(ObjectId),

    /// The object is already spawned in the world.
    #[error("object {0} is already spawned")]
    AlreadySpawned(ObjectId),
}
