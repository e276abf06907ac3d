//! World objects, known lists, and the region partition for Sightline.
//!
//! This crate models the shared, continuously mutating world state the
//! core engine works on: objects with positions and liveness, the
//! per-object known list, and the grid of regions that partitions space.
//!
//! # Modules
//!
//! - [`error`] -- Error types for world operations.
//! - [`known_list`] -- [`KnownList`] and the [`KnownListHooks`] extension
//!   contract.
//! - [`object`] -- [`WorldObject`] and its AI state.
//! - [`partition`] -- The [`PartitionService`] seam consumed by the
//!   refresh scheduler.
//! - [`position`] -- World coordinates.
//! - [`region`] -- [`Region`]: one grid cell and its membership.
//! - [`grid`] -- [`WorldGrid`]: the fixed-size grid partition.

pub mod error;
pub mod grid;
pub mod known_list;
pub mod object;
pub mod partition;
pub mod position;
pub mod region;

mod sync;

pub use error::WorldError;
pub use grid::WorldGrid;
pub use known_list::{KnownList, KnownListHooks, NoHooks};
pub use object::{AiState, Assistant, AssistantKind, ObjectBuilder, ObjectTraits, WorldObject};
pub use partition::PartitionService;
pub use position::Position;
pub use region::Region;
