//! The partition seam consumed by the refresh scheduler.
//!
//! The scheduler never knows how space is cut up. It enumerates regions,
//! resolves their neighbor lists, and asks whether two regions are
//! neighbors; [`WorldGrid`](crate::WorldGrid) is the stock implementation.

use std::sync::Arc;

use sightline_types::RegionId;

use crate::error::WorldError;
use crate::region::Region;

/// Read access to a partitioned world.
pub trait PartitionService: Send + Sync {
    /// All regions of the partition.
    fn regions(&self) -> &[Arc<Region>];

    /// Look up a region by id.
    fn region(&self, id: RegionId) -> Option<Arc<Region>>;

    /// Resolve the neighbor list of `region` (the region itself included).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::RegionNotFound`] if a neighbor id does not
    /// resolve.
    fn neighbors(&self, region: &Region) -> Result<Vec<Arc<Region>>, WorldError> {
        region
            .neighbor_ids()
            .iter()
            .map(|id| self.region(*id).ok_or(WorldError::RegionNotFound(*id)))
            .collect()
    }

    /// Whether `b` lies in the neighborhood of `a`.
    fn is_neighbor(&self, a: RegionId, b: RegionId) -> bool {
        self.region(a).is_some_and(|region| region.borders(b))
    }
}
