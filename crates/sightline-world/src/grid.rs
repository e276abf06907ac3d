//! Fixed-size grid partition of the world.
//!
//! The world is a `width x height` block of square cells, each
//! `cell_size` world units wide, starting at the origin. A region's
//! neighborhood is the 3x3 block of cells around it, clipped at the world
//! edge. Regions are numbered row-major: `id = y * width + x`.
//!
//! A region is active while it or any neighbor holds a player-controlled
//! object. Activity is recomputed whenever a playable object spawns,
//! despawns, or crosses a cell boundary.

use std::sync::{Arc, Weak};

use sightline_types::RegionId;
use tracing::debug;

use crate::error::WorldError;
use crate::object::WorldObject;
use crate::partition::PartitionService;
use crate::position::Position;
use crate::region::Region;

/// The grid partition and every region in it.
#[derive(Debug)]
pub struct WorldGrid {
    /// Number of cells along x.
    width: u32,
    /// Number of cells along y.
    height: u32,
    /// Side length of a cell in world units.
    cell_size: u32,
    /// All regions, indexed by region id.
    regions: Vec<Arc<Region>>,
}

impl WorldGrid {
    /// Create a grid of `width x height` empty regions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if any dimension is zero
    /// or the region count does not fit the id space.
    pub fn new(width: u32, height: u32, cell_size: u32) -> Result<Self, WorldError> {
        if width == 0 || height == 0 || cell_size == 0 {
            return Err(WorldError::InvalidDimensions {
                reason: format!(
                    "width, height and cell_size must be non-zero (got {width}x{height}, cell {cell_size})"
                ),
            });
        }
        let count = width
            .checked_mul(height)
            .ok_or_else(|| WorldError::InvalidDimensions {
                reason: format!("{width}x{height} regions overflow the region id space"),
            })?;

        let mut regions = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        for y in 0..height {
            for x in 0..width {
                let neighbors = neighborhood(x, y, width, height);
                regions.push(Arc::new(Region::new(cell_id(x, y, width), neighbors)));
            }
        }

        Ok(Self {
            width,
            height,
            cell_size,
            regions,
        })
    }

    /// Number of cells along x.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of cells along y.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Side length of a cell in world units.
    pub const fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Total number of resident objects across all regions.
    pub fn object_count(&self) -> usize {
        self.regions.iter().map(|region| region.object_count()).sum()
    }

    /// Number of regions currently active.
    pub fn active_region_count(&self) -> usize {
        self.regions.iter().filter(|region| region.is_active()).count()
    }

    /// Find the region containing `position`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if the position lies outside
    /// the grid.
    pub fn region_at(&self, position: Position) -> Result<Arc<Region>, WorldError> {
        let out_of_bounds = || WorldError::OutOfBounds {
            x: position.x,
            y: position.y,
        };
        let x = u32::try_from(position.x).map_err(|_err| out_of_bounds())?;
        let y = u32::try_from(position.y).map_err(|_err| out_of_bounds())?;
        let cx = x.checked_div(self.cell_size).ok_or_else(out_of_bounds)?;
        let cy = y.checked_div(self.cell_size).ok_or_else(out_of_bounds)?;
        if cx >= self.width || cy >= self.height {
            return Err(out_of_bounds());
        }
        let id = cell_id(cx, cy, self.width);
        self.region(id).ok_or(WorldError::RegionNotFound(id))
    }

    /// Place `object` into the world at `position` and make it visible.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AlreadySpawned`] if the object is already in
    /// the world, or [`WorldError::OutOfBounds`] for a bad position.
    pub fn spawn(&self, object: &Arc<WorldObject>, position: Position) -> Result<RegionId, WorldError> {
        if object.is_visible() {
            return Err(WorldError::AlreadySpawned(object.id()));
        }
        let region = self.region_at(position)?;

        object.set_position(position);
        object.set_region(Arc::downgrade(&region));
        region.add_object(object);
        object.set_visible(true);

        if object.kind().is_playable() {
            self.refresh_activity_around(&region);
        }
        debug!(object = %object.id(), region = %region.id(), "object spawned");
        Ok(region.id())
    }

    /// Remove `object` from the world.
    ///
    /// Every resident that knows it forgets it with `forget = true`, and
    /// its own known list is cleared. Known lists can lag behind movement,
    /// so observers are searched across the whole grid rather than only
    /// around the object's last region.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotSpawned`] if the object is not in the world.
    pub fn despawn(&self, object: &Arc<WorldObject>) -> Result<(), WorldError> {
        let region = object
            .region()
            .filter(|_| object.is_visible())
            .ok_or(WorldError::NotSpawned(object.id()))?;

        object.set_visible(false);
        region.remove_object(object.id());
        object.set_region(Weak::new());

        for resident in self.regions.iter().flat_map(|cell| cell.objects()) {
            resident.remove_known_object(object, true);
        }
        object.known_list().clear();

        if object.kind().is_playable() {
            self.refresh_activity_around(&region);
        }
        debug!(object = %object.id(), region = %region.id(), "object despawned");
        Ok(())
    }

    /// Move a spawned object to `position`, migrating it between regions
    /// when it crosses a cell boundary. Returns the region it ends up in.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotSpawned`] if the object is not in the
    /// world, or [`WorldError::OutOfBounds`] for a bad position.
    pub fn move_to(&self, object: &Arc<WorldObject>, position: Position) -> Result<RegionId, WorldError> {
        let current = object
            .region()
            .filter(|_| object.is_visible())
            .ok_or(WorldError::NotSpawned(object.id()))?;
        let target = self.region_at(position)?;

        object.set_position(position);
        if target.id() != current.id() {
            current.remove_object(object.id());
            object.set_region(Arc::downgrade(&target));
            target.add_object(object);

            if object.kind().is_playable() {
                self.refresh_activity_around(&current);
                self.refresh_activity_around(&target);
            }
        }
        Ok(target.id())
    }

    /// Recompute the active flag of every region around `region`.
    fn refresh_activity_around(&self, region: &Region) {
        for id in region.neighbor_ids() {
            let Some(candidate) = self.region(*id) else {
                continue;
            };
            let active = candidate
                .neighbor_ids()
                .iter()
                .filter_map(|neighbor| self.region(*neighbor))
                .any(|neighbor| neighbor.has_playables());
            if candidate.set_active(active) != active {
                debug!(region = %candidate.id(), active, "region activity changed");
            }
        }
    }
}

impl PartitionService for WorldGrid {
    fn regions(&self) -> &[Arc<Region>] {
        &self.regions
    }

    fn region(&self, id: RegionId) -> Option<Arc<Region>> {
        let index = usize::try_from(id.into_inner()).ok()?;
        self.regions.get(index).cloned()
    }
}

/// Row-major region id of cell `(x, y)`.
fn cell_id(x: u32, y: u32, width: u32) -> RegionId {
    RegionId(y.saturating_mul(width).saturating_add(x))
}

/// The 3x3 block of cells around `(x, y)`, clipped to the grid.
fn neighborhood(x: u32, y: u32, width: u32, height: u32) -> Vec<RegionId> {
    let x_max = x.saturating_add(1).min(width.saturating_sub(1));
    let y_max = y.saturating_add(1).min(height.saturating_sub(1));
    let mut ids = Vec::with_capacity(9);
    for ny in y.saturating_sub(1)..=y_max {
        for nx in x.saturating_sub(1)..=x_max {
            ids.push(cell_id(nx, ny, width));
        }
    }
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sightline_types::{ObjectId, ObjectKind};

    use super::*;

    fn grid() -> WorldGrid {
        WorldGrid::new(4, 4, 100).unwrap()
    }

    fn spawn(grid: &WorldGrid, id: u32, kind: ObjectKind, x: i32, y: i32) -> Arc<WorldObject> {
        let object = WorldObject::builder(ObjectId(id), kind).build();
        grid.spawn(&object, Position::new(x, y, 0)).unwrap();
        object
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            WorldGrid::new(0, 4, 100),
            Err(WorldError::InvalidDimensions { .. })
        ));
        assert!(WorldGrid::new(4, 4, 0).is_err());
    }

    #[test]
    fn corner_has_four_neighbors_and_center_nine() {
        let grid = grid();
        assert_eq!(grid.region(RegionId(0)).unwrap().neighbor_ids().len(), 4);
        assert_eq!(grid.region(RegionId(5)).unwrap().neighbor_ids().len(), 9);
        assert!(grid.is_neighbor(RegionId(0), RegionId(5)));
        assert!(!grid.is_neighbor(RegionId(0), RegionId(2)));
    }

    #[test]
    fn positions_map_to_cells() {
        let grid = grid();
        assert_eq!(grid.region_at(Position::new(150, 250, 0)).unwrap().id(), RegionId(9));
        assert!(matches!(
            grid.region_at(Position::new(-1, 0, 0)),
            Err(WorldError::OutOfBounds { .. })
        ));
        assert!(grid.region_at(Position::new(400, 0, 0)).is_err());
    }

    #[test]
    fn players_activate_their_neighborhood() {
        let grid = grid();
        let player = spawn(&grid, 1, ObjectKind::Player, 50, 50);
        assert!(grid.region(RegionId(0)).unwrap().is_active());
        assert!(grid.region(RegionId(5)).unwrap().is_active());
        assert!(!grid.region(RegionId(2)).unwrap().is_active());

        grid.move_to(&player, Position::new(350, 350, 0)).unwrap();
        assert!(!grid.region(RegionId(0)).unwrap().is_active());
        assert!(grid.region(RegionId(15)).unwrap().is_active());
        assert!(grid.region(RegionId(10)).unwrap().is_active());
    }

    #[test]
    fn npcs_do_not_activate_regions() {
        let grid = grid();
        spawn(&grid, 1, ObjectKind::Monster, 50, 50);
        assert_eq!(grid.active_region_count(), 0);
    }

    #[test]
    fn double_spawn_is_rejected() {
        let grid = grid();
        let npc = spawn(&grid, 1, ObjectKind::Npc, 50, 50);
        assert!(matches!(
            grid.spawn(&npc, Position::new(60, 60, 0)),
            Err(WorldError::AlreadySpawned(_))
        ));
    }

    #[test]
    fn despawn_makes_neighbors_forget() {
        let grid = grid();
        let player = spawn(&grid, 1, ObjectKind::Player, 50, 50);
        let npc = spawn(&grid, 2, ObjectKind::Npc, 150, 50);
        player.add_known_object(&npc);
        npc.add_known_object(&player);

        grid.despawn(&npc).unwrap();
        assert!(!player.knows(npc.id()));
        assert!(npc.known_list().is_empty());
        assert!(!npc.is_visible());
        assert!(matches!(grid.despawn(&npc), Err(WorldError::NotSpawned(_))));
    }

    #[test]
    fn despawn_reaches_observers_that_moved_away() {
        let grid = WorldGrid::new(6, 1, 100).unwrap();
        let player = spawn(&grid, 1, ObjectKind::Player, 50, 50);
        let npc = spawn(&grid, 2, ObjectKind::Npc, 150, 50);
        player.add_known_object(&npc);

        grid.move_to(&player, Position::new(450, 50, 0)).unwrap();
        assert!(!grid.is_neighbor(player.region_id().unwrap(), npc.region_id().unwrap()));
        assert!(player.knows(npc.id()));

        grid.despawn(&npc).unwrap();
        assert!(!player.knows(npc.id()));
    }

    #[test]
    fn move_within_a_cell_keeps_the_region() {
        let grid = grid();
        let npc = spawn(&grid, 1, ObjectKind::Npc, 10, 10);
        assert_eq!(grid.move_to(&npc, Position::new(90, 90, 0)).unwrap(), RegionId(0));
        assert_eq!(grid.move_to(&npc, Position::new(110, 90, 0)).unwrap(), RegionId(1));
        assert!(!grid.region(RegionId(0)).unwrap().contains(npc.id()));
        assert_eq!(grid.object_count(), 1);
    }
}
