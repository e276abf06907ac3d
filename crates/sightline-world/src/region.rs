//! A single cell of the world partition.
//!
//! Regions are created once when the partition is set up and live for the
//! rest of the process. Membership maps change on spawn, despawn, and
//! movement; the refresh scheduler only reads them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use sightline_types::{ObjectId, RegionId};

use crate::object::WorldObject;
use crate::sync;

/// One grid cell and the objects currently resident in it.
#[derive(Debug)]
pub struct Region {
    /// Region identity.
    id: RegionId,
    /// Neighboring regions, including this region itself.
    neighbors: Vec<RegionId>,
    /// All resident objects.
    objects: RwLock<HashMap<ObjectId, Arc<WorldObject>>>,
    /// The player-controlled subset of `objects`.
    playables: RwLock<HashMap<ObjectId, Arc<WorldObject>>>,
    /// Whether the region currently matters for gameplay.
    active: AtomicBool,
}

impl Region {
    /// Create an empty, inactive region.
    pub fn new(id: RegionId, neighbors: Vec<RegionId>) -> Self {
        Self {
            id,
            neighbors,
            objects: RwLock::new(HashMap::new()),
            playables: RwLock::new(HashMap::new()),
            active: AtomicBool::new(false),
        }
    }

    /// Return the region id.
    pub const fn id(&self) -> RegionId {
        self.id
    }

    /// Return the precomputed neighbor list (this region included).
    pub fn neighbor_ids(&self) -> &[RegionId] {
        &self.neighbors
    }

    /// Whether `other` is in this region's neighborhood.
    pub fn borders(&self, other: RegionId) -> bool {
        self.neighbors.contains(&other)
    }

    /// Whether the region currently matters for gameplay.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Set the active flag. Returns the previous value.
    pub fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    /// Snapshot of all resident objects.
    pub fn objects(&self) -> Vec<Arc<WorldObject>> {
        sync::read(&self.objects).values().cloned().collect()
    }

    /// Snapshot of resident player-controlled objects.
    pub fn playables(&self) -> Vec<Arc<WorldObject>> {
        sync::read(&self.playables).values().cloned().collect()
    }

    /// Number of resident objects.
    pub fn object_count(&self) -> usize {
        sync::read(&self.objects).len()
    }

    /// Whether any player-controlled object resides here.
    pub fn has_playables(&self) -> bool {
        !sync::read(&self.playables).is_empty()
    }

    /// Whether the object with id `id` resides here.
    pub fn contains(&self, id: ObjectId) -> bool {
        sync::read(&self.objects).contains_key(&id)
    }

    /// Record `object` as resident.
    pub fn add_object(&self, object: &Arc<WorldObject>) {
        sync::write(&self.objects).insert(object.id(), Arc::clone(object));
        if object.kind().is_playable() {
            sync::write(&self.playables).insert(object.id(), Arc::clone(object));
        }
    }

    /// Drop the object with id `id` from residency. Returns `true` if it
    /// was resident.
    pub fn remove_object(&self, id: ObjectId) -> bool {
        sync::write(&self.playables).remove(&id);
        sync::write(&self.objects).remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use sightline_types::ObjectKind;

    use super::*;

    #[test]
    fn playables_are_a_subset_of_objects() {
        let region = Region::new(RegionId(0), vec![RegionId(0)]);
        let player = WorldObject::builder(ObjectId(1), ObjectKind::Player).build();
        let npc = WorldObject::builder(ObjectId(2), ObjectKind::Npc).build();
        region.add_object(&player);
        region.add_object(&npc);

        assert_eq!(region.object_count(), 2);
        assert_eq!(region.playables().len(), 1);
        assert!(region.has_playables());

        assert!(region.remove_object(player.id()));
        assert!(!region.has_playables());
        assert!(!region.remove_object(player.id()));
    }

    #[test]
    fn borders_itself() {
        let region = Region::new(RegionId(4), vec![RegionId(3), RegionId(4), RegionId(5)]);
        assert!(region.borders(RegionId(4)));
        assert!(!region.borders(RegionId(9)));
    }
}
