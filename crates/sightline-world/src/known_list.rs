//! Per-object registry of the other objects it currently knows.
//!
//! A [`KnownList`] is owned by exactly one [`WorldObject`] and maps known
//! object ids to weak references, so knowing an object never keeps it
//! alive. Membership is not symmetric: `A` knowing `B` says nothing about
//! `B` knowing `A`. Each side is reconciled by the refresh pass that
//! processes that side.
//!
//! Derived behavior (AI wake-ups, client notifications) is layered on with
//! a [`KnownListHooks`] implementation chosen per actor kind. Hooks react
//! to single membership edges and run after the map lock is released, so
//! they are free to touch other objects' known lists.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use sightline_types::ObjectId;

use crate::object::WorldObject;
use crate::sync;

/// Extension points invoked after a known-list membership edge changes.
///
/// Implementations must be idempotent: re-entering a state the owner is
/// already in is a no-op, never an error. They must not remove the entry
/// that was just added, and they must not re-scan the whole known list.
pub trait KnownListHooks: Send + Sync + fmt::Debug {
    /// Called after `object` was added to `owner`'s known list.
    fn on_known(&self, owner: &WorldObject, object: &Arc<WorldObject>) {
        let _ = (owner, object);
    }

    /// Called after `object` was removed from `owner`'s known list.
    ///
    /// `forget` is `true` when the object is gone for good (destroyed or
    /// despawned) and `false` when it merely left range.
    fn on_forgotten(&self, owner: &WorldObject, object: &Arc<WorldObject>, forget: bool) {
        let _ = (owner, object, forget);
    }
}

/// Hooks that do nothing; the default for inert objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl KnownListHooks for NoHooks {}

/// The set of objects one world object currently knows.
#[derive(Debug)]
pub struct KnownList {
    /// Known object id -> non-owning reference.
    known: RwLock<HashMap<ObjectId, Weak<WorldObject>>>,
    /// Per-kind reactions to membership changes.
    hooks: Arc<dyn KnownListHooks>,
}

impl KnownList {
    /// Create an empty known list with the given hooks.
    pub fn new(hooks: Arc<dyn KnownListHooks>) -> Self {
        Self {
            known: RwLock::new(HashMap::new()),
            hooks,
        }
    }

    /// Add `object` to the list owned by `owner`.
    ///
    /// Returns `false` without mutating anything when `object` is the
    /// owner itself or is already known. On success the post-add hook runs
    /// before `true` is returned.
    pub fn add_known_object(&self, owner: &WorldObject, object: &Arc<WorldObject>) -> bool {
        if object.id() == owner.id() {
            return false;
        }

        {
            let mut known = sync::write(&self.known);
            match known.entry(object.id()) {
                Entry::Occupied(mut slot) => {
                    // A live entry means the object is already known. A dead
                    // one belonged to a previous incarnation of the id.
                    if slot.get().strong_count() > 0 {
                        return false;
                    }
                    slot.insert(Arc::downgrade(object));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::downgrade(object));
                }
            }
        }

        self.hooks.on_known(owner, object);
        true
    }

    /// Remove `object` from the list owned by `owner`.
    ///
    /// Returns `false` when the object is not known. On success the
    /// post-remove hook runs before `true` is returned.
    pub fn remove_known_object(
        &self,
        owner: &WorldObject,
        object: &Arc<WorldObject>,
        forget: bool,
    ) -> bool {
        if sync::write(&self.known).remove(&object.id()).is_none() {
            return false;
        }

        self.hooks.on_forgotten(owner, object, forget);
        true
    }

    /// Drop every entry that no longer satisfies `still_known`.
    ///
    /// With `full_scan` every entry is re-evaluated. Without it only
    /// playable entries are checked, since those are the ones that can
    /// leave range quickly. Entries whose object has been dropped are
    /// purged silently in both modes. Returns the number of entries removed
    /// through [`remove_known_object`](Self::remove_known_object).
    pub fn forget_objects<F>(&self, owner: &WorldObject, full_scan: bool, still_known: F) -> usize
    where
        F: Fn(&WorldObject) -> bool,
    {
        let snapshot: Vec<(ObjectId, Weak<WorldObject>)> = sync::read(&self.known)
            .iter()
            .map(|(id, weak)| (*id, Weak::clone(weak)))
            .collect();

        let mut removed: usize = 0;
        for (id, weak) in snapshot {
            let Some(object) = weak.upgrade() else {
                let mut known = sync::write(&self.known);
                if known.get(&id).is_some_and(|current| current.ptr_eq(&weak)) {
                    known.remove(&id);
                }
                continue;
            };

            if !full_scan && !object.kind().is_playable() {
                continue;
            }

            if !still_known(&object) && self.remove_known_object(owner, &object, true) {
                removed = removed.saturating_add(1);
            }
        }
        removed
    }

    /// Remove every entry without running hooks.
    ///
    /// Used when the owner itself leaves the world. Returns how many
    /// entries were dropped.
    pub fn clear(&self) -> usize {
        let mut known = sync::write(&self.known);
        let count = known.len();
        known.clear();
        count
    }

    /// Whether an object with this id is known.
    pub fn contains(&self, id: ObjectId) -> bool {
        sync::read(&self.known)
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of entries, including any not yet purged.
    pub fn len(&self) -> usize {
        sync::read(&self.known).len()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        sync::read(&self.known).is_empty()
    }

    /// Ids of all known objects.
    pub fn known_ids(&self) -> Vec<ObjectId> {
        sync::read(&self.known).keys().copied().collect()
    }

    /// All known objects that are still alive.
    pub fn known_objects(&self) -> Vec<Arc<WorldObject>> {
        sync::read(&self.known)
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Known objects that are player-controlled.
    pub fn known_playables(&self) -> Vec<Arc<WorldObject>> {
        self.known_objects()
            .into_iter()
            .filter(|object| object.kind().is_playable())
            .collect()
    }
}
