//! Known-list refresh scheduler.
//!
//! A single periodic job walks every active region and reconciles the known
//! list of each resident object. Two signals alternate across cycles:
//!
//! - **Pass kind** flips every cycle. A *forget* pass drops entries that
//!   left range; an *add* pass discovers new objects in the surrounding
//!   regions. An object never runs both phases in one cycle.
//! - **Full-update countdown** runs from the configured period down to
//!   zero. The cycle on which it reads zero is a *full update*: every
//!   object scans every neighbor exhaustively (add pass) or re-checks every
//!   entry (forget pass).
//!
//! Visibility on add passes is asymmetric by kind. Playable objects scan
//! the whole membership of every neighbor region. Dangerous NPCs scan the
//! whole membership of active neighbors only. Every other character only
//! looks for playable objects in active neighbors, so harmless NPCs never
//! pay for discovering each other.
//!
//! A region whose processing fails is logged, recorded in the
//! [`FailedRegionSet`], and the cycle moves on. On the next cycle that
//! region is processed as a full update; once that pass succeeds it leaves
//! the set. Staleness is therefore bounded by the full-update period, and
//! by one cycle after a failure.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use sightline_types::{ObjectKind, RegionId};
use sightline_world::{PartitionService, Region, WorldError, WorldObject};
use tracing::{debug, info, warn};

use crate::config::{PolicyConfig, RefreshConfig};
use crate::service::{self, ServiceHandle};

/// Errors raised while refreshing one region.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The region's neighborhood could not be resolved.
    #[error("cannot resolve neighbors of region {region}: {source}")]
    Neighbors {
        /// The region being processed.
        region: RegionId,
        /// The underlying world error.
        source: WorldError,
    },
}

/// Regions whose most recent refresh failed.
///
/// Owned by whoever builds the scheduler and handed in at construction, so
/// it can be inspected (or pre-seeded) from outside.
#[derive(Debug, Default)]
pub struct FailedRegionSet {
    /// Failed region ids.
    regions: Mutex<HashSet<RegionId>>,
}

impl FailedRegionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Returns `true` if the region was not yet recorded.
    pub fn insert(&self, region: RegionId) -> bool {
        self.lock().insert(region)
    }

    /// Clear a failure. Returns `true` if the region was recorded.
    pub fn remove(&self, region: RegionId) -> bool {
        self.lock().remove(&region)
    }

    /// Whether the region's last refresh failed.
    pub fn contains(&self, region: RegionId) -> bool {
        self.lock().contains(&region)
    }

    /// Number of failed regions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no region is marked failed.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the failed region ids.
    pub fn region_ids(&self) -> Vec<RegionId> {
        self.lock().iter().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<RegionId>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Which phase a cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Objects forgot what left range.
    Forget,
    /// Objects discovered what entered range.
    Add,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Phase the cycle ran.
    pub pass: PassKind,
    /// Whether the cycle was a scheduled full update.
    pub full_update: bool,
    /// Active regions processed without error.
    pub regions_processed: usize,
    /// Inactive regions skipped.
    pub regions_skipped: usize,
    /// Regions whose processing failed this cycle.
    pub regions_failed: Vec<RegionId>,
    /// Regions processed as a full update because they failed last cycle.
    pub regions_forced_full: Vec<RegionId>,
    /// Previously failed regions that succeeded this cycle.
    pub regions_recovered: Vec<RegionId>,
    /// Known-list entries added.
    pub added: usize,
    /// Known-list entries removed.
    pub removed: usize,
}

impl CycleReport {
    const fn new(pass: PassKind, full_update: bool) -> Self {
        Self {
            pass,
            full_update,
            regions_processed: 0,
            regions_skipped: 0,
            regions_failed: Vec::new(),
            regions_forced_full: Vec::new(),
            regions_recovered: Vec::new(),
            added: 0,
            removed: 0,
        }
    }
}

/// Edge changes produced while processing one region.
#[derive(Debug, Default, Clone, Copy)]
struct RegionDelta {
    added: usize,
    removed: usize,
}

/// The alternating cycle signals.
#[derive(Debug)]
struct CycleState {
    /// `true` when the next cycle is a forget pass.
    forget_pass: bool,
    /// Cycles left until the next full update; zero means "this one".
    full_update_countdown: u32,
}

/// The known-list refresh scheduler.
pub struct KnownListRefresher {
    /// Source of regions and neighborhoods.
    partition: Arc<dyn PartitionService>,
    /// Regions that need a forced full resync.
    failed: Arc<FailedRegionSet>,
    /// Global policy switches.
    policy: PolicyConfig,
    /// Countdown reset value.
    full_update_period: u32,
    /// Alternating signals, advanced once per cycle.
    state: Mutex<CycleState>,
}

impl std::fmt::Debug for KnownListRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownListRefresher")
            .field("regions", &self.partition.regions().len())
            .field("failed", &self.failed)
            .field("policy", &self.policy)
            .field("full_update_period", &self.full_update_period)
            .finish_non_exhaustive()
    }
}

impl KnownListRefresher {
    /// Create a scheduler over `partition`.
    ///
    /// The first cycle is a full add pass, so a freshly populated world is
    /// reconciled immediately.
    pub fn new(
        partition: Arc<dyn PartitionService>,
        failed: Arc<FailedRegionSet>,
        config: &RefreshConfig,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            partition,
            failed,
            policy,
            full_update_period: config.full_update_period,
            state: Mutex::new(CycleState {
                forget_pass: false,
                full_update_countdown: 0,
            }),
        }
    }

    /// The set of regions awaiting a forced resync.
    pub const fn failed_regions(&self) -> &Arc<FailedRegionSet> {
        &self.failed
    }

    /// Start running cycles every `config.interval_ms` on the tokio
    /// runtime. Cycles never overlap.
    pub fn start(self: &Arc<Self>, config: &RefreshConfig) -> ServiceHandle {
        let refresher = Arc::clone(self);
        service::spawn_periodic("known-list-refresh", config.interval(), move || {
            refresher.run_cycle();
        })
    }

    /// Run one refresh cycle over every region.
    pub fn run_cycle(&self) -> CycleReport {
        let (forget_pass, full_update) = {
            let state = self.lock_state();
            (state.forget_pass, state.full_update_countdown == 0)
        };
        let pass = if forget_pass {
            PassKind::Forget
        } else {
            PassKind::Add
        };
        let mut report = CycleReport::new(pass, full_update);

        for region in self.partition.regions() {
            let failed_last_time = self.failed.contains(region.id());
            if !region.is_active() {
                report.regions_skipped = report.regions_skipped.saturating_add(1);
                continue;
            }
            if failed_last_time {
                report.regions_forced_full.push(region.id());
            }

            match self.update_region(region, full_update || failed_last_time, forget_pass) {
                Ok(delta) => {
                    report.regions_processed = report.regions_processed.saturating_add(1);
                    report.added = report.added.saturating_add(delta.added);
                    report.removed = report.removed.saturating_add(delta.removed);
                    if failed_last_time && self.failed.remove(region.id()) {
                        info!(region = %region.id(), "region refresh recovered");
                        report.regions_recovered.push(region.id());
                    }
                }
                Err(err) => {
                    warn!(region = %region.id(), error = %err, "known-list refresh failed for region");
                    self.failed.insert(region.id());
                    report.regions_failed.push(region.id());
                }
            }
        }

        self.advance_state();
        debug!(
            pass = ?report.pass,
            full_update = report.full_update,
            processed = report.regions_processed,
            skipped = report.regions_skipped,
            failed = report.regions_failed.len(),
            added = report.added,
            removed = report.removed,
            "known-list refresh cycle complete"
        );
        report
    }

    /// Flip the pass kind and step the full-update countdown.
    fn advance_state(&self) {
        let mut state = self.lock_state();
        state.forget_pass = !state.forget_pass;
        state.full_update_countdown = match state.full_update_countdown.checked_sub(1) {
            Some(remaining) => remaining,
            None => self.full_update_period,
        };
    }

    /// Reconcile the known list of every visible resident of `region`.
    fn update_region(
        &self,
        region: &Region,
        full_update: bool,
        forget_pass: bool,
    ) -> Result<RegionDelta, RefreshError> {
        let neighbors = self
            .partition
            .neighbors(region)
            .map_err(|source| RefreshError::Neighbors {
                region: region.id(),
                source,
            })?;

        let mut delta = RegionDelta::default();
        for object in region.objects() {
            if !object.is_visible() {
                continue;
            }
            let aggro = self.is_aggro(&object);

            if forget_pass {
                let removed = object.known_list().forget_objects(
                    &object,
                    aggro || full_update,
                    |known| self.still_in_range(&object, known),
                );
                delta.removed = delta.removed.saturating_add(removed);
                continue;
            }

            for neighbor in &neighbors {
                let candidates = if object.kind().is_playable()
                    || (aggro && neighbor.is_active())
                    || full_update
                {
                    neighbor.objects()
                } else if object.kind().is_character() && neighbor.is_active() {
                    neighbor.playables()
                } else {
                    continue;
                };

                for other in candidates {
                    if other.is_visible() && object.add_known_object(&other) {
                        delta.added = delta.added.saturating_add(1);
                    }
                }
            }
        }
        Ok(delta)
    }

    /// Whether `object` hunts other NPCs and so needs the wider scan.
    const fn is_aggro(&self, object: &WorldObject) -> bool {
        match object.kind() {
            ObjectKind::Guard => self.policy.guard_attack_aggro_mob,
            ObjectKind::Monster => object.traits().aggressive || object.traits().has_rival_faction,
            ObjectKind::Player
            | ObjectKind::Companion
            | ObjectKind::Npc
            | ObjectKind::Trap
            | ObjectKind::Item => false,
        }
    }

    /// Whether `known` is still visible and within `owner`'s neighborhood.
    fn still_in_range(&self, owner: &WorldObject, known: &WorldObject) -> bool {
        if !known.is_visible() {
            return false;
        }
        match (owner.region_id(), known.region_id()) {
            (Some(here), Some(there)) => self.partition.is_neighbor(here, there),
            _ => false,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sightline_types::ObjectId;
    use sightline_world::{ObjectTraits, Position, WorldGrid};

    use super::*;

    /// A 3x1 strip of 100-unit cells: regions 0, 1, 2.
    fn strip() -> Arc<WorldGrid> {
        Arc::new(WorldGrid::new(3, 1, 100).unwrap())
    }

    fn refresher(grid: &Arc<WorldGrid>, period: u32, policy: PolicyConfig) -> KnownListRefresher {
        let config = RefreshConfig {
            interval_ms: 10,
            full_update_period: period,
        };
        KnownListRefresher::new(
            Arc::clone(grid) as Arc<dyn PartitionService>,
            Arc::new(FailedRegionSet::new()),
            &config,
            policy,
        )
    }

    fn spawn(grid: &WorldGrid, id: u32, kind: ObjectKind, x: i32) -> Arc<WorldObject> {
        let object = WorldObject::builder(ObjectId(id), kind).build();
        grid.spawn(&object, Position::new(x, 50, 0)).unwrap();
        object
    }

    #[test]
    fn passes_alternate_starting_with_a_full_add() {
        let grid = strip();
        let refresher = refresher(&grid, 2, PolicyConfig::default());

        let kinds: Vec<(PassKind, bool)> = (0..6)
            .map(|_| {
                let report = refresher.run_cycle();
                (report.pass, report.full_update)
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (PassKind::Add, true),
                (PassKind::Forget, false),
                (PassKind::Add, false),
                (PassKind::Forget, true),
                (PassKind::Add, false),
                (PassKind::Forget, false),
            ]
        );
    }

    #[test]
    fn inactive_regions_are_skipped() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        spawn(&grid, 1, ObjectKind::Npc, 50);
        let report = refresher.run_cycle();
        assert_eq!(report.regions_skipped, 3);
        assert_eq!(report.regions_processed, 0);
    }

    #[test]
    fn players_learn_everything_in_their_neighborhood() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        let player = spawn(&grid, 1, ObjectKind::Player, 50);
        let npc = spawn(&grid, 2, ObjectKind::Npc, 150);
        let item = spawn(&grid, 3, ObjectKind::Item, 150);
        let far = spawn(&grid, 4, ObjectKind::Npc, 250);

        refresher.run_cycle();
        assert!(player.knows(npc.id()));
        assert!(player.knows(item.id()));
        assert!(!player.knows(far.id()));
    }

    #[test]
    fn harmless_npcs_only_discover_playables() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        let player = spawn(&grid, 1, ObjectKind::Player, 50);
        let npc_a = spawn(&grid, 2, ObjectKind::Npc, 60);
        let npc_b = spawn(&grid, 3, ObjectKind::Npc, 70);

        // Skip the opening full update so the differential rules apply.
        refresher.run_cycle();
        npc_a.known_list().clear();
        refresher.run_cycle();
        refresher.run_cycle();

        assert!(npc_a.knows(player.id()));
        assert!(!npc_a.knows(npc_b.id()));
    }

    #[test]
    fn aggressive_monsters_discover_npcs_in_active_regions() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        spawn(&grid, 1, ObjectKind::Player, 50);
        let monster = WorldObject::builder(ObjectId(2), ObjectKind::Monster)
            .traits(ObjectTraits {
                aggressive: true,
                ..ObjectTraits::default()
            })
            .build();
        grid.spawn(&monster, Position::new(60, 50, 0)).unwrap();
        let npc = spawn(&grid, 3, ObjectKind::Npc, 150);

        refresher.run_cycle();
        monster.known_list().clear();
        refresher.run_cycle();
        refresher.run_cycle();
        assert!(monster.knows(npc.id()));
    }

    #[test]
    fn aggressive_monsters_skip_inactive_neighbors_between_full_updates() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        // Region 0 holds the player, so regions 0 and 1 are active and
        // region 2 is not.
        let player = spawn(&grid, 1, ObjectKind::Player, 50);
        let monster = WorldObject::builder(ObjectId(2), ObjectKind::Monster)
            .traits(ObjectTraits {
                aggressive: true,
                ..ObjectTraits::default()
            })
            .build();
        grid.spawn(&monster, Position::new(150, 50, 0)).unwrap();
        let npc = spawn(&grid, 3, ObjectKind::Npc, 250);
        assert!(grid.region(RegionId(1)).unwrap().is_active());
        assert!(!grid.region(RegionId(2)).unwrap().is_active());

        let full = refresher.run_cycle();
        assert!(full.full_update);
        assert!(monster.knows(npc.id()));

        monster.known_list().clear();
        refresher.run_cycle();
        let add = refresher.run_cycle();
        assert_eq!(add.pass, PassKind::Add);
        assert!(!add.full_update);
        assert!(monster.knows(player.id()));
        assert!(!monster.knows(npc.id()));
    }

    #[test]
    fn forget_pass_drops_objects_that_left_range() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        let player = spawn(&grid, 1, ObjectKind::Player, 50);
        let wanderer = spawn(&grid, 2, ObjectKind::Player, 60);

        refresher.run_cycle();
        assert!(player.knows(wanderer.id()));

        grid.move_to(&wanderer, Position::new(250, 50, 0)).unwrap();
        let report = refresher.run_cycle();
        assert_eq!(report.pass, PassKind::Forget);
        assert!(!player.knows(wanderer.id()));
        assert!(report.removed >= 1);
    }

    #[test]
    fn differential_forget_leaves_non_playables_for_full_scans() {
        let grid = strip();
        let refresher = refresher(&grid, 100, PolicyConfig::default());
        let player = spawn(&grid, 1, ObjectKind::Player, 50);
        let npc = spawn(&grid, 2, ObjectKind::Npc, 60);

        refresher.run_cycle();
        assert!(player.knows(npc.id()));

        grid.move_to(&npc, Position::new(250, 50, 0)).unwrap();
        refresher.run_cycle();
        assert!(player.knows(npc.id()));
    }

    /// Partition wrapper whose neighbor lookup fails for chosen regions.
    struct FlakyPartition {
        inner: Arc<WorldGrid>,
        failing: Mutex<HashSet<RegionId>>,
    }

    impl PartitionService for FlakyPartition {
        fn regions(&self) -> &[Arc<Region>] {
            self.inner.regions()
        }

        fn region(&self, id: RegionId) -> Option<Arc<Region>> {
            self.inner.region(id)
        }

        fn neighbors(&self, region: &Region) -> Result<Vec<Arc<Region>>, WorldError> {
            if self.failing.lock().unwrap().contains(&region.id()) {
                return Err(WorldError::RegionNotFound(region.id()));
            }
            self.inner.neighbors(region)
        }
    }

    #[test]
    fn failed_region_is_isolated_then_force_resynced() {
        let grid = strip();
        let partition = Arc::new(FlakyPartition {
            inner: Arc::clone(&grid),
            failing: Mutex::new(HashSet::from([RegionId(0)])),
        });
        let failed = Arc::new(FailedRegionSet::new());
        let refresher = KnownListRefresher::new(
            Arc::clone(&partition) as Arc<dyn PartitionService>,
            Arc::clone(&failed),
            &RefreshConfig::default(),
            PolicyConfig::default(),
        );
        let player = spawn(&grid, 1, ObjectKind::Player, 50);
        let npc = spawn(&grid, 2, ObjectKind::Npc, 60);
        let other_player = spawn(&grid, 3, ObjectKind::Player, 150);

        let first = refresher.run_cycle();
        assert_eq!(first.regions_failed, vec![RegionId(0)]);
        assert!(failed.contains(RegionId(0)));
        assert!(!player.knows(npc.id()));
        // Region 1 was processed despite region 0 failing.
        assert!(other_player.knows(player.id()));

        partition.failing.lock().unwrap().clear();
        let second = refresher.run_cycle();
        assert_eq!(second.pass, PassKind::Forget);
        assert!(!second.full_update);
        assert_eq!(second.regions_forced_full, vec![RegionId(0)]);
        assert_eq!(second.regions_recovered, vec![RegionId(0)]);
        assert!(failed.is_empty());

        let third = refresher.run_cycle();
        assert!(third.regions_forced_full.is_empty());
        assert!(player.knows(npc.id()));
    }

    #[test]
    fn failure_in_an_inactive_region_waits_for_activity() {
        let grid = strip();
        let failed = Arc::new(FailedRegionSet::new());
        failed.insert(RegionId(2));
        let refresher = KnownListRefresher::new(
            Arc::clone(&grid) as Arc<dyn PartitionService>,
            Arc::clone(&failed),
            &RefreshConfig::default(),
            PolicyConfig::default(),
        );
        spawn(&grid, 1, ObjectKind::Player, 50);

        refresher.run_cycle();
        assert!(failed.contains(RegionId(2)));
    }
}
