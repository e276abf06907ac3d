//! Seeds the world with a demo population.
//!
//! Counts come from the `world` config section. Positions and traits are
//! drawn from a seeded RNG so two runs with the same seed lay out the same
//! world.

use std::sync::Arc;

use rand::Rng;
use sightline_core::runtime::Runtime;
use sightline_types::{ObjectId, ObjectKind};
use sightline_world::{Assistant, AssistantKind, ObjectTraits, Position, WorldObject};
use tracing::info;

use crate::error::EngineError;

/// First id handed out to spawned objects.
const FIRST_OBJECT_ID: u32 = 0x1000_0000;

/// Percent of players spawned with negative reputation.
const OUTLAW_PERCENT: u32 = 10;

/// Percent of players that bring a companion.
const COMPANION_PERCENT: u32 = 30;

/// Percent of monsters that attack on sight.
const AGGRESSIVE_PERCENT: u32 = 50;

/// Percent of monsters with a rival faction.
const RIVAL_FACTION_PERCENT: u32 = 10;

/// Percent of guards that walk a fixed route.
const PATROL_PERCENT: u32 = 20;

/// Everything the spawner placed, grouped by role.
#[derive(Debug, Default)]
pub struct Population {
    /// Player characters.
    pub players: Vec<Arc<WorldObject>>,
    /// Companions, each attached to a player.
    pub companions: Vec<Arc<WorldObject>>,
    /// Town guards.
    pub guards: Vec<Arc<WorldObject>>,
    /// Monsters.
    pub monsters: Vec<Arc<WorldObject>>,
    /// Harmless NPCs.
    pub npcs: Vec<Arc<WorldObject>>,
    /// Ground items.
    pub items: Vec<Arc<WorldObject>>,
}

impl Population {
    /// Total number of spawned objects.
    pub fn len(&self) -> usize {
        [
            self.players.len(),
            self.companions.len(),
            self.guards.len(),
            self.monsters.len(),
            self.npcs.len(),
            self.items.len(),
        ]
        .iter()
        .sum()
    }

    /// Whether nothing was spawned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hands out consecutive object ids and random positions.
struct Placer<'a, R: Rng> {
    runtime: &'a Runtime,
    rng: &'a mut R,
    next_id: u32,
    extent_x: i32,
    extent_y: i32,
}

impl<R: Rng> Placer<'_, R> {
    fn next_id(&mut self) -> Result<ObjectId, EngineError> {
        let id = ObjectId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| EngineError::Spawner {
                message: "object id space exhausted".to_owned(),
            })?;
        Ok(id)
    }

    fn random_position(&mut self) -> Position {
        Position::new(
            self.rng.random_range(0..self.extent_x),
            self.rng.random_range(0..self.extent_y),
            0,
        )
    }

    fn roll(&mut self, percent: u32) -> bool {
        self.rng.random_range(0..100) < percent
    }

    fn place(&mut self, object: &Arc<WorldObject>) -> Result<(), EngineError> {
        let position = self.random_position();
        self.runtime.spawn(object, position)?;
        Ok(())
    }
}

/// World extent in world units along one axis.
fn extent(cells: u32, cell_size: u32) -> Result<i32, EngineError> {
    cells
        .checked_mul(cell_size)
        .and_then(|units| i32::try_from(units).ok())
        .ok_or_else(|| EngineError::Spawner {
            message: format!("world of {cells} cells of {cell_size} units does not fit i32"),
        })
}

/// Spawn the configured demo population into `runtime`'s world.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if the world extent does not fit the
/// coordinate space, or [`EngineError::World`] if a spawn fails.
pub fn seed_population<R: Rng>(runtime: &Runtime, rng: &mut R) -> Result<Population, EngineError> {
    let world = runtime.config().world.clone();
    let mut placer = Placer {
        runtime,
        rng,
        next_id: FIRST_OBJECT_ID,
        extent_x: extent(world.width, world.cell_size)?,
        extent_y: extent(world.height, world.cell_size)?,
    };
    let mut population = Population::default();

    for _ in 0..world.players {
        let reputation = if placer.roll(OUTLAW_PERCENT) { -100 } else { 0 };
        let player = runtime
            .object(placer.next_id()?, ObjectKind::Player)
            .reputation(reputation)
            .build();
        player.add_assistant(Arc::new(Assistant::new(AssistantKind::Healing)));
        player.add_assistant(Arc::new(Assistant::new(AssistantKind::Offensive)));
        placer.place(&player)?;

        if placer.roll(COMPANION_PERCENT) {
            let companion = runtime
                .object(placer.next_id()?, ObjectKind::Companion)
                .controlled_by(&player)
                .build();
            runtime.spawn(&companion, player.position())?;
            player.set_companion(&companion);
            population.companions.push(companion);
        }
        population.players.push(player);
    }

    for _ in 0..world.guards {
        let traits = ObjectTraits {
            stationary_patrol: placer.roll(PATROL_PERCENT),
            ..ObjectTraits::default()
        };
        let guard = runtime
            .object(placer.next_id()?, ObjectKind::Guard)
            .traits(traits)
            .build();
        placer.place(&guard)?;
        population.guards.push(guard);
    }

    for _ in 0..world.monsters {
        let traits = ObjectTraits {
            aggressive: placer.roll(AGGRESSIVE_PERCENT),
            has_rival_faction: placer.roll(RIVAL_FACTION_PERCENT),
            ..ObjectTraits::default()
        };
        let monster = runtime
            .object(placer.next_id()?, ObjectKind::Monster)
            .traits(traits)
            .build();
        placer.place(&monster)?;
        population.monsters.push(monster);
    }

    for _ in 0..world.npcs {
        let npc = runtime.object(placer.next_id()?, ObjectKind::Npc).build();
        placer.place(&npc)?;
        population.npcs.push(npc);
    }

    for _ in 0..world.items {
        let item = runtime.object(placer.next_id()?, ObjectKind::Item).build();
        placer.place(&item)?;
        population.items.push(item);
    }

    info!(
        players = population.players.len(),
        companions = population.companions.len(),
        guards = population.guards.len(),
        monsters = population.monsters.len(),
        npcs = population.npcs.len(),
        items = population.items.len(),
        "demo population spawned"
    );
    Ok(population)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sightline_core::config::SightlineConfig;
    use sightline_core::notify::NullNotifier;

    use super::*;

    fn runtime() -> Runtime {
        let mut config = SightlineConfig::default();
        config.world.width = 4;
        config.world.height = 4;
        config.world.cell_size = 100;
        config.world.players = 5;
        config.world.guards = 3;
        config.world.monsters = 10;
        config.world.npcs = 4;
        config.world.items = 2;
        Runtime::new(config, Arc::new(NullNotifier)).unwrap()
    }

    #[test]
    fn spawns_the_configured_counts() {
        let runtime = runtime();
        let mut rng = StdRng::seed_from_u64(7);
        let population = seed_population(&runtime, &mut rng).unwrap();

        assert_eq!(population.players.len(), 5);
        assert_eq!(population.guards.len(), 3);
        assert_eq!(population.monsters.len(), 10);
        assert_eq!(runtime.grid().object_count(), population.len());
        assert!(population.players.iter().all(|p| p.is_visible()));
    }

    #[test]
    fn companions_sit_with_their_player() {
        let runtime = runtime();
        let mut rng = StdRng::seed_from_u64(11);
        let population = seed_population(&runtime, &mut rng).unwrap();
        for companion in &population.companions {
            let owner = companion.controller().unwrap();
            assert_eq!(owner.position(), companion.position());
            assert_eq!(owner.companion().unwrap().id(), companion.id());
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let first = runtime();
        let second = runtime();
        let a = seed_population(&first, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = seed_population(&second, &mut StdRng::seed_from_u64(3)).unwrap();
        let positions = |p: &Population| p.monsters.iter().map(|m| m.position()).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn oversized_world_is_rejected() {
        assert!(extent(u32::MAX, 2).is_err());
        assert_eq!(extent(4, 100).unwrap(), 400);
    }
}
