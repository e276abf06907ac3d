//! Foreground activity that keeps the demo world moving.
//!
//! Each step nudges every player a short random distance (clamped to the
//! world bounds) and lets a few players pick a fight with a monster they
//! can see, which puts both into attack stance. The background services
//! do the rest: known lists follow the movement and stances expire once
//! the fighting stops.

use std::sync::Arc;

use rand::Rng;
use sightline_core::notify::Outbound;
use sightline_core::runtime::Runtime;
use sightline_types::{Notification, ObjectKind};
use sightline_world::{Position, WorldObject};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace};

use crate::error::EngineError;
use crate::spawner::Population;

/// Largest per-axis step a player takes in one activity tick.
const STEP_RANGE: std::ops::RangeInclusive<i32> = -600..=600;

/// Percent chance per player per tick of starting a fight.
const FIGHT_PERCENT: u32 = 5;

/// What one activity step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityReport {
    /// Players moved.
    pub moved: usize,
    /// Players that crossed into a different region.
    pub migrated: usize,
    /// Fights started.
    pub fights: usize,
}

/// Drives player movement and combat against a runtime.
#[derive(Debug)]
pub struct Activity<R: Rng> {
    /// The runtime being driven.
    runtime: Arc<Runtime>,
    /// Players eligible to move and fight.
    players: Vec<Arc<WorldObject>>,
    /// Random source.
    rng: R,
    /// Exclusive upper bound on x.
    extent_x: i32,
    /// Exclusive upper bound on y.
    extent_y: i32,
}

impl<R: Rng> Activity<R> {
    /// Drive the players of `population` inside `runtime`.
    pub fn new(runtime: Arc<Runtime>, population: &Population, rng: R) -> Self {
        let grid = runtime.grid();
        let span = |cells: u32| {
            i32::try_from(cells.saturating_mul(grid.cell_size())).unwrap_or(i32::MAX)
        };
        let extent_x = span(grid.width());
        let extent_y = span(grid.height());
        Self {
            runtime,
            players: population.players.clone(),
            rng,
            extent_x,
            extent_y,
        }
    }

    /// Run one step.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::World`] if a move is rejected by the grid.
    pub fn step(&mut self) -> Result<ActivityReport, EngineError> {
        let mut report = ActivityReport::default();
        let players = self.players.clone();
        for player in &players {
            if !player.is_visible() {
                continue;
            }
            let before = player.region_id();
            let target = self.wander(player.position());
            let after = self.runtime.grid().move_to(player, target)?;
            if let Some(companion) = player.companion().filter(|c| c.is_visible()) {
                self.runtime.grid().move_to(&companion, target)?;
            }
            report.moved = report.moved.saturating_add(1);
            if before != Some(after) {
                report.migrated = report.migrated.saturating_add(1);
            }

            if self.rng.random_range(0..100) < FIGHT_PERCENT && self.start_fight(player) {
                report.fights = report.fights.saturating_add(1);
            }
        }
        debug!(
            moved = report.moved,
            migrated = report.migrated,
            fights = report.fights,
            engaged = self.runtime.engagement().engaged_count(),
            "activity step"
        );
        Ok(report)
    }

    /// A random point near `from`, clamped to the world.
    fn wander(&mut self, from: Position) -> Position {
        let dx = self.rng.random_range(STEP_RANGE);
        let dy = self.rng.random_range(STEP_RANGE);
        let clamp = |value: i32, extent: i32| value.clamp(0, extent.saturating_sub(1));
        Position::new(
            clamp(from.x.saturating_add(dx), self.extent_x),
            clamp(from.y.saturating_add(dy), self.extent_y),
            from.z,
        )
    }

    /// Pick a monster `player` knows and put both into attack stance.
    /// Returns `false` when no monster is in sight.
    fn start_fight(&mut self, player: &Arc<WorldObject>) -> bool {
        let monsters: Vec<Arc<WorldObject>> = player
            .known_list()
            .known_objects()
            .into_iter()
            .filter(|object| object.kind() == ObjectKind::Monster)
            .collect();
        if monsters.is_empty() {
            return false;
        }
        let index = self.rng.random_range(0..monsters.len());
        let Some(monster) = monsters.get(index) else {
            return false;
        };

        if let Some(ai) = monster.ai() {
            ai.add_hostile(player.id());
            ai.set_auto_attacking(true);
        }
        let engagement = self.runtime.engagement();
        engagement.mark_engaged(player);
        engagement.mark_engaged(monster);
        debug!(player = %player.id(), monster = %monster.id(), "fight started");
        true
    }
}

/// Tally of delivered notifications, by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// `ObjectAppeared` notifications.
    pub appeared: u64,
    /// `ObjectVanished` notifications.
    pub vanished: u64,
    /// `CombatStanceEnded` notifications.
    pub stance_ended: u64,
}

impl DeliveryStats {
    /// Count one notification.
    pub fn record(&mut self, notification: &Notification) {
        match notification {
            Notification::ObjectAppeared { .. } => self.appeared = self.appeared.saturating_add(1),
            Notification::ObjectVanished { .. } => self.vanished = self.vanished.saturating_add(1),
            Notification::CombatStanceEnded { .. } => {
                self.stance_ended = self.stance_ended.saturating_add(1);
            }
        }
    }
}

/// Consume outbound notifications until every sender is gone. Stance
/// endings are logged at debug, everything else at trace. Returns the
/// final tally.
pub async fn deliver(mut receiver: UnboundedReceiver<Outbound>) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    while let Some(outbound) = receiver.recv().await {
        stats.record(&outbound.notification);
        if matches!(outbound.notification, Notification::CombatStanceEnded { .. }) {
            debug!(
                recipient = %outbound.recipient,
                subject = %outbound.notification.subject(),
                "attack stance ended"
            );
        } else {
            trace!(
                recipient = %outbound.recipient,
                notification = ?outbound.notification,
                "notification delivered"
            );
        }
    }
    info!(
        appeared = stats.appeared,
        vanished = stats.vanished,
        stance_ended = stats.stance_ended,
        "notification channel closed"
    );
    stats
}
