//! Process-lifetime wiring of the core services.
//!
//! [`Runtime`] owns the world grid, the refresh scheduler, the engagement
//! tracker, and the hook factory. It is built once at startup, handed to
//! whoever needs it, started once, and stopped once at shutdown. Nothing
//! here is reachable through global state, so tests can build as many
//! isolated instances as they like.

use std::sync::Arc;

use sightline_types::{ObjectId, ObjectKind, RegionId};
use sightline_world::{ObjectBuilder, PartitionService, Position, WorldError, WorldGrid, WorldObject};
use tracing::info;

use crate::config::{ConfigError, SightlineConfig};
use crate::engagement::EngagementTracker;
use crate::hooks::HookFactory;
use crate::notify::Notifier;
use crate::refresh::{FailedRegionSet, KnownListRefresher};
use crate::service::ServiceHandle;

/// Errors raised while assembling a [`Runtime`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The configuration failed validation.
    #[error("runtime config rejected: {source}")]
    Config {
        /// The validation error.
        #[from]
        source: ConfigError,
    },

    /// The world grid could not be built.
    #[error("world grid rejected: {source}")]
    World {
        /// The grid construction error.
        #[from]
        source: WorldError,
    },
}

/// The assembled core: world, scheduler, and tracker.
#[derive(Debug)]
pub struct Runtime {
    /// Configuration the runtime was built from.
    config: SightlineConfig,
    /// The world partition.
    grid: Arc<WorldGrid>,
    /// Known-list refresh scheduler.
    refresher: Arc<KnownListRefresher>,
    /// Attack-stance tracker.
    engagement: Arc<EngagementTracker>,
    /// Per-kind known-list hooks.
    hooks: HookFactory,
}

/// Handles of the two running background services.
#[derive(Debug)]
pub struct RunningServices {
    /// Known-list refresh loop.
    refresh: ServiceHandle,
    /// Engagement sweep loop.
    engagement: ServiceHandle,
}

impl RunningServices {
    /// Stop both services and wait for them to exit.
    pub async fn shutdown(self) {
        self.refresh.shutdown().await;
        self.engagement.shutdown().await;
        info!("core services stopped");
    }
}

impl Runtime {
    /// Build the grid and services described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] if `config` fails
    /// [`SightlineConfig::validate`], or [`RuntimeError::World`] if the
    /// grid cannot be created.
    pub fn new(config: SightlineConfig, notifier: Arc<dyn Notifier>) -> Result<Self, RuntimeError> {
        config.validate()?;
        let grid = Arc::new(WorldGrid::new(
            config.world.width,
            config.world.height,
            config.world.cell_size,
        )?);
        let refresher = Arc::new(KnownListRefresher::new(
            Arc::clone(&grid) as Arc<dyn PartitionService>,
            Arc::new(FailedRegionSet::new()),
            &config.refresh,
            config.policy,
        ));
        let engagement = Arc::new(EngagementTracker::new(
            &config.engagement,
            Arc::clone(&notifier),
        ));
        let hooks = HookFactory::new(config.policy, notifier);

        info!(
            width = grid.width(),
            height = grid.height(),
            cell_size = grid.cell_size(),
            regions = grid.regions().len(),
            "core runtime assembled"
        );

        Ok(Self {
            config,
            grid,
            refresher,
            engagement,
            hooks,
        })
    }

    /// Return the configuration.
    pub const fn config(&self) -> &SightlineConfig {
        &self.config
    }

    /// Return the world grid.
    pub const fn grid(&self) -> &Arc<WorldGrid> {
        &self.grid
    }

    /// Return the refresh scheduler.
    pub const fn refresher(&self) -> &Arc<KnownListRefresher> {
        &self.refresher
    }

    /// Return the engagement tracker.
    pub const fn engagement(&self) -> &Arc<EngagementTracker> {
        &self.engagement
    }

    /// Start an object builder with the known-list hooks for `kind`.
    pub fn object(&self, id: ObjectId, kind: ObjectKind) -> ObjectBuilder {
        WorldObject::builder(id, kind).hooks(self.hooks.for_kind(kind))
    }

    /// Start both background services on the current tokio runtime.
    pub fn start(&self) -> RunningServices {
        let refresh = self.refresher.start(&self.config.refresh);
        let engagement = self.engagement.start(&self.config.engagement);
        info!("core services started");
        RunningServices {
            refresh,
            engagement,
        }
    }

    /// Place `object` into the world.
    ///
    /// # Errors
    ///
    /// Propagates [`WorldError`] from the grid.
    pub fn spawn(&self, object: &Arc<WorldObject>, position: Position) -> Result<RegionId, WorldError> {
        self.grid.spawn(object, position)
    }

    /// Remove `object` from the world. Every object that knows it forgets
    /// it, its own known list is cleared, and its attack stance is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotSpawned`] if the object is not in the world.
    pub fn despawn(&self, object: &Arc<WorldObject>) -> Result<(), WorldError> {
        self.grid.despawn(object)?;
        if object.kind() != ObjectKind::Companion {
            self.engagement.clear_engaged(object);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sightline_types::Intention;

    use super::*;
    use crate::notify::NullNotifier;

    fn runtime() -> Runtime {
        let mut config = SightlineConfig::default();
        config.world.width = 3;
        config.world.height = 3;
        config.world.cell_size = 100;
        Runtime::new(config, Arc::new(NullNotifier)).unwrap()
    }

    #[test]
    fn objects_get_hooks_for_their_kind() {
        let runtime = runtime();
        let guard = runtime.object(ObjectId(1), ObjectKind::Guard).build();
        let outlaw = runtime
            .object(ObjectId(2), ObjectKind::Player)
            .reputation(-5)
            .build();
        assert!(guard.add_known_object(&outlaw));
        assert_eq!(guard.intention(), Some(Intention::Active));
    }

    #[test]
    fn despawn_clears_the_attack_stance() {
        let runtime = runtime();
        let player = runtime.object(ObjectId(1), ObjectKind::Player).build();
        runtime.spawn(&player, Position::new(50, 50, 0)).unwrap();
        runtime.engagement().mark_engaged(&player);

        runtime.despawn(&player).unwrap();
        assert!(!runtime.engagement().is_engaged(&player));
        assert!(runtime.despawn(&player).is_err());
    }

    #[test]
    fn invalid_grid_is_rejected() {
        let mut config = SightlineConfig::default();
        config.world.cell_size = 0;
        assert!(matches!(
            Runtime::new(config, Arc::new(NullNotifier)),
            Err(RuntimeError::Config { .. })
        ));

        let mut config = SightlineConfig::default();
        config.world.width = u32::MAX;
        config.world.height = 2;
        assert!(matches!(
            Runtime::new(config, Arc::new(NullNotifier)),
            Err(RuntimeError::World { .. })
        ));
    }

    #[test]
    fn zero_service_intervals_are_rejected() {
        let mut config = SightlineConfig::default();
        config.refresh.interval_ms = 0;
        assert!(matches!(
            Runtime::new(config, Arc::new(NullNotifier)),
            Err(RuntimeError::Config { .. })
        ));

        let mut config = SightlineConfig::default();
        config.engagement.sweep_interval_ms = 0;
        let err = Runtime::new(config, Arc::new(NullNotifier)).unwrap_err();
        assert!(err.to_string().contains("engagement.sweep_interval_ms"));
    }
}
