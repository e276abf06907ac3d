//! Engine binary for the Sightline world.
//!
//! Wires the core services to a seeded demo world and keeps it moving
//! until Ctrl-C or the configured runtime limit.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `sightline-config.yaml` (or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Build the runtime and the notification channel
//! 4. Spawn the demo population
//! 5. Start the refresh and engagement services
//! 6. Run the activity loop
//! 7. Stop the services and report

mod activity;
mod error;
mod spawner;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use sightline_core::config::{LoggingConfig, SightlineConfig};
use sightline_core::notify::ChannelNotifier;
use sightline_core::runtime::Runtime;
use sightline_world::PartitionService;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::activity::Activity;
use crate::error::EngineError;

/// Default config file, relative to the working directory.
const CONFIG_FILE: &str = "sightline-config.yaml";

/// How long shutdown waits for queued notifications to drain.
const DELIVERY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the activity loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// Ctrl-C was received.
    Interrupted,
    /// `max_runtime_seconds` elapsed.
    RuntimeLimit,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging setup, or world seeding
/// fails, or if the activity loop hits a world error.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = load_config()?;
    init_tracing(&config.logging)?;
    info!(
        width = config.world.width,
        height = config.world.height,
        cell_size = config.world.cell_size,
        seed = config.world.seed,
        refresh_interval_ms = config.refresh.interval_ms,
        full_update_period = config.refresh.full_update_period,
        "sightline-engine starting"
    );

    let (notifier, receiver) = ChannelNotifier::new();
    let delivery = tokio::spawn(activity::deliver(receiver));
    let runtime = Arc::new(Runtime::new(config, Arc::new(notifier))?);
    info!(regions = runtime.grid().regions().len(), "world grid created");

    let mut rng = StdRng::seed_from_u64(runtime.config().world.seed);
    let population = spawner::seed_population(&runtime, &mut rng)?;
    if population.is_empty() {
        warn!("world config spawns no objects; the services will idle");
    }
    info!(
        objects = population.len(),
        active_regions = runtime.grid().active_region_count(),
        "world seeded"
    );

    let services = runtime.start();
    let mut activity = Activity::new(Arc::clone(&runtime), &population, rng);
    let outcome = run_activity(&runtime, &mut activity).await;
    services.shutdown().await;

    let failed = runtime.refresher().failed_regions().len();
    if failed > 0 {
        warn!(failed_regions = failed, "regions left unsynchronized at shutdown");
    }

    // Dropping every notifier holder closes the channel and lets delivery finish.
    drop(activity);
    drop(population);
    drop(runtime);
    match tokio::time::timeout(DELIVERY_DRAIN_TIMEOUT, delivery).await {
        Ok(Ok(stats)) => info!(
            appeared = stats.appeared,
            vanished = stats.vanished,
            stance_ended = stats.stance_ended,
            "notification totals"
        ),
        Ok(Err(err)) => warn!(error = %err, "notification delivery task failed"),
        Err(_elapsed) => warn!("notification channel still open after shutdown"),
    }

    let reason = outcome?;
    info!(reason = ?reason, "sightline-engine stopped");
    Ok(())
}

/// Step `activity` on the configured interval until interrupted or out of
/// time.
async fn run_activity(
    runtime: &Runtime,
    activity: &mut Activity<StdRng>,
) -> Result<StopReason, EngineError> {
    let engine = runtime.config().engine.clone();
    let mut ticker = tokio::time::interval(Duration::from_millis(engine.activity_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let limit = (engine.max_runtime_seconds > 0).then(|| {
        tokio::time::Instant::now().checked_add(Duration::from_secs(engine.max_runtime_seconds))
    });
    let deadline = async move {
        match limit {
            Some(Some(at)) => tokio::time::sleep_until(at).await,
            Some(None) | None => std::future::pending().await,
        }
    };
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            result = &mut interrupt => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for Ctrl-C");
                }
                info!("interrupt received, shutting down");
                return Ok(StopReason::Interrupted);
            }
            () = &mut deadline => {
                info!(seconds = engine.max_runtime_seconds, "runtime limit reached");
                return Ok(StopReason::RuntimeLimit);
            }
            _ = ticker.tick() => {
                activity.step()?;
            }
        }
    }
}

/// Load configuration from `SIGHTLINE_CONFIG` or `sightline-config.yaml`,
/// falling back to defaults when the file does not exist.
fn load_config() -> Result<SightlineConfig, EngineError> {
    let path = std::env::var_os("SIGHTLINE_CONFIG")
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    if Path::new(&path).exists() {
        Ok(SightlineConfig::from_file(&path)?)
    } else {
        let mut config = SightlineConfig::default();
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|err| EngineError::Logging {
            message: format!("invalid log filter {:?}: {err}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| EngineError::Logging {
        message: err.to_string(),
    })
}
