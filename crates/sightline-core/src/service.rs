//! Periodic background units.
//!
//! Both the refresh scheduler and the engagement sweep run as a tokio task
//! that calls a synchronous unit of work on a fixed interval. Each run is
//! handed to the blocking pool and awaited, so a long walk never stalls the
//! async workers and one run always finishes before the next begins. Late
//! ticks are delayed rather than bunched up. Shutdown stops scheduling
//! further runs and never interrupts one in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Shortest period a unit can be scheduled at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running periodic unit.
#[derive(Debug)]
pub struct ServiceHandle {
    /// Service name used in logs.
    name: &'static str,
    /// Signals the loop to stop.
    shutdown: watch::Sender<bool>,
    /// The loop task.
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Return the service name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop scheduling further runs and wait for the loop to exit.
    pub async fn shutdown(self) {
        // A send error means the loop is already gone.
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(service = self.name, error = %err, "background service ended abnormally");
        }
    }
}

/// Run `unit` every `period` on the current tokio runtime.
///
/// The first run happens one `period` after the call. A `period` below
/// [`MIN_PERIOD`] is raised to it. A run that panics is logged and the
/// schedule carries on.
pub fn spawn_periodic<F>(name: &'static str, period: Duration, unit: F) -> ServiceHandle
where
    F: Fn() + Send + Sync + 'static,
{
    let period = period.max(MIN_PERIOD);
    let unit = Arc::new(unit);
    let (shutdown, mut stop) = watch::channel(false);
    let task = tokio::spawn(async move {
        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            service = name,
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "background service started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let run = Arc::clone(&unit);
                    if let Err(err) = tokio::task::spawn_blocking(move || run()).await {
                        warn!(service = name, error = %err, "background run failed");
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!(service = name, "background service stopped");
    });

    ServiceHandle {
        name,
        shutdown,
        task,
    }
}
