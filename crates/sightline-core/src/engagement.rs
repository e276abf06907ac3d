//! Attack-stance (engagement) tracking.
//!
//! Combat code calls [`EngagementTracker::mark_engaged`] on every hostile
//! action. The tracker keeps one timestamp per actor, with companions
//! folded into their controlling player, and a periodic sweep ends the
//! stance of every actor idle for longer than the stance timeout:
//!
//! - the record is removed,
//! - the actor gets a [`Notification::CombatStanceEnded`], as does a
//!   player's active companion,
//! - the actor's auto-attacking flag is cleared.
//!
//! Readers never judge staleness; a record exists until the sweep or an
//! explicit [`clear_engaged`](EngagementTracker::clear_engaged) removes it.
//! Readers do check identity, so an id reused by a new object starts clean.
//! A bad entry is logged and dropped without stopping the sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use sightline_types::{Notification, ObjectId, ObjectKind};
use sightline_world::WorldObject;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::EngagementConfig;
use crate::notify::Notifier;
use crate::service::{self, ServiceHandle};

/// Errors raised while ending one actor's stance.
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    /// The actor was dropped while still engaged.
    #[error("engaged actor {actor} no longer exists")]
    ActorGone {
        /// Id of the vanished actor.
        actor: ObjectId,
    },
}

/// One engaged actor and the time of its latest hostile action.
#[derive(Debug, Clone)]
struct EngagementRecord {
    /// The normalized actor.
    actor: Weak<WorldObject>,
    /// When the actor last acted with hostility.
    engaged_at: Instant,
}

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Actors whose stance ended and were notified.
    pub expired: Vec<ObjectId>,
    /// Stale records that could not be processed; they are dropped.
    pub faulted: Vec<ObjectId>,
    /// Records still live after the sweep.
    pub remaining: usize,
}

/// Registry of actors currently in attack stance.
#[derive(Debug)]
pub struct EngagementTracker {
    /// Normalized actor id -> record.
    records: Mutex<HashMap<ObjectId, EngagementRecord>>,
    /// Outbound sink for stance-ended notifications.
    notifier: Arc<dyn Notifier>,
    /// Idle time after which the stance ends.
    stance_timeout: Duration,
}

impl EngagementTracker {
    /// Create an empty tracker.
    pub fn new(config: &EngagementConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            notifier,
            stance_timeout: config.stance_timeout(),
        }
    }

    /// Start sweeping every `config.sweep_interval_ms`.
    pub fn start(self: &Arc<Self>, config: &EngagementConfig) -> ServiceHandle {
        let tracker = Arc::clone(self);
        service::spawn_periodic("engagement-sweep", config.sweep_interval(), move || {
            tracker.sweep();
        })
    }

    /// Record a hostile action by `actor` now.
    ///
    /// A companion is recorded under its controlling player. A player's
    /// non-passive assistants are woken up.
    pub fn mark_engaged(&self, actor: &Arc<WorldObject>) {
        let actor = actor.acting_player();
        if actor.kind() == ObjectKind::Player {
            for assistant in actor.assistants() {
                if !assistant.is_passive() {
                    assistant.wake();
                }
            }
        }

        let record = EngagementRecord {
            actor: Arc::downgrade(&actor),
            engaged_at: Instant::now(),
        };
        if self.lock().insert(actor.id(), record).is_none() {
            debug!(actor = %actor.id(), "attack stance started");
        }
    }

    /// Drop `actor`'s record without notifying anyone. Returns `true` if
    /// there was one.
    pub fn clear_engaged(&self, actor: &Arc<WorldObject>) -> bool {
        let actor = actor.acting_player();
        self.lock().remove(&actor.id()).is_some()
    }

    /// Whether `actor` (or its controlling player) holds a record.
    ///
    /// A record left behind by an earlier object with the same id does not
    /// count.
    pub fn is_engaged(&self, actor: &Arc<WorldObject>) -> bool {
        let actor = actor.acting_player();
        self.lock().get(&actor.id()).is_some_and(|record| {
            record
                .actor
                .upgrade()
                .is_some_and(|recorded| Arc::ptr_eq(&recorded, &actor))
        })
    }

    /// Number of actors in attack stance.
    pub fn engaged_count(&self) -> usize {
        self.lock().len()
    }

    /// End the stance of every actor idle longer than the timeout.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    /// Like [`sweep`](Self::sweep), judging staleness against `now`.
    pub fn sweep_at(&self, now: Instant) -> SweepReport {
        let mut stale = Vec::new();
        let remaining = {
            let mut records = self.lock();
            records.retain(|id, record| {
                let idle = now.saturating_duration_since(record.engaged_at);
                if idle > self.stance_timeout {
                    stale.push((*id, Weak::clone(&record.actor)));
                    false
                } else {
                    true
                }
            });
            records.len()
        };

        let mut report = SweepReport {
            remaining,
            ..SweepReport::default()
        };
        for (id, actor) in stale {
            match self.end_stance(id, &actor) {
                Ok(()) => report.expired.push(id),
                Err(err) => {
                    warn!(actor = %id, error = %err, "failed to end attack stance");
                    report.faulted.push(id);
                }
            }
        }

        if !report.expired.is_empty() || !report.faulted.is_empty() {
            debug!(
                expired = report.expired.len(),
                faulted = report.faulted.len(),
                remaining = report.remaining,
                "engagement sweep complete"
            );
        }
        report
    }

    /// Notify and reset one actor whose stance timed out.
    fn end_stance(&self, id: ObjectId, actor: &Weak<WorldObject>) -> Result<(), EngagementError> {
        let actor = actor
            .upgrade()
            .ok_or(EngagementError::ActorGone { actor: id })?;

        self.notifier.notify(
            &actor,
            Notification::CombatStanceEnded {
                subject: actor.id(),
            },
        );
        if let Some(ai) = actor.ai() {
            ai.set_auto_attacking(false);
        }
        if actor.kind() == ObjectKind::Player {
            if let Some(companion) = actor.companion() {
                self.notifier.notify(
                    &companion,
                    Notification::CombatStanceEnded {
                        subject: companion.id(),
                    },
                );
            }
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObjectId, EngagementRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sightline_world::{Assistant, AssistantKind};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::notify::{ChannelNotifier, Outbound};

    fn tracker() -> (EngagementTracker, UnboundedReceiver<Outbound>) {
        let (notifier, receiver) = ChannelNotifier::new();
        (
            EngagementTracker::new(&EngagementConfig::default(), Arc::new(notifier)),
            receiver,
        )
    }

    fn drain(receiver: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = receiver.try_recv() {
            out.push(item);
        }
        out
    }

    fn player(id: u32) -> Arc<WorldObject> {
        WorldObject::builder(ObjectId(id), ObjectKind::Player).build()
    }

    #[tokio::test(start_paused = true)]
    async fn engaged_until_the_timeout_passes() {
        let (tracker, mut receiver) = tracker();
        let actor = player(1);
        tracker.mark_engaged(&actor);
        assert!(tracker.is_engaged(&actor));

        tokio::time::advance(Duration::from_millis(14_900)).await;
        let report = tracker.sweep();
        assert!(report.expired.is_empty());
        assert!(tracker.is_engaged(&actor));

        tokio::time::advance(Duration::from_millis(200)).await;
        let report = tracker.sweep();
        assert_eq!(report.expired, vec![ObjectId(1)]);
        assert!(!tracker.is_engaged(&actor));

        let sent = drain(&mut receiver);
        assert_eq!(
            sent,
            vec![Outbound {
                recipient: ObjectId(1),
                notification: Notification::CombatStanceEnded { subject: ObjectId(1) },
            }]
        );

        // A later sweep has nothing left to end.
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(tracker.sweep().expired.is_empty());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn renewed_actions_extend_the_stance() {
        let (tracker, _receiver) = tracker();
        let actor = player(1);
        tracker.mark_engaged(&actor);
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.mark_engaged(&actor);
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(tracker.sweep().expired.is_empty());
        assert_eq!(tracker.engaged_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn companion_is_folded_into_its_player() {
        let (tracker, mut receiver) = tracker();
        let owner = player(1);
        let pet = WorldObject::builder(ObjectId(2), ObjectKind::Companion)
            .controlled_by(&owner)
            .build();
        owner.set_companion(&pet);

        tracker.mark_engaged(&pet);
        assert!(tracker.is_engaged(&owner));
        assert!(tracker.is_engaged(&pet));
        assert_eq!(tracker.engaged_count(), 1);

        tokio::time::advance(Duration::from_secs(16)).await;
        let report = tracker.sweep();
        assert_eq!(report.expired, vec![ObjectId(1)]);

        let recipients: Vec<ObjectId> = drain(&mut receiver).iter().map(|o| o.recipient).collect();
        assert_eq!(recipients, vec![ObjectId(1), ObjectId(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_clears_auto_attacking() {
        let (tracker, _receiver) = tracker();
        let monster = WorldObject::builder(ObjectId(7), ObjectKind::Monster).build();
        monster.ai().unwrap().set_auto_attacking(true);
        tracker.mark_engaged(&monster);

        tokio::time::advance(Duration::from_secs(16)).await;
        tracker.sweep();
        assert!(!monster.ai().unwrap().is_auto_attacking());
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_actor_does_not_stall_the_sweep() {
        let (tracker, mut receiver) = tracker();
        let ghost = player(1);
        let survivor = player(2);
        tracker.mark_engaged(&ghost);
        tracker.mark_engaged(&survivor);
        drop(ghost);

        tokio::time::advance(Duration::from_secs(16)).await;
        let report = tracker.sweep();
        assert_eq!(report.faulted, vec![ObjectId(1)]);
        assert_eq!(report.expired, vec![ObjectId(2)]);
        assert_eq!(report.remaining, 0);
        assert_eq!(drain(&mut receiver).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reused_id_does_not_inherit_a_stance() {
        let (tracker, _receiver) = tracker();
        let original = player(1);
        tracker.mark_engaged(&original);
        drop(original);

        let successor = player(1);
        assert!(!tracker.is_engaged(&successor));

        tracker.mark_engaged(&successor);
        assert!(tracker.is_engaged(&successor));
        assert_eq!(tracker.engaged_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_removes_without_notifying() {
        let (tracker, mut receiver) = tracker();
        let actor = player(1);
        tracker.mark_engaged(&actor);
        assert!(tracker.clear_engaged(&actor));
        assert!(!tracker.clear_engaged(&actor));
        assert!(!tracker.is_engaged(&actor));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(tracker.sweep().expired.is_empty());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn only_active_assistants_are_woken() {
        let (tracker, _receiver) = tracker();
        let actor = player(1);
        let healer = Arc::new(Assistant::new(AssistantKind::Healing));
        let striker = Arc::new(Assistant::new(AssistantKind::Offensive));
        actor.add_assistant(Arc::clone(&healer));
        actor.add_assistant(Arc::clone(&striker));

        tracker.mark_engaged(&actor);
        assert_eq!(healer.wakeups(), 0);
        assert_eq!(striker.wakeups(), 1);
    }
}
