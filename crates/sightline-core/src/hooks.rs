//! Known-list specializations per actor kind.
//!
//! The generic [`KnownList`](sightline_world::KnownList) knows nothing about
//! guards or players. Domain policy lives here, as [`KnownListHooks`]
//! implementations that react to one membership edge at a time:
//!
//! - [`AttackableHooks`] -- monsters wake up when a player shows up and go
//!   back to sleep once no player is left; forgotten objects drop off the
//!   hostile-target list.
//! - [`GuardHooks`] -- guards put hostile-flagged players (and, under
//!   policy, aggressive monsters) on their hostile list, wake up, and idle
//!   once that list empties.
//! - [`PlayerHooks`] -- players are told about objects appearing and
//!   vanishing.
//!
//! Every reaction is idempotent: setting an intention the owner already
//! has is a silent no-op.

use std::sync::Arc;

use sightline_types::{Intention, Notification, ObjectKind};
use sightline_world::{KnownListHooks, NoHooks, WorldObject};
use tracing::debug;

use crate::config::PolicyConfig;
use crate::notify::Notifier;

/// Hooks for attackable creatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttackableHooks;

impl AttackableHooks {
    /// Drop `object` from the owner's hostile-target list.
    fn forget_hostile(owner: &WorldObject, object: &WorldObject) {
        if let Some(ai) = owner.ai() {
            ai.remove_hostile(object.id());
        }
    }
}

impl KnownListHooks for AttackableHooks {
    fn on_known(&self, owner: &WorldObject, object: &Arc<WorldObject>) {
        if !object.kind().is_playable() {
            return;
        }
        if let Some(ai) = owner.ai() {
            if ai.intention() == Intention::Idle && ai.set_intention(Intention::Active) {
                debug!(owner = %owner.id(), player = %object.id(), "monster woke up");
            }
        }
    }

    fn on_forgotten(&self, owner: &WorldObject, object: &Arc<WorldObject>, _forget: bool) {
        Self::forget_hostile(owner, object);

        let Some(ai) = owner.ai() else {
            return;
        };
        if owner.known_list().known_playables().is_empty()
            && ai.has_no_hostiles()
            && ai.set_intention(Intention::Idle)
        {
            debug!(owner = %owner.id(), "monster went idle");
        }
    }
}

/// Hooks for guards.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardHooks {
    /// Global policy switches.
    policy: PolicyConfig,
}

impl GuardHooks {
    /// Create guard hooks under `policy`.
    pub const fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    /// Whether a guard owned by `owner` should take interest in `object`.
    fn is_threat(&self, owner: &WorldObject, object: &WorldObject) -> bool {
        object.is_flagged_hostile()
            || (self.policy.guard_attack_aggro_mob
                && owner.is_in_active_region()
                && object.is_aggressive_monster())
    }
}

impl KnownListHooks for GuardHooks {
    fn on_known(&self, owner: &WorldObject, object: &Arc<WorldObject>) {
        if !self.is_threat(owner, object) {
            return;
        }
        if let Some(ai) = owner.ai() {
            ai.add_hostile(object.id());
            if ai.intention() == Intention::Idle && ai.set_intention(Intention::Active) {
                debug!(guard = %owner.id(), threat = %object.id(), "guard became active");
            }
        }
    }

    fn on_forgotten(&self, owner: &WorldObject, object: &Arc<WorldObject>, _forget: bool) {
        AttackableHooks::forget_hostile(owner, object);

        let Some(ai) = owner.ai() else {
            return;
        };
        if ai.has_no_hostiles()
            && !owner.traits().stationary_patrol
            && ai.set_intention(Intention::Idle)
        {
            debug!(guard = %owner.id(), "guard returned to idle");
        }
    }
}

/// Hooks for players: every membership edge becomes a notification.
#[derive(Debug, Clone)]
pub struct PlayerHooks {
    /// Outbound sink.
    notifier: Arc<dyn Notifier>,
}

impl PlayerHooks {
    /// Create player hooks that report through `notifier`.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

impl KnownListHooks for PlayerHooks {
    fn on_known(&self, owner: &WorldObject, object: &Arc<WorldObject>) {
        self.notifier.notify(
            owner,
            Notification::ObjectAppeared {
                subject: object.id(),
            },
        );
    }

    fn on_forgotten(&self, owner: &WorldObject, object: &Arc<WorldObject>, forget: bool) {
        self.notifier.notify(
            owner,
            Notification::ObjectVanished {
                subject: object.id(),
                forget,
            },
        );
    }
}

/// Chooses known-list hooks for each object kind.
#[derive(Debug, Clone)]
pub struct HookFactory {
    /// Shared player hooks.
    player: Arc<PlayerHooks>,
    /// Shared guard hooks.
    guard: Arc<GuardHooks>,
    /// Shared monster hooks.
    attackable: Arc<AttackableHooks>,
    /// Shared no-op hooks.
    inert: Arc<NoHooks>,
}

impl HookFactory {
    /// Create a factory under `policy`, reporting through `notifier`.
    pub fn new(policy: PolicyConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            player: Arc::new(PlayerHooks::new(notifier)),
            guard: Arc::new(GuardHooks::new(policy)),
            attackable: Arc::new(AttackableHooks),
            inert: Arc::new(NoHooks),
        }
    }

    /// Hooks for an object of `kind`.
    pub fn for_kind(&self, kind: ObjectKind) -> Arc<dyn KnownListHooks> {
        match kind {
            ObjectKind::Player => Arc::clone(&self.player) as Arc<dyn KnownListHooks>,
            ObjectKind::Guard => Arc::clone(&self.guard) as Arc<dyn KnownListHooks>,
            ObjectKind::Monster => Arc::clone(&self.attackable) as Arc<dyn KnownListHooks>,
            ObjectKind::Companion | ObjectKind::Npc | ObjectKind::Trap | ObjectKind::Item => {
                Arc::clone(&self.inert) as Arc<dyn KnownListHooks>
            }
        }
    }
}
