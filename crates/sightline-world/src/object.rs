//! World objects and the AI state they carry.
//!
//! A [`WorldObject`] is shared as `Arc<WorldObject>` between the region
//! that holds it, the scheduler, and combat code. All mutable state sits
//! behind atomics or short-lived locks so any thread may read or update it
//! without coordinating with the others.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use sightline_types::{Intention, ObjectId, ObjectKind, RegionId};

use crate::known_list::{KnownList, KnownListHooks, NoHooks};
use crate::position::Position;
use crate::region::Region;
use crate::sync;

/// Static behavior flags fixed when an object is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectTraits {
    /// Attacks players on sight (monsters).
    pub aggressive: bool,
    /// Belongs to a faction with declared enemies among other NPCs.
    pub has_rival_faction: bool,
    /// Walks a fixed route and never idles its AI on its own.
    pub stationary_patrol: bool,
}

/// Mutable AI state of a character.
#[derive(Debug, Default)]
pub struct AiState {
    /// Current intention.
    intention: RwLock<Intention>,
    /// Whether the character is swinging at a target on its own.
    auto_attacking: AtomicBool,
    /// Hostile targets this character is tracking.
    aggro_list: Mutex<HashSet<ObjectId>>,
}

impl AiState {
    /// Return the current intention.
    pub fn intention(&self) -> Intention {
        *sync::read(&self.intention)
    }

    /// Set the intention. Returns `true` if it changed.
    pub fn set_intention(&self, intention: Intention) -> bool {
        let mut current = sync::write(&self.intention);
        if *current == intention {
            return false;
        }
        *current = intention;
        true
    }

    /// Whether the character is auto-attacking.
    pub fn is_auto_attacking(&self) -> bool {
        self.auto_attacking.load(Ordering::Acquire)
    }

    /// Set the auto-attacking flag.
    pub fn set_auto_attacking(&self, value: bool) {
        self.auto_attacking.store(value, Ordering::Release);
    }

    /// Start tracking `target` as hostile. Returns `true` if it was new.
    pub fn add_hostile(&self, target: ObjectId) -> bool {
        sync::lock(&self.aggro_list).insert(target)
    }

    /// Stop tracking `target`. Returns `true` if it was tracked.
    pub fn remove_hostile(&self, target: ObjectId) -> bool {
        sync::lock(&self.aggro_list).remove(&target)
    }

    /// Whether the hostile-target list is empty.
    pub fn has_no_hostiles(&self) -> bool {
        sync::lock(&self.aggro_list).is_empty()
    }

    /// Snapshot of the hostile-target list.
    pub fn hostiles(&self) -> Vec<ObjectId> {
        sync::lock(&self.aggro_list).iter().copied().collect()
    }
}

/// What an assistant object does for the player that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantKind {
    /// Heals its owner on a timer; unaffected by combat.
    Healing,
    /// Strikes the owner's target.
    Offensive,
    /// Buffs the owner during fights.
    Support,
}

/// A small helper orbiting a player, woken whenever the player fights.
#[derive(Debug)]
pub struct Assistant {
    /// Behavior of the assistant.
    kind: AssistantKind,
    /// How many times combat has woken it.
    wakeups: AtomicU32,
}

impl Assistant {
    /// Create an assistant.
    pub const fn new(kind: AssistantKind) -> Self {
        Self {
            kind,
            wakeups: AtomicU32::new(0),
        }
    }

    /// Return the assistant kind.
    pub const fn kind(&self) -> AssistantKind {
        self.kind
    }

    /// Passive assistants keep their own schedule and ignore combat.
    pub fn is_passive(&self) -> bool {
        self.kind == AssistantKind::Healing
    }

    /// Reactivate the assistant.
    pub fn wake(&self) {
        self.wakeups.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of times the assistant was woken.
    pub fn wakeups(&self) -> u32 {
        self.wakeups.load(Ordering::Acquire)
    }
}

/// A live object in the world.
#[derive(Debug)]
pub struct WorldObject {
    /// Stable identity.
    id: ObjectId,
    /// Kind tag driving visibility rules.
    kind: ObjectKind,
    /// Display name.
    name: String,
    /// Behavior flags.
    traits: ObjectTraits,
    /// Current position.
    position: RwLock<Position>,
    /// Region the object currently resides in.
    region: RwLock<Weak<Region>>,
    /// Whether the object is spawned and perceivable.
    visible: AtomicBool,
    /// Player standing; negative marks the player as hostile to guards.
    reputation: AtomicI32,
    /// Objects this object knows.
    known_list: KnownList,
    /// AI state, absent for objects that never think.
    ai: Option<AiState>,
    /// Controlling player of a companion.
    controller: Option<Weak<Self>>,
    /// Active companion of a player.
    companion: RwLock<Weak<Self>>,
    /// Assistants carried by a player.
    assistants: RwLock<Vec<Arc<Assistant>>>,
}

impl WorldObject {
    /// Start building an object.
    pub fn builder(id: ObjectId, kind: ObjectKind) -> ObjectBuilder {
        ObjectBuilder::new(id, kind)
    }

    /// Return the object id.
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Return the kind tag.
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Return the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the behavior flags.
    pub const fn traits(&self) -> ObjectTraits {
        self.traits
    }

    /// Return the current position.
    pub fn position(&self) -> Position {
        *sync::read(&self.position)
    }

    pub(crate) fn set_position(&self, position: Position) {
        *sync::write(&self.position) = position;
    }

    /// Return the region the object resides in, if spawned.
    pub fn region(&self) -> Option<Arc<Region>> {
        sync::read(&self.region).upgrade()
    }

    /// Return the id of the region the object resides in, if spawned.
    pub fn region_id(&self) -> Option<RegionId> {
        self.region().map(|region| region.id())
    }

    pub(crate) fn set_region(&self, region: Weak<Region>) {
        *sync::write(&self.region) = region;
    }

    /// Whether the object's region currently matters for gameplay.
    pub fn is_in_active_region(&self) -> bool {
        self.region().is_some_and(|region| region.is_active())
    }

    /// Whether the object is spawned and perceivable.
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub(crate) fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Return the reputation score.
    pub fn reputation(&self) -> i32 {
        self.reputation.load(Ordering::Acquire)
    }

    /// Set the reputation score.
    pub fn set_reputation(&self, reputation: i32) {
        self.reputation.store(reputation, Ordering::Release);
    }

    /// Whether this is a player flagged hostile by negative reputation.
    pub fn is_flagged_hostile(&self) -> bool {
        self.kind == ObjectKind::Player && self.reputation() < 0
    }

    /// Whether this is a monster that attacks on sight.
    pub const fn is_aggressive_monster(&self) -> bool {
        matches!(self.kind, ObjectKind::Monster) && self.traits.aggressive
    }

    /// Return the known list.
    pub const fn known_list(&self) -> &KnownList {
        &self.known_list
    }

    /// Add `object` to this object's known list.
    pub fn add_known_object(&self, object: &Arc<Self>) -> bool {
        self.known_list.add_known_object(self, object)
    }

    /// Remove `object` from this object's known list.
    pub fn remove_known_object(&self, object: &Arc<Self>, forget: bool) -> bool {
        self.known_list.remove_known_object(self, object, forget)
    }

    /// Whether this object knows the object with id `id`.
    pub fn knows(&self, id: ObjectId) -> bool {
        self.known_list.contains(id)
    }

    /// Return the AI state, if the object has one.
    pub const fn ai(&self) -> Option<&AiState> {
        self.ai.as_ref()
    }

    /// Whether the object runs AI.
    pub const fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Return the current AI intention, or `None` without AI.
    pub fn intention(&self) -> Option<Intention> {
        self.ai.as_ref().map(AiState::intention)
    }

    /// Return the controlling player of a companion.
    pub fn controller(&self) -> Option<Arc<Self>> {
        self.controller.as_ref().and_then(Weak::upgrade)
    }

    /// Return the player's active companion.
    pub fn companion(&self) -> Option<Arc<Self>> {
        sync::read(&self.companion).upgrade()
    }

    /// Attach a companion to this player.
    pub fn set_companion(&self, companion: &Arc<Self>) {
        *sync::write(&self.companion) = Arc::downgrade(companion);
    }

    /// Detach the player's companion.
    pub fn clear_companion(&self) {
        *sync::write(&self.companion) = Weak::new();
    }

    /// Give the player an assistant.
    pub fn add_assistant(&self, assistant: Arc<Assistant>) {
        sync::write(&self.assistants).push(assistant);
    }

    /// Return the player's assistants.
    pub fn assistants(&self) -> Vec<Arc<Assistant>> {
        sync::read(&self.assistants).clone()
    }

    /// Map a companion to its controlling player; everything else maps to
    /// itself. A companion whose player is gone stands for itself.
    pub fn acting_player(self: &Arc<Self>) -> Arc<Self> {
        if self.kind == ObjectKind::Companion {
            if let Some(player) = self.controller() {
                return player;
            }
        }
        Arc::clone(self)
    }
}

/// Builder for [`WorldObject`].
#[derive(Debug)]
pub struct ObjectBuilder {
    id: ObjectId,
    kind: ObjectKind,
    name: Option<String>,
    traits: ObjectTraits,
    reputation: i32,
    ai: bool,
    controller: Option<Weak<WorldObject>>,
    hooks: Arc<dyn KnownListHooks>,
}

impl ObjectBuilder {
    fn new(id: ObjectId, kind: ObjectKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            traits: ObjectTraits::default(),
            reputation: 0,
            ai: kind.is_character(),
            controller: None,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the behavior flags.
    #[must_use]
    pub const fn traits(mut self, traits: ObjectTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Set the starting reputation.
    #[must_use]
    pub const fn reputation(mut self, reputation: i32) -> Self {
        self.reputation = reputation;
        self
    }

    /// Create the object without AI state.
    #[must_use]
    pub const fn without_ai(mut self) -> Self {
        self.ai = false;
        self
    }

    /// Make the object a companion of `player`.
    #[must_use]
    pub fn controlled_by(mut self, player: &Arc<WorldObject>) -> Self {
        self.controller = Some(Arc::downgrade(player));
        self
    }

    /// Set the known-list hooks for this object's kind.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn KnownListHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Finish building. The object starts unspawned.
    pub fn build(self) -> Arc<WorldObject> {
        let name = self
            .name
            .unwrap_or_else(|| format!("{:?}#{}", self.kind, self.id));
        Arc::new(WorldObject {
            id: self.id,
            kind: self.kind,
            name,
            traits: self.traits,
            position: RwLock::new(Position::default()),
            region: RwLock::new(Weak::new()),
            visible: AtomicBool::new(false),
            reputation: AtomicI32::new(self.reputation),
            known_list: KnownList::new(self.hooks),
            ai: self.ai.then(AiState::default),
            controller: self.controller,
            companion: RwLock::new(Weak::new()),
            assistants: RwLock::new(Vec::new()),
        })
    }
}
