//! Enumeration types describing world objects and their AI state.

use serde::{Deserialize, Serialize};

/// The kind tag carried by every world object.
///
/// Visibility rules in the refresh scheduler are keyed by kind: playable
/// objects scan everything around them, dangerous NPCs scan active
/// neighborhoods, and harmless characters only look for players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A player-controlled character.
    Player,
    /// A summon or pet controlled by a player.
    Companion,
    /// A town guard NPC.
    Guard,
    /// A hostile, attackable creature.
    Monster,
    /// Any other non-player character (merchants, quest givers).
    Npc,
    /// A placed trap.
    Trap,
    /// An item lying on the ground.
    Item,
}

impl ObjectKind {
    /// Whether the object is controlled by a player, directly or through a
    /// summon.
    pub const fn is_playable(self) -> bool {
        matches!(self, Self::Player | Self::Companion)
    }

    /// Whether the object is a character (anything that can perceive and
    /// act), as opposed to inert objects like items.
    pub const fn is_character(self) -> bool {
        !matches!(self, Self::Item)
    }

    /// Whether the object can be attacked and keeps a hostile-target list.
    pub const fn is_attackable(self) -> bool {
        matches!(self, Self::Guard | Self::Monster)
    }
}

/// High-level AI intention of an NPC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intention {
    /// Nothing of interest nearby; the AI does not think.
    #[default]
    Idle,
    /// Something of interest is around; the AI thinks every tick.
    Active,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playable_kinds() {
        assert!(ObjectKind::Player.is_playable());
        assert!(ObjectKind::Companion.is_playable());
        assert!(!ObjectKind::Guard.is_playable());
        assert!(!ObjectKind::Item.is_playable());
    }

    #[test]
    fn items_are_not_characters() {
        assert!(!ObjectKind::Item.is_character());
        assert!(ObjectKind::Trap.is_character());
        assert!(ObjectKind::Npc.is_character());
    }

    #[test]
    fn intention_defaults_to_idle() {
        assert_eq!(Intention::default(), Intention::Idle);
    }
}
