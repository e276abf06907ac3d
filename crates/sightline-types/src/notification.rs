//! Outbound notifications emitted by the core.
//!
//! Wire encoding is somebody else's problem: these are plain values handed
//! to a notifier, which forwards them to whatever transport exists.

use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

/// A message addressed to one world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The subject left its attack stance.
    CombatStanceEnded {
        /// Object whose stance ended.
        subject: ObjectId,
    },
    /// The subject entered the recipient's known list.
    ObjectAppeared {
        /// The newly known object.
        subject: ObjectId,
    },
    /// The subject left the recipient's known list.
    ObjectVanished {
        /// The forgotten object.
        subject: ObjectId,
        /// `true` when the subject was destroyed rather than merely out of
        /// range.
        forget: bool,
    },
}

impl Notification {
    /// The object the notification is about.
    pub const fn subject(&self) -> ObjectId {
        match *self {
            Self::CombatStanceEnded { subject }
            | Self::ObjectAppeared { subject }
            | Self::ObjectVanished { subject, .. } => subject,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&Notification::CombatStanceEnded {
            subject: ObjectId(5),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"combat_stance_ended","subject":5}"#);
    }

    #[test]
    fn subject_is_extracted_from_every_variant() {
        let vanished = Notification::ObjectVanished {
            subject: ObjectId(3),
            forget: true,
        };
        assert_eq!(vanished.subject(), ObjectId(3));
    }
}
