//! State snapshots published to the rendering surface.

use serde::Serialize;

use crate::turn::{Turn, TurnId};

/// What a view needs to draw a conversation: the ordered turns and whether a
/// reply is being waited on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub history: Vec<Turn>,
    pub pending: bool,
}

impl ConversationSnapshot {
    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }

    /// Turns created after `last_seen`. Ids are never reused, so this stays
    /// correct across a clear.
    pub fn turns_after(&self, last_seen: Option<TurnId>) -> impl Iterator<Item = &Turn> {
        self.history
            .iter()
            .filter(move |turn| Some(turn.id()) > last_seen)
    }
}
