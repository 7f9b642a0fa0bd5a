//! Request context assembly.

use shared::agent_api::{ChatMessage, CurrentTurn};
use shared::Turn;

/// Everything one completion request needs. Built fresh per submission and
/// dropped once the request resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub system_instructions: String,
    pub prior_turns: Vec<ChatMessage>,
    pub current_turn: CurrentTurn,
}

impl RequestContext {
    /// `earlier` must not contain `current`.
    pub fn build(system_instructions: &str, earlier: &[Turn], current: &Turn) -> Self {
        Self {
            system_instructions: system_instructions.to_string(),
            prior_turns: replay_turns(earlier),
            current_turn: CurrentTurn {
                text: current.text().map(str::to_string),
                image: current.image().map(str::to_string),
            },
        }
    }
}

/// Text-only projection of history. Image-only turns are left out and images
/// on captioned turns are not replayed.
pub fn replay_turns(history: &[Turn]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|turn| {
            let text = turn.text().filter(|t| !t.is_empty())?;
            Some(ChatMessage {
                role: turn.sender().role(),
                content: text.to_string(),
            })
        })
        .collect()
}
