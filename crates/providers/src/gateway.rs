//! Seam between conversation logic and whatever answers completion requests.

use shared::agent_api::{ChatMessage, CurrentTurn};
use shared::CompletionError;

/// A stateless chat-completion backend.
///
/// Every call is independent; implementations must be safe to share between
/// conversations.
///
/// Note: Uses async_trait for object safety
#[async_trait::async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Send `[system, ...prior_turns, current_turn]` and return the reply text.
    async fn complete(
        &self,
        system_instructions: &str,
        prior_turns: &[ChatMessage],
        current_turn: &CurrentTurn,
    ) -> Result<String, CompletionError>;
}
