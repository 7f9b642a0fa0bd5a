//! Chat Host - conversation core for the OneSearch assistant
//!
//! This crate provides:
//! - Assistant personas (system instructions, image caption, fallback text)
//! - Request context assembly from conversation history
//! - A single-flight conversation controller that views subscribe to

pub mod context;
pub mod controller;
pub mod prompts;

pub use context::{replay_turns, RequestContext};
pub use controller::{ConversationController, IgnoreReason, SubmitOutcome};
pub use prompts::{
    get_system_instructions, AssistantProfile, DEFAULT_IMAGE_CAPTION, FALLBACK_MESSAGE,
};

use providers::OpenAIGateway;
use shared::settings::ChatSettings;
use std::sync::Arc;

/// Controller for the configured persona, backed by the OpenAI gateway.
pub fn openai_controller(settings: &ChatSettings) -> ConversationController {
    let gateway = Arc::new(OpenAIGateway::new(settings.completion.clone()));
    ConversationController::new(gateway, AssistantProfile::from_settings(settings))
}
