//! Completion backends for the OneSearch assistant.

pub mod gateway;
pub mod openai;

pub use gateway::CompletionGateway;
pub use openai::OpenAIGateway;
