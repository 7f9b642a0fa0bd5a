pub mod error;
pub mod events;
pub mod turn;

pub use error::CompletionError;
pub use events::ConversationSnapshot;
pub use turn::{Sender, Turn, TurnId, UserInput};

pub mod settings {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;

    fn default_bind_address() -> String {
        "127.0.0.1:3000".to_string()
    }

    fn default_server_workers() -> usize {
        8
    }

    /// Fixed model and decoding parameters for the completion backend.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CompletionSettings {
        pub model: String,       // e.g., "gpt-4o"
        pub max_tokens: u32,
        pub temperature: f32,
        pub base_url: String,    // without the /v1/... suffix
        pub api_key_env: String, // name of the variable holding the bearer credential
    }

    impl Default for CompletionSettings {
        fn default() -> Self {
            Self {
                model: "gpt-4o".into(),
                max_tokens: 1000,
                temperature: 0.7,
                base_url: "https://api.openai.com".into(),
                api_key_env: "OPENAI_API_KEY".into(),
            }
        }
    }

    /// Assistant persona preset
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ProfileKind {
        /// Office staff assistant (the main chat page)
        #[default]
        Office,
        /// Product search and fashion assistant
        Search,
        /// Generic assistant behind the HTTP endpoint
        Api,
    }

    impl ProfileKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                ProfileKind::Office => "office",
                ProfileKind::Search => "search",
                ProfileKind::Api => "api",
            }
        }
    }

    impl fmt::Display for ProfileKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for ProfileKind {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_lowercase().as_str() {
                "office" => Ok(ProfileKind::Office),
                "search" => Ok(ProfileKind::Search),
                "api" => Ok(ProfileKind::Api),
                other => Err(format!(
                    "unknown profile '{}' (expected one of: office, search, api)",
                    other
                )),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ChatSettings {
        #[serde(default)]
        pub completion: CompletionSettings,
        #[serde(default)]
        pub profile: ProfileKind,
        #[serde(default = "default_bind_address")]
        pub bind_address: String,
        /// Threads answering HTTP requests concurrently
        #[serde(default = "default_server_workers")]
        pub server_workers: usize,
        /// Replaces the persona's caption for image-only submissions
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub default_caption: Option<String>,
        /// Replaces the persona's text shown when a request fails
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fallback_message: Option<String>,
    }

    impl Default for ChatSettings {
        fn default() -> Self {
            Self {
                completion: CompletionSettings::default(),
                profile: ProfileKind::default(),
                bind_address: default_bind_address(),
                server_workers: default_server_workers(),
                default_caption: None,
                fallback_message: None,
            }
        }
    }
}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        System,
        User,
        Assistant,
    }

    /// A text-only message, as replayed in the request context.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: Role,
        pub content: String,
    }

    impl ChatMessage {
        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: Role::User,
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: Role::Assistant,
                content: content.into(),
            }
        }
    }

    /// The turn being submitted right now. Unlike replayed context it may
    /// carry an image.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CurrentTurn {
        pub text: Option<String>,
        pub image: Option<String>,
    }

    impl CurrentTurn {
        pub fn text(text: impl Into<String>) -> Self {
            Self {
                text: Some(text.into()),
                image: None,
            }
        }

        pub fn with_image(mut self, image: impl Into<String>) -> Self {
            self.image = Some(image.into());
            self
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ImageUrl {
        pub url: String,
    }

    /// One part of a multi-part message body.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ContentPart {
        Text { text: String },
        #[serde(rename = "image_url")]
        ImageRef { image_url: ImageUrl },
    }

    impl ContentPart {
        pub fn text(text: impl Into<String>) -> Self {
            ContentPart::Text { text: text.into() }
        }

        pub fn image_ref(url: impl Into<String>) -> Self {
            ContentPart::ImageRef {
                image_url: ImageUrl { url: url.into() },
            }
        }
    }

    /// Message body: a plain string, or a list of parts when an image rides along.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum MessageContent {
        Text(String),
        Parts(Vec<ContentPart>),
    }
}
