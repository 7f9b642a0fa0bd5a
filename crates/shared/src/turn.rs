//! Conversation turns and the raw input that produces them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent_api::Role;

/// Creation-ordered turn identifier. Unique within one conversation, even
/// across `clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(u64);

impl TurnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role used when this turn is replayed to the completion backend.
    pub fn role(self) -> Role {
        match self {
            Sender::User => Role::User,
            Sender::Assistant => Role::Assistant,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "Sen",
            Sender::Assistant => "Asistan",
        }
    }
}

/// One message unit in a conversation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    id: TurnId,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    sender: Sender,
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Build a turn stamped with the current time.
    ///
    /// Empty strings count as absent. Returns `None` when neither text nor
    /// image is left, since such a turn has nothing to show.
    pub fn new(
        id: TurnId,
        sender: Sender,
        text: Option<String>,
        image: Option<String>,
    ) -> Option<Self> {
        let text = text.filter(|t| !t.is_empty());
        let image = image.filter(|i| !i.is_empty());
        if text.is_none() && image.is_none() {
            return None;
        }
        Some(Self {
            id,
            text,
            image,
            sender,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Wall-clock time for display, e.g. "14:05".
    pub fn display_time(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}

/// Raw input from the UI: whatever was typed, plus an optional attached image
/// (data URI or remote URL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            image: Some(image.into()),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Attached image, with an empty string treated as no image.
    pub fn attached_image(&self) -> Option<&str> {
        self.image.as_deref().filter(|i| !i.is_empty())
    }

    /// Nothing to send: blank text and no image.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.attached_image().is_none()
    }
}
