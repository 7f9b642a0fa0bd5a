//! Failure taxonomy for completion requests.

/// Why a completion request produced no reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// No usable credential in the process environment. Raised before any
    /// network attempt.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The backend answered with a non-success status, or could not be
    /// reached at all (`status` is `None` then).
    #[error("Upstream error ({}): {message}", display_status(.status))]
    Upstream { status: Option<u16>, message: String },

    /// Success status, but the reply text was not where it should be.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no status".to_string(),
    }
}

impl CompletionError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CompletionError::Configuration {
            message: message.into(),
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        CompletionError::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        CompletionError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Upstream status code, when the backend sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Short machine-friendly label, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Configuration { .. } => "configuration",
            CompletionError::Upstream { .. } => "upstream",
            CompletionError::MalformedResponse { .. } => "malformed_response",
        }
    }
}
