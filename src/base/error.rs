//! Closed error set for the capability layer.
//!
//! Capability functions never surface these to callers directly: they are
//! rendered into a `CapabilityResult::Error`. The typed form exists so the
//! failure mode stays inspectable.

use thiserror::Error;

/// The four failure classes a capability call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authorization,
    Transport,
    Validation,
}

/// Errors raised while acquiring credentials or talking to Google.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service responded with HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AssistantError {
    /// Classify the error into one of the closed kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssistantError::Configuration(_) => ErrorKind::Configuration,
            AssistantError::Authorization(_) => ErrorKind::Authorization,
            AssistantError::Validation(_) => ErrorKind::Validation,
            AssistantError::Transport(_) | AssistantError::Service { .. } | AssistantError::Decode(_) | AssistantError::Io(_) => ErrorKind::Transport,
        }
    }
}

/// Result alias for the capability layer.
pub type CapabilityRes<T> = Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AssistantError::Configuration("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(AssistantError::Authorization("x".into()).kind(), ErrorKind::Authorization);
        assert_eq!(AssistantError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(AssistantError::Service { status: 500, body: String::new() }.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_display_includes_detail() {
        let err = AssistantError::Configuration("credentials.json not found".into());
        assert_eq!(err.to_string(), "Configuration error: credentials.json not found");
    }
}
