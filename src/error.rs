//! Error types for PRism assess.

use std::fmt;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors raised while bootstrapping a session.
///
/// Missing inputs are fatal for the session and never retried.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No repository selected")]
    NoRepositorySelected,

    #[error("No skills selected")]
    NoSkillsSelected,

    #[error("Failed to read selection from {path}: {reason}")]
    SelectionUnreadable { path: String, reason: String },

    #[error("Failed to write selection to {path}: {reason}")]
    SelectionUnwritable { path: String, reason: String },

    #[error("Pick {pick} is out of range (1-{available})")]
    PickOutOfRange { pick: usize, available: usize },
}

impl SessionError {
    /// Whether this error means the session was started without its inputs.
    pub fn is_missing_context(&self) -> bool {
        matches!(self, Self::NoRepositorySelected | Self::NoSkillsSelected)
    }
}

/// Which backend operation a gateway error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    RepoInfo,
    Assessment,
    Chat,
    Search,
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RepoInfo => "repo_info",
            Self::Assessment => "assessment",
            Self::Chat => "chat",
            Self::Search => "search",
        };
        write!(f, "{s}")
    }
}

/// The single network error kind surfaced by the backend gateway.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} request failed: {reason}")]
pub struct GatewayError {
    pub operation: GatewayOperation,
    pub reason: String,
}

impl GatewayError {
    pub fn new(operation: GatewayOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("message is empty")]
    Blank,

    #[error("a message is still being delivered")]
    Streaming,

    #[error("a request is still in flight")]
    RequestInFlight,

    #[error("the conversation is not accepting input yet")]
    NotReady,

    #[error("the session is in an error state")]
    Failed,

    #[error("the session has ended")]
    Closed,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_names_operation() {
        let err = GatewayError::new(GatewayOperation::RepoInfo, "status 404");
        assert_eq!(err.to_string(), "repo_info request failed: status 404");
    }

    #[test]
    fn missing_context_classification() {
        assert!(SessionError::NoRepositorySelected.is_missing_context());
        assert!(SessionError::NoSkillsSelected.is_missing_context());
        let unreadable = SessionError::SelectionUnreadable {
            path: "/tmp/x".into(),
            reason: "denied".into(),
        };
        assert!(!unreadable.is_missing_context());
    }

    #[test]
    fn top_level_wraps_session_error() {
        let err: Error = SessionError::NoRepositorySelected.into();
        assert_eq!(err.to_string(), "Session error: No repository selected");
    }
}
