use std::time::Duration;

use thiserror::Error;

/// Errors returned by every agent operation.
///
/// Callers are expected to branch on the variant; none of these are raised as
/// panics for ordinary failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// A reference, object, path, cursor or index handle does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed object id, bad path, impossible peel or conflicting options.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying libgit2 call failed.
    ///
    /// `class` is the libgit2 error class (e.g. `Odb`, `Reference`) and
    /// `message` the reason reported by the library.
    #[error("store error ({class}): {message}")]
    Store { class: String, message: String },

    /// The caller-side deadline elapsed before a reply arrived.
    ///
    /// The agent may still complete the operation after this is returned.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The agent stopped (explicitly, by idle expiry, or because it never
    /// started) before the request could be served.
    #[error("agent unavailable")]
    AgentUnavailable,

    /// A typed client call received a reply of a different shape.
    #[error("unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply {
        expected: &'static str,
        actual: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AgentError::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        AgentError::InvalidArgument(what.into())
    }

    pub fn store(class: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::Store {
            class: class.into(),
            message: message.into(),
        }
    }

    /// True when the error came from the caller side of the boundary rather
    /// than from executing the operation.
    pub fn is_transport(&self) -> bool {
        matches!(self, AgentError::Timeout(_) | AgentError::AgentUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Error bridging
// ---------------------------------------------------------------------------

impl From<git2::Error> for AgentError {
    fn from(e: git2::Error) -> Self {
        let message = e.message().to_string();
        match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch => {
                AgentError::NotFound(message)
            }
            git2::ErrorCode::InvalidSpec
            | git2::ErrorCode::Ambiguous
            | git2::ErrorCode::Invalid
            | git2::ErrorCode::Peel
            | git2::ErrorCode::Exists => AgentError::InvalidArgument(message),
            _ => AgentError::Store {
                class: format!("{:?}", e.class()),
                message,
            },
        }
    }
}
