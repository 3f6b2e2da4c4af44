use crate::state::{SessionEvent, SessionPhase};

/// Outcome shared by every caller waiting on one refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refresh failed: {reason}")]
pub struct RefreshFailed {
    pub reason: String,
}

impl RefreshFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_token() -> Self {
        Self::new("no refresh token held")
    }

    pub(crate) fn abandoned() -> Self {
        Self::new("refresh abandoned before it settled")
    }

    pub(crate) fn superseded() -> Self {
        Self::new("session changed while the refresh was in flight")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session record is corrupt: {0}")]
    Corrupt(String),
    #[error("session storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage backend: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error(transparent)]
    RefreshFailed(#[from] RefreshFailed),
    #[error("authorization failed: {method} {path}")]
    AuthorizationFailed { method: String, path: String },
    #[error("identity provider unreachable: {0}")]
    IdentityProviderUnreachable(String),
    #[error("stored session is corrupt: {0}")]
    StorageCorrupt(String),
    #[error("session storage: {0}")]
    Storage(String),
    #[error("invalid session transition: {event:?} from {from:?}")]
    InvalidTransition {
        from: SessionPhase,
        event: SessionEvent,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt(detail) => Self::StorageCorrupt(detail),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl SessionError {
    /// Whether the UI should send the user back to the login screen.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::RefreshFailed(_))
    }
}
