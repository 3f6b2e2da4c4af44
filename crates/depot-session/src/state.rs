use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::store::TokenStore;
use crate::types::Session;

const NOTICE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
    /// Persisted state could not be read. Resolved to `Unauthenticated`.
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    BeginLogin,
    LoginSucceeded,
    LoginFailed,
    Logout,
    AuthorizationFailure,
    RefreshSucceeded,
    RefreshFailed,
    IdentityMerged,
    StorageCorrupt,
    Recover,
    /// A refresh ended without a result. Resolved by
    /// [`SessionMachine::abandon_refresh`], not by the transition table.
    RefreshAbandoned,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        if session.is_authenticated {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }

    /// Target phase for `event`, or `None` when the transition is not allowed.
    #[must_use]
    pub fn next(self, event: SessionEvent) -> Option<Self> {
        use SessionEvent as E;
        use SessionPhase as P;

        match (self, event) {
            (_, E::Logout) => Some(P::Unauthenticated),
            (_, E::StorageCorrupt) => Some(P::Failed),
            (P::Failed, E::Recover) => Some(P::Unauthenticated),
            (P::Unauthenticated | P::Failed, E::BeginLogin) => Some(P::Authenticating),
            (P::Authenticating, E::LoginSucceeded) => Some(P::Authenticated),
            (P::Authenticating, E::LoginFailed) => Some(P::Unauthenticated),
            // Unauthenticated covers a hydrated session holding only a refresh token.
            (P::Authenticated | P::Unauthenticated, E::AuthorizationFailure) => {
                Some(P::Refreshing)
            }
            (P::Refreshing, E::RefreshSucceeded) => Some(P::Authenticated),
            (P::Refreshing, E::RefreshFailed) => Some(P::Unauthenticated),
            (P::Authenticated | P::Unauthenticated, E::IdentityMerged) => Some(P::Authenticated),
            _ => None,
        }
    }
}

/// Signals for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// Equivalent of navigating to the login screen.
    LoginRequired { reason: String },
    SignedIn { username: String },
    SignedOut,
}

/// Single writer for the session: every phase change and every session
/// commit happens under one lock, in that order.
pub struct SessionMachine {
    store: Arc<TokenStore>,
    writer: Mutex<()>,
    phase: watch::Sender<SessionPhase>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionMachine {
    pub fn new(store: Arc<TokenStore>, initial: SessionPhase) -> Self {
        let (phase, _) = watch::channel(initial);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            store,
            writer: Mutex::new(()),
            phase,
            notices,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub fn notify(&self, notice: SessionNotice) {
        // No subscribers is fine: nobody is listening for navigation.
        let _ = self.notices.send(notice);
    }

    /// Phase-only transition; the session is left untouched.
    pub fn transition(&self, event: SessionEvent) -> Result<SessionPhase, SessionError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.advance(event)
    }

    /// Commits `session` together with the phase change for `event`.
    ///
    /// With `expected_version` set, the write is dropped (returning `Ok(None)`)
    /// when another commit landed after that version was read.
    pub fn commit(
        &self,
        event: SessionEvent,
        session: Session,
        expected_version: Option<u64>,
    ) -> Result<Option<u64>, SessionError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(expected) = expected_version {
            if self.store.version() != expected {
                debug!(?event, expected, "session moved on; commit dropped");
                return Ok(None);
            }
        }
        let from = self.phase();
        let to = from
            .next(event)
            .ok_or(SessionError::InvalidTransition { from, event })?;
        let version = self.store.set(session);
        self.publish(from, to, event);
        Ok(Some(version))
    }

    /// Leaves `Refreshing` for the phase the stored session implies. A no-op in
    /// any other phase.
    pub fn abandon_refresh(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let from = self.phase();
        if from != SessionPhase::Refreshing {
            return;
        }
        let to = SessionPhase::from_session(&self.store.get());
        self.publish(from, to, SessionEvent::RefreshAbandoned);
    }

    fn advance(&self, event: SessionEvent) -> Result<SessionPhase, SessionError> {
        let from = self.phase();
        let to = from
            .next(event)
            .ok_or(SessionError::InvalidTransition { from, event })?;
        self.publish(from, to, event);
        Ok(to)
    }

    fn publish(&self, from: SessionPhase, to: SessionPhase, event: SessionEvent) {
        self.phase.send_replace(to);
        if from != to {
            info!(?from, ?to, ?event, "session phase changed");
        }
    }
}
