use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::AuthApi;
use crate::error::{RefreshFailed, SessionError};
use crate::refresh::RefreshCoordinator;
use crate::state::{SessionMachine, SessionPhase};
use crate::storage::MemoryStorage;
use crate::store::TokenStore;
use crate::types::{AuthResponse, Credentials, IdentityAssertion, Session, User};

pub(crate) fn user(id: i64, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        role: "USER".to_string(),
        permissions: BTreeSet::from(["products:read".to_string()]),
    }
}

pub(crate) fn alice() -> User {
    user(1, "alice")
}

pub(crate) fn auth_response(access: &str, refresh: &str) -> AuthResponse {
    AuthResponse {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        user: alice(),
    }
}

pub(crate) fn alice_session(access: &str, refresh: &str) -> Session {
    Session::from_auth(auth_response(access, refresh))
}

pub(crate) fn harness(
    api: Arc<FakeAuthApi>,
    session: Session,
) -> (Arc<SessionMachine>, RefreshCoordinator) {
    let store = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new())));
    let phase = SessionPhase::from_session(&session);
    store.set(session);
    let machine = Arc::new(SessionMachine::new(store, phase));
    let coordinator = RefreshCoordinator::new(machine.clone(), api);
    (machine, coordinator)
}

/// Scripted [`AuthApi`] that counts calls.
#[derive(Default)]
pub(crate) struct FakeAuthApi {
    login: Option<Result<AuthResponse, String>>,
    login_gate: Option<Arc<Notify>>,
    refresh: Option<Result<AuthResponse, RefreshFailed>>,
    refresh_delay: Duration,
    identity: IdentityAssertion,
    identity_gate: Option<Arc<Notify>>,
    refresh_calls: AtomicUsize,
    identity_calls: AtomicUsize,
    refresh_tokens: Mutex<Vec<String>>,
}

impl FakeAuthApi {
    pub(crate) fn login_with(mut self, outcome: Result<AuthResponse, String>) -> Self {
        self.login = Some(outcome);
        self
    }

    /// Holds every login until the gate is notified.
    pub(crate) fn login_gate(mut self, gate: Arc<Notify>) -> Self {
        self.login_gate = Some(gate);
        self
    }

    pub(crate) fn refresh_with(mut self, outcome: Result<AuthResponse, RefreshFailed>) -> Self {
        self.refresh = Some(outcome);
        self
    }

    pub(crate) fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub(crate) fn identity_with(mut self, assertion: IdentityAssertion) -> Self {
        self.identity = assertion;
        self
    }

    /// Holds every identity query until the gate is notified.
    pub(crate) fn identity_gate(mut self, gate: Arc<Notify>) -> Self {
        self.identity_gate = Some(gate);
        self
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse, SessionError> {
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }
        match &self.login {
            Some(Ok(auth)) => Ok(auth.clone()),
            Some(Err(message)) => Err(SessionError::LoginFailed(message.clone())),
            None => Err(SessionError::LoginFailed("no scripted login".to_string())),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, SessionError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(refresh_token.to_string());
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        match &self.refresh {
            Some(Ok(auth)) => Ok(auth.clone()),
            Some(Err(failed)) => Err(failed.clone().into()),
            None => Err(RefreshFailed::new("no scripted refresh").into()),
        }
    }

    async fn identity(&self) -> IdentityAssertion {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.identity_gate {
            gate.notified().await;
        }
        self.identity.clone()
    }
}
