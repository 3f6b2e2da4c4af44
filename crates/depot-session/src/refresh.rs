use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::error::RefreshFailed;
use crate::state::{SessionEvent, SessionMachine, SessionNotice};
use crate::types::Session;

type Outcome = Result<String, RefreshFailed>;
type Slot = Mutex<Option<watch::Receiver<Option<Outcome>>>>;

/// Single-flight refresh of the access token.
///
/// The first caller installs the in-flight slot and performs the exchange;
/// callers arriving before it settles wait on the same outcome. The slot is
/// cleared after the session commit and before waiters are released, so the
/// next expiry always starts a fresh exchange. A failure is remembered
/// against the session version it cleared, so 401s that arrive after it get
/// the same cause until the session changes again.
pub struct RefreshCoordinator {
    machine: Arc<SessionMachine>,
    api: Arc<dyn AuthApi>,
    inflight: Slot,
    last_failure: Mutex<Option<(u64, RefreshFailed)>>,
}

/// Clears the in-flight slot even if the leading caller is dropped.
struct SlotGuard<'a>(&'a Slot);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Puts the phase back if the exchange never reached a commit.
struct ExchangeGuard<'a>(&'a SessionMachine);

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        self.0.abandon_refresh();
    }
}

enum Role {
    Leader(watch::Sender<Option<Outcome>>),
    Follower(watch::Receiver<Option<Outcome>>),
    Settled(String),
    Failed(RefreshFailed),
}

impl RefreshCoordinator {
    pub fn new(machine: Arc<SessionMachine>, api: Arc<dyn AuthApi>) -> Self {
        Self {
            machine,
            api,
            inflight: Mutex::new(None),
            last_failure: Mutex::new(None),
        }
    }

    /// Returns a usable access token, exchanging the refresh token if needed.
    ///
    /// `stale` is the token the failed request carried. When the store already
    /// holds a different one, a refresh settled in between and that token is
    /// returned without another exchange.
    pub async fn obtain_fresh_token(&self, stale: Option<&str>) -> Outcome {
        let tx = match self.claim(stale) {
            Role::Settled(token) => {
                debug!("access token already rotated; skipping refresh");
                return Ok(token);
            }
            Role::Failed(failure) => {
                debug!(reason = %failure.reason, "refresh already failed for this session");
                return Err(failure);
            }
            Role::Follower(rx) => return Self::wait(rx).await,
            Role::Leader(tx) => tx,
        };

        let guard = SlotGuard(&self.inflight);
        let outcome = self.exchange().await;
        drop(guard);
        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Whether an exchange is currently outstanding.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn claim(&self, stale: Option<&str>) -> Role {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = slot.as_ref() {
            return Role::Follower(rx.clone());
        }
        let (current, version) = self.machine.store().snapshot();
        if let Some((failed_at, failure)) = self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            if *failed_at == version {
                return Role::Failed(failure.clone());
            }
        }
        if let (Some(stale), Some(fresh)) = (stale, current.bearer()) {
            if current.is_authenticated && stale != fresh {
                return Role::Settled(fresh.to_string());
            }
        }
        let (tx, rx) = watch::channel(None);
        *slot = Some(rx);
        Role::Leader(tx)
    }

    async fn wait(mut rx: watch::Receiver<Option<Outcome>>) -> Outcome {
        match rx.wait_for(Option::is_some).await {
            Ok(settled) => settled
                .clone()
                .unwrap_or_else(|| Err(RefreshFailed::abandoned())),
            Err(_) => Err(RefreshFailed::abandoned()),
        }
    }

    async fn exchange(&self) -> Outcome {
        let (session, version) = self.machine.store().snapshot();
        if let Err(err) = self.machine.transition(SessionEvent::AuthorizationFailure) {
            warn!(error = %err, "session is not refreshable");
            return Err(RefreshFailed::new(err.to_string()));
        }
        let _restore = ExchangeGuard(&self.machine);
        let Some(refresh_token) = session.refresh_credential() else {
            return Err(self.fail(RefreshFailed::missing_token(), version));
        };

        info!("exchanging refresh token");
        match self.api.refresh(refresh_token).await {
            Ok(auth) => {
                let fresh = Session::from_auth(auth);
                let token = fresh.access_token.clone().unwrap_or_default();
                match self
                    .machine
                    .commit(SessionEvent::RefreshSucceeded, fresh, Some(version))
                {
                    Ok(Some(_)) => {
                        info!("access token refreshed");
                        Ok(token)
                    }
                    Ok(None) => {
                        warn!("session changed during refresh; discarding new tokens");
                        Err(RefreshFailed::superseded())
                    }
                    Err(err) => Err(RefreshFailed::new(err.to_string())),
                }
            }
            Err(err) => {
                let reason = match err {
                    crate::SessionError::RefreshFailed(failed) => failed,
                    other => RefreshFailed::new(other.to_string()),
                };
                Err(self.fail(reason, version))
            }
        }
    }

    fn fail(&self, failure: RefreshFailed, version: u64) -> RefreshFailed {
        warn!(reason = %failure.reason, "refresh failed; clearing session");
        match self
            .machine
            .commit(SessionEvent::RefreshFailed, Session::default(), Some(version))
        {
            Ok(Some(cleared)) => {
                *self
                    .last_failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some((cleared, failure.clone()));
                self.machine.notify(SessionNotice::LoginRequired {
                    reason: failure.reason.clone(),
                });
            }
            Ok(None) => debug!("session already replaced; leaving it alone"),
            Err(err) => warn!(error = %err, "could not record refresh failure"),
        }
        failure
    }
}
