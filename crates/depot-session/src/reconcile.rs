use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::AuthApi;
use crate::state::{SessionEvent, SessionMachine, SessionNotice};
use crate::types::{IdentityAssertion, Session};

/// Folds an identity assertion into `current`.
///
/// Returns the session to commit, or `None` when nothing should be written.
/// An unauthenticated assertion never touches local state; expiry is left to
/// the next 401.
#[must_use]
pub fn merge_assertion(current: &Session, assertion: &IdentityAssertion) -> Option<Session> {
    if !assertion.authenticated {
        return None;
    }
    let asserted = assertion.user.as_ref()?;
    match current.user.as_ref() {
        Some(local) if current.is_authenticated && local.username == asserted.username => {
            if local == asserted {
                return None;
            }
            let mut updated = current.clone();
            updated.user = Some(asserted.clone());
            Some(updated)
        }
        _ => Some(Session::external(asserted.clone())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Deployment is not behind the identity proxy.
    Disabled,
    Unchanged,
    Merged,
    /// Provider says unauthenticated while a local session exists.
    Deferred,
    /// Another commit landed while the provider was being queried.
    Superseded,
    /// The session was mid-login or mid-refresh.
    Busy,
}

pub struct Reconciler {
    machine: Arc<SessionMachine>,
    api: Arc<dyn AuthApi>,
    enabled: bool,
}

impl Reconciler {
    pub fn new(machine: Arc<SessionMachine>, api: Arc<dyn AuthApi>, enabled: bool) -> Self {
        Self {
            machine,
            api,
            enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn reconcile(&self) -> ReconcileOutcome {
        if !self.enabled {
            return ReconcileOutcome::Disabled;
        }
        let (session, version) = self.machine.store().snapshot();
        let assertion = self.api.identity().await;

        let Some(merged) = merge_assertion(&session, &assertion) else {
            if !assertion.authenticated && session.is_authenticated {
                debug!(
                    message = assertion.message.as_deref(),
                    "identity provider reports no session; keeping local session"
                );
                return ReconcileOutcome::Deferred;
            }
            return ReconcileOutcome::Unchanged;
        };

        let previous = session.username().map(str::to_owned);
        let username = merged.username().map(str::to_owned).unwrap_or_default();
        match self
            .machine
            .commit(SessionEvent::IdentityMerged, merged, Some(version))
        {
            Ok(Some(_)) => {
                info!(
                    username = %username,
                    previous = previous.as_deref(),
                    "merged external identity into session"
                );
                if previous.as_deref() != Some(username.as_str()) {
                    self.machine.notify(SessionNotice::SignedIn { username });
                }
                ReconcileOutcome::Merged
            }
            Ok(None) => ReconcileOutcome::Superseded,
            Err(err) => {
                debug!(error = %err, "identity merge skipped");
                ReconcileOutcome::Busy
            }
        }
    }

    /// Re-runs [`Reconciler::reconcile`] every `every` until the task is aborted.
    pub fn spawn_periodic(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = self.reconcile().await;
                debug!(?outcome, "periodic identity reconcile");
            }
        })
    }
}
