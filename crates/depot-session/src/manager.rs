use std::sync::Arc;

use reqwest::Response;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{AuthApi, HttpAuthApi};
use crate::config::ClientConfig;
use crate::credential::{fetch_certificate_info, CertificateInfo};
use crate::error::{SessionError, StorageError};
use crate::guard::{GuardDecision, RouteGuard};
use crate::pipeline::{ApiRequest, Pipeline};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::refresh::RefreshCoordinator;
use crate::state::{SessionEvent, SessionMachine, SessionNotice, SessionPhase};
use crate::storage::SessionStorage;
use crate::store::TokenStore;
use crate::types::{Credentials, Session};

/// Cloneable handle over the whole session subsystem.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    machine: Arc<SessionMachine>,
    api: Arc<dyn AuthApi>,
    refresher: Arc<RefreshCoordinator>,
    pipeline: Pipeline,
    reconciler: Arc<Reconciler>,
}

impl SessionManager {
    /// Builds the manager against the HTTP endpoints in `config`.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, SessionError> {
        let client = config.http_client()?;
        let api = Arc::new(HttpAuthApi::new(client.clone(), config.clone()));
        Ok(Self::with_api(config, client, storage, api))
    }

    /// Hydrates the session from `storage` and wires every component.
    pub fn with_api(
        config: ClientConfig,
        client: reqwest::Client,
        storage: Arc<dyn SessionStorage>,
        api: Arc<dyn AuthApi>,
    ) -> Self {
        let store = Arc::new(TokenStore::new(storage));
        let hydrated = store.hydrate();
        let initial = match &hydrated {
            Ok(session) => SessionPhase::from_session(session),
            Err(_) => SessionPhase::Unauthenticated,
        };
        let machine = Arc::new(SessionMachine::new(store.clone(), initial));
        if let Err(err) = hydrated {
            recover_from_corruption(&machine, &err);
        }

        let refresher = Arc::new(RefreshCoordinator::new(machine.clone(), api.clone()));
        let pipeline = Pipeline::new(client, config.clone(), store, refresher.clone());
        let reconciler = Arc::new(Reconciler::new(
            machine.clone(),
            api.clone(),
            config.is_identity_proxied(),
        ));
        Self {
            inner: Arc::new(Inner {
                config,
                machine,
                api,
                refresher,
                pipeline,
                reconciler,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.machine.store().get()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.machine.phase()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.inner.machine.subscribe()
    }

    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.machine.watch()
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Exchanges credentials for a session. Signing in from any phase other
    /// than `Unauthenticated` or `Failed` ends the current session first.
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Session, SessionError> {
        let machine = &self.inner.machine;
        if !matches!(
            machine.phase(),
            SessionPhase::Unauthenticated | SessionPhase::Failed
        ) {
            self.logout()?;
        }
        let credentials = Credentials::new(username, password);
        machine.transition(SessionEvent::BeginLogin)?;
        match self.inner.api.login(&credentials).await {
            Ok(auth) => {
                let session = Session::from_auth(auth);
                machine.commit(SessionEvent::LoginSucceeded, session.clone(), None)?;
                info!(username = %credentials.username, "signed in");
                machine.notify(SessionNotice::SignedIn {
                    username: credentials.username.clone(),
                });
                Ok(session)
            }
            Err(err) => {
                if let Err(moved_on) = machine.transition(SessionEvent::LoginFailed) {
                    debug!(error = %moved_on, "session changed while signing in");
                }
                warn!(username = %credentials.username, error = %err, "sign in failed");
                Err(err)
            }
        }
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        let machine = &self.inner.machine;
        machine.commit(SessionEvent::Logout, Session::default(), None)?;
        info!("signed out");
        machine.notify(SessionNotice::SignedOut);
        Ok(())
    }

    /// Completes an interrupted refresh after startup: a stored refresh token
    /// with no access token is exchanged right away. Returns whether it ran.
    pub async fn resume(&self) -> Result<bool, SessionError> {
        let session = self.session();
        if session.is_authenticated
            || session.bearer().is_some()
            || session.refresh_credential().is_none()
        {
            return Ok(false);
        }
        self.inner.refresher.obtain_fresh_token(None).await?;
        Ok(true)
    }

    /// Sends an API call through the authorization pipeline.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, SessionError> {
        self.inner.pipeline.execute(request).await
    }

    pub async fn reconcile(&self) -> ReconcileOutcome {
        self.inner.reconciler.reconcile().await
    }

    /// Route-entry hook: reconciles with the identity proxy, then applies `guard`.
    pub async fn enter_protected_route(&self, guard: &RouteGuard) -> GuardDecision {
        if self.inner.reconciler.is_enabled() {
            self.reconcile().await;
        }
        guard.check(&self.session())
    }

    /// Starts periodic reconciliation when the deployment is proxied and an
    /// interval is configured.
    #[must_use]
    pub fn spawn_identity_watch(&self) -> Option<JoinHandle<()>> {
        let every = self.inner.config.reconcile_interval()?;
        if !self.inner.reconciler.is_enabled() {
            return None;
        }
        Some(self.inner.reconciler.clone().spawn_periodic(every))
    }

    pub async fn certificate_info(&self) -> CertificateInfo {
        fetch_certificate_info(&self.inner.pipeline).await
    }
}

fn recover_from_corruption(machine: &SessionMachine, err: &StorageError) {
    warn!(error = %err, "stored session unreadable; starting signed out");
    for event in [SessionEvent::StorageCorrupt, SessionEvent::Recover] {
        if let Err(err) = machine.transition(event) {
            warn!(error = %err, "could not record storage recovery");
        }
    }
}
