use std::sync::Arc;
use std::time::Instant;

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::refresh::RefreshCoordinator;
use crate::store::TokenStore;

/// One outbound API call.
///
/// Carries its own one-shot `retried` marker so concurrent calls never share
/// retry state.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    context: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            context: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Forwards collaborator-produced policy context under the body's
    /// `context` key. The value is never inspected.
    #[must_use]
    pub fn with_policy_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Sets the marker; returns `false` if it was already set.
    pub(crate) fn mark_retried(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }

    pub(crate) fn payload(&self) -> Option<Value> {
        let Some(context) = self.context.clone() else {
            return self.body.clone();
        };
        match self.body.clone() {
            None => Some(serde_json::json!({ "context": context })),
            Some(Value::Object(mut fields)) => {
                fields.insert("context".to_string(), context);
                Some(Value::Object(fields))
            }
            Some(other) => {
                debug!(path = %self.path, "policy context dropped for non-object body");
                Some(other)
            }
        }
    }
}

/// Stamps bearer tokens on outbound calls and recovers from one 401 per call.
pub struct Pipeline {
    client: reqwest::Client,
    config: ClientConfig,
    store: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl Pipeline {
    pub fn new(
        client: reqwest::Client,
        config: ClientConfig,
        store: Arc<TokenStore>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            client,
            config,
            store,
            refresher,
        }
    }

    /// Sends `request`, refreshing and retrying once on 401.
    ///
    /// Non-401 responses, success or not, are returned untouched. A 401 on a
    /// call that was already retried becomes [`SessionError::AuthorizationFailed`].
    pub async fn execute(&self, mut request: ApiRequest) -> Result<Response, SessionError> {
        let mut token = self.store.get().bearer().map(str::to_owned);
        loop {
            let response = self.send_once(&request, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            if !request.mark_retried() {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    "request unauthorized after retry"
                );
                return Err(SessionError::AuthorizationFailed {
                    method: request.method.to_string(),
                    path: request.path.clone(),
                });
            }
            info!(
                method = %request.method,
                path = %request.path,
                "http request unauthorized; refreshing access token"
            );
            let fresh = self.refresher.obtain_fresh_token(token.as_deref()).await?;
            token = Some(fresh);
        }
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, SessionError> {
        let url = self.config.endpoint(&request.path)?;
        let mut builder = self.client.request(request.method.clone(), url.clone());
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(payload) = request.payload() {
            builder = builder.json(&payload);
        }
        debug!(method = %request.method, url = %url, retried = request.retried, "http request");
        let start = Instant::now();
        let response = builder.send().await?;
        debug!(
            method = %request.method,
            url = %url,
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis(),
            "http response"
        );
        Ok(response)
    }
}
