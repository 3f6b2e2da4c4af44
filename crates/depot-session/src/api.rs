use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ClientConfig, IDENTITY_PATH, LOGIN_PATH, REFRESH_PATH};
use crate::error::SessionError;
use crate::types::{AuthResponse, Credentials, IdentityAssertion, RefreshRequest};

/// Diagnostic message when the proxy could not be reached at all, which
/// usually means the backend session behind the proxy is missing.
pub const BACKEND_AUTH_REQUIRED: &str = "BACKEND_AUTH_REQUIRED";

/// Token and identity endpoints, behind a trait so tests can script them.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, SessionError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, SessionError>;

    /// Never fails: unreachable or erroring providers read as unauthenticated.
    async fn identity(&self) -> IdentityAssertion;
}

pub struct HttpAuthApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpAuthApi {
    #[must_use]
    pub fn new(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, SessionError> {
        let url = self.config.endpoint(LOGIN_PATH)?;
        let response = self.client.post(url).json(credentials).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::LoginFailed(format!("{status} {body}")));
        }
        response
            .json::<AuthResponse>()
            .await
            .map_err(|err| SessionError::LoginFailed(format!("unreadable login response: {err}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, SessionError> {
        let url = self.config.endpoint(REFRESH_PATH)?;
        let payload = RefreshRequest { refresh_token };
        let response = self.client.post(url).json(&payload).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::RefreshFailed::new(format!("{status} {body}")).into());
        }
        response.json::<AuthResponse>().await.map_err(|err| {
            SessionError::from(crate::RefreshFailed::new(format!(
                "unreadable refresh response: {err}"
            )))
        })
    }

    async fn identity(&self) -> IdentityAssertion {
        let url = match self.config.endpoint(IDENTITY_PATH) {
            Ok(url) => url,
            Err(err) => return IdentityAssertion::unauthenticated(err.to_string()),
        };
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                let err = SessionError::IdentityProviderUnreachable(err.to_string());
                warn!(error = %err, "identity check failed without a response");
                return IdentityAssertion::unauthenticated(BACKEND_AUTH_REQUIRED);
            }
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| format!("{status} {body}"));
            warn!(%status, message = %message, "identity check rejected");
            return IdentityAssertion::unauthenticated(message);
        }
        match response.json::<IdentityAssertion>().await {
            Ok(assertion) => {
                debug!(
                    authenticated = assertion.authenticated,
                    username = assertion.user.as_ref().map(|user| user.username.as_str()),
                    "identity assertion received"
                );
                assertion
            }
            Err(err) => {
                warn!(error = %err, "identity assertion unreadable");
                IdentityAssertion::unauthenticated(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_reads_message_field() {
        assert_eq!(
            error_message(r#"{"message":"Not authenticated via Teleport"}"#).as_deref(),
            Some("Not authenticated via Teleport")
        );
        assert_eq!(error_message("<html>"), None);
        assert_eq!(error_message(r#"{"error":"x"}"#), None);
    }
}
