use std::time::Duration;

use reqwest::Url;

use crate::error::SessionError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const IDENTITY_PATH: &str = "/api/auth/teleport";
pub const CERTIFICATE_PATH: &str = "/api/debug/certificate";

/// Connection settings for one API deployment.
///
/// ```rust,ignore
/// let config = ClientConfig::parse("https://warehouse-frontend.example.com")?
///     .with_identity_proxy_marker("warehouse-frontend")
///     .with_reconcile_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    identity_proxy_marker: Option<String>,
    reconcile_interval: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            identity_proxy_marker: None,
            reconcile_interval: None,
            request_timeout: None,
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, SessionError> {
        let url = Url::parse(base_url)
            .map_err(|err| SessionError::Config(format!("invalid base url {base_url}: {err}")))?;
        Ok(Self::new(url))
    }

    /// Host fragment that marks a deployment served through the identity proxy.
    #[must_use]
    pub fn with_identity_proxy_marker(mut self, marker: impl Into<String>) -> Self {
        self.identity_proxy_marker = Some(marker.into());
        self
    }

    #[must_use]
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn reconcile_interval(&self) -> Option<Duration> {
        self.reconcile_interval
    }

    #[must_use]
    pub fn is_identity_proxied(&self) -> bool {
        let Some(marker) = self
            .identity_proxy_marker
            .as_deref()
            .map(str::trim)
            .filter(|marker| !marker.is_empty())
        else {
            return false;
        };
        self.base_url
            .host_str()
            .is_some_and(|host| host.contains(marker))
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&url).map_err(|err| SessionError::Config(format!("invalid url {url}: {err}")))
    }

    /// HTTP client with a cookie jar, so proxy credentials ride along.
    pub fn http_client(&self) -> Result<reqwest::Client, SessionError> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_BASE_URL).expect("valid default URL"))
    }
}
