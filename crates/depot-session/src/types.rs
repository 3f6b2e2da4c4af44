use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Synthetic access token held while the identity proxy enforces access.
pub const EXTERNAL_ACCESS_TOKEN: &str = "external-identity";
/// Synthetic refresh token paired with [`EXTERNAL_ACCESS_TOKEN`].
pub const EXTERNAL_REFRESH_TOKEN: &str = "external-identity-refresh";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl User {
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// How the current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    #[default]
    Credentials,
    ExternalIdentity,
}

/// The authoritative local record of authentication state.
///
/// `is_authenticated` implies `user` and `access_token` are present. Whoever
/// detects expiry clears the flag eagerly; readers never infer it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub source: SessionSource,
}

impl Session {
    #[must_use]
    pub fn from_auth(auth: AuthResponse) -> Self {
        Self {
            user: Some(auth.user),
            access_token: Some(auth.access_token),
            refresh_token: Some(auth.refresh_token),
            is_authenticated: true,
            source: SessionSource::Credentials,
        }
    }

    /// Session asserted by the identity proxy, with non-expiring local tokens.
    #[must_use]
    pub fn external(user: User) -> Self {
        Self {
            user: Some(user),
            access_token: Some(EXTERNAL_ACCESS_TOKEN.to_string()),
            refresh_token: Some(EXTERNAL_REFRESH_TOKEN.to_string()),
            is_authenticated: true,
            source: SessionSource::ExternalIdentity,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.access_token.is_none() && self.refresh_token.is_none()
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }

    /// Access token to stamp on outbound requests, if any.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    #[must_use]
    pub fn refresh_credential(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    /// Drops an `is_authenticated` flag that the stored fields cannot back.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.is_authenticated && (self.user.is_none() || self.bearer().is_none()) {
            self.is_authenticated = false;
        }
        self
    }
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response body of the login and refresh endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Read-only snapshot of what the identity proxy says about the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentityAssertion {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

impl IdentityAssertion {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            user: None,
            message: Some(message.into()),
        }
    }
}
