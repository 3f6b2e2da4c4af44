//! Status of the short-lived credential issued by the identity proxy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CERTIFICATE_PATH;
use crate::pipeline::{ApiRequest, Pipeline};

pub const CREDENTIAL_TRADITIONAL: &str = "TRADITIONAL";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    #[serde(default)]
    pub has_certificate: bool,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub issued_at_epoch: Option<i64>,
    #[serde(default)]
    pub expires_at_epoch: Option<i64>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub zero_trust_enabled: bool,
    #[serde(default)]
    pub credential_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CertificateInfo {
    /// Placeholder used when the deployment is reached without the proxy.
    pub fn not_via_proxy(message: impl Into<String>) -> Self {
        Self {
            credential_type: Some(CREDENTIAL_TRADITIONAL.to_string()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Seconds left at `now`; negative once expired.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at_epoch
            .map(|expires_at| expires_at - now.timestamp())
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(now)
            .is_some_and(|remaining| remaining <= 0)
    }

    /// Share of the lifetime left, clamped to `0..=100`.
    #[must_use]
    pub fn lifetime_percent(&self, now: DateTime<Utc>) -> f64 {
        let (Some(ttl), Some(remaining)) = (self.ttl_seconds, self.remaining_seconds(now)) else {
            return 0.0;
        };
        if ttl <= 0 {
            return 0.0;
        }
        (remaining as f64 / ttl as f64 * 100.0).clamp(0.0, 100.0)
    }
}

#[must_use]
pub fn format_remaining(seconds: i64) -> String {
    match seconds {
        s if s < 0 => "Expired".to_string(),
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m {}s", s / 60, s % 60),
        s if s < 86_400 => format!("{}h {}m", s / 3_600, (s % 3_600) / 60),
        s => format!("{}d {}h", s / 86_400, (s % 86_400) / 3_600),
    }
}

/// Reads the proxy's credential status; any failure reads as "not proxied".
pub async fn fetch_certificate_info(pipeline: &Pipeline) -> CertificateInfo {
    let response = match pipeline.execute(ApiRequest::get(CERTIFICATE_PATH)).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "certificate status unavailable");
            return CertificateInfo::not_via_proxy(err.to_string());
        }
    };
    let status = response.status();
    if !status.is_success() {
        warn!(%status, "certificate status request rejected");
        return CertificateInfo::not_via_proxy(format!("Not accessing via proxy ({status})"));
    }
    match response.json::<CertificateInfo>().await {
        Ok(info) => info,
        Err(err) => {
            warn!(error = %err, "certificate status unreadable");
            CertificateInfo::not_via_proxy(err.to_string())
        }
    }
}
