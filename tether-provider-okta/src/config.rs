//! Okta provider configuration

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const ORG_URL_ENV: &str = "OKTA_ORG_URL";
pub const API_TOKEN_ENV: &str = "OKTA_API_TOKEN";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum OktaError {
    #[error("missing Okta setting '{setting}' (set it in the provider block or {env})")]
    MissingSetting {
        setting: &'static str,
        env: &'static str,
    },

    #[error("invalid Okta org URL '{url}': {reason}")]
    InvalidOrgUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The `provider.okta` block of the configuration file, as written
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OktaSettings {
    pub org_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Resolved connection settings for the Okta management API
#[derive(Clone)]
pub struct OktaConfig {
    /// Base URL of the org, always http or https
    pub org_url: Url,
    pub api_token: String,
    pub request_timeout: Duration,
}

impl OktaConfig {
    /// Resolve settings, falling back to `OKTA_ORG_URL` / `OKTA_API_TOKEN`
    pub fn resolve(settings: &OktaSettings) -> Result<Self, OktaError> {
        Self::resolve_with(settings, |name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        settings: &OktaSettings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OktaError> {
        let lookup = |value: &Option<String>, setting: &'static str, var: &'static str| {
            value
                .clone()
                .or_else(|| env(var))
                .filter(|v| !v.trim().is_empty())
                .ok_or(OktaError::MissingSetting { setting, env: var })
        };

        let org_url = lookup(&settings.org_url, "org_url", ORG_URL_ENV)?;
        let api_token = lookup(&settings.api_token, "api_token", API_TOKEN_ENV)?;

        let org_url = parse_org_url(org_url.trim())?;

        Ok(Self {
            org_url,
            api_token,
            request_timeout: Duration::from_secs(
                settings
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }
}

fn parse_org_url(raw: &str) -> Result<Url, OktaError> {
    let invalid = |reason: String| OktaError::InvalidOrgUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment".to_string()));
    }
    Ok(url)
}

impl fmt::Debug for OktaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OktaConfig")
            .field("org_url", &self.org_url)
            .field("api_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
