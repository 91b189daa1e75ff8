//! HTTP client for the Okta applications API
//!
//! The API has no endpoint for a single redirect URI, so the client exposes
//! whole-application fetch and replace through [`ParentStore`].

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use tether_core::membership::{ParentStore, RemoteError};
use url::Url;

use crate::application::Application;
use crate::config::{OktaConfig, OktaError};

/// Error body returned by the Okta API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_summary: Option<String>,
}

pub struct OktaClient {
    http: reqwest::Client,
    /// `{org}/api/v1/apps`
    apps_url: Url,
    auth: String,
}

impl OktaClient {
    pub fn new(config: &OktaConfig) -> Result<Self, OktaError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(OktaError::Client)?;

        let mut apps_url = config.org_url.clone();
        apps_url
            .path_segments_mut()
            .map_err(|()| OktaError::InvalidOrgUrl {
                url: config.org_url.to_string(),
                reason: "cannot be used as a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "v1", "apps"]);

        Ok(Self {
            http,
            apps_url,
            auth: format!("SSWS {}", config.api_token),
        })
    }

    /// URL of one application; the id is percent-encoded as a single segment
    fn app_url(&self, app_id: &str) -> Url {
        let mut url = self.apps_url.clone();
        // `apps_url` was checked to be a base URL in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(app_id);
        }
        url
    }

    /// Fetch an application; `Ok(None)` when Okta answers 404
    pub async fn get_application(&self, app_id: &str) -> Result<Option<Application>, RemoteError> {
        // An empty id would hit the list endpoint instead.
        if app_id.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(self.app_url(app_id))
            .header(header::AUTHORIZATION, &self.auth)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(RemoteError::transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("application {} not found", app_id);
            return Ok(None);
        }
        let response = check_status(response).await?;

        response
            .json::<Application>()
            .await
            .map(Some)
            .map_err(|e| RemoteError::Decode(format!("application {}: {}", app_id, e)))
    }

    /// Replace an application with `PUT /api/v1/apps/{id}`
    pub async fn update_application(
        &self,
        app_id: &str,
        app: &Application,
    ) -> Result<(), RemoteError> {
        let response = self
            .http
            .put(self.app_url(app_id))
            .header(header::AUTHORIZATION, &self.auth)
            .header(header::ACCEPT, "application/json")
            .json(app)
            .send()
            .await
            .map_err(RemoteError::transport)?;

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(ApiErrorBody {
            error_summary: Some(summary),
            error_code,
        }) => match error_code {
            Some(code) => format!("{} ({})", summary, code),
            None => summary,
        },
        _ if body.is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        _ => body,
    };

    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ParentStore for OktaClient {
    type Parent = Application;

    async fn fetch(&self, parent_id: &str) -> Result<Option<Application>, RemoteError> {
        self.get_application(parent_id).await
    }

    async fn replace(&self, parent_id: &str, parent: &Application) -> Result<(), RemoteError> {
        self.update_application(parent_id, parent).await
    }
}
