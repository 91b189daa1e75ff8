//! Okta application model
//!
//! Only the fields Tether edits are typed. Everything else the API returns is
//! kept in `extra` maps so a replace sends the object back unchanged apart
//! from the reconciled list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tether_core::membership::ParentObject;

/// An Okta application as returned by `GET /api/v1/apps/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub settings: ApplicationSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_client: Option<OAuthClientSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `settings.oauthClient`; Okta uses snake_case inside this block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthClientSettings {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uris: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Application {
    fn oauth_client_mut(&mut self) -> &mut OAuthClientSettings {
        self.settings
            .oauth_client
            .get_or_insert_with(OAuthClientSettings::default)
    }

    pub fn redirect_uris(&self) -> &[String] {
        self.settings
            .oauth_client
            .as_ref()
            .map(|c| c.redirect_uris.as_slice())
            .unwrap_or_default()
    }

    pub fn post_logout_redirect_uris(&self) -> &[String] {
        self.settings
            .oauth_client
            .as_ref()
            .and_then(|c| c.post_logout_redirect_uris.as_deref())
            .unwrap_or_default()
    }
}

/// List accessor for `settings.oauthClient.redirect_uris`
pub fn redirect_uris_mut(app: &mut Application) -> &mut Vec<String> {
    &mut app.oauth_client_mut().redirect_uris
}

/// List accessor for `settings.oauthClient.post_logout_redirect_uris`
pub fn post_logout_redirect_uris_mut(app: &mut Application) -> &mut Vec<String> {
    app.oauth_client_mut()
        .post_logout_redirect_uris
        .get_or_insert_with(Vec::new)
}

impl ParentObject for Application {
    fn remote_id(&self) -> &str {
        &self.id
    }
}
