//! Tether Okta Provider
//!
//! Manages single redirect URIs of Okta OAuth applications without owning the
//! application itself. Each URI is a membership of a list attribute on the
//! application, reconciled through a whole-object fetch and replace.

pub mod application;
pub mod client;
pub mod config;
pub mod schemas;

use std::collections::HashMap;
use std::sync::Arc;

use tether_core::lock::KeyedLockManager;
use tether_core::membership::{Membership, MembershipError, MembershipList, MembershipOrchestrator, ParentStore};
use tether_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use tether_core::resource::{Resource, ResourceId, State, Value};
use tether_core::schema::ResourceSchema;

pub use application::Application;
pub use client::OktaClient;
pub use config::{OktaConfig, OktaError, OktaSettings};

/// okta.app_oauth_redirect_uri resource type
pub struct RedirectUriType;

impl ResourceType for RedirectUriType {
    fn name(&self) -> &'static str {
        schemas::REDIRECT_URI
    }

    fn schema(&self) -> ResourceSchema {
        schemas::redirect_uri_schema()
    }
}

/// okta.app_oauth_post_logout_redirect_uri resource type
pub struct PostLogoutRedirectUriType;

impl ResourceType for PostLogoutRedirectUriType {
    fn name(&self) -> &'static str {
        schemas::POST_LOGOUT_REDIRECT_URI
    }

    fn schema(&self) -> ResourceSchema {
        schemas::post_logout_redirect_uri_schema()
    }
}

pub const REDIRECT_URIS: MembershipList<Application> = MembershipList {
    name: "redirect_uris",
    items: application::redirect_uris_mut,
};

pub const POST_LOGOUT_REDIRECT_URIS: MembershipList<Application> = MembershipList {
    name: "post_logout_redirect_uris",
    items: application::post_logout_redirect_uris_mut,
};

/// Okta Provider
///
/// Both resource kinds edit the same application object, so their
/// orchestrators share one lock manager: a redirect URI and a post-logout
/// redirect URI on the same application are never written concurrently.
pub struct OktaProvider<S: ParentStore<Parent = Application> = OktaClient> {
    redirect_uris: MembershipOrchestrator<S>,
    post_logout_redirect_uris: MembershipOrchestrator<S>,
}

impl OktaProvider<OktaClient> {
    pub fn new(config: &OktaConfig) -> Result<Self, OktaError> {
        Ok(Self::with_store(Arc::new(OktaClient::new(config)?)))
    }
}

impl<S: ParentStore<Parent = Application>> OktaProvider<S> {
    pub fn with_store(store: Arc<S>) -> Self {
        let locks = Arc::new(KeyedLockManager::new());
        Self {
            redirect_uris: MembershipOrchestrator::new(
                Arc::clone(&store),
                Arc::clone(&locks),
                REDIRECT_URIS,
            ),
            post_logout_redirect_uris: MembershipOrchestrator::new(store, locks, POST_LOGOUT_REDIRECT_URIS),
        }
    }

    fn orchestrator(&self, id: &ResourceId) -> ProviderResult<&MembershipOrchestrator<S>> {
        match id.resource_type.as_str() {
            schemas::REDIRECT_URI => Ok(&self.redirect_uris),
            schemas::POST_LOGOUT_REDIRECT_URI => Ok(&self.post_logout_redirect_uris),
            other => Err(
                ProviderError::new(format!("Unknown resource type: {}", other))
                    .for_resource(id.clone()),
            ),
        }
    }
}

/// Human-readable kind used in error messages ("redirect URI")
fn kind(id: &ResourceId) -> &'static str {
    match id.resource_type.as_str() {
        schemas::POST_LOGOUT_REDIRECT_URI => "post-logout redirect URI",
        _ => "redirect URI",
    }
}

fn required<'a>(id: &ResourceId, value: Option<&'a str>, attr: &str) -> ProviderResult<&'a str> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ProviderError::new(format!("{} is required", attr)).for_resource(id.clone())
    })
}

fn membership_error(id: &ResourceId, action: &str, error: MembershipError) -> ProviderError {
    ProviderError::new(format!("failed to {} {}: {}", action, kind(id), error))
        .for_resource(id.clone())
        .with_cause(error)
}

/// State tracked for a membership; the identifier is the URI itself
fn membership_state(id: &ResourceId, membership: &Membership) -> State {
    let mut attributes = HashMap::new();
    attributes.insert(
        "app_id".to_string(),
        Value::String(membership.parent_id.clone()),
    );
    attributes.insert("uri".to_string(), Value::String(membership.value.clone()));
    State::existing(id.clone(), attributes).with_identifier(membership.identifier())
}

/// Recover the membership from tracked state
///
/// Older entries may lack `uri`; the identifier carries the same value.
fn tracked_membership(state: &State) -> ProviderResult<Membership> {
    let app_id = required(&state.id, state.get_string("app_id"), "app_id")?;
    let uri = required(
        &state.id,
        state.identifier.as_deref().or_else(|| state.get_string("uri")),
        "uri",
    )?;
    Ok(Membership::new(app_id, uri))
}

impl<S: ParentStore<Parent = Application> + 'static> Provider for OktaProvider<S> {
    fn name(&self) -> &'static str {
        "okta"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(RedirectUriType), Box::new(PostLogoutRedirectUriType)]
    }

    fn read(&self, id: &ResourceId, prior: Option<&State>) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let prior = prior.cloned();
        Box::pin(async move {
            let orchestrator = self.orchestrator(&id)?;
            match prior {
                Some(state) if state.exists => {
                    let verified = orchestrator.verify(&tracked_membership(&state)?);
                    Ok(membership_state(&id, &verified))
                }
                _ => Ok(State::not_found(id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let id = &resource.id;
            let orchestrator = self.orchestrator(id)?;
            let app_id = required(id, resource.get_string("app_id"), "app_id")?;
            let uri = required(id, resource.get_string("uri"), "uri")?;

            let applied = orchestrator
                .ensure_present(app_id, uri)
                .await
                .map_err(|e| membership_error(id, "create", e))?;
            Ok(membership_state(id, &applied.membership))
        })
    }

    fn update(&self, id: &ResourceId, _from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let to = to.clone();
        Box::pin(async move {
            let orchestrator = self.orchestrator(&id)?;
            let app_id = required(&id, to.get_string("app_id"), "app_id")?;
            let uri = required(&id, to.get_string("uri"), "uri")?;

            let applied = orchestrator
                .ensure_present(app_id, uri)
                .await
                .map_err(|e| membership_error(&id, "update", e))?;
            Ok(membership_state(&id, &applied.membership))
        })
    }

    fn delete(&self, id: &ResourceId, from: &State) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let from = from.clone();
        Box::pin(async move {
            let orchestrator = self.orchestrator(&id)?;
            let membership = tracked_membership(&from)?;

            orchestrator
                .ensure_absent(&membership.parent_id, &membership.value)
                .await
                .map_err(|e| membership_error(&id, "delete", e))?;
            Ok(())
        })
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let import_id = import_id.to_string();
        Box::pin(async move {
            let orchestrator = self.orchestrator(&id)?;
            let membership = orchestrator
                .import(&import_id)
                .map_err(|e| membership_error(&id, "import", e))?;
            Ok(membership_state(&id, &membership))
        })
    }
}
