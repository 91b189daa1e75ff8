//! Whole-object access to remote parent objects

use async_trait::async_trait;
use thiserror::Error;

use super::error::MembershipError;

/// Failure talking to the remote API, other than the parent being missing
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with a non-success status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (connect, timeout, TLS, ...)
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body could not be understood
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn transport(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(cause))
    }
}

/// A remote object that owns one or more membership lists
pub trait ParentObject: Send + Sync {
    /// Identifier reported by the remote API. Empty means "does not exist".
    fn remote_id(&self) -> &str;
}

/// Selects one list-valued attribute of a parent object
pub struct MembershipList<P> {
    /// Attribute name, used in log messages (e.g., "redirect_uris")
    pub name: &'static str,
    pub items: fn(&mut P) -> &mut Vec<String>,
}

impl<P> Clone for MembershipList<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for MembershipList<P> {}

impl<P> std::fmt::Debug for MembershipList<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipList")
            .field("name", &self.name)
            .finish()
    }
}

/// Read and replace parent objects as a whole
///
/// The backing API has no per-item endpoint, so `replace` always sends the
/// full object. Callers must hold the parent's lock from the `fetch` that
/// produced the object until `replace` returns.
#[async_trait]
pub trait ParentStore: Send + Sync {
    type Parent: ParentObject;

    /// Fetch the current state of a parent object
    ///
    /// Returns `Ok(None)` when the API reports the object as missing.
    async fn fetch(&self, parent_id: &str) -> Result<Option<Self::Parent>, RemoteError>;

    /// Replace the whole parent object
    async fn replace(&self, parent_id: &str, parent: &Self::Parent) -> Result<(), RemoteError>;
}

/// Fetch a parent object, treating a missing or id-less object as not found
pub async fn fetch_parent<S>(store: &S, parent_id: &str) -> Result<S::Parent, MembershipError>
where
    S: ParentStore + ?Sized,
{
    let parent = store
        .fetch(parent_id)
        .await
        .map_err(|source| MembershipError::Remote {
            parent_id: parent_id.to_string(),
            source,
        })?;

    match parent {
        Some(parent) if !parent.remote_id().is_empty() => Ok(parent),
        _ => Err(MembershipError::ParentNotFound {
            parent_id: parent_id.to_string(),
        }),
    }
}
