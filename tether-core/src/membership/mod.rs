//! Membership reconciliation
//!
//! A membership is one entry of a list-valued attribute on a larger remote
//! object (for example one redirect URI of an OAuth application). The remote
//! API only offers whole-object read and replace, so every change is a
//! fetch → reconcile → replace cycle run under a per-parent lock:
//!
//! - [`reconcile`] decides whether the list needs to change (pure)
//! - [`ParentStore`] fetches and replaces the parent object
//! - [`MembershipOrchestrator`] sequences both under [`KeyedLockManager`]
//!
//! Memberships have no remote id; their identifier is the item value itself.
//!
//! [`KeyedLockManager`]: crate::lock::KeyedLockManager

mod error;
mod import;
mod orchestrator;
mod reconcile;
mod remote;

pub use error::{MembershipError, MembershipResult};
pub use import::{IMPORT_DELIMITER, parse_import_id};
pub use orchestrator::{Applied, MembershipOrchestrator};
pub use reconcile::{Presence, Reconciliation, reconcile};
pub use remote::{MembershipList, ParentObject, ParentStore, RemoteError, fetch_parent};

/// Tracked state of one membership
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Membership {
    pub parent_id: String,
    pub value: String,
}

impl Membership {
    pub fn new(parent_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            value: value.into(),
        }
    }

    /// Local identifier; always the item value
    pub fn identifier(&self) -> &str {
        &self.value
    }
}
