//! Errors raised while reconciling a membership

use thiserror::Error;

use super::remote::RemoteError;

#[derive(Debug, Error)]
pub enum MembershipError {
    /// The parent object is missing remotely
    #[error("parent object with id {parent_id} does not exist")]
    ParentNotFound { parent_id: String },

    /// Fetching or replacing the parent failed
    #[error("remote call for parent object {parent_id} failed: {source}")]
    Remote {
        parent_id: String,
        #[source]
        source: RemoteError,
    },

    /// A composite import id could not be split
    #[error("invalid import id '{input}': expecting the following format: {expected}")]
    InvalidImportId {
        input: String,
        expected: &'static str,
    },
}

pub type MembershipResult<T> = Result<T, MembershipError>;
