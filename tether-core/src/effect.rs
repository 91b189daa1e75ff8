//! Effect - A side effect to be performed against a Provider
//!
//! Effects are plain values. Nothing happens until the Interpreter runs them.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create a resource that is not tracked yet
    Create(Resource),
    /// Update a tracked resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    /// Create the desired resource, then delete the tracked one.
    ///
    /// Emitted when an attribute that determines identity changes. With
    /// `keep_previous` the tracked value is still declared by another
    /// resource, so only the create runs.
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
        keep_previous: bool,
    },
    /// Delete a tracked resource
    Delete { id: ResourceId, from: State },
    /// Stop tracking a resource without touching the remote object.
    ///
    /// Emitted instead of `Delete` when another declared resource manages
    /// the same remote entry (e.g. after a rename).
    Forget { id: ResourceId, from: State },
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. }
            | Effect::Replace { id, .. }
            | Effect::Delete { id, .. }
            | Effect::Forget { id, .. } => id,
        }
    }

    /// Short verb used when printing plans
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Replace { .. } => "replace",
            Effect::Delete { .. } => "delete",
            Effect::Forget { .. } => "forget",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.resource_id())
    }
}
