//! Differ - Compare desired state with tracked state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the state
//! tracked from the last apply, and generates the list of required Effects.
//! Resource schemas decide whether a change is an in-place update or a
//! replacement.

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences that can be applied in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists but an identity-bearing attribute changed
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// Without a schema every change is treated as an in-place update.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| changed.iter().any(|attr| s.requires_replace(attr)));
    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Remote addresses of every desired resource that has one, keyed by type
fn claimed_addresses(
    desired: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Vec<(String, Vec<(String, Value)>)> {
    desired
        .iter()
        .filter_map(|resource| {
            let schema = schemas.get(&resource.id.resource_type)?;
            let address = schema.remote_address(&resource.attributes)?;
            Some((resource.id.resource_type.clone(), address))
        })
        .collect()
}

/// Whether a tracked resource's remote entry is also declared in config
fn is_claimed(
    state: &State,
    claimed: &[(String, Vec<(String, Value)>)],
    schemas: &HashMap<String, ResourceSchema>,
) -> bool {
    schemas
        .get(&state.id.resource_type)
        .and_then(|schema| schema.remote_address(&state.attributes))
        .is_some_and(|address| {
            claimed
                .iter()
                .any(|(resource_type, claim)| *resource_type == state.id.resource_type && *claim == address)
        })
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Tracked resources that no longer appear in `desired` are deleted, unless
/// a desired resource manages the same remote entry: those are only
/// forgotten, and a replacement keeps such a previous value in place.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();
    let claimed = claimed_addresses(desired, schemas);

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let schema = schemas.get(&resource.id.resource_type);

        match diff(resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => plan.add(Effect::Update { id, from, to }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => {
                let keep_previous = is_claimed(&from, &claimed, schemas);
                if keep_previous {
                    log::debug!("{}: previous value is still declared, keeping it", id);
                }
                plan.add(Effect::Replace {
                    id,
                    from,
                    to,
                    changed_attributes,
                    keep_previous,
                })
            }
            Diff::NoChange(_) => {}
        }
    }

    let desired_ids: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|state| state.exists && !desired_ids.contains(&state.id))
        .collect();
    orphans.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));

    for state in orphans {
        let id = state.id.clone();
        let from = state.clone();
        if is_claimed(state, &claimed, schemas) {
            log::debug!("{}: remote entry is declared by another resource, forgetting it", id);
            plan.add(Effect::Forget { id, from });
        } else {
            plan.add(Effect::Delete { id, from });
        }
    }

    plan
}

/// Plan that deletes every tracked resource
pub fn destroy_plan(current_states: &HashMap<ResourceId, State>) -> Plan {
    create_plan(&[], current_states, &HashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType, Identity};

    fn membership_schema() -> ResourceSchema {
        ResourceSchema::new("membership")
            .attribute(AttributeSchema::new("app_id", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("uri", AttributeType::String))
            .with_identity(Identity::Value {
                attribute: "uri".to_string(),
            })
    }

    fn tracked(name: &str, app_id: &str, uri: &str) -> State {
        let mut attrs = HashMap::new();
        attrs.insert("app_id".to_string(), Value::String(app_id.to_string()));
        attrs.insert("uri".to_string(), Value::String(uri.to_string()));
        State::existing(ResourceId::new("membership", name), attrs).with_identifier(uri)
    }

    fn desired(name: &str, app_id: &str, uri: &str) -> Resource {
        Resource::new("membership", name)
            .with_attribute("app_id", Value::String(app_id.to_string()))
            .with_attribute("uri", Value::String(uri.to_string()))
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = desired("cb", "app1", "https://a");
        let current = State::not_found(desired.id.clone());

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let result = diff(
            &desired("cb", "app1", "https://a"),
            &tracked("cb", "app1", "https://a"),
            Some(&membership_schema()),
        );
        assert!(!result.is_change());
    }

    #[test]
    fn diff_value_change_replaces_membership() {
        let result = diff(
            &desired("cb", "app1", "https://b"),
            &tracked("cb", "app1", "https://a"),
            Some(&membership_schema()),
        );
        match result {
            Diff::Replace {
                from,
                to,
                changed_attributes,
                ..
            } => {
                assert_eq!(changed_attributes, vec!["uri".to_string()]);
                assert_eq!(from.identifier.as_deref(), Some("https://a"));
                assert_eq!(to.get_string("uri"), Some("https://b"));
            }
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn diff_parent_change_replaces_membership() {
        let result = diff(
            &desired("cb", "app2", "https://a"),
            &tracked("cb", "app1", "https://a"),
            Some(&membership_schema()),
        );
        assert!(matches!(result, Diff::Replace { .. }));
    }

    #[test]
    fn diff_without_schema_updates_in_place() {
        let result = diff(
            &desired("cb", "app1", "https://b"),
            &tracked("cb", "app1", "https://a"),
            None,
        );
        match result {
            Diff::Update {
                changed_attributes, ..
            } => assert!(changed_attributes.contains(&"uri".to_string())),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            desired("new", "app1", "https://new"),
            desired("moved", "app1", "https://moved-to"),
            desired("same", "app1", "https://same"),
        ];

        let mut current_states = HashMap::new();
        for state in [
            tracked("moved", "app1", "https://moved-from"),
            tracked("same", "app1", "https://same"),
            tracked("dropped", "app1", "https://dropped"),
        ] {
            current_states.insert(state.id.clone(), state);
        }

        let mut schemas = HashMap::new();
        schemas.insert("membership".to_string(), membership_schema());

        let plan = create_plan(&resources, &current_states, &schemas);

        assert_eq!(plan.effects().len(), 3);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Replace { .. }));
        assert!(
            matches!(&plan.effects()[2], Effect::Delete { id, .. } if id.name == "dropped")
        );
    }

    fn membership_schemas() -> HashMap<String, ResourceSchema> {
        let mut schemas = HashMap::new();
        schemas.insert("membership".to_string(), membership_schema());
        schemas
    }

    fn states(tracked: impl IntoIterator<Item = State>) -> HashMap<ResourceId, State> {
        tracked.into_iter().map(|s| (s.id.clone(), s)).collect()
    }

    #[test]
    fn renamed_resource_forgets_old_entry_instead_of_deleting() {
        let plan = create_plan(
            &[desired("new", "app1", "https://a/cb")],
            &states([tracked("old", "app1", "https://a/cb")]),
            &membership_schemas(),
        );

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(&plan.effects()[0], Effect::Create(r) if r.id.name == "new"));
        assert!(matches!(&plan.effects()[1], Effect::Forget { id, .. } if id.name == "old"));
    }

    #[test]
    fn same_uri_on_another_app_is_still_deleted() {
        let plan = create_plan(
            &[desired("new", "app2", "https://a/cb")],
            &states([tracked("old", "app1", "https://a/cb")]),
            &membership_schemas(),
        );

        assert!(matches!(&plan.effects()[1], Effect::Delete { id, .. } if id.name == "old"));
    }

    #[test]
    fn swapped_values_keep_both_remote_entries() {
        let plan = create_plan(
            &[
                desired("r1", "app1", "https://b"),
                desired("r2", "app1", "https://a"),
            ],
            &states([
                tracked("r1", "app1", "https://a"),
                tracked("r2", "app1", "https://b"),
            ]),
            &membership_schemas(),
        );

        assert_eq!(plan.effects().len(), 2);
        for effect in plan.effects() {
            assert!(
                matches!(effect, Effect::Replace { keep_previous: true, .. }),
                "{:?}",
                effect
            );
        }
    }

    #[test]
    fn replace_deletes_previous_value_nobody_declares() {
        let plan = create_plan(
            &[desired("cb", "app1", "https://b")],
            &states([tracked("cb", "app1", "https://a")]),
            &membership_schemas(),
        );

        assert!(matches!(
            plan.effects()[0],
            Effect::Replace {
                keep_previous: false,
                ..
            }
        ));
    }

    #[test]
    fn destroy_plan_deletes_everything_tracked() {
        let mut current_states = HashMap::new();
        for state in [tracked("b", "app1", "https://b"), tracked("a", "app1", "https://a")] {
            current_states.insert(state.id.clone(), state);
        }

        let plan = destroy_plan(&current_states);
        let names: Vec<&str> = plan
            .effects()
            .iter()
            .map(|e| e.resource_id().name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
