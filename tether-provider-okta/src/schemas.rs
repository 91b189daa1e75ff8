//! Okta resource schema definitions

use tether_core::schema::{
    AttributeSchema, DriftDetection, Identity, ResourceSchema, types,
};

pub const REDIRECT_URI: &str = "okta.app_oauth_redirect_uri";
pub const POST_LOGOUT_REDIRECT_URI: &str = "okta.app_oauth_post_logout_redirect_uri";

/// Shared shape of an OAuth application URI membership
fn uri_membership_schema(resource_type: &str, description: &str, uri_description: &str) -> ResourceSchema {
    ResourceSchema::new(resource_type)
        .with_description(description)
        .with_identity(Identity::Value {
            attribute: "uri".to_string(),
        })
        .with_drift_detection(DriftDetection::Disabled)
        .attribute(
            AttributeSchema::new("app_id", types::non_empty_string())
                .required()
                .force_new()
                .with_description("OAuth application ID."),
        )
        .attribute(
            AttributeSchema::new("uri", types::uri())
                .required()
                .with_description(uri_description),
        )
}

pub fn redirect_uri_schema() -> ResourceSchema {
    uri_membership_schema(
        REDIRECT_URI,
        "One redirect URI of an Okta OIDC application",
        "Redirect URI to append to Okta OIDC application.",
    )
}

pub fn post_logout_redirect_uri_schema() -> ResourceSchema {
    uri_membership_schema(
        POST_LOGOUT_REDIRECT_URI,
        "One post-logout redirect URI of an Okta OIDC application",
        "Post-logout redirect URI to append to Okta OIDC application.",
    )
}

/// Returns all Okta schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    vec![redirect_uri_schema(), post_logout_redirect_uri_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tether_core::resource::Value;
    use tether_core::schema::TypeError;

    fn attrs(app_id: &str, uri: &str) -> HashMap<String, Value> {
        let mut attrs = HashMap::new();
        attrs.insert("app_id".to_string(), Value::String(app_id.to_string()));
        attrs.insert("uri".to_string(), Value::String(uri.to_string()));
        attrs
    }

    #[test]
    fn valid_redirect_uri() {
        let schema = redirect_uri_schema();
        assert!(schema.validate(&attrs("0oa1", "https://host/callback")).is_ok());
        assert!(schema.validate(&attrs("0oa1", "com.example.app:/callback")).is_ok());
    }

    #[test]
    fn both_attributes_are_required() {
        let errors = redirect_uri_schema().validate(&HashMap::new()).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e, TypeError::MissingRequired { .. }))
        );
    }

    #[test]
    fn rejects_empty_app_id_and_bad_uri() {
        let errors = post_logout_redirect_uri_schema()
            .validate(&attrs(" ", "not a uri"))
            .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn app_id_and_uri_force_replacement() {
        for schema in all_schemas() {
            assert!(schema.requires_replace("app_id"));
            assert!(schema.requires_replace("uri"));
            assert_eq!(schema.drift_detection, DriftDetection::Disabled);
            assert_eq!(
                schema.identity,
                Identity::Value {
                    attribute: "uri".to_string()
                }
            );
        }
    }
}
