//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling validation of
//! configuration before anything is sent to a remote API. A schema also
//! records how a resource is identified and whether its read path detects
//! drift.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Changing this attribute replaces the resource instead of updating it
    pub force_new: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            force_new: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// How the local identifier of a resource is derived
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// The remote API assigns a surrogate id on create
    #[default]
    ServerAssigned,
    /// The identifier is the value of one of the resource's own attributes.
    ///
    /// Used for list members that have no remote id. Changing that attribute
    /// changes the identity, so it always replaces the resource.
    Value { attribute: String },
}

/// Whether reading a resource compares remote state against tracked state
///
/// Callers refreshing state skip `Provider::read` for `Disabled` types and
/// keep the tracked state as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriftDetection {
    #[default]
    Enabled,
    /// The read path returns tracked state untouched; changes made outside
    /// Tether go unnoticed until the next create or delete recomputes them.
    Disabled,
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub identity: Identity,
    pub drift_detection: DriftDetection,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            identity: Identity::default(),
            drift_detection: DriftDetection::default(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_drift_detection(mut self, drift_detection: DriftDetection) -> Self {
        self.drift_detection = drift_detection;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether a change to `attribute` must replace the resource
    pub fn requires_replace(&self, attribute: &str) -> bool {
        if let Identity::Value { attribute: identity_attr } = &self.identity
            && identity_attr == attribute
        {
            return true;
        }
        self.attributes
            .get(attribute)
            .is_some_and(|schema| schema.force_new)
    }

    /// Where a value-identified resource lives remotely: the identity
    /// attribute and every `force_new` attribute, sorted by name.
    ///
    /// Two resources with the same address manage the same remote entry.
    /// Server-assigned resources have no address.
    pub fn remote_address(&self, attributes: &HashMap<String, Value>) -> Option<Vec<(String, Value)>> {
        let Identity::Value { attribute } = &self.identity else {
            return None;
        };
        let value = attributes.get(attribute)?;

        let mut address = vec![(attribute.clone(), value.clone())];
        for (name, schema) in &self.attributes {
            if schema.force_new
                && name != attribute
                && let Some(value) = attributes.get(name)
            {
                address.push((name.clone(), value.clone()));
            }
        }
        address.sort_by(|a, b| a.0.cmp(&b.0));
        Some(address)
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        for (name, value) in attributes {
            if let Some(schema) = self.attributes.get(name)
                && let Err(e) = schema.attr_type.validate(value)
            {
                errors.push(e);
            }
            // Unknown attributes are allowed (for flexibility)
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Non-empty string type (opaque remote ids)
    pub fn non_empty_string() -> AttributeType {
        AttributeType::Custom {
            name: "NonEmptyString".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if !s.trim().is_empty() => Ok(()),
                _ => Err("Value must not be empty".to_string()),
            },
        }
    }

    /// Absolute URI type (e.g., "https://host/callback", "com.example.app:/cb")
    pub fn uri() -> AttributeType {
        AttributeType::Custom {
            name: "Uri".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => validate_uri(s),
                _ => Err("Expected string".to_string()),
            },
        }
    }
}

/// Validate that a string is an absolute URI with a scheme
///
/// Remote APIs compare redirect URIs byte for byte, so whitespace that
/// `Url::parse` would strip or encode is rejected as well.
pub fn validate_uri(uri: &str) -> Result<(), String> {
    url::Url::parse(uri).map_err(|e| format!("Invalid URI '{}': {}", uri, e))?;
    if uri.chars().any(char::is_whitespace) {
        return Err(format!("Invalid URI '{}': contains whitespace", uri));
    }
    Ok(())
}
