//! Loading of the `tether.json` configuration file

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tether_core::resource::{Resource, ResourceId, Value};
use tether_provider_okta::OktaSettings;
use tether_state::BackendConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub provider: ProviderBlock,
    #[serde(default)]
    pub state: StateBlock,
    #[serde(default)]
    pub resources: Vec<ResourceBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBlock {
    #[serde(default)]
    pub okta: OktaSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateBlock {
    /// Backend type; only "local" is available
    pub backend: Option<String>,
    /// State file path, relative to the configuration file
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceBlock {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))
    }

    /// Desired resources, in declaration order
    pub fn resources(&self) -> Result<Vec<Resource>, String> {
        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(self.resources.len());

        for block in &self.resources {
            if block.resource_type.is_empty() || block.name.is_empty() {
                return Err("Every resource needs a non-empty type and name".to_string());
            }
            let id = ResourceId::new(&block.resource_type, &block.name);
            if !seen.insert(id.clone()) {
                return Err(format!("Duplicate resource {}", id));
            }

            let attributes: HashMap<String, Value> = block
                .attributes
                .iter()
                .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                .collect();
            resources.push(Resource { id, attributes });
        }

        Ok(resources)
    }

    /// Backend configuration; a relative state path is resolved against `base_dir`
    pub fn backend_config(&self, base_dir: &Path) -> BackendConfig {
        let mut config = BackendConfig::local();
        if let Some(backend) = &self.state.backend {
            config.backend_type = backend.clone();
        }

        let path = self
            .state
            .path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(tether_state::LocalBackend::DEFAULT_STATE_FILE));
        let path = if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        };
        config.attributes.insert(
            "path".to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        config
    }
}
