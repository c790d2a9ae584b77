//! Per-service pattern configuration from a roles file:
//! `{"defaults": {...}, "services": {"<folder>": {...}}}`.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub services: BTreeMap<String, Map<String, Value>>,
}

impl RolesConfig {
    /// Missing path means an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roles config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse roles config: {}", path.display()))
    }

    /// Defaults with the service's own keys laid over them.
    pub fn for_service(&self, service: &str) -> Map<String, Value> {
        let mut merged = self.defaults.clone();
        if let Some(overrides) = self.services.get(service) {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}
