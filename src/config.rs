//! Layered configuration.
//!
//! Resolution order, later wins: built-in defaults, the JSON config file
//! (`--config` or `~/.archgen/config.json`), `ARCHGEN_*` environment
//! variables, then command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_RETRIEVER_TOP_K: usize = 5;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub workers: usize,
    pub per_doc_limit: usize,
    pub max_retries: usize,
    pub temperature: Option<f32>,
    pub retriever_url: Option<String>,
    pub retriever_top_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
            per_doc_limit: crate::workspace::PER_DOC_LIMIT,
            max_retries: crate::api::MAX_RETRIES,
            temperature: None,
            retriever_url: None,
            retriever_top_k: DEFAULT_RETRIEVER_TOP_K,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("workers", &self.workers)
            .field("per_doc_limit", &self.per_doc_limit)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .field("retriever_url", &self.retriever_url)
            .field("retriever_top_k", &self.retriever_top_k)
            .finish()
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retriever_url: Option<String>,
}

/// Accept provider-prefixed ids such as `openai/gpt-4.1`.
pub fn normalize_model(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix("openai/").unwrap_or(id).to_string()
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {}", name, value);
            None
        }
    }
}

impl Settings {
    /// `~/.archgen/config.json`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".archgen").join("config.json"))
    }

    /// Resolve settings from every layer using the process environment.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::resolve(config_path, overrides, |name| std::env::var(name).ok())
    }

    pub fn resolve(
        config_path: Option<&Path>,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        settings.apply_env(env);
        settings.apply_overrides(overrides);
        settings.model = normalize_model(&settings.model);
        if settings.workers == 0 {
            warn!("Worker count of 0 is not usable; falling back to 1");
            settings.workers = 1;
        }

        debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ARCHGEN_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("ARCHGEN_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.api_key = Some(v);
        }
        if let Some(v) = get("ARCHGEN_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("ARCHGEN_TIMEOUT_SECS").and_then(|v| parse_env("ARCHGEN_TIMEOUT_SECS", &v)) {
            self.timeout_secs = v;
        }
        if let Some(v) = get("ARCHGEN_WORKERS").and_then(|v| parse_env("ARCHGEN_WORKERS", &v)) {
            self.workers = v;
        }
        if let Some(v) = get("ARCHGEN_RETRIEVER_URL") {
            self.retriever_url = Some(v);
        }
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(url) = &overrides.retriever_url {
            self.retriever_url = Some(url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_layers_later_wins() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, r#"{"model": "from-file", "workers": 2, "timeout_secs": 30}"#);

        let settings = Settings::resolve(
            Some(&path),
            &Overrides {
                workers: Some(4),
                ..Default::default()
            },
            env_from(&[("ARCHGEN_MODEL", "openai/gpt-4o"), ("ARCHGEN_WORKERS", "3")]),
        )
        .unwrap();

        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.per_doc_limit, 18_000);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_api_key_fallback_and_redaction() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "{}");

        let settings = Settings::resolve(
            Some(&path),
            &Overrides::default(),
            env_from(&[("OPENAI_API_KEY", "sk-secret")]),
        )
        .unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("sk-secret"));
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "{}");

        let settings = Settings::resolve(
            Some(&path),
            &Overrides::default(),
            env_from(&[("ARCHGEN_TIMEOUT_SECS", "soon"), ("ARCHGEN_WORKERS", "0")]),
        )
        .unwrap();

        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.workers, 1);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.json");
        assert!(Settings::resolve(Some(&missing), &Overrides::default(), |_| None).is_err());
    }
}
