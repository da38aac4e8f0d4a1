//! Engine configuration: budget limits and bucketing policy

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_NODE_LIMIT: usize = 100;
pub const DEFAULT_CHILD_LIMIT: usize = 10;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Prefix for environment overrides, e.g. `UNDERSTORY_NODE_LIMIT=40`.
pub const ENV_PREFIX: &str = "UNDERSTORY_";

/// Tunables of the coarsening engine.
///
/// Loaded from a TOML file such as
///
/// ```toml
/// node_limit = 60
/// child_limit = 8
/// priority_attributes = ["type", "label"]
/// similarity_threshold = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum rendered load before the engine starts grouping.
    pub node_limit: usize,
    /// Maximum number of entities a single fetch may add.
    pub child_limit: usize,
    /// Attributes used to bucket siblings, most important first.
    pub priority_attributes: Vec<String>,
    /// Similarity above which a node joins an existing bucket.
    pub similarity_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_limit: DEFAULT_NODE_LIMIT,
            child_limit: DEFAULT_CHILD_LIMIT,
            priority_attributes: Vec::new(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded engine configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Apply `UNDERSTORY_*` overrides from the process environment (and a
    /// `.env` file, if one is present).
    pub fn with_env_overrides(self) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        self.with_overrides(|key| dotenvy::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("NODE_LIMIT") {
            self.node_limit = parse_setting("NODE_LIMIT", &v)?;
        }
        if let Some(v) = var("CHILD_LIMIT") {
            self.child_limit = parse_setting("CHILD_LIMIT", &v)?;
        }
        if let Some(v) = var("SIMILARITY_THRESHOLD") {
            self.similarity_threshold = parse_setting("SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = var("PRIORITY_ATTRIBUTES") {
            self.priority_attributes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_limit == 0 {
            return Err(Error::Configuration("node_limit must be at least 1".into()));
        }
        if self.child_limit == 0 {
            return Err(Error::Configuration("child_limit must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Configuration(format!(
                "similarity_threshold must lie in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

fn parse_setting<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::Configuration(format!("{}{} has invalid value '{}'", ENV_PREFIX, name, value))
    })
}
