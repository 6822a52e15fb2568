//! Engine configuration loading

use lintel_core::{LintelError, Result};
use lintel_graph::{TraversalRuleDef, TraversalRules};
use lintel_rules::{ActionDef, BindingDef, RuleDef, RuleRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// `[traversal]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Report cycles and dangling relations instead of skipping them
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub rule: Vec<TraversalRuleDef>,
}

impl TraversalConfig {
    pub fn rules(&self) -> TraversalRules {
        TraversalRules::new(self.rule.clone())
    }
}

/// A complete engine configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub rule: Vec<RuleDef>,
    #[serde(default)]
    pub action: Vec<ActionDef>,
    #[serde(default)]
    pub binding: BindingDef,
}

impl EngineConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            LintelError::ConfigLoadError(format!("Failed to parse engine config: {}", e))
        })
    }

    /// Load a configuration from a TOML file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build a configuration from a rule registry, e.g. one loaded from a
    /// `rules/` directory
    pub fn from_registry(registry: &RuleRegistry, traversal: TraversalConfig) -> Self {
        Self {
            traversal,
            rule: registry.all().to_vec(),
            action: registry.actions().to_vec(),
            binding: registry.binding().clone(),
        }
    }

    /// The definitions as a registry, ready to compile
    pub fn registry(&self) -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        for rule in &self.rule {
            registry.register(rule.clone());
        }
        for action in &self.action {
            registry.register_action(action.clone());
        }
        registry.bind(self.binding.clone());
        registry
    }
}
