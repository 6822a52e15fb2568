//! Rule registry for loading and managing rule and action definitions

use crate::binding::Dispatcher;
use crate::evaluator::RuleSet;
use crate::types::{ActionDef, BindingDef, RuleDef, RulesFile, Severity};
use lintel_core::{LintelError, Result};
use std::fs;
use std::path::Path;

/// Rules and dispatcher ready for a run
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub rules: RuleSet,
    pub dispatcher: Dispatcher,
}

/// Registry that holds all loaded rule, action and binding definitions
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<RuleDef>,
    actions: Vec<ActionDef>,
    binding: BindingDef,
}

impl RuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load definitions from a directory of TOML files
    ///
    /// Expects `path/rules/*.toml` files, loaded in file name order
    pub fn load_from_directory<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut registry = Self::new();
        let rules_path = path.as_ref().join("rules");

        if rules_path.exists() {
            let mut files = Vec::new();
            for entry in fs::read_dir(&rules_path)? {
                let entry = entry?;
                let file_path = entry.path();
                if file_path.extension().map(|e| e == "toml").unwrap_or(false) {
                    files.push(file_path);
                }
            }
            files.sort();
            for file_path in files {
                registry.load_file(&file_path)?;
            }
        }

        Ok(registry)
    }

    /// Load definitions from a TOML file
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.load_string(&content)
    }

    /// Load definitions from a TOML string
    ///
    /// A `[binding]` section replaces the mode and threshold; its map entries
    /// are appended to those already loaded.
    pub fn load_string(&mut self, content: &str) -> Result<()> {
        let file: RulesFile = toml::from_str(content).map_err(|e| {
            LintelError::ConfigLoadError(format!("Failed to parse rules TOML: {}", e))
        })?;

        self.rules.extend(file.rule);
        self.actions.extend(file.action);
        if let Some(binding) = file.binding {
            self.bind(binding);
        }

        Ok(())
    }

    /// Register a rule directly
    pub fn register(&mut self, rule: RuleDef) {
        self.rules.push(rule);
    }

    /// Register an action directly
    pub fn register_action(&mut self, action: ActionDef) {
        self.actions.push(action);
    }

    /// Merge a binding definition. Mode and thresholds are replaced, map
    /// entries are appended.
    pub fn bind(&mut self, binding: BindingDef) {
        self.binding.mode = binding.mode;
        self.binding.min_severity = binding.min_severity;
        self.binding.on_error = binding.on_error;
        self.binding.map.extend(binding.map);
    }

    /// Get all rules
    pub fn all(&self) -> &[RuleDef] {
        &self.rules
    }

    /// Get all actions
    pub fn actions(&self) -> &[ActionDef] {
        &self.actions
    }

    pub fn binding(&self) -> &BindingDef {
        &self.binding
    }

    /// Get rules filtered by severity
    pub fn by_severity(&self, severity: Severity) -> Vec<&RuleDef> {
        self.rules
            .iter()
            .filter(|r| r.severity == severity)
            .collect()
    }

    /// Get standalone rules that apply to a specific element type
    pub fn for_type(&self, element_type: &str) -> Vec<&RuleDef> {
        self.rules
            .iter()
            .filter(|r| r.standalone)
            .filter(|r| {
                r.applies_to
                    .as_ref()
                    .map_or(true, |sel| sel.matches(element_type))
            })
            .collect()
    }

    /// Get the number of loaded rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate everything and build the runtime rule set and dispatcher
    pub fn compile(&self) -> Result<CompiledRules> {
        let rules = RuleSet::compile(&self.rules)?;
        let dispatcher = Dispatcher::compile(&self.actions, &self.binding, &rules)?;
        log::debug!(
            "compiled {} rules and {} actions ({:?} binding)",
            rules.len(),
            dispatcher.actions().len(),
            dispatcher.mode()
        );
        Ok(CompiledRules { rules, dispatcher })
    }
}
