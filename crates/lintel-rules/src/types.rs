//! Rule, action and binding definitions

use lintel_graph::TypeSelector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for rule outcomes
///
/// Ordered from least to most severe. `Error` is reserved for rules that
/// could not evaluate at all (missing or malformed parameters) and cannot be
/// declared by a rule definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Violation,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Violation => "violation",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A leaf predicate over one element
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    /// The parameter must be present
    ParameterExists { parameter: String },
    /// The parameter must carry a non-blank value
    HasValue { parameter: String },
    /// The parameter must not still hold its default value
    NotDefault {
        parameter: String,
        #[serde(default = "default_marker")]
        default: toml::Value,
    },
    /// A string parameter must not start with the prefix
    ForbiddenPrefix { parameter: String, prefix: String },
    /// No parameter name may start with the prefix
    NoPrefixedParameters { prefix: String },
    /// The element type must match the selector
    TypeIs { types: TypeSelector },
    /// A numeric parameter must be within `[min, max]`
    ValueRange {
        parameter: String,
        min: f64,
        max: f64,
    },
    /// The parameter must equal the value
    Equals {
        parameter: String,
        value: toml::Value,
    },
}

pub(crate) fn default_marker() -> toml::Value {
    toml::Value::String("Default".to_string())
}

fn updated_marker() -> toml::Value {
    toml::Value::String("Updated Value".to_string())
}

fn default_true() -> bool {
    true
}

/// A complete rule definition
///
/// Exactly one of `check` (a leaf predicate) or `expr` (a combinator over
/// other named rules, e.g. `"has_mark & (no_tmp | legacy_ok)"`) must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Restrict the rule to element types
    #[serde(default)]
    pub applies_to: Option<TypeSelector>,
    pub severity: Severity,
    /// Message template with `{key}`, `{type}`, `{rule}` and `{detail}`
    /// placeholders
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub check: Option<CheckKind>,
    #[serde(default)]
    pub expr: Option<String>,
    /// When false the rule only runs as part of composite expressions
    #[serde(default = "default_true")]
    pub standalone: bool,
}

impl RuleDef {
    /// A leaf rule applying to every element
    pub fn check(name: impl Into<String>, severity: Severity, check: CheckKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            applies_to: None,
            severity,
            message: None,
            check: Some(check),
            expr: None,
            standalone: true,
        }
    }

    /// A composite rule over other named rules
    pub fn expr(name: impl Into<String>, severity: Severity, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            applies_to: None,
            severity,
            message: None,
            check: None,
            expr: Some(expr.into()),
            standalone: true,
        }
    }

    pub fn applies_to(mut self, selector: TypeSelector) -> Self {
        self.applies_to = Some(selector);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }
}

/// A parameter mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Strip a prefix from a string parameter value
    RemovePrefix { parameter: String, prefix: String },
    /// Set a parameter to a fixed value
    SetValue {
        parameter: String,
        value: toml::Value,
        /// Add the parameter when it is missing instead of failing
        #[serde(default)]
        create: bool,
    },
    /// Replace a default placeholder value
    ReplaceDefault {
        parameter: String,
        #[serde(default = "default_marker")]
        default: toml::Value,
        #[serde(default = "updated_marker")]
        value: toml::Value,
    },
    /// Remove every parameter whose name starts with the prefix
    StripPrefixedParameters { prefix: String },
    /// Copy a parameter from the element this one was reached from
    InheritFromParent {
        parameter: String,
        /// Parameter name on the parent, defaults to `parameter`
        #[serde(default)]
        source: Option<String>,
    },
}

impl ActionKind {
    /// The parameter this action targets, if it targets exactly one
    pub fn target_parameter(&self) -> Option<&str> {
        match self {
            ActionKind::RemovePrefix { parameter, .. }
            | ActionKind::SetValue { parameter, .. }
            | ActionKind::ReplaceDefault { parameter, .. }
            | ActionKind::InheritFromParent { parameter, .. } => Some(parameter),
            ActionKind::StripPrefixedParameters { .. } => None,
        }
    }

    /// Short strategy name used in reports
    pub fn strategy(&self) -> &'static str {
        match self {
            ActionKind::RemovePrefix { .. } => "remove_prefix",
            ActionKind::SetValue { .. } => "set_value",
            ActionKind::ReplaceDefault { .. } => "replace_default",
            ActionKind::StripPrefixedParameters { .. } => "strip_prefixed_parameters",
            ActionKind::InheritFromParent { .. } => "inherit_from_parent",
        }
    }
}

/// The rule condition an action declares it answers (tight coupling)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answers {
    pub rule: String,
    #[serde(default = "answers_min_severity")]
    pub min_severity: Severity,
    /// Also run when the rule passes (normalization)
    #[serde(default)]
    pub on_pass: bool,
}

fn answers_min_severity() -> Severity {
    Severity::Info
}

/// A complete action definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub op: ActionKind,
    #[serde(default)]
    pub answers: Option<Answers>,
}

impl ActionDef {
    pub fn new(name: impl Into<String>, op: ActionKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            op,
            answers: None,
        }
    }

    pub fn answering(mut self, rule: impl Into<String>, min_severity: Severity) -> Self {
        self.answers = Some(Answers {
            rule: rule.into(),
            min_severity,
            on_pass: false,
        });
        self
    }
}

/// How rule outcomes are connected to actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    /// The `[[binding.map]]` table decides
    #[default]
    Loose,
    /// Each action's `answers` declaration decides
    Tight,
}

/// One row of the loose binding table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LooseBinding {
    pub rule: String,
    /// Only match outcomes of exactly this severity
    #[serde(default)]
    pub severity: Option<Severity>,
    pub actions: Vec<String>,
    #[serde(default)]
    pub on_pass: bool,
}

impl LooseBinding {
    pub fn new(rule: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            rule: rule.into(),
            severity: None,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            on_pass: false,
        }
    }
}

/// Binding policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDef {
    #[serde(default)]
    pub mode: BindingMode,
    /// Failing outcomes below this severity never trigger actions
    #[serde(default = "binding_min_severity")]
    pub min_severity: Severity,
    /// Let evaluation errors trigger actions too
    #[serde(default)]
    pub on_error: bool,
    #[serde(default)]
    pub map: Vec<LooseBinding>,
}

fn binding_min_severity() -> Severity {
    Severity::Warning
}

impl Default for BindingDef {
    fn default() -> Self {
        Self {
            mode: BindingMode::default(),
            min_severity: binding_min_severity(),
            on_error: false,
            map: Vec::new(),
        }
    }
}

/// TOML file format for rule, action and binding definitions
#[derive(Debug, Default, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rule: Vec<RuleDef>,
    #[serde(default)]
    pub action: Vec<ActionDef>,
    #[serde(default)]
    pub binding: Option<BindingDef>,
}
