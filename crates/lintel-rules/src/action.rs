//! Parameter-level corrective actions

use crate::evaluator::RuleOutcome;
use crate::types::{ActionDef, ActionKind, Answers};
use lintel_core::{LintelError, Result};
use lintel_graph::Parameters;
use serde::Serialize;
use thiserror::Error;

/// Why an action could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionError {
    #[error("parameter '{parameter}' not found")]
    ParameterNotFound { parameter: String },

    #[error("parameter '{parameter}' is not a string")]
    NotAString { parameter: String },

    #[error("no parent element to inherit '{parameter}' from")]
    NoParent { parameter: String },

    #[error("parent element has no parameter '{parameter}'")]
    ParentParameterNotFound { parameter: String },
}

/// Outcome of applying one action to one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub parameter: Option<String>,
    pub changed: bool,
    pub before: Option<toml::Value>,
    pub after: Option<toml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
    /// Rules whose outcomes dispatched the action, first trigger first
    pub triggers: Vec<String>,
    /// Dispatched by a failing outcome rather than an on-pass binding
    pub remedial: bool,
}

impl ActionResult {
    fn new(action: &str, parameter: Option<&str>) -> Self {
        Self {
            action: action.to_string(),
            parameter: parameter.map(str::to_string),
            changed: false,
            before: None,
            after: None,
            error: None,
            triggers: Vec::new(),
            remedial: false,
        }
    }

    fn unchanged(mut self, value: Option<toml::Value>) -> Self {
        self.before = value.clone();
        self.after = value;
        self
    }

    fn changed(mut self, before: Option<toml::Value>, after: Option<toml::Value>) -> Self {
        self.changed = true;
        self.before = before;
        self.after = after;
        self
    }

    fn failed(mut self, error: ActionError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach the dispatching rules
    pub fn triggered_by<I, S>(mut self, rules: I, remedial: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = rules.into_iter().map(Into::into).collect();
        self.remedial = remedial;
        self
    }

    /// The first rule that dispatched the action
    pub fn trigger(&self) -> Option<&str> {
        self.triggers.first().map(|t| t.as_str())
    }

    pub fn answers(&self, rule: &str) -> bool {
        self.triggers.iter().any(|t| t == rule)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// What an action may touch: the element's own parameters, mutably, and
/// the parameters of the element it was reached from, read-only.
pub struct ActionContext<'a> {
    pub parameters: &'a mut Parameters,
    pub parent: Option<&'a Parameters>,
}

impl<'a> ActionContext<'a> {
    pub fn new(parameters: &'a mut Parameters, parent: Option<&'a Parameters>) -> Self {
        Self { parameters, parent }
    }
}

/// Declares which rule outcomes an action answers.
///
/// Whether evaluation errors may trigger at all is left to the dispatcher.
pub trait Compatible {
    fn compatible(&self, outcome: &RuleOutcome) -> bool;
}

impl Compatible for Answers {
    fn compatible(&self, outcome: &RuleOutcome) -> bool {
        if self.rule != outcome.rule {
            return false;
        }
        if outcome.passed {
            self.on_pass
        } else {
            outcome.severity >= self.min_severity
        }
    }
}

/// A validated, named action
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    description: Option<String>,
    kind: ActionKind,
    answers: Option<Answers>,
}

impl Compatible for Action {
    fn compatible(&self, outcome: &RuleOutcome) -> bool {
        self.answers
            .as_ref()
            .map_or(false, |answers| answers.compatible(outcome))
    }
}

impl Action {
    /// Validate an action definition
    pub fn from_def(def: &ActionDef) -> Result<Self> {
        let invalid = |what: &str| {
            Err(LintelError::InvalidConfig(format!(
                "action '{}': {}",
                def.name, what
            )))
        };

        if def.name.trim().is_empty() {
            return Err(LintelError::InvalidConfig(
                "action name must not be empty".to_string(),
            ));
        }

        match &def.op {
            ActionKind::RemovePrefix { prefix, .. }
            | ActionKind::StripPrefixedParameters { prefix }
                if prefix.is_empty() =>
            {
                return invalid("prefix must not be empty");
            }
            ActionKind::ReplaceDefault { default, value, .. } if same_value(default, value) => {
                return invalid("replacement equals the default value");
            }
            _ => {}
        }

        if let Some(answers) = &def.answers {
            if answers.rule.trim().is_empty() {
                return invalid("answers.rule must not be empty");
            }
        }

        Ok(Self {
            name: def.name.clone(),
            description: def.description.clone(),
            kind: def.op.clone(),
            answers: def.answers.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn answers(&self) -> Option<&Answers> {
        self.answers.as_ref()
    }

    /// Apply the action. Never panics and never returns an error; failures
    /// are recorded on the result with `changed = false`.
    pub fn apply(&self, ctx: ActionContext<'_>) -> ActionResult {
        let result = ActionResult::new(&self.name, self.kind.target_parameter());
        let params = ctx.parameters;

        match &self.kind {
            ActionKind::RemovePrefix { parameter, prefix } => {
                let current = match params.get(parameter) {
                    Some(v) => v.clone(),
                    None => {
                        return result.failed(ActionError::ParameterNotFound {
                            parameter: parameter.clone(),
                        })
                    }
                };
                let Some(text) = current.as_str() else {
                    return result.failed(ActionError::NotAString {
                        parameter: parameter.clone(),
                    });
                };
                match text.strip_prefix(prefix.as_str()) {
                    Some(rest) => {
                        let after = toml::Value::String(rest.to_string());
                        params.set(parameter.clone(), after.clone());
                        result.changed(Some(current), Some(after))
                    }
                    None => result.unchanged(Some(current)),
                }
            }

            ActionKind::SetValue {
                parameter,
                value,
                create,
            } => match params.get(parameter).cloned() {
                Some(current) if same_value(&current, value) => result.unchanged(Some(current)),
                None if !*create => result.failed(ActionError::ParameterNotFound {
                    parameter: parameter.clone(),
                }),
                _ => {
                    let before = params.set(parameter.clone(), value.clone());
                    result.changed(before, Some(value.clone()))
                }
            },

            ActionKind::ReplaceDefault {
                parameter,
                default,
                value,
            } => match params.get(parameter).cloned() {
                None => result.failed(ActionError::ParameterNotFound {
                    parameter: parameter.clone(),
                }),
                Some(current) if same_value(&current, default) => {
                    params.set(parameter.clone(), value.clone());
                    result.changed(Some(current), Some(value.clone()))
                }
                Some(current) => result.unchanged(Some(current)),
            },

            ActionKind::StripPrefixedParameters { prefix } => {
                let mut removed = toml::Table::new();
                params.retain(|name, value| {
                    if name.starts_with(prefix.as_str()) {
                        removed.insert(name.to_string(), value.clone());
                        false
                    } else {
                        true
                    }
                });
                if removed.is_empty() {
                    result
                } else {
                    result.changed(Some(toml::Value::Table(removed)), None)
                }
            }

            ActionKind::InheritFromParent { parameter, source } => {
                let source = source.as_deref().unwrap_or(parameter);
                let Some(parent) = ctx.parent else {
                    return result.failed(ActionError::NoParent {
                        parameter: parameter.clone(),
                    });
                };
                let Some(inherited) = parent.get(source) else {
                    return result.failed(ActionError::ParentParameterNotFound {
                        parameter: source.to_string(),
                    });
                };
                if params
                    .get(parameter)
                    .map_or(false, |current| same_value(current, inherited))
                {
                    return result.unchanged(Some(inherited.clone()));
                }
                let before = params.set(parameter.clone(), inherited.clone());
                result.changed(before, Some(inherited.clone()))
            }
        }
    }
}

/// Value equality for idempotence checks: floats compare by bit pattern as
/// well, so a NaN already in place counts as applied
fn same_value(a: &toml::Value, b: &toml::Value) -> bool {
    use toml::Value;

    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || x.to_bits() == y.to_bits(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Table(xs), Value::Table(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| same_value(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn s(v: &str) -> toml::Value {
        toml::Value::String(v.to_string())
    }

    fn action(op: ActionKind) -> Action {
        Action::from_def(&ActionDef::new("test_action", op)).unwrap()
    }

    fn remove_tmp() -> Action {
        action(ActionKind::RemovePrefix {
            parameter: "Mark".to_string(),
            prefix: "TMP_".to_string(),
        })
    }

    #[test]
    fn test_remove_prefix_exact() {
        let mut params: Parameters = [("Mark", s("TMP_DoorWidth"))].into_iter().collect();

        let result = remove_tmp().apply(ActionContext::new(&mut params, None));
        assert!(result.changed);
        assert_eq!(result.before, Some(s("TMP_DoorWidth")));
        assert_eq!(result.after, Some(s("DoorWidth")));
        assert_eq!(params.get_str("Mark"), Some("DoorWidth"));

        let again = remove_tmp().apply(ActionContext::new(&mut params, None));
        assert!(!again.changed);
        assert!(again.error.is_none());
        assert_eq!(params.get_str("Mark"), Some("DoorWidth"));
    }

    #[test]
    fn test_remove_prefix_only_strips_once() {
        let mut params: Parameters = [("Mark", s("TMP_TMP_X"))].into_iter().collect();
        remove_tmp().apply(ActionContext::new(&mut params, None));
        assert_eq!(params.get_str("Mark"), Some("TMP_X"));
    }

    #[test]
    fn test_missing_parameter_is_error_result() {
        let mut params = Parameters::new();
        let result = remove_tmp().apply(ActionContext::new(&mut params, None));
        assert!(!result.changed);
        assert_eq!(
            result.error,
            Some(ActionError::ParameterNotFound {
                parameter: "Mark".to_string()
            })
        );

        let mut params: Parameters = [("Mark", toml::Value::Integer(1))].into_iter().collect();
        let result = remove_tmp().apply(ActionContext::new(&mut params, None));
        assert!(matches!(result.error, Some(ActionError::NotAString { .. })));
        assert_eq!(params.get("Mark"), Some(&toml::Value::Integer(1)));
    }

    #[test]
    fn test_set_value() {
        let set = action(ActionKind::SetValue {
            parameter: "Phase".to_string(),
            value: s("New"),
            create: false,
        });
        let mut params = Parameters::new();
        assert!(set.apply(ActionContext::new(&mut params, None)).is_error());
        assert!(params.is_empty());

        let create = action(ActionKind::SetValue {
            parameter: "Phase".to_string(),
            value: s("New"),
            create: true,
        });
        let result = create.apply(ActionContext::new(&mut params, None));
        assert!(result.changed);
        assert_eq!(result.before, None);
        assert!(!create.apply(ActionContext::new(&mut params, None)).changed);
        assert!(!set.apply(ActionContext::new(&mut params, None)).changed);
    }

    #[test]
    fn test_replace_default() {
        let replace = action(ActionKind::ReplaceDefault {
            parameter: "Comments".to_string(),
            default: s("Default"),
            value: s("Updated Value"),
        });
        let mut params: Parameters = [("Comments", s("Default"))].into_iter().collect();

        let result = replace.apply(ActionContext::new(&mut params, None));
        assert!(result.changed);
        assert_eq!(params.get_str("Comments"), Some("Updated Value"));
        assert!(!replace.apply(ActionContext::new(&mut params, None)).changed);
    }

    #[test]
    fn test_strip_prefixed_parameters() {
        let strip = action(ActionKind::StripPrefixedParameters {
            prefix: "Revit_".to_string(),
        });
        let mut params: Parameters = [
            ("Revit_Id", s("1")),
            ("Mark", s("D1")),
            ("Revit_Guid", s("g")),
        ]
        .into_iter()
        .collect();

        let result = strip.apply(ActionContext::new(&mut params, None));
        assert!(result.changed);
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["Mark"]);
        let removed = result.before.unwrap();
        assert_eq!(removed.as_table().unwrap().len(), 2);

        assert!(!strip.apply(ActionContext::new(&mut params, None)).changed);
    }

    #[test]
    fn test_inherit_from_parent() {
        let inherit = action(ActionKind::InheritFromParent {
            parameter: "Level".to_string(),
            source: None,
        });
        let parent: Parameters = [("Level", s("L2"))].into_iter().collect();
        let mut params: Parameters = [("Level", s("L1"))].into_iter().collect();

        let result = inherit.apply(ActionContext::new(&mut params, Some(&parent)));
        assert!(result.changed);
        assert_eq!(result.before, Some(s("L1")));
        assert_eq!(params.get_str("Level"), Some("L2"));

        let again = inherit.apply(ActionContext::new(&mut params, Some(&parent)));
        assert!(!again.changed);

        let orphan = inherit.apply(ActionContext::new(&mut params, None));
        assert!(matches!(orphan.error, Some(ActionError::NoParent { .. })));

        let bare = Parameters::new();
        let missing = inherit.apply(ActionContext::new(&mut params, Some(&bare)));
        assert!(matches!(
            missing.error,
            Some(ActionError::ParentParameterNotFound { .. })
        ));
    }

    #[test]
    fn test_nan_values_are_idempotent() {
        let set = action(ActionKind::SetValue {
            parameter: "Offset".to_string(),
            value: toml::Value::Float(f64::NAN),
            create: true,
        });
        let mut params = Parameters::new();
        assert!(set.apply(ActionContext::new(&mut params, None)).changed);
        let again = set.apply(ActionContext::new(&mut params, None));
        assert!(!again.changed);
        assert!(again.error.is_none());

        let inherit = action(ActionKind::InheritFromParent {
            parameter: "Offset".to_string(),
            source: None,
        });
        let parent: Parameters = [("Offset", toml::Value::Float(f64::NAN))].into_iter().collect();
        let result = inherit.apply(ActionContext::new(&mut params, Some(&parent)));
        assert!(!result.changed);
    }

    #[test]
    fn test_same_value_nested() {
        let nested = |x: f64| {
            toml::Value::Array(vec![toml::Value::Table(
                [("v".to_string(), toml::Value::Float(x))].into_iter().collect(),
            )])
        };
        assert!(same_value(&nested(f64::NAN), &nested(f64::NAN)));
        assert!(same_value(&nested(0.0), &nested(-0.0)));
        assert!(!same_value(&nested(1.0), &nested(2.0)));
        assert!(!same_value(&s("1"), &toml::Value::Integer(1)));
    }

    #[test]
    fn test_triggers() {
        let result = remove_tmp()
            .apply(ActionContext::new(&mut Parameters::new(), None))
            .triggered_by(["no_tmp", "mark_variant"], true);
        assert_eq!(result.trigger(), Some("no_tmp"));
        assert!(result.answers("mark_variant"));
        assert!(!result.answers("other"));
    }

    #[test]
    fn test_invalid_definitions() {
        let empty_prefix = ActionDef::new(
            "bad",
            ActionKind::RemovePrefix {
                parameter: "Mark".to_string(),
                prefix: String::new(),
            },
        );
        assert!(Action::from_def(&empty_prefix).is_err());

        let no_op = ActionDef::new(
            "bad",
            ActionKind::ReplaceDefault {
                parameter: "Comments".to_string(),
                default: s("x"),
                value: s("x"),
            },
        );
        assert!(Action::from_def(&no_op).is_err());
    }

    #[test]
    fn test_compatible() {
        let def = ActionDef::new(
            "strip",
            ActionKind::RemovePrefix {
                parameter: "Mark".to_string(),
                prefix: "TMP_".to_string(),
            },
        )
        .answering("no_tmp", Severity::Warning);
        let strip = Action::from_def(&def).unwrap();

        assert!(strip.compatible(&RuleOutcome::fail("no_tmp", Severity::Warning, "")));
        assert!(strip.compatible(&RuleOutcome::fail("no_tmp", Severity::Violation, "")));
        assert!(!strip.compatible(&RuleOutcome::fail("no_tmp", Severity::Info, "")));
        assert!(!strip.compatible(&RuleOutcome::fail("other", Severity::Violation, "")));
        // evaluation errors are gated by the dispatcher, not the declaration
        assert!(strip.compatible(&RuleOutcome::evaluation_error("no_tmp", "missing")));
        assert!(!strip.compatible(&RuleOutcome::pass("no_tmp", Severity::Warning)));

        let unbound = remove_tmp();
        assert!(!unbound.compatible(&RuleOutcome::fail("no_tmp", Severity::Violation, "")));
    }
}
