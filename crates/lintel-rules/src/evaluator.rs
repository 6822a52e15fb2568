//! Rule evaluation against a single element

use crate::expr::{parse_expr, RuleExpr};
use crate::types::{CheckKind, RuleDef, Severity};
use lintel_core::{ElementKey, LintelError, Result};
use lintel_graph::{value_is_blank, ElementRef, Parameters, TypeSelector};
use serde::Serialize;
use std::collections::HashMap;

/// Read-only snapshot of the element a rule looks at
#[derive(Debug, Clone, Copy)]
pub struct ElementView<'a> {
    pub key: &'a ElementKey,
    pub element_type: &'a str,
    pub parameters: &'a Parameters,
}

impl<'a> ElementView<'a> {
    pub fn new(key: &'a ElementKey, element_type: &'a str, parameters: &'a Parameters) -> Self {
        Self {
            key,
            element_type,
            parameters,
        }
    }
}

impl<'a> From<ElementRef<'a>> for ElementView<'a> {
    fn from(element: ElementRef<'a>) -> Self {
        Self::new(element.key, element.element_type, element.parameters)
    }
}

/// Result of evaluating one rule on one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
}

impl RuleOutcome {
    pub fn pass(rule: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule: rule.into(),
            passed: true,
            severity,
            message: String::new(),
        }
    }

    pub fn fail(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            passed: false,
            severity,
            message: message.into(),
        }
    }

    /// The rule could not be evaluated (missing or malformed parameter)
    pub fn evaluation_error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::fail(rule, Severity::Error, message)
    }

    pub fn is_evaluation_error(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

#[derive(Debug, Clone)]
enum Node {
    Check(CheckKind),
    Ref(usize),
    All(Vec<Node>),
    Any(Vec<Node>),
}

impl Node {
    fn references(&self, out: &mut Vec<usize>) {
        match self {
            Node::Check(_) => {}
            Node::Ref(i) => out.push(*i),
            Node::All(items) | Node::Any(items) => {
                for item in items {
                    item.references(out);
                }
            }
        }
    }
}

/// Intermediate result before a rule's name, severity and message apply
struct Verdict {
    passed: bool,
    error: bool,
    message: String,
}

impl Verdict {
    fn pass() -> Self {
        Self {
            passed: true,
            error: false,
            message: String::new(),
        }
    }

    fn fail(message: String) -> Self {
        Self {
            passed: false,
            error: false,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            passed: false,
            error: true,
            message,
        }
    }
}

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    description: Option<String>,
    severity: Severity,
    applies_to: Option<TypeSelector>,
    message: Option<String>,
    standalone: bool,
    body: Node,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self.body, Node::Check(_))
    }

    pub fn applies(&self, element_type: &str) -> bool {
        self.applies_to
            .as_ref()
            .map_or(true, |sel| sel.matches(element_type))
    }

    fn outcome(&self, verdict: Verdict, view: &ElementView<'_>) -> RuleOutcome {
        if verdict.passed {
            RuleOutcome::pass(&self.name, self.severity)
        } else if verdict.error {
            RuleOutcome::evaluation_error(&self.name, verdict.message)
        } else {
            let message = match &self.message {
                Some(template) => render(template, &self.name, &verdict.message, view),
                None => verdict.message,
            };
            RuleOutcome::fail(&self.name, self.severity, message)
        }
    }
}

fn render(template: &str, rule: &str, detail: &str, view: &ElementView<'_>) -> String {
    template
        .replace("{key}", view.key.as_str())
        .replace("{type}", view.element_type)
        .replace("{rule}", rule)
        .replace("{detail}", detail)
}

/// An ordered, validated set of rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
}

impl RuleSet {
    /// Compile rule definitions, resolving composite expressions.
    ///
    /// Fails on duplicate names, declared `error` severity, malformed
    /// checks, unknown references and reference cycles.
    pub fn compile(defs: &[RuleDef]) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, def) in defs.iter().enumerate() {
            if def.name.trim().is_empty() {
                return Err(LintelError::InvalidConfig(
                    "rule name must not be empty".to_string(),
                ));
            }
            if index.insert(def.name.clone(), i).is_some() {
                return Err(LintelError::InvalidConfig(format!(
                    "duplicate rule '{}'",
                    def.name
                )));
            }
        }

        let mut rules = Vec::with_capacity(defs.len());
        for def in defs {
            if def.severity == Severity::Error {
                return Err(LintelError::InvalidConfig(format!(
                    "rule '{}': severity 'error' is reserved for evaluation errors",
                    def.name
                )));
            }

            let body = match (&def.check, &def.expr) {
                (Some(check), None) => {
                    validate_check(&def.name, check)?;
                    Node::Check(check.clone())
                }
                (None, Some(source)) => {
                    let expr = parse_expr(source).map_err(|e| {
                        LintelError::InvalidConfig(format!("rule '{}': {}", def.name, e))
                    })?;
                    resolve(&expr, &index, &def.name)?
                }
                (Some(_), Some(_)) => {
                    return Err(LintelError::InvalidConfig(format!(
                        "rule '{}' has both a check and an expr",
                        def.name
                    )))
                }
                (None, None) => {
                    return Err(LintelError::InvalidConfig(format!(
                        "rule '{}' needs either a check or an expr",
                        def.name
                    )))
                }
            };

            rules.push(Rule {
                name: def.name.clone(),
                description: def.description.clone(),
                severity: def.severity,
                applies_to: def.applies_to.clone(),
                message: def.message.clone(),
                standalone: def.standalone,
                body,
            });
        }

        detect_cycles(&rules)?;

        Ok(Self { rules, index })
    }

    /// Evaluate every applicable standalone rule, in registration order
    pub fn evaluate(&self, view: &ElementView<'_>) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.standalone && rule.applies(view.element_type))
            .map(|(i, _)| self.evaluate_index(i, view))
            .collect()
    }

    /// Evaluate a single rule by name, standalone or not
    pub fn evaluate_rule(&self, name: &str, view: &ElementView<'_>) -> Option<RuleOutcome> {
        self.index.get(name).map(|&i| self.evaluate_index(i, view))
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn evaluate_index(&self, i: usize, view: &ElementView<'_>) -> RuleOutcome {
        let rule = &self.rules[i];
        // A referenced rule that does not apply to this type holds vacuously
        if !rule.applies(view.element_type) {
            return RuleOutcome::pass(&rule.name, rule.severity);
        }
        let verdict = self.verdict(&rule.body, view);
        rule.outcome(verdict, view)
    }

    fn verdict(&self, node: &Node, view: &ElementView<'_>) -> Verdict {
        match node {
            Node::Check(check) => run_check(check, view),
            Node::Ref(i) => {
                let outcome = self.evaluate_index(*i, view);
                Verdict {
                    passed: outcome.passed,
                    error: outcome.is_evaluation_error(),
                    message: outcome.message,
                }
            }
            Node::All(items) => {
                for item in items {
                    let verdict = self.verdict(item, view);
                    if !verdict.passed {
                        return verdict;
                    }
                }
                Verdict::pass()
            }
            Node::Any(items) => {
                let mut messages = Vec::with_capacity(items.len());
                let mut all_errors = true;
                for item in items {
                    let verdict = self.verdict(item, view);
                    if verdict.passed {
                        return Verdict::pass();
                    }
                    all_errors &= verdict.error;
                    messages.push(verdict.message);
                }
                Verdict {
                    passed: false,
                    error: all_errors,
                    message: messages.join("; "),
                }
            }
        }
    }
}

fn resolve(expr: &RuleExpr, index: &HashMap<String, usize>, owner: &str) -> Result<Node> {
    match expr {
        RuleExpr::Ref(name) => index.get(name).map(|&i| Node::Ref(i)).ok_or_else(|| {
            LintelError::InvalidConfig(format!(
                "rule '{}' references unknown rule '{}'",
                owner, name
            ))
        }),
        RuleExpr::All(items) => Ok(Node::All(
            items
                .iter()
                .map(|e| resolve(e, index, owner))
                .collect::<Result<_>>()?,
        )),
        RuleExpr::Any(items) => Ok(Node::Any(
            items
                .iter()
                .map(|e| resolve(e, index, owner))
                .collect::<Result<_>>()?,
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

fn detect_cycles(rules: &[Rule]) -> Result<()> {
    let mut marks = vec![Mark::New; rules.len()];
    let mut path = Vec::new();
    for i in 0..rules.len() {
        visit(i, rules, &mut marks, &mut path)?;
    }
    Ok(())
}

fn visit(i: usize, rules: &[Rule], marks: &mut [Mark], path: &mut Vec<usize>) -> Result<()> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            let start = path.iter().position(|&p| p == i).unwrap_or(0);
            let mut names: Vec<&str> = path[start..]
                .iter()
                .map(|&p| rules[p].name.as_str())
                .collect();
            names.push(&rules[i].name);
            return Err(LintelError::InvalidConfig(format!(
                "rule reference cycle: {}",
                names.join(" -> ")
            )));
        }
        Mark::New => {}
    }

    marks[i] = Mark::Active;
    path.push(i);
    let mut refs = Vec::new();
    rules[i].body.references(&mut refs);
    for r in refs {
        visit(r, rules, marks, path)?;
    }
    path.pop();
    marks[i] = Mark::Done;
    Ok(())
}

fn validate_check(rule: &str, check: &CheckKind) -> Result<()> {
    let invalid = |what: &str| {
        Err(LintelError::InvalidConfig(format!(
            "rule '{}': {}",
            rule, what
        )))
    };

    match check {
        CheckKind::ForbiddenPrefix { prefix, .. } | CheckKind::NoPrefixedParameters { prefix }
            if prefix.is_empty() =>
        {
            invalid("prefix must not be empty")
        }
        CheckKind::ValueRange { min, max, .. } if min > max => {
            invalid(&format!("min {} is greater than max {}", min, max))
        }
        _ => Ok(()),
    }
}

fn missing(parameter: &str) -> Verdict {
    Verdict::error(format!("parameter '{}' is missing", parameter))
}

fn run_check(check: &CheckKind, view: &ElementView<'_>) -> Verdict {
    let params = view.parameters;

    match check {
        CheckKind::ParameterExists { parameter } => {
            if params.contains(parameter) {
                Verdict::pass()
            } else {
                Verdict::fail(format!("parameter '{}' is missing", parameter))
            }
        }
        CheckKind::HasValue { parameter } => match params.get(parameter) {
            None => missing(parameter),
            Some(value) if value_is_blank(value) => {
                Verdict::fail(format!("parameter '{}' has no value", parameter))
            }
            Some(_) => Verdict::pass(),
        },
        CheckKind::NotDefault { parameter, default } => match params.get(parameter) {
            None => missing(parameter),
            Some(value) if value == default => Verdict::fail(format!(
                "parameter '{}' still has its default value {}",
                parameter, default
            )),
            Some(_) => Verdict::pass(),
        },
        CheckKind::ForbiddenPrefix { parameter, prefix } => match params.get(parameter) {
            None => missing(parameter),
            Some(value) => match value.as_str() {
                None => Verdict::error(format!("parameter '{}' is not a string", parameter)),
                Some(s) if s.starts_with(prefix.as_str()) => Verdict::fail(format!(
                    "parameter '{}' value '{}' starts with '{}'",
                    parameter, s, prefix
                )),
                Some(_) => Verdict::pass(),
            },
        },
        CheckKind::NoPrefixedParameters { prefix } => {
            let offending: Vec<&str> = params
                .names()
                .filter(|name| name.starts_with(prefix.as_str()))
                .collect();
            if offending.is_empty() {
                Verdict::pass()
            } else {
                Verdict::fail(format!(
                    "parameters prefixed with '{}': {}",
                    prefix,
                    offending.join(", ")
                ))
            }
        }
        CheckKind::TypeIs { types } => {
            if types.matches(view.element_type) {
                Verdict::pass()
            } else {
                Verdict::fail(format!(
                    "type '{}' does not match '{}'",
                    view.element_type, types
                ))
            }
        }
        CheckKind::ValueRange {
            parameter,
            min,
            max,
        } => {
            if !params.contains(parameter) {
                return missing(parameter);
            }
            match params.get_number(parameter) {
                None => Verdict::error(format!("parameter '{}' is not a number", parameter)),
                Some(n) if n < *min || n > *max => Verdict::fail(format!(
                    "parameter '{}' is {} (expected {} to {})",
                    parameter, n, min, max
                )),
                Some(_) => Verdict::pass(),
            }
        }
        CheckKind::Equals { parameter, value } => match params.get(parameter) {
            None => missing(parameter),
            Some(actual) if actual == value => Verdict::pass(),
            Some(actual) => Verdict::fail(format!(
                "parameter '{}' is {} (expected {})",
                parameter, actual, value
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, toml::Value)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn s(v: &str) -> toml::Value {
        toml::Value::String(v.to_string())
    }

    fn eval(rules: &RuleSet, element_type: &str, params: &Parameters) -> Vec<RuleOutcome> {
        let key = ElementKey::new("e1");
        rules.evaluate(&ElementView::new(&key, element_type, params))
    }

    fn prefix_rule(name: &str) -> RuleDef {
        RuleDef::check(
            name,
            Severity::Warning,
            CheckKind::ForbiddenPrefix {
                parameter: "Mark".to_string(),
                prefix: "TMP_".to_string(),
            },
        )
    }

    #[test]
    fn test_forbidden_prefix() {
        let rules = RuleSet::compile(&[prefix_rule("no_tmp")]).unwrap();

        let out = eval(&rules, "Door", &params(&[("Mark", s("TMP_D1"))]));
        assert_eq!(out.len(), 1);
        assert!(!out[0].passed);
        assert_eq!(out[0].severity, Severity::Warning);
        assert!(out[0].message.contains("TMP_D1"));

        let out = eval(&rules, "Door", &params(&[("Mark", s("D1"))]));
        assert!(out[0].passed);
    }

    #[test]
    fn test_missing_parameter_is_evaluation_error() {
        let rules = RuleSet::compile(&[prefix_rule("no_tmp")]).unwrap();
        let out = eval(&rules, "Door", &Parameters::new());
        assert!(out[0].is_evaluation_error());
        assert!(out[0].message.contains("'Mark' is missing"));

        let out = eval(&rules, "Door", &params(&[("Mark", toml::Value::Integer(3))]));
        assert!(out[0].is_evaluation_error());
    }

    #[test]
    fn test_parameter_exists_fails_with_rule_severity() {
        let rules = RuleSet::compile(&[RuleDef::check(
            "has_mark",
            Severity::Violation,
            CheckKind::ParameterExists {
                parameter: "Mark".to_string(),
            },
        )])
        .unwrap();

        let out = eval(&rules, "Door", &Parameters::new());
        assert!(!out[0].passed);
        assert_eq!(out[0].severity, Severity::Violation);
        assert!(!out[0].is_evaluation_error());
    }

    #[test]
    fn test_value_checks() {
        let rules = RuleSet::compile(&[
            RuleDef::check(
                "filled",
                Severity::Info,
                CheckKind::HasValue {
                    parameter: "Comments".to_string(),
                },
            ),
            RuleDef::check(
                "changed",
                Severity::Warning,
                CheckKind::NotDefault {
                    parameter: "Comments".to_string(),
                    default: s("Default"),
                },
            ),
            RuleDef::check(
                "width",
                Severity::Violation,
                CheckKind::ValueRange {
                    parameter: "Width".to_string(),
                    min: 600.0,
                    max: 1200.0,
                },
            ),
            RuleDef::check(
                "fire",
                Severity::Violation,
                CheckKind::Equals {
                    parameter: "FireRating".to_string(),
                    value: s("EI30"),
                },
            ),
        ])
        .unwrap();

        let p = params(&[
            ("Comments", s("Default")),
            ("Width", toml::Value::Integer(900)),
            ("FireRating", s("EI60")),
        ]);
        let out = eval(&rules, "Door", &p);
        assert!(out[0].passed);
        assert!(!out[1].passed);
        assert!(out[2].passed);
        assert!(!out[3].passed);
        assert!(out[3].message.contains("EI60"));

        let p = params(&[
            ("Comments", s("  ")),
            ("Width", s("wide")),
            ("FireRating", s("EI30")),
        ]);
        let out = eval(&rules, "Door", &p);
        assert!(!out[0].passed);
        assert!(!out[0].is_evaluation_error());
        assert!(out[1].passed);
        assert!(out[2].is_evaluation_error());
        assert!(out[3].passed);
    }

    #[test]
    fn test_parameter_name_checks() {
        let rules = RuleSet::compile(&[
            RuleDef::check(
                "clean",
                Severity::Warning,
                CheckKind::NoPrefixedParameters {
                    prefix: "Revit_".to_string(),
                },
            ),
            RuleDef::check(
                "door_type",
                Severity::Info,
                CheckKind::TypeIs {
                    types: TypeSelector::parse("Door|Window").unwrap(),
                },
            ),
        ])
        .unwrap();

        let p = params(&[("Revit_Id", s("1")), ("Mark", s("D1")), ("Revit_Guid", s("x"))]);
        let out = eval(&rules, "Wall", &p);
        assert!(!out[0].passed);
        assert!(out[0].message.contains("Revit_Id, Revit_Guid"));
        assert!(!out[1].passed);
    }

    #[test]
    fn test_applies_to_and_standalone() {
        let rules = RuleSet::compile(&[
            prefix_rule("door_only").applies_to(TypeSelector::parse("Door").unwrap()),
            prefix_rule("hidden").standalone(false),
        ])
        .unwrap();

        let p = params(&[("Mark", s("TMP_1"))]);
        assert_eq!(eval(&rules, "Door", &p).len(), 1);
        assert!(eval(&rules, "Wall", &p).is_empty());

        let key = ElementKey::new("e1");
        let view = ElementView::new(&key, "Wall", &p);
        let hidden = rules.evaluate_rule("hidden", &view).unwrap();
        assert!(!hidden.passed);
    }

    #[test]
    fn test_message_template() {
        let rules = RuleSet::compile(&[prefix_rule("no_tmp")
            .with_message("{type} '{key}' fails {rule}: {detail}")])
        .unwrap();

        let out = eval(&rules, "Door", &params(&[("Mark", s("TMP_1"))]));
        assert!(out[0]
            .message
            .starts_with("Door 'e1' fails no_tmp: parameter 'Mark'"));
    }

    fn composite_set(expr: &str) -> RuleSet {
        RuleSet::compile(&[
            RuleDef::check(
                "has_mark",
                Severity::Warning,
                CheckKind::ParameterExists {
                    parameter: "Mark".to_string(),
                },
            )
            .with_message("mark missing"),
            prefix_rule("no_tmp").with_message("mark is temporary"),
            RuleDef::check(
                "has_level",
                Severity::Info,
                CheckKind::HasValue {
                    parameter: "Level".to_string(),
                },
            ),
            RuleDef::expr("combined", Severity::Violation, expr),
        ])
        .unwrap()
    }

    fn combined(rules: &RuleSet, p: &Parameters) -> RuleOutcome {
        let key = ElementKey::new("e1");
        rules
            .evaluate_rule("combined", &ElementView::new(&key, "Door", p))
            .unwrap()
    }

    #[test]
    fn test_and_reports_first_failure() {
        let rules = composite_set("has_mark & no_tmp");

        let out = combined(&rules, &Parameters::new());
        assert!(!out.passed);
        assert_eq!(out.severity, Severity::Violation);
        assert_eq!(out.message, "mark missing");

        let out = combined(&rules, &params(&[("Mark", s("TMP_2"))]));
        assert_eq!(out.message, "mark is temporary");

        assert!(combined(&rules, &params(&[("Mark", s("D2"))])).passed);
    }

    #[test]
    fn test_or_aggregates_messages() {
        let rules = composite_set("has_mark | has_level");

        assert!(combined(&rules, &params(&[("Level", s("L1"))])).passed);

        let out = combined(&rules, &params(&[("Level", s(""))]));
        assert!(!out.passed);
        assert_eq!(out.severity, Severity::Violation);
        assert_eq!(out.message, "mark missing; parameter 'Level' has no value");
    }

    #[test]
    fn test_composite_error_severity() {
        // AND reporting an evaluation error
        let rules = composite_set("no_tmp & has_mark");
        let out = combined(&rules, &Parameters::new());
        assert!(out.is_evaluation_error());

        // OR where every branch errored
        let rules = composite_set("no_tmp | has_level");
        let out = combined(&rules, &Parameters::new());
        assert!(out.is_evaluation_error());

        // OR with mixed failures keeps the configured severity
        let rules = composite_set("no_tmp | has_mark");
        let out = combined(&rules, &Parameters::new());
        assert_eq!(out.severity, Severity::Violation);
    }

    #[test]
    fn test_compile_errors() {
        let dup = RuleSet::compile(&[prefix_rule("a"), prefix_rule("a")]);
        assert!(matches!(dup, Err(LintelError::InvalidConfig(_))));

        let mut err_sev = prefix_rule("a");
        err_sev.severity = Severity::Error;
        assert!(RuleSet::compile(&[err_sev]).is_err());

        let unknown = RuleSet::compile(&[RuleDef::expr("x", Severity::Info, "a & b")]);
        assert!(unknown.is_err());

        let bad_syntax = RuleSet::compile(&[prefix_rule("a"), RuleDef::expr("x", Severity::Info, "a &")]);
        assert!(bad_syntax.is_err());

        let mut both = prefix_rule("a");
        both.expr = Some("a".to_string());
        assert!(RuleSet::compile(&[both]).is_err());

        let empty_prefix = RuleDef::check(
            "p",
            Severity::Info,
            CheckKind::NoPrefixedParameters {
                prefix: String::new(),
            },
        );
        assert!(RuleSet::compile(&[empty_prefix]).is_err());
    }

    #[test]
    fn test_reference_cycle_rejected() {
        let result = RuleSet::compile(&[
            RuleDef::expr("a", Severity::Info, "b | c"),
            RuleDef::expr("b", Severity::Info, "a"),
            prefix_rule("c"),
        ]);
        match result {
            Err(LintelError::InvalidConfig(msg)) => assert!(msg.contains("a -> b -> a")),
            other => panic!("expected cycle error, got {:?}", other),
        }

        let self_ref = RuleSet::compile(&[RuleDef::expr("a", Severity::Info, "a")]);
        assert!(self_ref.is_err());
    }
}
