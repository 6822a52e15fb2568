//! Rule outcome to action dispatch

use crate::action::{Action, Compatible};
use crate::evaluator::{RuleOutcome, RuleSet};
use crate::types::{ActionDef, BindingDef, BindingMode, Severity};
use lintel_core::{LintelError, Result};
use std::collections::HashMap;

/// One action scheduled for an element
#[derive(Debug, Clone)]
pub struct Dispatch<'a> {
    pub action: &'a Action,
    /// Rules whose outcomes scheduled the action, first trigger first
    pub triggers: Vec<&'a str>,
    /// True when at least one trigger was a failing outcome
    pub remedial: bool,
}

impl<'a> Dispatch<'a> {
    fn new(action: &'a Action, outcome: &'a RuleOutcome) -> Self {
        Self {
            action,
            triggers: vec![outcome.rule.as_str()],
            remedial: !outcome.passed,
        }
    }

    fn add_trigger(&mut self, outcome: &'a RuleOutcome) {
        if !self.triggers.contains(&outcome.rule.as_str()) {
            self.triggers.push(&outcome.rule);
        }
        self.remedial |= !outcome.passed;
    }
}

#[derive(Debug, Clone)]
struct MapEntry {
    rule: String,
    severity: Option<Severity>,
    actions: Vec<usize>,
    on_pass: bool,
}

/// Decides which actions run for a set of rule outcomes
#[derive(Debug, Clone)]
pub struct Dispatcher {
    mode: BindingMode,
    min_severity: Severity,
    on_error: bool,
    actions: Vec<Action>,
    map: Vec<MapEntry>,
}

impl Dispatcher {
    /// Validate actions and the binding against a compiled rule set
    pub fn compile(defs: &[ActionDef], binding: &BindingDef, rules: &RuleSet) -> Result<Self> {
        if binding.min_severity == Severity::Error {
            return Err(LintelError::InvalidConfig(
                "binding.min_severity cannot be 'error'".to_string(),
            ));
        }

        let mut index = HashMap::new();
        let mut actions = Vec::with_capacity(defs.len());
        for def in defs {
            let action = Action::from_def(def)?;
            if index.insert(def.name.clone(), actions.len()).is_some() {
                return Err(LintelError::InvalidConfig(format!(
                    "duplicate action '{}'",
                    def.name
                )));
            }
            if let Some(answers) = action.answers() {
                if !rules.contains(&answers.rule) {
                    return Err(LintelError::InvalidConfig(format!(
                        "action '{}' answers unknown rule '{}'",
                        def.name, answers.rule
                    )));
                }
            }
            actions.push(action);
        }

        let mut map = Vec::with_capacity(binding.map.len());
        for entry in &binding.map {
            if !rules.contains(&entry.rule) {
                return Err(LintelError::InvalidConfig(format!(
                    "binding references unknown rule '{}'",
                    entry.rule
                )));
            }
            let resolved = entry
                .actions
                .iter()
                .map(|name| {
                    index.get(name).copied().ok_or_else(|| {
                        LintelError::InvalidConfig(format!(
                            "binding for rule '{}' references unknown action '{}'",
                            entry.rule, name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            map.push(MapEntry {
                rule: entry.rule.clone(),
                severity: entry.severity,
                actions: resolved,
                on_pass: entry.on_pass,
            });
        }

        match binding.mode {
            BindingMode::Tight if !map.is_empty() => {
                log::warn!(
                    "binding mode is tight; {} binding.map entries are ignored",
                    map.len()
                );
            }
            BindingMode::Loose => {
                let declared = actions.iter().filter(|a| a.answers().is_some()).count();
                if declared > 0 {
                    log::warn!(
                        "binding mode is loose; {} action answers declarations are ignored",
                        declared
                    );
                }
            }
            _ => {}
        }

        Ok(Self {
            mode: binding.mode,
            min_severity: binding.min_severity,
            on_error: binding.on_error,
            actions,
            map,
        })
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    /// Whether evaluation errors may trigger actions
    pub fn on_error(&self) -> bool {
        self.on_error
    }

    /// A failing outcome that may trigger remedial actions
    pub fn triggers(&self, outcome: &RuleOutcome) -> bool {
        if outcome.passed {
            return false;
        }
        if outcome.is_evaluation_error() {
            return self.on_error;
        }
        outcome.severity >= self.min_severity
    }

    /// Ordered actions for one element's outcomes. Each action appears at
    /// most once, in the position of the first outcome that schedules it;
    /// every outcome that schedules it is listed in its triggers.
    pub fn resolve<'a>(&'a self, outcomes: &'a [RuleOutcome]) -> Vec<Dispatch<'a>> {
        match self.mode {
            BindingMode::Loose => self.resolve_loose(outcomes),
            BindingMode::Tight => self.resolve_tight(outcomes),
        }
    }

    fn resolve_loose<'a>(&'a self, outcomes: &'a [RuleOutcome]) -> Vec<Dispatch<'a>> {
        // action index -> position in `dispatches`
        let mut scheduled: HashMap<usize, usize> = HashMap::new();
        let mut dispatches: Vec<Dispatch<'a>> = Vec::new();

        for entry in &self.map {
            let hit = outcomes.iter().find(|o| {
                o.rule == entry.rule
                    && entry.severity.map_or(true, |s| s == o.severity)
                    && ((o.passed && entry.on_pass) || self.triggers(o))
            });
            let Some(outcome) = hit else {
                continue;
            };

            for &i in &entry.actions {
                match scheduled.get(&i) {
                    Some(&pos) => dispatches[pos].add_trigger(outcome),
                    None => {
                        scheduled.insert(i, dispatches.len());
                        dispatches.push(Dispatch::new(&self.actions[i], outcome));
                    }
                }
            }
        }

        dispatches
    }

    fn resolve_tight<'a>(&'a self, outcomes: &'a [RuleOutcome]) -> Vec<Dispatch<'a>> {
        let mut dispatches = Vec::new();

        for action in &self.actions {
            let mut dispatch: Option<Dispatch<'a>> = None;
            for outcome in outcomes {
                if !action.compatible(outcome) || !(outcome.passed || self.triggers(outcome)) {
                    continue;
                }
                match dispatch.as_mut() {
                    Some(d) => d.add_trigger(outcome),
                    None => dispatch = Some(Dispatch::new(action, outcome)),
                }
            }
            dispatches.extend(dispatch);
        }

        dispatches
    }
}
