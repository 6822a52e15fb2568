//! Lintel Rules - Validation rules and corrective actions
//!
//! This crate provides rule definitions that check element parameters,
//! actions that repair them, and the binding policy that decides which
//! actions answer which rule outcomes.

mod action;
mod binding;
mod evaluator;
mod expr;
mod registry;
mod types;

pub use action::{Action, ActionContext, ActionError, ActionResult, Compatible};
pub use binding::{Dispatch, Dispatcher};
pub use evaluator::{ElementView, Rule, RuleOutcome, RuleSet};
pub use expr::{parse_expr, ExprError, RuleExpr};
pub use registry::{CompiledRules, RuleRegistry};
pub use types::{
    ActionDef, ActionKind, Answers, BindingDef, BindingMode, CheckKind, LooseBinding, RuleDef,
    RulesFile, Severity,
};
