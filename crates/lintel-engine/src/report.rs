//! Validation report types

use lintel_core::ElementKey;
use lintel_graph::TraversalError;
use lintel_rules::{ActionResult, RuleOutcome, Severity};
use serde::Serialize;

/// Everything that happened to one visited element
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRecord {
    pub key: ElementKey,
    pub element_type: String,
    pub depth: usize,
    /// The element this one was reached from
    pub parent: Option<ElementKey>,
    pub outcomes: Vec<RuleOutcome>,
    pub actions: Vec<ActionResult>,
    /// Actions not run because an earlier action on this element failed
    pub skipped: Vec<String>,
}

impl ValidationRecord {
    /// Failing outcomes, evaluation errors included
    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn changes(&self) -> impl Iterator<Item = &ActionResult> {
        self.actions.iter().filter(|a| a.changed)
    }

    pub fn has_errors(&self) -> bool {
        self.outcomes.iter().any(|o| o.is_evaluation_error())
            || self.actions.iter().any(|a| a.is_error())
    }

    /// A failing outcome is answered when an action it triggered, alone or
    /// together with other rules, ran without error
    fn is_answered(&self, outcome: &RuleOutcome) -> bool {
        self.actions
            .iter()
            .any(|a| !a.is_error() && a.answers(&outcome.rule))
    }
}

/// Aggregate counters
///
/// `passed + failed == rule_evaluations`, `fixed <= changed`, and
/// `errored` is rule evaluation errors plus action errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub elements: usize,
    pub rule_evaluations: usize,
    pub passed: usize,
    pub failed: usize,
    pub changed: usize,
    pub fixed: usize,
    pub errored: usize,
    pub traversal_errors: usize,
}

/// What one action did across a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSummary {
    pub action: String,
    pub applied: usize,
    pub errors: usize,
    /// Changed elements and the parameter touched, in traversal order
    pub changed: Vec<(ElementKey, Option<String>)>,
}

/// Accumulates records during a run
#[derive(Debug, Default)]
pub struct ReportBuilder {
    records: Vec<ValidationRecord>,
    traversal_errors: Vec<TraversalError>,
    counts: ReportCounts,
    dry_run: bool,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn push_record(&mut self, record: ValidationRecord) {
        let counts = &mut self.counts;
        counts.elements += 1;
        counts.rule_evaluations += record.outcomes.len();
        for outcome in &record.outcomes {
            if outcome.passed {
                counts.passed += 1;
            } else {
                counts.failed += 1;
                if outcome.is_evaluation_error() {
                    counts.errored += 1;
                }
            }
        }
        for result in &record.actions {
            if result.is_error() {
                counts.errored += 1;
            } else if result.changed {
                counts.changed += 1;
                if result.remedial {
                    counts.fixed += 1;
                }
            }
        }
        self.records.push(record);
    }

    pub fn push_traversal_error(&mut self, error: TraversalError) {
        self.counts.traversal_errors += 1;
        self.traversal_errors.push(error);
    }

    /// Seal the report
    pub fn finish(self) -> Report {
        Report {
            records: self.records,
            traversal_errors: self.traversal_errors,
            counts: self.counts,
            dry_run: self.dry_run,
        }
    }
}

/// A sealed validation report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    records: Vec<ValidationRecord>,
    traversal_errors: Vec<TraversalError>,
    counts: ReportCounts,
    dry_run: bool,
}

impl Report {
    /// Records in traversal order
    pub fn records(&self) -> &[ValidationRecord] {
        &self.records
    }

    pub fn record(&self, key: &ElementKey) -> Option<&ValidationRecord> {
        self.records.iter().find(|r| &r.key == key)
    }

    pub fn traversal_errors(&self) -> &[TraversalError] {
        &self.traversal_errors
    }

    pub fn counts(&self) -> &ReportCounts {
        &self.counts
    }

    /// True when the actions ran on a scratch copy of the graph
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Failing outcomes at or above `min`, with their records
    pub fn failures_at(&self, min: Severity) -> Vec<(&ValidationRecord, &RuleOutcome)> {
        self.records
            .iter()
            .flat_map(|r| r.failures().map(move |o| (r, o)))
            .filter(|(_, o)| o.severity >= min)
            .collect()
    }

    /// Nothing at warning or above failed and nothing errored
    pub fn is_clean(&self) -> bool {
        self.traversal_errors.is_empty()
            && self.counts.errored == 0
            && self.failures_at(Severity::Warning).is_empty()
    }

    /// Every failure at warning or above was answered by an action that
    /// ran without error, and nothing errored
    pub fn is_resolved(&self) -> bool {
        self.traversal_errors.is_empty()
            && self.counts.errored == 0
            && self
                .failures_at(Severity::Warning)
                .iter()
                .all(|(record, outcome)| record.is_answered(outcome))
    }

    /// Per-action results, in order of first appearance
    pub fn action_summaries(&self) -> Vec<ActionSummary> {
        let mut summaries: Vec<ActionSummary> = Vec::new();
        for record in &self.records {
            for result in &record.actions {
                let idx = match summaries.iter().position(|s| s.action == result.action) {
                    Some(idx) => idx,
                    None => {
                        summaries.push(ActionSummary {
                            action: result.action.clone(),
                            applied: 0,
                            errors: 0,
                            changed: Vec::new(),
                        });
                        summaries.len() - 1
                    }
                };
                let summary = &mut summaries[idx];
                summary.applied += 1;
                if result.is_error() {
                    summary.errors += 1;
                } else if result.changed {
                    summary
                        .changed
                        .push((record.key.clone(), result.parameter.clone()));
                }
            }
        }
        summaries
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        let c = &self.counts;
        let mut line = format!(
            "{} element(s), {} rule evaluation(s): {} passed, {} failed; {} changed ({} fixed), {} errored",
            c.elements, c.rule_evaluations, c.passed, c.failed, c.changed, c.fixed, c.errored
        );
        if c.traversal_errors > 0 {
            line.push_str(&format!(", {} traversal error(s)", c.traversal_errors));
        }
        if self.dry_run {
            line.push_str(" [dry run]");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, outcomes: Vec<RuleOutcome>, actions: Vec<ActionResult>) -> ValidationRecord {
        ValidationRecord {
            key: ElementKey::new(key),
            element_type: "Door".to_string(),
            depth: 0,
            parent: None,
            outcomes,
            actions,
            skipped: Vec::new(),
        }
    }

    fn result(action: &str, changed: bool, trigger: &str, remedial: bool) -> ActionResult {
        ActionResult {
            action: action.to_string(),
            parameter: Some("Mark".to_string()),
            changed,
            before: None,
            after: None,
            error: None,
            triggers: vec![trigger.to_string()],
            remedial,
        }
    }

    #[test]
    fn test_counts() {
        let mut builder = ReportBuilder::new();
        builder.push_record(record(
            "d1",
            vec![
                RuleOutcome::fail("no_tmp", Severity::Warning, "tmp"),
                RuleOutcome::pass("has_mark", Severity::Violation),
                RuleOutcome::evaluation_error("width", "missing"),
            ],
            vec![
                result("strip", true, "no_tmp", true),
                result("stamp", true, "has_mark", false),
            ],
        ));
        builder.push_traversal_error(TraversalError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        });
        let report = builder.finish();

        let c = report.counts();
        assert_eq!(c.elements, 1);
        assert_eq!(c.rule_evaluations, 3);
        assert_eq!(c.passed + c.failed, c.rule_evaluations);
        assert_eq!(c.changed, 2);
        assert_eq!(c.fixed, 1);
        assert_eq!(c.errored, 1);
        assert_eq!(c.traversal_errors, 1);
        assert!(!report.is_clean());
        assert!(report.summary().contains("1 traversal error(s)"));
    }

    #[test]
    fn test_clean_and_resolved() {
        let mut builder = ReportBuilder::new();
        builder.push_record(record(
            "d1",
            vec![
                RuleOutcome::fail("no_tmp", Severity::Warning, "tmp"),
                RuleOutcome::fail("note", Severity::Info, "fyi"),
            ],
            vec![result("strip", true, "no_tmp", true)],
        ));
        let report = builder.finish();
        assert!(!report.is_clean());
        assert!(report.is_resolved());

        let mut builder = ReportBuilder::new();
        builder.push_record(record(
            "d2",
            vec![RuleOutcome::fail("note", Severity::Info, "fyi")],
            Vec::new(),
        ));
        let report = builder.finish();
        assert!(report.is_clean());
    }

    #[test]
    fn test_shared_action_answers_every_trigger() {
        let mut strip = result("strip", true, "no_tmp", true);
        strip.triggers.push("mark_not_tmp".to_string());

        let mut builder = ReportBuilder::new();
        builder.push_record(record(
            "d1",
            vec![
                RuleOutcome::fail("no_tmp", Severity::Warning, "tmp"),
                RuleOutcome::fail("mark_not_tmp", Severity::Violation, "tmp"),
            ],
            vec![strip],
        ));
        let report = builder.finish();
        assert!(!report.is_clean());
        assert!(report.is_resolved());

        let mut builder = ReportBuilder::new();
        builder.push_record(record(
            "d2",
            vec![
                RuleOutcome::fail("no_tmp", Severity::Warning, "tmp"),
                RuleOutcome::fail("mark_not_tmp", Severity::Violation, "tmp"),
            ],
            vec![result("strip", true, "no_tmp", true)],
        ));
        assert!(!builder.finish().is_resolved());
    }

    #[test]
    fn test_action_summaries() {
        let mut builder = ReportBuilder::new().dry_run(true);
        builder.push_record(record("d1", Vec::new(), vec![result("strip", true, "r", true)]));
        builder.push_record(record("d2", Vec::new(), vec![result("strip", false, "r", true)]));
        let report = builder.finish();

        let summaries = report.action_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].applied, 2);
        assert_eq!(
            summaries[0].changed,
            vec![(ElementKey::new("d1"), Some("Mark".to_string()))]
        );
        assert!(report.summary().ends_with("[dry run]"));
    }

    #[test]
    fn test_report_serializes() {
        let mut builder = ReportBuilder::new();
        builder.push_record(record(
            "d1",
            vec![RuleOutcome::fail("no_tmp", Severity::Violation, "tmp")],
            Vec::new(),
        ));
        let json = serde_json::to_value(builder.finish()).unwrap();
        assert_eq!(json["counts"]["failed"], 1);
        assert_eq!(json["records"][0]["key"], "d1");
        assert_eq!(json["records"][0]["outcomes"][0]["severity"], "violation");
    }
}
