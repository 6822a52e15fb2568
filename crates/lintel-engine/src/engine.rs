//! Validation runs

use crate::config::EngineConfig;
use crate::report::{Report, ReportBuilder, ValidationRecord};
use lintel_core::{ElementId, ElementKey, LintelError, Result};
use lintel_graph::{ElementGraph, ParameterStore, Topology, Traversal, TraversalRules, Visit};
use lintel_rules::{ActionContext, CompiledRules, Dispatcher, ElementView, RuleSet};
use log::{debug, info, warn};

/// A compiled, reusable validation engine.
///
/// Holds no per-run state; one engine can run over many graphs, including
/// from several threads at once.
#[derive(Debug, Clone)]
pub struct Engine {
    traversal: TraversalRules,
    strict: bool,
    rules: RuleSet,
    dispatcher: Dispatcher,
}

impl Engine {
    /// Compile and validate a configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let CompiledRules { rules, dispatcher } = config.registry().compile()?;
        Ok(Self {
            traversal: config.traversal.rules(),
            strict: config.traversal.strict,
            rules,
            dispatcher,
        })
    }

    /// Override the configured strictness
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Validate and repair `graph` in place, starting from `roots`
    pub fn run(&self, graph: &mut ElementGraph, roots: &[ElementKey]) -> Result<Report> {
        let root_ids = resolve_roots(graph.topology(), roots)?;
        let (topology, store) = graph.split_mut();

        let report = self.walk(topology, root_ids, ReportBuilder::new(), |visit| {
            self.process(topology, store, visit)
        });
        info!("run complete: {}", report.summary());
        Ok(report)
    }

    /// Run on a copy of `graph`, leaving the original untouched
    pub fn dry_run(&self, graph: &ElementGraph, roots: &[ElementKey]) -> Result<Report> {
        self.preview(graph, roots).map(|(report, _)| report)
    }

    /// Like `dry_run`, also returning the repaired copy
    pub fn preview(
        &self,
        graph: &ElementGraph,
        roots: &[ElementKey],
    ) -> Result<(Report, ElementGraph)> {
        let mut scratch = graph.clone();
        let root_ids = resolve_roots(scratch.topology(), roots)?;
        let (topology, store) = scratch.split_mut();

        let builder = ReportBuilder::new().dry_run(true);
        let report = self.walk(topology, root_ids, builder, |visit| {
            self.process(topology, store, visit)
        });
        info!("dry run complete: {}", report.summary());
        Ok((report, scratch))
    }

    /// Evaluate rules only; no actions are dispatched
    pub fn validate(&self, graph: &ElementGraph, roots: &[ElementKey]) -> Result<Report> {
        let topology = graph.topology();
        let root_ids = resolve_roots(topology, roots)?;

        let report = self.walk(topology, root_ids, ReportBuilder::new(), |visit| {
            let key = topology.key(visit.id)?;
            let element_type = topology.element_type(visit.id)?;
            let params = graph.parameters(visit.id)?;
            let outcomes = self
                .rules
                .evaluate(&ElementView::new(key, element_type, params));
            Some(new_record(topology, visit, outcomes))
        });
        info!("validation complete: {}", report.summary());
        Ok(report)
    }

    fn walk<F>(
        &self,
        topology: &Topology,
        roots: Vec<ElementId>,
        mut builder: ReportBuilder,
        mut visit_element: F,
    ) -> Report
    where
        F: FnMut(&Visit) -> Option<ValidationRecord>,
    {
        let mut traversal = Traversal::new(topology, &self.traversal, roots, self.strict);
        for step in traversal.by_ref() {
            match step {
                Ok(visit) => {
                    if let Some(record) = visit_element(&visit) {
                        builder.push_record(record);
                    }
                }
                Err(e) => {
                    warn!("traversal: {}", e);
                    builder.push_traversal_error(e);
                }
            }
        }

        let unreached = topology.len().saturating_sub(traversal.visited_count());
        if unreached > 0 {
            debug!("{} element(s) not reached from the roots", unreached);
        }
        builder.finish()
    }

    /// Evaluate one element and run the actions its outcomes dispatch
    fn process(
        &self,
        topology: &Topology,
        store: &mut ParameterStore,
        visit: &Visit,
    ) -> Option<ValidationRecord> {
        let key = topology.key(visit.id)?;
        let element_type = topology.element_type(visit.id)?;
        let outcomes = {
            let params = store.get(visit.id)?;
            self.rules
                .evaluate(&ElementView::new(key, element_type, params))
        };

        let mut actions = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = false;

        for dispatch in self.dispatcher.resolve(&outcomes) {
            let name = dispatch.action.name();
            if failed {
                skipped.push(name.to_string());
                continue;
            }

            let (params, parent) = store.with_parent_mut(visit.id, visit.parent)?;
            let result = dispatch
                .action
                .apply(ActionContext::new(params, parent))
                .triggered_by(dispatch.triggers.iter().copied(), dispatch.remedial);

            if let Some(err) = &result.error {
                warn!("action '{}' failed on '{}': {}", name, key, err);
                failed = true;
            } else if result.changed {
                debug!("action '{}' changed '{}'", name, key);
            }
            actions.push(result);
        }

        if !skipped.is_empty() {
            debug!("skipped {} action(s) on '{}'", skipped.len(), key);
        }

        let mut record = new_record(topology, visit, outcomes);
        record.actions = actions;
        record.skipped = skipped;
        Some(record)
    }
}

fn new_record(
    topology: &Topology,
    visit: &Visit,
    outcomes: Vec<lintel_rules::RuleOutcome>,
) -> ValidationRecord {
    ValidationRecord {
        key: topology.key(visit.id).cloned().unwrap_or_default(),
        element_type: topology
            .element_type(visit.id)
            .unwrap_or_default()
            .to_string(),
        depth: visit.depth,
        parent: visit.parent.and_then(|p| topology.key(p)).cloned(),
        outcomes,
        actions: Vec::new(),
        skipped: Vec::new(),
    }
}

/// Fatal root problems are reported before any element is visited
fn resolve_roots(topology: &Topology, roots: &[ElementKey]) -> Result<Vec<ElementId>> {
    if roots.is_empty() {
        return Err(LintelError::NoRoots);
    }
    roots
        .iter()
        .map(|key| {
            topology
                .get_id(key)
                .ok_or_else(|| LintelError::ElementNotFound(key.to_string()))
        })
        .collect()
}
