//! Deterministic, cycle-safe pre-order traversal
//!
//! The walk starts from each root in order and follows the relation kinds
//! selected by the first traversal rule whose selector matches an element's
//! type. Every element is emitted at most once, before anything it hosts or
//! contains. The walk keeps an explicit stack, so deep hierarchies cannot
//! overflow the call stack.

use crate::element::Relation;
use crate::graph::Topology;
use crate::selector::TypeSelector;
use lintel_core::{ElementId, ElementKey};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Which relation kinds to follow from elements of a given type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalRuleDef {
    /// Element types this rule applies to
    pub select: TypeSelector,
    /// Relation kinds to follow; `"*"` follows every kind
    #[serde(default = "follow_everything")]
    pub follow: Vec<String>,
}

fn follow_everything() -> Vec<String> {
    vec!["*".to_string()]
}

impl TraversalRuleDef {
    pub fn new(select: TypeSelector, follow: &[&str]) -> Self {
        Self {
            select,
            follow: follow.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Relation filter resolved for one element
#[derive(Debug, Clone, Copy)]
pub enum Follow<'a> {
    All,
    Kinds(&'a [String]),
    Nothing,
}

impl Follow<'_> {
    pub fn includes(&self, kind: &str) -> bool {
        match self {
            Follow::All => true,
            Follow::Kinds(kinds) => kinds.iter().any(|k| k == "*" || k == kind),
            Follow::Nothing => false,
        }
    }
}

/// Ordered traversal rules; the first matching rule wins.
///
/// With no rules at all, every relation of every element is followed.
#[derive(Debug, Clone, Default)]
pub struct TraversalRules {
    rules: Vec<TraversalRuleDef>,
}

impl TraversalRules {
    pub fn new(rules: Vec<TraversalRuleDef>) -> Self {
        Self { rules }
    }

    /// Rules that follow every relation from every element
    pub fn follow_all() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: TraversalRuleDef) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[TraversalRuleDef] {
        &self.rules
    }

    /// Resolve which relations to follow for an element type
    pub fn follow_for(&self, element_type: &str) -> Follow<'_> {
        if self.rules.is_empty() {
            return Follow::All;
        }

        self.rules
            .iter()
            .find(|r| r.select.matches(element_type))
            .map(|r| Follow::Kinds(&r.follow))
            .unwrap_or(Follow::Nothing)
    }
}

/// A branch of the walk that could not be followed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraversalError {
    #[error("relation cycle: {}", join_path(.path))]
    Cycle { path: Vec<ElementKey> },

    #[error("element '{from}' has a '{relation}' relation to unknown element '{target}'")]
    UnresolvedTarget {
        from: ElementKey,
        relation: String,
        target: ElementKey,
    },
}

fn join_path(path: &[ElementKey]) -> String {
    path.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One element emitted by the traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub id: ElementId,
    /// The element this one was reached from (`None` for roots)
    pub parent: Option<ElementId>,
    /// The relation kind it was reached through
    pub via: Option<String>,
    /// Distance from the root
    pub depth: usize,
}

struct Frame<'a> {
    id: ElementId,
    edges: Vec<&'a Relation>,
    next: usize,
}

enum Step<'a> {
    NextRoot,
    Leave,
    Edge(ElementId, &'a Relation),
}

/// Lazy pre-order walk over a topology.
///
/// Yields `Ok(Visit)` for each element and, in strict mode, `Err` for each
/// branch dropped because of a cycle or a dangling relation. Not restartable:
/// create a new traversal for a new run.
pub struct Traversal<'a> {
    topology: &'a Topology,
    rules: &'a TraversalRules,
    strict: bool,
    roots: std::vec::IntoIter<ElementId>,
    visited: HashSet<ElementId>,
    on_path: HashSet<ElementId>,
    stack: Vec<Frame<'a>>,
}

impl<'a> Traversal<'a> {
    pub fn new(
        topology: &'a Topology,
        rules: &'a TraversalRules,
        roots: Vec<ElementId>,
        strict: bool,
    ) -> Self {
        Self {
            topology,
            rules,
            strict,
            roots: roots.into_iter(),
            visited: HashSet::new(),
            on_path: HashSet::new(),
            stack: Vec::new(),
        }
    }

    /// Number of distinct elements emitted so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    fn enter(&mut self, id: ElementId, parent: Option<ElementId>, via: Option<String>) -> Visit {
        let depth = self.stack.len();
        let edges = self.edges_for(id);

        self.visited.insert(id);
        self.on_path.insert(id);
        self.stack.push(Frame { id, edges, next: 0 });

        Visit {
            id,
            parent,
            via,
            depth,
        }
    }

    fn edges_for(&self, id: ElementId) -> Vec<&'a Relation> {
        let topology = self.topology;
        let element_type = topology.element_type(id).unwrap_or("");
        let follow = self.rules.follow_for(element_type);

        topology
            .relations(id)
            .iter()
            .filter(|r| follow.includes(&r.kind))
            .collect()
    }

    fn key_of(&self, id: ElementId) -> ElementKey {
        self.topology
            .key(id)
            .cloned()
            .unwrap_or_else(|| ElementKey::new(id.to_string()))
    }

    fn cycle_error(&self, target: ElementId) -> TraversalError {
        let start = self
            .stack
            .iter()
            .position(|f| f.id == target)
            .unwrap_or(0);

        let mut path: Vec<ElementKey> = self.stack[start..]
            .iter()
            .map(|f| self.key_of(f.id))
            .collect();
        path.push(self.key_of(target));

        TraversalError::Cycle { path }
    }
}

impl<'a> Iterator for Traversal<'a> {
    type Item = Result<Visit, TraversalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match self.stack.last_mut() {
                None => Step::NextRoot,
                Some(frame) if frame.next >= frame.edges.len() => Step::Leave,
                Some(frame) => {
                    let relation = frame.edges[frame.next];
                    frame.next += 1;
                    Step::Edge(frame.id, relation)
                }
            };

            match step {
                Step::NextRoot => {
                    let root = self.roots.next()?;
                    if self.visited.contains(&root) {
                        debug!("root {} already visited, skipping", self.key_of(root));
                        continue;
                    }
                    return Some(Ok(self.enter(root, None, None)));
                }
                Step::Leave => {
                    if let Some(frame) = self.stack.pop() {
                        self.on_path.remove(&frame.id);
                    }
                }
                Step::Edge(from, relation) => {
                    let Some(target) = self.topology.resolve(relation) else {
                        let err = TraversalError::UnresolvedTarget {
                            from: self.key_of(from),
                            relation: relation.kind.clone(),
                            target: relation.target.clone(),
                        };
                        if self.strict {
                            return Some(Err(err));
                        }
                        debug!("skipping branch: {}", err);
                        continue;
                    };

                    if self.on_path.contains(&target) {
                        let err = self.cycle_error(target);
                        if self.strict {
                            return Some(Err(err));
                        }
                        debug!("skipping branch: {}", err);
                        continue;
                    }

                    if self.visited.contains(&target) {
                        continue;
                    }

                    return Some(Ok(self.enter(target, Some(from), Some(relation.kind.clone()))));
                }
            }
        }
    }
}
