//! Element relations and read-only element views

use crate::parameters::Parameters;
use lintel_core::{ElementId, ElementKey};
use serde::{Deserialize, Serialize};

/// A typed, directed edge to another element (e.g. "hosts", "contains",
/// "instance-of"). Targets are stable keys, never arena ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub kind: String,
    pub target: ElementKey,
}

impl Relation {
    pub fn new(kind: impl Into<String>, target: impl Into<ElementKey>) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
        }
    }
}

/// Borrowed view of one element
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    pub id: ElementId,
    pub key: &'a ElementKey,
    pub element_type: &'a str,
    pub parameters: &'a Parameters,
    pub relations: &'a [Relation],
}

impl<'a> ElementRef<'a> {
    /// Relations of the given kind, in declaration order
    pub fn relations_of(self, kind: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.kind == kind)
    }
}
