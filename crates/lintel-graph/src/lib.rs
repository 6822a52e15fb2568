//! Lintel Graph - In-memory BIM element graph with stable keys
//!
//! Elements live in an arena addressed by `ElementId`; relations point at
//! stable `ElementKey`s so that parameter mutation never invalidates them.
//! The traversal walks the graph in deterministic pre-order.

mod element;
mod graph;
mod parameters;
mod selector;
mod traversal;

pub use element::{ElementRef, Relation};
pub use graph::{ElementGraph, ParameterStore, Topology};
pub use parameters::{value_is_blank, Parameters};
pub use selector::TypeSelector;
pub use traversal::{Follow, Traversal, TraversalError, TraversalRuleDef, TraversalRules, Visit};
