//! Lintel Engine - Validation and repair runs over element graphs
//!
//! An `Engine` is compiled once from an `EngineConfig` and can then be run
//! over any number of graphs. Each run walks the graph from its roots,
//! evaluates the rules on every element, dispatches the bound actions and
//! seals everything into a `Report`.

mod config;
mod engine;
mod report;

pub use config::{EngineConfig, TraversalConfig};
pub use engine::Engine;
pub use report::{ActionSummary, Report, ReportBuilder, ReportCounts, ValidationRecord};
