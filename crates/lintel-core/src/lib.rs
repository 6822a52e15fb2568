//! Lintel Core - Foundational types for the Lintel validation engine
//!
//! This crate provides the core types that all other Lintel crates depend on:
//! - `ElementId` - Arena index of an element inside a graph
//! - `ElementKey` - Stable, externally supplied element identity
//! - `ContentHash` - SHA-256 graph fingerprints
//! - Error types and Result alias

mod error;
mod hash;
mod id;

pub use error::{LintelError, Result};
pub use hash::{ContentHash, HashBuilder};
pub use id::{ElementId, ElementKey};
