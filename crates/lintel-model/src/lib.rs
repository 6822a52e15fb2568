//! Lintel Model - TOML model loading and saving
//!
//! This crate handles:
//! - Parsing model files into element graphs
//! - Serializing graphs back to TOML
//! - Line diffs between model versions

mod diff;
mod format;
mod loader;
mod saver;

pub use diff::compute_model_diff;
pub use format::{ElementDef, Model, ModelFile, ModelMeta};
pub use loader::{graph_from_model_file, load_model, load_model_string};
pub use saver::{model_to_file, save_model, save_model_string};
