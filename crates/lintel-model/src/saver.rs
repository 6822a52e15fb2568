//! Model saving to TOML files

use crate::format::{ElementDef, Model, ModelFile};
use lintel_core::Result;
use std::fs;
use std::path::Path;

/// Save a model to a TOML file
pub fn save_model<P: AsRef<Path>>(path: P, model: &Model) -> Result<()> {
    let content = save_model_string(model)?;
    fs::write(path, content)?;
    Ok(())
}

/// Save a model to a TOML string
pub fn save_model_string(model: &Model) -> Result<String> {
    let file = model_to_file(model);
    let content = toml::to_string_pretty(&file)?;
    Ok(content)
}

/// Convert a model back to its file representation, elements in graph
/// order with their current parameters
pub fn model_to_file(model: &Model) -> ModelFile {
    let element = model
        .graph
        .elements()
        .map(|e| ElementDef {
            key: e.key.clone(),
            element_type: e.element_type.to_string(),
            parameters: e.parameters.clone(),
            relations: e.relations.to_vec(),
        })
        .collect();

    ModelFile {
        model: model.meta.clone(),
        element,
    }
}
