//! Model loading from TOML files

use crate::format::{Model, ModelFile};
use lintel_core::{LintelError, Result};
use lintel_graph::ElementGraph;
use log::debug;
use std::fs;
use std::path::Path;

/// Load a model from a TOML file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    let content = fs::read_to_string(path)?;
    load_model_string(&content)
}

/// Load a model from a TOML string
pub fn load_model_string(content: &str) -> Result<Model> {
    let file: ModelFile = toml::from_str(content)?;
    let graph = graph_from_model_file(&file)?;
    debug!(
        "loaded model '{}' with {} elements",
        file.model.name,
        graph.len()
    );
    Ok(Model {
        meta: file.model,
        graph,
    })
}

/// Build an element graph from a parsed model file.
///
/// Relation targets may dangle; declared roots must exist.
pub fn graph_from_model_file(file: &ModelFile) -> Result<ElementGraph> {
    let mut graph = ElementGraph::new();

    // First pass: create all elements
    let mut ids = Vec::with_capacity(file.element.len());
    for def in &file.element {
        let id = graph.insert(
            def.key.clone(),
            def.element_type.clone(),
            def.parameters.clone(),
        )?;
        ids.push(id);
    }

    // Second pass: relations, in declaration order
    for (def, id) in file.element.iter().zip(ids) {
        for relation in &def.relations {
            graph.relate(id, relation.kind.clone(), relation.target.clone())?;
        }
    }

    for root in &file.model.roots {
        if !graph.contains_key(root) {
            return Err(LintelError::ModelError(format!(
                "root '{}' is not an element of the model",
                root
            )));
        }
    }

    Ok(graph)
}
