//! Model file format definitions

use lintel_core::ElementKey;
use lintel_graph::{ElementGraph, Parameters, Relation};
use serde::{Deserialize, Serialize};

/// Root structure of a model TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub model: ModelMeta,
    #[serde(default)]
    pub element: Vec<ElementDef>,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Traversal entry points; empty means "every unreferenced element",
    /// plus one element of each otherwise unreachable group
    #[serde(default)]
    pub roots: Vec<ElementKey>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ModelMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: None,
            roots: Vec::new(),
        }
    }
}

/// Definition of one element in a model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDef {
    pub key: ElementKey,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(default, rename = "relation", skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

impl ElementDef {
    pub fn new(key: impl Into<ElementKey>, element_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            element_type: element_type.into(),
            parameters: Parameters::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: toml::Value) -> Self {
        self.parameters.set(name, value);
        self
    }

    pub fn with_relation(mut self, kind: impl Into<String>, target: impl Into<ElementKey>) -> Self {
        self.relations.push(Relation::new(kind, target));
        self
    }
}

/// A loaded model: its metadata and the element graph
#[derive(Debug, Clone)]
pub struct Model {
    pub meta: ModelMeta,
    pub graph: ElementGraph,
}

impl Model {
    /// The declared roots, or every element nothing points at plus one
    /// entry point per group those leave unreached
    pub fn roots(&self) -> Vec<ElementKey> {
        if !self.meta.roots.is_empty() {
            return self.meta.roots.clone();
        }
        self.graph
            .default_roots()
            .into_iter()
            .filter_map(|id| self.graph.key(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_file() {
        let toml_str = r#"
[model]
name = "Sample"
roots = ["site"]

[[element]]
key = "site"
type = "Site"

[element.parameters]
Name = "Main"
Area = 1250.5

[[element.relation]]
kind = "contains"
target = "level-1"

[[element]]
key = "level-1"
type = "Level"
"#;

        let file: ModelFile = toml::from_str(toml_str).unwrap();
        assert_eq!(file.model.name, "Sample");
        assert_eq!(file.model.version, "1.0");
        assert_eq!(file.model.roots, vec![ElementKey::new("site")]);
        assert_eq!(file.element.len(), 2);

        let site = &file.element[0];
        assert_eq!(site.element_type, "Site");
        assert_eq!(site.parameters.get_str("Name"), Some("Main"));
        assert_eq!(site.relations, vec![Relation::new("contains", "level-1")]);
        assert!(file.element[1].parameters.is_empty());
    }

    #[test]
    fn test_element_def_builder() {
        let def = ElementDef::new("door-1", "Door")
            .with_parameter("Mark", toml::Value::String("D1".into()))
            .with_relation("bounds", "room-1");
        assert_eq!(def.parameters.len(), 1);
        assert_eq!(def.relations[0].target, ElementKey::new("room-1"));
    }
}
