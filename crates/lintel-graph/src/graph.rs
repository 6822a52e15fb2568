//! ElementGraph - arena of BIM elements with stable keys

use crate::element::{ElementRef, Relation};
use crate::parameters::Parameters;
use bimap::BiMap;
use lintel_core::{ContentHash, ElementId, ElementKey, LintelError, Result};

/// Relational structure of a graph: keys, type tags and relations.
///
/// A run only ever sees this through a shared reference, which is what keeps
/// actions from touching relations.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Bidirectional mapping: ElementKey <-> ElementId
    keys: BiMap<ElementKey, ElementId>,
    /// Type tag per element, indexed by ElementId
    types: Vec<String>,
    /// Outgoing relations per element, in declaration order
    relations: Vec<Vec<Relation>>,
}

impl Topology {
    /// Get element id by key
    pub fn get_id(&self, key: &ElementKey) -> Option<ElementId> {
        self.keys.get_by_left(key).copied()
    }

    /// Get element key by id
    pub fn key(&self, id: ElementId) -> Option<&ElementKey> {
        self.keys.get_by_right(&id)
    }

    pub fn element_type(&self, id: ElementId) -> Option<&str> {
        self.types.get(id.index()).map(|t| t.as_str())
    }

    /// Outgoing relations of an element (empty for unknown ids)
    pub fn relations(&self, id: ElementId) -> &[Relation] {
        self.relations
            .get(id.index())
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve the target of a relation to an id, if the target exists
    pub fn resolve(&self, relation: &Relation) -> Option<ElementId> {
        self.get_id(&relation.target)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        id.index() < self.types.len()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All ids in arena order
    pub fn ids(&self) -> impl Iterator<Item = ElementId> {
        (0..self.types.len() as u32).map(ElementId::from_raw)
    }
}

/// Parameter values of every element, indexed by ElementId
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: Vec<Parameters>,
}

impl ParameterStore {
    pub fn get(&self, id: ElementId) -> Option<&Parameters> {
        self.params.get(id.index())
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Parameters> {
        self.params.get_mut(id.index())
    }

    /// Mutable access to one element together with read access to another
    /// (typically the element it was reached from).
    ///
    /// Returns `None` if `id` is unknown. The parent slot is `None` if no
    /// parent was given, if it is unknown, or if it is `id` itself.
    pub fn with_parent_mut(
        &mut self,
        id: ElementId,
        parent: Option<ElementId>,
    ) -> Option<(&mut Parameters, Option<&Parameters>)> {
        let index = id.index();
        if index >= self.params.len() {
            return None;
        }

        match parent.map(|p| p.index()) {
            Some(p) if p < index => {
                let (head, tail) = self.params.split_at_mut(index);
                Some((&mut tail[0], Some(&head[p])))
            }
            Some(p) if p > index && p < self.params.len() => {
                let (head, tail) = self.params.split_at_mut(p);
                Some((&mut head[index], Some(&tail[0])))
            }
            _ => Some((&mut self.params[index], None)),
        }
    }
}

/// The element graph for one model
///
/// Stores:
/// - Stable ElementKey mapping
/// - Type tags and typed relations (the topology)
/// - Ordered parameters per element
#[derive(Debug, Clone, Default)]
pub struct ElementGraph {
    topology: Topology,
    parameters: ParameterStore,
}

impl ElementGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new element
    pub fn insert(
        &mut self,
        key: impl Into<ElementKey>,
        element_type: impl Into<String>,
        parameters: Parameters,
    ) -> Result<ElementId> {
        let key = key.into();

        if self.topology.keys.contains_left(&key) {
            return Err(LintelError::DuplicateElementKey(key.to_string()));
        }

        let id = ElementId::from_raw(self.topology.types.len() as u32);
        self.topology.keys.insert(key, id);
        self.topology.types.push(element_type.into());
        self.topology.relations.push(Vec::new());
        self.parameters.params.push(parameters);

        Ok(id)
    }

    /// Add an outgoing relation.
    ///
    /// The target does not have to exist yet; dangling targets are reported
    /// by the traversal.
    pub fn relate(
        &mut self,
        from: ElementId,
        kind: impl Into<String>,
        target: impl Into<ElementKey>,
    ) -> Result<()> {
        let relations = self
            .topology
            .relations
            .get_mut(from.index())
            .ok_or_else(|| LintelError::ElementNotFound(from.to_string()))?;

        relations.push(Relation::new(kind, target));
        Ok(())
    }

    /// Add an outgoing relation, looking the source up by key
    pub fn relate_by_key(
        &mut self,
        from: &ElementKey,
        kind: impl Into<String>,
        target: impl Into<ElementKey>,
    ) -> Result<()> {
        let id = self
            .get_id(from)
            .ok_or_else(|| LintelError::ElementNotFound(from.to_string()))?;
        self.relate(id, kind, target)
    }

    /// Get element id by key
    pub fn get_id(&self, key: &ElementKey) -> Option<ElementId> {
        self.topology.get_id(key)
    }

    /// Get element key by id
    pub fn key(&self, id: ElementId) -> Option<&ElementKey> {
        self.topology.key(id)
    }

    pub fn element_type(&self, id: ElementId) -> Option<&str> {
        self.topology.element_type(id)
    }

    pub fn parameters(&self, id: ElementId) -> Option<&Parameters> {
        self.parameters.get(id)
    }

    pub fn parameters_mut(&mut self, id: ElementId) -> Option<&mut Parameters> {
        self.parameters.get_mut(id)
    }

    pub fn relations(&self, id: ElementId) -> &[Relation] {
        self.topology.relations(id)
    }

    /// Borrowed view of one element
    pub fn element(&self, id: ElementId) -> Option<ElementRef<'_>> {
        Some(ElementRef {
            id,
            key: self.topology.key(id)?,
            element_type: self.topology.element_type(id)?,
            parameters: self.parameters.get(id)?,
            relations: self.topology.relations(id),
        })
    }

    /// Borrowed view of one element by key
    pub fn element_by_key(&self, key: &ElementKey) -> Option<ElementRef<'_>> {
        self.get_id(key).and_then(|id| self.element(id))
    }

    /// All elements in arena (insertion) order
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.topology.ids().filter_map(|id| self.element(id))
    }

    /// Elements that no resolvable relation points at, in arena order
    pub fn unreferenced(&self) -> Vec<ElementId> {
        let mut referenced = vec![false; self.len()];
        for id in self.topology.ids() {
            for relation in self.topology.relations(id) {
                if let Some(target) = self.topology.resolve(relation) {
                    if target != id {
                        referenced[target.index()] = true;
                    }
                }
            }
        }

        self.topology
            .ids()
            .filter(|id| !referenced[id.index()])
            .collect()
    }

    /// Entry points that reach every element when all relations are
    /// followed: the unreferenced elements, then the first element in arena
    /// order of each group they leave unreached (e.g. an isolated cycle).
    pub fn default_roots(&self) -> Vec<ElementId> {
        let mut reached = vec![false; self.len()];
        let mut roots = self.unreferenced();
        for &root in &roots {
            self.mark_reachable(root, &mut reached);
        }

        for id in self.topology.ids() {
            if !reached[id.index()] {
                roots.push(id);
                self.mark_reachable(id, &mut reached);
            }
        }
        roots
    }

    fn mark_reachable(&self, start: ElementId, reached: &mut [bool]) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut reached[id.index()], true) {
                continue;
            }
            stack.extend(
                self.topology
                    .relations(id)
                    .iter()
                    .filter_map(|r| self.topology.resolve(r))
                    .filter(|t| !reached[t.index()]),
            );
        }
    }

    /// Get number of elements
    pub fn len(&self) -> usize {
        self.topology.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.is_empty()
    }

    /// Check if an element with key exists
    pub fn contains_key(&self, key: &ElementKey) -> bool {
        self.topology.keys.contains_left(key)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Split the graph into its read-only topology and mutable parameters.
    ///
    /// This is the only way a validation run touches the graph.
    pub fn split_mut(&mut self) -> (&Topology, &mut ParameterStore) {
        (&self.topology, &mut self.parameters)
    }

    /// SHA-256 fingerprint over keys, types, relations and parameters
    pub fn fingerprint(&self) -> ContentHash {
        let mut hash = ContentHash::builder();
        for element in self.elements() {
            hash.record(0)
                .field(element.key.as_str())
                .field(&element.element_type);
            for relation in element.relations {
                hash.record(1).field(&relation.kind).field(relation.target.as_str());
            }
            for (name, value) in element.parameters.iter() {
                hash.record(2).field(name).field(value.to_string());
            }
        }
        hash.finish()
    }

    /// Fingerprint over keys, types and relations only
    pub fn topology_fingerprint(&self) -> ContentHash {
        let mut hash = ContentHash::builder();
        for id in self.topology.ids() {
            hash.record(0)
                .field(self.topology.key(id).map_or("", |k| k.as_str()))
                .field(self.topology.element_type(id).unwrap_or(""));
            for relation in self.topology.relations(id) {
                hash.record(1).field(&relation.kind).field(relation.target.as_str());
            }
        }
        hash.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mark: &str) -> Parameters {
        Parameters::from_iter([("Mark", toml::Value::String(mark.to_string()))])
    }

    #[test]
    fn test_insert_and_get() {
        let mut graph = ElementGraph::new();
        let id = graph.insert("door-1", "Door", params("D1")).unwrap();

        let key = ElementKey::from("door-1");
        assert!(graph.contains_key(&key));
        assert_eq!(graph.get_id(&key), Some(id));
        assert_eq!(graph.key(id), Some(&key));
        assert_eq!(graph.element_type(id), Some("Door"));
        assert_eq!(graph.parameters(id).unwrap().get_str("Mark"), Some("D1"));
    }

    #[test]
    fn test_duplicate_key() {
        let mut graph = ElementGraph::new();
        graph.insert("wall-1", "Wall", Parameters::new()).unwrap();

        assert!(matches!(
            graph.insert("wall-1", "Wall", Parameters::new()),
            Err(LintelError::DuplicateElementKey(_))
        ));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_relations_by_key() {
        let mut graph = ElementGraph::new();
        let wall = graph.insert("wall-1", "Wall", Parameters::new()).unwrap();
        graph.relate(wall, "hosts", "door-1").unwrap();
        let door = graph.insert("door-1", "Door", params("D1")).unwrap();

        let relation = &graph.relations(wall)[0];
        assert_eq!(relation.kind, "hosts");
        assert_eq!(graph.topology().resolve(relation), Some(door));
    }

    #[test]
    fn test_relate_unknown_source() {
        let mut graph = ElementGraph::new();
        assert!(matches!(
            graph.relate(ElementId::from_raw(3), "hosts", "x"),
            Err(LintelError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_unreferenced_elements() {
        let mut graph = ElementGraph::new();
        let level = graph.insert("level-1", "Level", Parameters::new()).unwrap();
        let wall = graph.insert("wall-1", "Wall", Parameters::new()).unwrap();
        let loose = graph.insert("note-1", "Annotation", Parameters::new()).unwrap();
        graph.relate(level, "contains", "wall-1").unwrap();
        graph.relate(wall, "hosts", "wall-1").unwrap();

        assert_eq!(graph.unreferenced(), vec![level, loose]);
    }

    #[test]
    fn test_default_roots_cover_isolated_cycles() {
        let mut graph = ElementGraph::new();
        let site = graph.insert("site", "Site", Parameters::new()).unwrap();
        let x = graph.insert("x", "Group", Parameters::new()).unwrap();
        let y = graph.insert("y", "Group", Parameters::new()).unwrap();
        graph.insert("z", "Group", Parameters::new()).unwrap();
        graph.relate(x, "contains", "y").unwrap();
        graph.relate(y, "contains", "x").unwrap();
        // z hangs off the cycle and is reached through x
        graph.relate(y, "hosts", "z").unwrap();

        assert_eq!(graph.unreferenced(), vec![site]);
        assert_eq!(graph.default_roots(), vec![site, x]);

        // A cycle reachable from an unreferenced element adds no root
        graph.relate(site, "contains", "y").unwrap();
        assert_eq!(graph.default_roots(), vec![site]);
    }

    #[test]
    fn test_with_parent_mut() {
        let mut graph = ElementGraph::new();
        let wall = graph.insert("wall-1", "Wall", params("W1")).unwrap();
        let door = graph.insert("door-1", "Door", params("D1")).unwrap();

        let (_, store) = graph.split_mut();
        let (child, parent) = store.with_parent_mut(door, Some(wall)).unwrap();
        assert_eq!(parent.unwrap().get_str("Mark"), Some("W1"));
        child.set("Mark", toml::Value::String("W1-D1".into()));

        // parent stored after the child in the arena
        let (child, parent) = store.with_parent_mut(wall, Some(door)).unwrap();
        assert_eq!(parent.unwrap().get_str("Mark"), Some("W1-D1"));
        assert_eq!(child.get_str("Mark"), Some("W1"));

        let (_, parent) = store.with_parent_mut(wall, Some(wall)).unwrap();
        assert!(parent.is_none());
        assert!(store.with_parent_mut(ElementId::from_raw(9), None).is_none());
    }

    #[test]
    fn test_fingerprint_tracks_parameters_only_when_asked() {
        let mut graph = ElementGraph::new();
        let door = graph.insert("door-1", "Door", params("TMP_D1")).unwrap();
        let before = graph.fingerprint();
        let topology_before = graph.topology_fingerprint();

        graph
            .parameters_mut(door)
            .unwrap()
            .set("Mark", toml::Value::String("D1".into()));

        assert_ne!(graph.fingerprint(), before);
        assert_eq!(graph.topology_fingerprint(), topology_before);
    }
}
