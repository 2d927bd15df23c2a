//! # Dependency Graph
//!
//! Orders the re-evaluation of configuration objects whose attributes refer
//! to other objects by name, and refuses edits that would make those
//! references circular.
//!
//! Every object is one node tagged with a [`Cell::ObjectRef`]. A reference
//! from `referrer` to `referenced` is an edge `referenced.pos -> referrer.neg`,
//! so walking from the source sentinel visits every object after all the
//! objects it refers to.

use crate::graph::PolarGraph;
use crate::types::validate_name;
use crate::{Cell, CellKind, ElementRef, GraphError, InterfaceId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One entry of an object list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    /// Names of the objects this one refers to.
    #[serde(default)]
    pub references: Vec<String>,
}

impl ObjectSpec {
    pub fn new(name: impl Into<String>, references: &[&str]) -> Self {
        Self {
            name: name.into(),
            references: references.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

/// Objects and their references on top of a sentinel graph.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: PolarGraph,
    by_name: BTreeMap<String, NodeId>,
}

impl DependencyGraph {
    /// Build from an ordered object list and reject circular references.
    pub fn build(objects: &[ObjectSpec]) -> Result<Self, GraphError> {
        let mut deps = Self {
            graph: PolarGraph::with_sentinels(),
            by_name: BTreeMap::new(),
        };
        for object in objects {
            validate_name(&object.name)?;
            if deps.by_name.contains_key(&object.name) {
                return Err(GraphError::DuplicateObject(object.name.clone()));
            }
            let node = deps.graph.insert_node(None, None)?;
            deps.graph
                .attach(ElementRef::Node(node), Cell::ObjectRef(object.name.clone()))?;
            deps.by_name.insert(object.name.clone(), node);
        }
        for object in objects {
            let node = deps.node_of(&object.name)?;
            for target in deps.resolve_references(&object.name, &object.references)? {
                connect_reference(&mut deps.graph, target, node)?;
            }
        }
        deps.check()?;
        tracing::debug!(objects = deps.len(), "built dependency graph");
        Ok(deps)
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Whether an object with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The underlying polar graph.
    #[must_use]
    pub fn graph(&self) -> &PolarGraph {
        &self.graph
    }

    /// Validate that no references are circular.
    pub fn check(&self) -> Result<(), GraphError> {
        self.graph
            .check_acyclic()
            .map_err(|err| name_objects(&self.graph, err))
    }

    /// All objects, each after every object it refers to.
    pub fn evaluation_order(&self) -> Result<Vec<String>, GraphError> {
        let order = self
            .graph
            .rectify()
            .map_err(|err| name_objects(&self.graph, err))?;
        Ok(order
            .into_iter()
            .filter_map(|n| object_name(&self.graph, n))
            .collect())
    }

    /// Add one object with its references.
    pub fn add_object(&mut self, object: &ObjectSpec) -> Result<(), GraphError> {
        validate_name(&object.name)?;
        if self.contains(&object.name) {
            return Err(GraphError::DuplicateObject(object.name.clone()));
        }
        let targets = self.resolve_references(&object.name, &object.references)?;
        let name = object.name.clone();
        let node = self.graph.transact(
            |g| {
                let node = g.insert_node(None, None)?;
                g.attach(ElementRef::Node(node), Cell::ObjectRef(name.clone()))?;
                for &target in &targets {
                    connect_reference(g, target, node)?;
                }
                Ok(node)
            },
            |draft| draft.check_acyclic().map_err(|err| name_objects(draft, err)),
        )?;
        self.by_name.insert(object.name.clone(), node);
        tracing::debug!(object = %object.name, "added object");
        Ok(())
    }

    /// Delete an object.
    ///
    /// Objects that referred to it lose that reference; their names are
    /// returned so the caller can re-evaluate them.
    pub fn remove_object(&mut self, name: &str) -> Result<Vec<String>, GraphError> {
        let node = self.node_of(name)?;
        let referrers = self.direct_referrers(node)?;
        self.graph.remove_node(node)?;
        self.by_name.remove(name);
        tracing::debug!(object = %name, referrers = referrers.len(), "removed object");
        Ok(referrers)
    }

    /// Replace the references of an object.
    ///
    /// The edit is tried on a copy first; a reference cycle leaves the graph
    /// as it was.
    pub fn set_references(
        &mut self,
        name: &str,
        references: &[String],
    ) -> Result<(), GraphError> {
        let node = self.node_of(name)?;
        let wanted: BTreeSet<NodeId> = self
            .resolve_references(name, references)?
            .into_iter()
            .collect();
        let neg = InterfaceId::neg(node);

        self.graph.transact(
            |g| {
                let current: BTreeSet<NodeId> = g
                    .neighbours(neg)?
                    .into_iter()
                    .map(|i| i.node)
                    .filter(|&n| !g.is_sentinel(n))
                    .collect();
                for &target in wanted.difference(&current) {
                    connect_reference(g, target, node)?;
                }
                for &stale in current.difference(&wanted) {
                    g.disconnect_with_sentinel_handling(InterfaceId::pos(stale), neg)?;
                }
                Ok(())
            },
            |draft| draft.check_acyclic().map_err(|err| name_objects(draft, err)),
        )?;
        tracing::debug!(object = %name, references = references.len(), "references updated");
        Ok(())
    }

    /// Every object that depends on `name`, directly or not, in evaluation
    /// order.
    pub fn dependents(&self, name: &str) -> Result<Vec<String>, GraphError> {
        let node = self.node_of(name)?;
        let downstream = self.graph.coverage(InterfaceId::pos(node), [])?;
        let order = self.graph.rectify().map_err(|err| name_objects(&self.graph, err))?;
        Ok(order
            .into_iter()
            .filter(|&n| n != node && downstream.contains_node(n))
            .filter_map(|n| object_name(&self.graph, n))
            .collect())
    }

    /// The objects `name` refers to directly, sorted by name.
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>, GraphError> {
        let node = self.node_of(name)?;
        let mut names: Vec<String> = self
            .graph
            .neighbours(InterfaceId::neg(node))?
            .into_iter()
            .filter_map(|i| object_name(&self.graph, i.node))
            .collect();
        names.sort();
        Ok(names)
    }

    fn node_of(&self, name: &str) -> Result<NodeId, GraphError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownObject(name.to_string()))
    }

    fn direct_referrers(&self, node: NodeId) -> Result<Vec<String>, GraphError> {
        let mut names: Vec<String> = self
            .graph
            .neighbours(InterfaceId::pos(node))?
            .into_iter()
            .filter_map(|i| object_name(&self.graph, i.node))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Distinct referenced nodes; a self reference is a one-object cycle.
    fn resolve_references(
        &self,
        name: &str,
        references: &[String],
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut seen = BTreeSet::new();
        let mut targets = Vec::new();
        for reference in references {
            if reference == name {
                return Err(GraphError::DependencyCycle {
                    names: vec![name.to_string(), name.to_string()],
                });
            }
            let node = self.node_of(reference)?;
            if seen.insert(node) {
                targets.push(node);
            }
        }
        Ok(targets)
    }
}

fn connect_reference(
    graph: &mut PolarGraph,
    referenced: NodeId,
    referrer: NodeId,
) -> Result<(), GraphError> {
    graph.connect_with_sentinel_handling(
        InterfaceId::pos(referenced),
        InterfaceId::neg(referrer),
    )?;
    Ok(())
}

fn object_name(graph: &PolarGraph, node: NodeId) -> Option<String> {
    graph
        .find_cell(ElementRef::Node(node), CellKind::ObjectRef)
        .and_then(Cell::as_name)
        .map(str::to_string)
}

/// Translate node-level validation errors into object names.
fn name_objects(graph: &PolarGraph, err: GraphError) -> GraphError {
    let to_names = |nodes: &[NodeId]| -> Vec<String> {
        nodes
            .iter()
            .filter_map(|&n| object_name(graph, n))
            .collect()
    };
    match err {
        GraphError::CycleDetected { nodes } => {
            let mut names = to_names(&nodes);
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            GraphError::DependencyCycle { names }
        }
        GraphError::Isolated { nodes } => GraphError::IsolatedObjects {
            names: to_names(&nodes),
        },
        other => other,
    }
}

// =============================================================================
// TESTS
// =============================================================================
