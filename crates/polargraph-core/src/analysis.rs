//! # Derived Operations
//!
//! Everything built on top of [`PolarGraph::walk`]:
//! - cycle check and loop detection
//! - topological rectification
//! - node-to-node route search
//! - coverage (subgraph cut)
//!
//! None of these mutate the graph.

use crate::graph::PolarGraph;
use crate::walk::Route;
use crate::{EdgeId, End, GraphError, InterfaceId, NodeId};
use std::collections::{BTreeMap, BTreeSet};

/// Nodes and edges swept by a set of routes.
///
/// Sentinels are never part of a coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub nodes: BTreeSet<NodeId>,
    pub edges: BTreeSet<EdgeId>,
}

impl Coverage {
    /// Whether nothing was covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Whether `node` was covered.
    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}

impl PolarGraph {
    /// Every route reachable from the source sentinel.
    fn routes_from_source(&self) -> Result<Vec<Route>, GraphError> {
        let routes: Vec<Route> = self.walk(self.source()?, [])?.collect();
        tracing::trace!(routes = routes.len(), "walked from source");
        Ok(routes)
    }

    /// The cyclic routes leaving through `start`.
    pub fn find_loops(&self, start: InterfaceId) -> Result<Vec<Route>, GraphError> {
        Ok(self.walk(start, [])?.filter(Route::is_cycle).collect())
    }

    /// Validate that the graph is acyclic and fully reachable from the source.
    ///
    /// # Errors
    ///
    /// - [`GraphError::CycleDetected`] with the nodes of the first cycle found
    /// - [`GraphError::Isolated`] with every real node the source cannot reach
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        self.acyclic_routes().map(|_| ())
    }

    fn acyclic_routes(&self) -> Result<Vec<Route>, GraphError> {
        let routes = self.routes_from_source()?;
        if let Some(cyclic) = routes.iter().find(|r| r.is_cycle()) {
            let nodes = cyclic.cycle_nodes();
            tracing::debug!(?nodes, "cycle reachable from source");
            return Err(GraphError::CycleDetected { nodes });
        }

        let reached: BTreeSet<NodeId> = routes.iter().flat_map(|r| r.nodes()).copied().collect();
        let unreached: Vec<NodeId> = self
            .real_nodes()
            .map(|n| n.id())
            .filter(|n| !reached.contains(n))
            .collect();
        if unreached.is_empty() {
            return Ok(routes);
        }

        // A cycle cut off from the sentinels shows up as unreachable nodes.
        for &node in &unreached {
            if let Some(cyclic) = self.find_loops(InterfaceId::pos(node))?.first() {
                let nodes = cyclic.cycle_nodes();
                tracing::debug!(?nodes, "detached cycle");
                return Err(GraphError::CycleDetected { nodes });
            }
        }
        tracing::debug!(nodes = ?unreached, "isolated nodes");
        Err(GraphError::Isolated { nodes: unreached })
    }

    /// A linear order of all real nodes in which every node follows the
    /// nodes leading to it from the source.
    ///
    /// A node is placed by its deepest position over all routes, ties broken
    /// by first appearance, so the result is stable across calls.
    pub fn rectify(&self) -> Result<Vec<NodeId>, GraphError> {
        let routes = self.acyclic_routes()?;

        // node -> (deepest index, first-seen rank)
        let mut rank: BTreeMap<NodeId, (usize, usize)> = BTreeMap::new();
        let mut seen = 0usize;
        for route in &routes {
            for (depth, &node) in route.nodes().iter().enumerate() {
                if self.is_sentinel(node) {
                    continue;
                }
                let entry = rank.entry(node).or_insert_with(|| {
                    seen = seen.saturating_add(1);
                    (depth, seen)
                });
                entry.0 = entry.0.max(depth);
            }
        }

        let mut order: Vec<(usize, usize, NodeId)> = rank
            .into_iter()
            .map(|(node, (depth, first))| (depth, first, node))
            .collect();
        order.sort_unstable();
        Ok(order.into_iter().map(|(.., node)| node).collect())
    }

    /// Every non-cyclic route from either interface of `from` that ends at `to`.
    ///
    /// Empty when `from == to`.
    pub fn routes_between(&self, from: NodeId, to: NodeId) -> Result<Vec<Route>, GraphError> {
        self.routes_between_limited(from, to, usize::MAX)
    }

    /// [`PolarGraph::routes_between`], stopping the walks after `limit` routes.
    pub fn routes_between_limited(
        &self,
        from: NodeId,
        to: NodeId,
        limit: usize,
    ) -> Result<Vec<Route>, GraphError> {
        self.node(from)?;
        self.node(to)?;
        if from == to {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for end in End::BOTH {
            let remaining = limit.saturating_sub(found.len());
            if remaining == 0 {
                break;
            }
            found.extend(
                self.walk(InterfaceId::new(from, end), [to])?
                    .filter(|r| !r.is_cycle() && r.terminal() == to)
                    .take(remaining),
            );
        }
        Ok(found)
    }

    /// Everything reachable through `start` before a branch hits `border`.
    ///
    /// The start node is included, border nodes are not.
    pub fn coverage(
        &self,
        start: InterfaceId,
        border: impl IntoIterator<Item = NodeId>,
    ) -> Result<Coverage, GraphError> {
        let border: BTreeSet<NodeId> = border.into_iter().collect();
        let mut coverage = Coverage::default();
        if !self.is_sentinel(start.node) && !border.contains(&start.node) {
            coverage.nodes.insert(start.node);
        }
        for route in self.walk(start, border.iter().copied())? {
            coverage.edges.extend(route.edges().iter().copied());
            coverage.nodes.extend(
                route
                    .nodes()
                    .iter()
                    .copied()
                    .filter(|n| !border.contains(n) && !self.is_sentinel(*n)),
            );
        }
        Ok(coverage)
    }

    /// The interior of every route joining two nodes.
    ///
    /// # Errors
    ///
    /// [`GraphError::NoRoute`] when the nodes are not joined.
    pub fn between(&self, from: NodeId, to: NodeId) -> Result<Coverage, GraphError> {
        let routes = self.routes_between(from, to)?;
        if routes.is_empty() {
            return Err(GraphError::NoRoute { from, to });
        }
        let mut coverage = Coverage::default();
        for route in &routes {
            coverage.edges.extend(route.edges().iter().copied());
            coverage.nodes.extend(
                route
                    .nodes()
                    .iter()
                    .copied()
                    .filter(|&n| n != from && n != to && !self.is_sentinel(n)),
            );
        }
        Ok(coverage)
    }
}

// =============================================================================
// TESTS
// =============================================================================
