//! # Walk Algorithm
//!
//! Route discovery over a polar graph.
//!
//! A walk leaves a node through one interface, crosses an edge, enters the
//! next node through the interface at the far end and leaves it through the
//! node's other interface. A branch ends when it
//! - reaches a stop node,
//! - reaches a node whose onward interface has no edges (a border), or
//! - reaches a node already on the branch, in which case the route is cyclic.
//!
//! [`Walk`] is an iterative depth-first traversal with an explicit frame
//! stack, so large topologies never hit a recursion limit and routes are
//! emitted as soon as their branch terminates.

use crate::graph::PolarGraph;
use crate::{ContractViolation, EdgeId, GraphError, InterfaceId, NodeId};
use std::collections::BTreeSet;

// =============================================================================
// ROUTE
// =============================================================================

/// One element of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Node(NodeId),
    Edge(EdgeId),
}

/// An alternating `node, edge, node, ...` path produced by a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    start: InterfaceId,
    end: InterfaceId,
    /// Never empty; `nodes.len() == edges.len() + 1`.
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
}

impl Route {
    /// The interface the walk left the first node through.
    #[must_use]
    pub fn start(&self) -> InterfaceId {
        self.start
    }

    /// The interface the terminal node was entered through.
    ///
    /// Equals `start` for a route that never left its first node.
    #[must_use]
    pub fn end(&self) -> InterfaceId {
        self.end
    }

    /// Nodes in walk order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Edges in walk order.
    #[must_use]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Number of edges crossed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the route never left its first node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The first node.
    #[must_use]
    pub fn origin(&self) -> NodeId {
        self.nodes[0]
    }

    /// The last node.
    #[must_use]
    pub fn terminal(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// Whether the terminal node already appears earlier in the route.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        match self.nodes.split_last() {
            Some((last, rest)) => rest.contains(last),
            None => false,
        }
    }

    /// The closed part of a cyclic route, from the first visit of the
    /// terminal node up to (not including) its repetition.
    #[must_use]
    pub fn cycle_nodes(&self) -> Vec<NodeId> {
        if !self.is_cycle() {
            return Vec::new();
        }
        let terminal = self.terminal();
        let body = &self.nodes[..self.nodes.len() - 1];
        body.iter()
            .position(|&n| n == terminal)
            .map(|first| body[first..].to_vec())
            .unwrap_or_default()
    }

    /// Whether `node` lies on the route.
    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// The alternating node/edge sequence.
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        let edges = self.edges.iter().map(|&e| Some(Step::Edge(e)));
        self.nodes
            .iter()
            .map(|&n| Step::Node(n))
            .zip(edges.chain(std::iter::once(None)))
            .flat_map(|(node, edge)| std::iter::once(node).chain(edge))
    }

    /// Nodes both routes visit, excluding a shared origin, in `self` order.
    #[must_use]
    pub fn overlap(&self, other: &Route) -> Vec<NodeId> {
        let shared_origin = (self.origin() == other.origin()).then_some(self.origin());
        let theirs: BTreeSet<NodeId> = other.nodes.iter().copied().collect();
        let mut seen = BTreeSet::new();
        self.nodes
            .iter()
            .copied()
            .filter(|n| Some(*n) != shared_origin && theirs.contains(n))
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Fail with [`GraphError::RoutesOverlap`] if the routes share nodes
    /// beyond a common origin.
    pub fn ensure_disjoint(&self, other: &Route) -> Result<(), GraphError> {
        let nodes = self.overlap(other);
        if nodes.is_empty() {
            Ok(())
        } else {
            Err(GraphError::RoutesOverlap { nodes })
        }
    }
}

// =============================================================================
// WALK ITERATOR
// =============================================================================

/// One expanded interface and the edges still to try from it.
#[derive(Debug)]
struct Frame {
    exit: InterfaceId,
    pending: std::vec::IntoIter<EdgeId>,
}

/// Lazy enumeration of every route from a start interface.
///
/// Edges at one interface are tried in insertion order; no global route order
/// is promised.
#[derive(Debug)]
pub struct Walk<'g> {
    graph: &'g PolarGraph,
    start: InterfaceId,
    stop: BTreeSet<NodeId>,
    frames: Vec<Frame>,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    on_branch: BTreeSet<NodeId>,
}

impl<'g> Walk<'g> {
    fn new(
        graph: &'g PolarGraph,
        start: InterfaceId,
        stop: BTreeSet<NodeId>,
    ) -> Result<Self, GraphError> {
        let pending: Vec<EdgeId> = graph.interface(start)?.edges().collect();
        Ok(Self {
            graph,
            start,
            stop,
            frames: vec![Frame {
                exit: start,
                pending: pending.into_iter(),
            }],
            nodes: vec![start.node],
            edges: Vec::new(),
            on_branch: BTreeSet::from([start.node]),
        })
    }

    fn is_border(&self, onward: InterfaceId) -> bool {
        self.graph
            .interface(onward)
            .map(|i| i.is_empty())
            .unwrap_or(true)
    }
}

impl Iterator for Walk<'_> {
    type Item = Route;

    fn next(&mut self) -> Option<Route> {
        loop {
            let frame = self.frames.last_mut()?;
            let exit = frame.exit;
            let Some(edge) = frame.pending.next() else {
                self.frames.pop();
                if !self.frames.is_empty() {
                    // Backtrack: the node this frame expanded leaves the branch.
                    if let Some(node) = self.nodes.pop() {
                        self.on_branch.remove(&node);
                    }
                    self.edges.pop();
                }
                continue;
            };

            let entry = match self.graph.opposite(edge, exit) {
                Ok(entry) => entry,
                Err(err) => {
                    // An interface lists an edge the graph does not hold.
                    tracing::warn!(%edge, %exit, error = %err, "skipping inconsistent edge");
                    continue;
                }
            };
            let node = entry.node;
            let onward = entry.opposite();
            let cyclic = self.on_branch.contains(&node);

            self.nodes.push(node);
            self.edges.push(edge);

            if cyclic || self.stop.contains(&node) || self.is_border(onward) {
                let route = Route {
                    start: self.start,
                    end: entry,
                    nodes: self.nodes.clone(),
                    edges: self.edges.clone(),
                };
                self.nodes.pop();
                self.edges.pop();
                tracing::trace!(terminal = %node, cyclic, "route completed");
                return Some(route);
            }

            self.on_branch.insert(node);
            let pending: Vec<EdgeId> = self
                .graph
                .interface(onward)
                .map(|i| i.edges().collect())
                .unwrap_or_default();
            self.frames.push(Frame {
                exit: onward,
                pending: pending.into_iter(),
            });
        }
    }
}

// =============================================================================
// GRAPH ENTRY POINTS
// =============================================================================

impl PolarGraph {
    /// Enumerate every route leaving through `start`.
    ///
    /// Branches end at nodes in `stop`, at borders, or on revisiting a node
    /// (reported as a cyclic route).
    pub fn walk(
        &self,
        start: InterfaceId,
        stop: impl IntoIterator<Item = NodeId>,
    ) -> Result<Walk<'_>, GraphError> {
        Walk::new(self, start, stop.into_iter().collect())
    }

    /// Follow the active choice of every interface from `start`.
    ///
    /// Ends at a stop node, a border, or a revisited node. Leaving through an
    /// interface with several edges whose position was never chosen is a
    /// [`ContractViolation::BlindNode`].
    pub fn free_roll(
        &self,
        start: InterfaceId,
        stop: impl IntoIterator<Item = NodeId>,
    ) -> Result<Route, GraphError> {
        let stop: BTreeSet<NodeId> = stop.into_iter().collect();
        let mut nodes = vec![start.node];
        let mut edges = Vec::new();
        let mut on_branch = BTreeSet::from([start.node]);
        let mut exit = start;
        let mut end = start;

        loop {
            let iface = self.interface(exit)?;
            let Some(choice) = iface.active_choice()? else {
                break;
            };
            if !iface.is_determined() {
                return Err(ContractViolation::BlindNode {
                    node: exit.node,
                    interface: exit,
                }
                .into());
            }
            let edge = choice.edge();
            let entry = self.opposite(edge, exit)?;
            nodes.push(entry.node);
            edges.push(edge);
            end = entry;

            if !on_branch.insert(entry.node)
                || stop.contains(&entry.node)
                || self.interface(entry.opposite())?.is_empty()
            {
                break;
            }
            exit = entry.opposite();
        }

        Ok(Route {
            start,
            end,
            nodes,
            edges,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// source -> a -> b -> sink, plus a second branch a -> c -> sink.
    fn fork() -> (PolarGraph, NodeId, NodeId, NodeId) {
        let mut graph = PolarGraph::with_sentinels();
        let a = graph.insert_node(None, None).expect("a");
        let b = graph
            .insert_node(Some(InterfaceId::pos(a)), None)
            .expect("b");
        let c = graph.insert_node(None, None).expect("c");
        graph
            .connect_with_sentinel_handling(InterfaceId::pos(a), InterfaceId::neg(c))
            .expect("a-c");
        (graph, a, b, c)
    }

    #[test]
    fn walk_enumerates_every_branch() {
        let (graph, a, b, c) = fork();
        let source = graph.source().expect("source");

        let routes: Vec<Route> = graph.walk(source, []).expect("walk").collect();

        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| !r.is_cycle()));
        assert_eq!(&routes[0].nodes()[1..4], &[a, b, routes[0].terminal()][..]);
        assert!(routes[1].contains_node(c));
    }

    #[test]
    fn walk_stops_at_stop_nodes() {
        let (graph, a, b, _) = fork();
        let routes: Vec<Route> = graph
            .walk(InterfaceId::pos(a), [b])
            .expect("walk")
            .collect();

        let to_b: Vec<_> = routes.iter().filter(|r| r.terminal() == b).collect();
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].nodes(), &[a, b]);
        assert_eq!(to_b[0].end(), InterfaceId::neg(b));
    }

    #[test]
    fn walk_from_empty_interface_yields_nothing() {
        let mut graph = PolarGraph::new();
        let n = graph.insert_node(None, None).expect("n");
        assert_eq!(graph.walk(InterfaceId::pos(n), []).expect("walk").count(), 0);
    }

    #[test]
    fn walk_skips_dangling_edge_records() {
        let (mut graph, a, b, c) = fork();
        let to_b = graph
            .edges_between(InterfaceId::pos(a), InterfaceId::neg(b))
            .expect("between")[0];
        // Corrupt the store: a.pos still lists the edge, the graph no longer holds it.
        graph.edges.remove(&to_b);

        let routes: Vec<Route> = graph.walk(InterfaceId::pos(a), []).expect("walk").collect();
        assert_eq!(routes.len(), 1);
        assert!(routes[0].contains_node(c));
        assert!(!routes[0].contains_node(b));
    }

    #[test]
    fn walk_reports_cycles_instead_of_looping() {
        let mut graph = PolarGraph::new();
        let a = graph.insert_node(None, None).expect("a");
        let b = graph.insert_node(None, None).expect("b");
        graph
            .connect(InterfaceId::pos(a), InterfaceId::neg(b))
            .expect("a-b");
        graph
            .connect(InterfaceId::pos(b), InterfaceId::neg(a))
            .expect("b-a");

        let routes: Vec<Route> = graph.walk(InterfaceId::pos(a), []).expect("walk").collect();

        assert_eq!(routes.len(), 1);
        assert!(routes[0].is_cycle());
        assert_eq!(routes[0].nodes(), &[a, b, a]);
        assert_eq!(routes[0].cycle_nodes(), vec![a, b]);
    }

    #[test]
    fn steps_alternate() {
        let (graph, ..) = fork();
        let route = graph
            .walk(graph.source().expect("source"), [])
            .expect("walk")
            .next()
            .expect("route");

        let steps: Vec<Step> = route.steps().collect();
        assert_eq!(steps.len(), route.nodes().len() + route.edges().len());
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(matches!(step, Step::Node(_)), i % 2 == 0);
        }
    }

    #[test]
    fn overlap_ignores_shared_origin() {
        let (graph, a, b, c) = fork();
        let routes: Vec<Route> = graph.walk(InterfaceId::pos(a), []).expect("walk").collect();
        let via_b = routes.iter().find(|r| r.contains_node(b)).expect("via b");
        let via_c = routes.iter().find(|r| r.contains_node(c)).expect("via c");

        // Both branches drain into the sink.
        let sink = graph.sink().expect("sink").node;
        assert_eq!(via_b.overlap(via_c), vec![sink]);
        assert!(matches!(
            via_b.ensure_disjoint(via_c),
            Err(GraphError::RoutesOverlap { .. })
        ));
    }

    #[test]
    fn free_roll_follows_single_edges() {
        let mut graph = PolarGraph::with_sentinels();
        let a = graph.insert_node(None, None).expect("a");
        let b = graph
            .insert_node(Some(InterfaceId::pos(a)), None)
            .expect("b");

        let route = graph
            .free_roll(graph.source().expect("source"), [])
            .expect("roll");
        assert_eq!(&route.nodes()[1..3], &[a, b]);
        assert!(!route.is_cycle());
    }

    #[test]
    fn free_roll_rejects_unset_junction() {
        let (graph, a, ..) = fork();
        let err = graph
            .free_roll(InterfaceId::pos(a), [])
            .expect_err("blind");
        assert_eq!(
            err,
            GraphError::from(ContractViolation::BlindNode {
                node: a,
                interface: InterfaceId::pos(a),
            })
        );
    }

    #[test]
    fn free_roll_follows_chosen_position() {
        let (mut graph, a, _, c) = fork();
        let to_c = graph
            .edges_between(InterfaceId::pos(a), InterfaceId::neg(c))
            .expect("between")[0];
        graph.choose(InterfaceId::pos(a), to_c).expect("choose");

        let route = graph.free_roll(InterfaceId::pos(a), [c]).expect("roll");
        assert_eq!(route.nodes(), &[a, c]);
        assert_eq!(route.edges(), &[to_c]);
    }
}
