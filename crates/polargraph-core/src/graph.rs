//! # Graph Container
//!
//! The polar graph: nodes with exactly two interfaces, undirected links
//! between interfaces of distinct nodes, and (optionally) two permanent
//! sentinel nodes.
//!
//! All data structures use `BTreeMap` for deterministic ordering.
//!
//! ## Sentinels
//!
//! A graph built with [`PolarGraph::with_sentinels`] owns two "infinity"
//! nodes. Real nodes hang between them:
//!
//! ```text
//!   inf_pos.neg ── n.neg [n] n.pos ── inf_neg.pos
//!   (source)                            (sink)
//! ```
//!
//! Through the `*_with_sentinel_handling` operations every real interface and
//! both inner sentinel interfaces stay connected to at least one edge. An
//! interface left empty is rewired to its matching sentinel; a sentinel edge
//! made redundant by a real connection is dropped.

use crate::interface::NodeInterface;
use crate::{
    Cell, CellKind, ContractViolation, EdgeId, ElementRef, End, GraphError, InterfaceId, NodeId,
};
use std::collections::BTreeMap;

// =============================================================================
// NODE & LINK
// =============================================================================

/// A node with a negative and a positive interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolarNode {
    id: NodeId,
    neg: NodeInterface,
    pos: NodeInterface,
    pub(crate) cells: Vec<Cell>,
    sentinel: bool,
}

impl PolarNode {
    fn new(id: NodeId, sentinel: bool) -> Self {
        Self {
            id,
            neg: NodeInterface::new(InterfaceId::neg(id)),
            pos: NodeInterface::new(InterfaceId::pos(id)),
            cells: Vec::new(),
            sentinel,
        }
    }

    /// The node identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The interface on one side.
    #[must_use]
    pub fn interface(&self, end: End) -> &NodeInterface {
        match end {
            End::Neg => &self.neg,
            End::Pos => &self.pos,
        }
    }

    pub(crate) fn interface_mut(&mut self, end: End) -> &mut NodeInterface {
        match end {
            End::Neg => &mut self.neg,
            End::Pos => &mut self.pos,
        }
    }

    /// Payload cells attached to this node.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Whether this is one of the two permanent infinity nodes.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }
}

/// An undirected connector between interfaces of two distinct nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    id: EdgeId,
    ends: (InterfaceId, InterfaceId),
    pub(crate) cells: Vec<Cell>,
}

impl Link {
    /// The edge identity.
    #[must_use]
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Both interfaces, in connection order.
    #[must_use]
    pub fn ends(&self) -> (InterfaceId, InterfaceId) {
        self.ends
    }

    /// The interface reached when crossing from `from`.
    #[must_use]
    pub fn opposite(&self, from: InterfaceId) -> Option<InterfaceId> {
        if self.ends.0 == from {
            Some(self.ends.1)
        } else if self.ends.1 == from {
            Some(self.ends.0)
        } else {
            None
        }
    }

    /// Whether the link joins exactly these two interfaces.
    #[must_use]
    pub fn joins(&self, a: InterfaceId, b: InterfaceId) -> bool {
        self.ends == (a, b) || self.ends == (b, a)
    }

    /// Payload cells attached to this link.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// The two permanent infinity nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinels {
    /// Receives the negative side of real nodes on its `neg` interface.
    pub pos: NodeId,
    /// Receives the positive side of real nodes on its `pos` interface.
    pub neg: NodeId,
}

// =============================================================================
// GRAPH
// =============================================================================

/// The polar graph container.
///
/// Owns every node and edge. Not `Clone`: a second instance comes from
/// [`PolarGraph::copy`] or [`PolarGraph::copy_part`] together with the
/// identity mapping.
#[derive(Debug, Default)]
pub struct PolarGraph {
    pub(crate) nodes: BTreeMap<NodeId, PolarNode>,
    pub(crate) edges: BTreeMap<EdgeId, Link>,
    pub(crate) sentinels: Option<Sentinels>,
    pub(crate) next_node_id: u64,
    pub(crate) next_edge_id: u64,
}

impl PolarGraph {
    /// Create an empty graph without sentinels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph holding only the two sentinels, joined to each other.
    #[must_use]
    pub fn with_sentinels() -> Self {
        let mut graph = Self::new();
        let pos = graph.allocate_node(true);
        let neg = graph.allocate_node(true);
        graph.sentinels = Some(Sentinels { pos, neg });
        // Fresh nodes on distinct ids: the raw link cannot violate a contract.
        let _ = graph.link(InterfaceId::neg(pos), InterfaceId::pos(neg));
        graph
    }

    /// The sentinel pair, if this graph has one.
    #[must_use]
    pub fn sentinels(&self) -> Option<Sentinels> {
        self.sentinels
    }

    /// Whether `node` is a sentinel.
    #[must_use]
    pub fn is_sentinel(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(PolarNode::is_sentinel)
    }

    /// The border interface all dependency-free nodes hang from (`inf_pos.neg`).
    pub fn source(&self) -> Result<InterfaceId, GraphError> {
        self.sentinels
            .map(|s| InterfaceId::neg(s.pos))
            .ok_or_else(|| ContractViolation::MissingSentinels.into())
    }

    /// The border interface every open positive side drains into (`inf_neg.pos`).
    pub fn sink(&self) -> Result<InterfaceId, GraphError> {
        self.sentinels
            .map(|s| InterfaceId::pos(s.neg))
            .ok_or_else(|| ContractViolation::MissingSentinels.into())
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Result<&PolarNode, GraphError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| ContractViolation::UnknownNode(id).into())
    }

    /// Look up an edge.
    pub fn edge(&self, id: EdgeId) -> Result<&Link, GraphError> {
        self.edges
            .get(&id)
            .ok_or_else(|| ContractViolation::UnknownEdge(id).into())
    }

    /// Look up an interface.
    pub fn interface(&self, id: InterfaceId) -> Result<&NodeInterface, GraphError> {
        Ok(self.node(id.node)?.interface(id.end))
    }

    pub(crate) fn interface_mut(
        &mut self,
        id: InterfaceId,
    ) -> Result<&mut NodeInterface, GraphError> {
        let node = self
            .nodes
            .get_mut(&id.node)
            .ok_or(ContractViolation::UnknownNode(id.node))?;
        Ok(node.interface_mut(id.end))
    }

    /// Whether the node exists.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether the edge exists.
    #[must_use]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// All nodes, sentinels included, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &PolarNode> {
        self.nodes.values()
    }

    /// All non-sentinel nodes in id order.
    pub fn real_nodes(&self) -> impl Iterator<Item = &PolarNode> {
        self.nodes.values().filter(|n| !n.is_sentinel())
    }

    /// All edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Link> {
        self.edges.values()
    }

    /// Node count, sentinels included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edge count.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The interface reached when crossing `edge` from `from`.
    pub fn opposite(&self, edge: EdgeId, from: InterfaceId) -> Result<InterfaceId, GraphError> {
        self.edge(edge)?.opposite(from).ok_or_else(|| {
            ContractViolation::ForeignEdge {
                interface: from,
                edge,
            }
            .into()
        })
    }

    /// The far interface of every edge at `interface`, in edge order.
    pub fn neighbours(&self, interface: InterfaceId) -> Result<Vec<InterfaceId>, GraphError> {
        self.interface(interface)?
            .edges()
            .map(|e| self.opposite(e, interface))
            .collect()
    }

    /// Edges directly joining `a` and `b`.
    pub fn edges_between(&self, a: InterfaceId, b: InterfaceId) -> Result<Vec<EdgeId>, GraphError> {
        let iface = self.interface(a)?;
        Ok(iface
            .edges()
            .filter(|e| self.edges.get(e).is_some_and(|l| l.joins(a, b)))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Raw mutation
    // -------------------------------------------------------------------------

    pub(crate) fn allocate_node(&mut self, sentinel: bool) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);
        self.nodes.insert(id, PolarNode::new(id, sentinel));
        id
    }

    /// Validate and add one edge.
    fn link(&mut self, a: InterfaceId, b: InterfaceId) -> Result<EdgeId, GraphError> {
        if a == b {
            return Err(ContractViolation::SelfLoop(a).into());
        }
        if a.node == b.node {
            return Err(ContractViolation::SameNode(a, b).into());
        }
        self.node(a.node)?;
        self.node(b.node)?;

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id = self.next_edge_id.saturating_add(1);
        self.interface_mut(a)?.add_edge(id)?;
        self.interface_mut(b)?.add_edge(id)?;
        self.edges.insert(
            id,
            Link {
                id,
                ends: (a, b),
                cells: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Connect two interfaces of distinct nodes. No sentinel bookkeeping.
    pub fn connect(&mut self, a: InterfaceId, b: InterfaceId) -> Result<EdgeId, GraphError> {
        self.link(a, b)
    }

    /// Remove every edge directly joining `a` and `b`. No sentinel bookkeeping.
    pub fn disconnect(&mut self, a: InterfaceId, b: InterfaceId) -> Result<Vec<EdgeId>, GraphError> {
        let edges = self.edges_between(a, b)?;
        if edges.is_empty() {
            return Err(ContractViolation::NotConnected(a, b).into());
        }
        for &edge in &edges {
            self.remove_edge(edge)?;
        }
        Ok(edges)
    }

    /// Remove one edge and deregister it from both interfaces.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<Link, GraphError> {
        let link = self
            .edges
            .remove(&edge)
            .ok_or(ContractViolation::UnknownEdge(edge))?;
        let (a, b) = link.ends;
        self.interface_mut(a)?.remove_edge(edge)?;
        self.interface_mut(b)?.remove_edge(edge)?;
        Ok(link)
    }

    /// Make `edge` the active choice at `interface`.
    pub fn choose(&mut self, interface: InterfaceId, edge: EdgeId) -> Result<(), GraphError> {
        self.interface_mut(interface)?.choose(edge)
    }

    // -------------------------------------------------------------------------
    // Sentinel-aware mutation
    // -------------------------------------------------------------------------

    /// The sentinel interface an empty `interface` is rewired to.
    ///
    /// `None` for sentinel outer interfaces and for graphs without sentinels.
    #[must_use]
    pub fn matching_sentinel_interface(&self, interface: InterfaceId) -> Option<InterfaceId> {
        let s = self.sentinels?;
        if interface.node == s.pos {
            return (interface.end == End::Neg).then_some(InterfaceId::pos(s.neg));
        }
        if interface.node == s.neg {
            return (interface.end == End::Pos).then_some(InterfaceId::neg(s.pos));
        }
        Some(match interface.end {
            End::Neg => InterfaceId::neg(s.pos),
            End::Pos => InterfaceId::pos(s.neg),
        })
    }

    /// Whether `edge` crossed from `interface` lands on a sentinel.
    fn leads_to_sentinel(&self, interface: InterfaceId, edge: EdgeId) -> bool {
        self.edges
            .get(&edge)
            .and_then(|l| l.opposite(interface))
            .is_some_and(|other| self.is_sentinel(other.node))
    }

    fn has_real_edge(&self, interface: InterfaceId) -> Result<bool, GraphError> {
        Ok(self
            .interface(interface)?
            .edges()
            .any(|e| !self.leads_to_sentinel(interface, e)))
    }

    /// Drop sentinel edges a real connection has made redundant.
    fn drop_redundant_sentinel_edges(&mut self, interface: InterfaceId) -> Result<(), GraphError> {
        let Some(s) = self.sentinels else {
            return Ok(());
        };
        if self.is_sentinel(interface.node) {
            // The sentinel-to-sentinel link goes only once both inner sides have real edges.
            let (source, sink) = (InterfaceId::neg(s.pos), InterfaceId::pos(s.neg));
            if self.has_real_edge(source)? && self.has_real_edge(sink)? {
                for edge in self.edges_between(source, sink)? {
                    tracing::trace!(%edge, "dropping sentinel-to-sentinel edge");
                    self.remove_edge(edge)?;
                }
            }
            return Ok(());
        }
        if !self.has_real_edge(interface)? {
            return Ok(());
        }
        let redundant: Vec<EdgeId> = self
            .interface(interface)?
            .edges()
            .filter(|&e| self.leads_to_sentinel(interface, e))
            .collect();
        for edge in redundant {
            tracing::trace!(%interface, %edge, "dropping redundant sentinel edge");
            let link = self.remove_edge(edge)?;
            if let Some(other) = link.opposite(interface) {
                self.reattach_if_empty(other)?;
            }
        }
        Ok(())
    }

    /// Rewire an empty interface to its matching sentinel.
    pub(crate) fn reattach_if_empty(&mut self, interface: InterfaceId) -> Result<(), GraphError> {
        if !self.interface(interface)?.is_empty() {
            return Ok(());
        }
        let Some(target) = self.matching_sentinel_interface(interface) else {
            return Ok(());
        };
        tracing::trace!(%interface, %target, "rewiring empty interface to sentinel");
        self.link(interface, target)?;
        if !self.is_sentinel(interface.node) {
            self.drop_redundant_sentinel_edges(target)?;
        }
        Ok(())
    }

    /// Connect, then drop sentinel edges made redundant on either side.
    pub fn connect_with_sentinel_handling(
        &mut self,
        a: InterfaceId,
        b: InterfaceId,
    ) -> Result<EdgeId, GraphError> {
        let edge = self.link(a, b)?;
        self.drop_redundant_sentinel_edges(a)?;
        self.drop_redundant_sentinel_edges(b)?;
        Ok(edge)
    }

    /// Disconnect, then rewire any interface left empty to its sentinel.
    pub fn disconnect_with_sentinel_handling(
        &mut self,
        a: InterfaceId,
        b: InterfaceId,
    ) -> Result<Vec<EdgeId>, GraphError> {
        let removed = self.disconnect(a, b)?;
        self.reattach_if_empty(a)?;
        self.reattach_if_empty(b)?;
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Node insertion
    // -------------------------------------------------------------------------

    /// Create a node and splice it between `a` and `b`.
    ///
    /// The node's negative interface is wired to `a` (default: the source,
    /// `inf_pos.neg`) and its positive interface to `b` (default: the sink,
    /// `inf_neg.pos`). Edges that joined `a` and `b` directly are removed once
    /// the new node is in place. Without sentinels a missing argument leaves
    /// that side unconnected.
    pub fn insert_node(
        &mut self,
        a: Option<InterfaceId>,
        b: Option<InterfaceId>,
    ) -> Result<NodeId, GraphError> {
        let a = match a {
            Some(a) => Some(a),
            None => self.sentinels.map(|s| InterfaceId::neg(s.pos)),
        };
        let b = match b {
            Some(b) => Some(b),
            None => self.sentinels.map(|s| InterfaceId::pos(s.neg)),
        };
        for iface in [a, b].into_iter().flatten() {
            self.interface(iface)?;
        }
        let direct = match (a, b) {
            (Some(a), Some(b)) => self.edges_between(a, b)?,
            _ => Vec::new(),
        };

        let node = self.allocate_node(false);
        if let Some(a) = a {
            self.connect_with_sentinel_handling(InterfaceId::neg(node), a)?;
        }
        if let Some(b) = b {
            self.connect_with_sentinel_handling(InterfaceId::pos(node), b)?;
        }
        for edge in direct {
            if self.contains_edge(edge) {
                self.remove_edge(edge)?;
            }
        }
        tracing::debug!(%node, "inserted node");
        Ok(node)
    }

    /// Insert a node that pinches `interface`.
    ///
    /// Every edge of `interface` moves to the new node's interface on the same
    /// side, keeping its id, cells and active flag; the new node's other
    /// interface is connected to `interface`.
    pub fn insert_node_neck(&mut self, interface: InterfaceId) -> Result<NodeId, GraphError> {
        let was_set = self.interface(interface)?.is_set();
        let moving: Vec<EdgeId> = self.interface(interface)?.edges().collect();

        let node = self.allocate_node(false);
        let outer = InterfaceId::new(node, interface.end);
        let inner = InterfaceId::new(node, interface.end.opposite());

        for edge in moving {
            let choice = self.interface_mut(interface)?.remove_edge(edge)?;
            let target = self.interface_mut(outer)?;
            target.add_edge(edge)?;
            if choice.is_active() {
                target.activate(edge, was_set)?;
            }
            if let Some(moved) = target.choice_mut(edge) {
                moved.cells = choice.cells;
            }
            let link = self
                .edges
                .get_mut(&edge)
                .ok_or(ContractViolation::UnknownEdge(edge))?;
            if link.ends.0 == interface {
                link.ends.0 = outer;
            } else {
                link.ends.1 = outer;
            }
        }
        self.link(inner, interface)?;
        self.reattach_if_empty(outer)?;
        tracing::debug!(%node, %interface, "inserted neck node");
        Ok(node)
    }

    /// Disconnect every edge of a real node and delete it.
    ///
    /// Neighbours left empty are rewired to the sentinels.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        if self.node(node)?.is_sentinel() {
            return Err(ContractViolation::SentinelNode(node).into());
        }
        for end in End::BOTH {
            let iface = InterfaceId::new(node, end);
            let edges: Vec<EdgeId> = self.interface(iface)?.edges().collect();
            for edge in edges {
                let link = self.remove_edge(edge)?;
                if let Some(other) = link.opposite(iface) {
                    self.reattach_if_empty(other)?;
                }
            }
        }
        self.nodes.remove(&node);
        tracing::debug!(%node, "removed node");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payload cells
    // -------------------------------------------------------------------------

    /// Attach a cell to a node, edge or choice.
    pub fn attach(&mut self, element: ElementRef, cell: Cell) -> Result<(), GraphError> {
        let cells = match element {
            ElementRef::Node(id) => {
                &mut self
                    .nodes
                    .get_mut(&id)
                    .ok_or(ContractViolation::UnknownNode(id))?
                    .cells
            }
            ElementRef::Edge(id) => {
                &mut self
                    .edges
                    .get_mut(&id)
                    .ok_or(ContractViolation::UnknownEdge(id))?
                    .cells
            }
            ElementRef::Choice(interface, edge) => {
                &mut self
                    .interface_mut(interface)?
                    .choice_mut(edge)
                    .ok_or(ContractViolation::ForeignEdge { interface, edge })?
                    .cells
            }
        };
        cells.push(cell);
        Ok(())
    }

    /// Cells attached to an element.
    pub fn cells(&self, element: ElementRef) -> Result<&[Cell], GraphError> {
        match element {
            ElementRef::Node(id) => Ok(self.node(id)?.cells()),
            ElementRef::Edge(id) => Ok(self.edge(id)?.cells()),
            ElementRef::Choice(interface, edge) => Ok(self
                .interface(interface)?
                .choice(edge)
                .ok_or(ContractViolation::ForeignEdge { interface, edge })?
                .cells()),
        }
    }

    /// The first cell of a kind on an element; `None` for unknown elements.
    #[must_use]
    pub fn find_cell(&self, element: ElementRef, kind: CellKind) -> Option<&Cell> {
        self.cells(element)
            .ok()?
            .iter()
            .find(|c| c.kind() == kind)
    }

    /// The first node carrying exactly this cell.
    #[must_use]
    pub fn find_node_by_cell(&self, cell: &Cell) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.cells.contains(cell))
            .map(PolarNode::id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
