//! # Core Type Definitions
//!
//! This module contains the vocabulary shared by every part of the engine:
//! - Orientation tag (`End`) and element identifiers (`NodeId`, `EdgeId`, `InterfaceId`)
//! - Payload cells (`Cell`, `CellKind`, `Direction`) and the `ElementRef` they attach to
//! - Error types (`GraphError`, `ContractViolation`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so they can key `BTreeMap`/`BTreeSet`.
//! Identifiers are allocated monotonically and never reused within one graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ORIENTATION
// =============================================================================

/// Which side of a polar node an interface occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum End {
    /// The negative side.
    Neg,
    /// The positive side.
    Pos,
}

impl End {
    /// Both ends, negative first.
    pub const BOTH: [End; 2] = [End::Neg, End::Pos];

    /// The other side of the same node.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            End::Neg => End::Pos,
            End::Pos => End::Neg,
        }
    }
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            End::Neg => write!(f, "neg"),
            End::Pos => write!(f, "pos"),
        }
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identity of a node inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identity of an edge (link) inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identity of one interface: a node plus the side it sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterfaceId {
    /// The node owning the interface.
    pub node: NodeId,
    /// The side of the node.
    pub end: End,
}

impl InterfaceId {
    /// Create an interface identity.
    #[must_use]
    pub const fn new(node: NodeId, end: End) -> Self {
        Self { node, end }
    }

    /// The negative interface of `node`.
    #[must_use]
    pub const fn neg(node: NodeId) -> Self {
        Self::new(node, End::Neg)
    }

    /// The positive interface of `node`.
    #[must_use]
    pub const fn pos(node: NodeId) -> Self {
        Self::new(node, End::Pos)
    }

    /// The interface on the other side of the same node.
    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::new(self.node, self.end.opposite())
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.end)
    }
}

/// Any graph element that can carry payload cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementRef {
    /// A node.
    Node(NodeId),
    /// An edge.
    Edge(EdgeId),
    /// The choice "take this edge from this interface".
    Choice(InterfaceId, EdgeId),
}

// =============================================================================
// PAYLOAD CELLS
// =============================================================================

/// Direction tag of a switch leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The "+" (normal) leg.
    #[serde(rename = "+")]
    Plus,
    /// The "-" (reverse) leg.
    #[serde(rename = "-")]
    Minus,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Plus => write!(f, "+"),
            Direction::Minus => write!(f, "-"),
        }
    }
}

/// An opaque payload attached to a node, edge or choice.
///
/// The engine never interprets cells; consumers attach them to encode domain
/// meaning and query them back by [`CellKind`]. Lengths and coordinates are
/// integers (millimetres).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    /// Name of the configuration object a node stands for.
    ObjectRef(String),
    /// Name of a track point.
    Point(String),
    /// Name of a signal placed at a point.
    Signal(String),
    /// Name of the track section a point belongs to.
    Section(String),
    /// Direction tag of a switch leg.
    Direction(Direction),
    /// Length of a link.
    Length(u64),
    /// Planar position.
    Coordinate { x: i64, y: i64 },
    /// Ordering key supplied by the topology builder.
    SortKey(i64),
}

/// The variant tag of a [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    ObjectRef,
    Point,
    Signal,
    Section,
    Direction,
    Length,
    Coordinate,
    SortKey,
}

impl Cell {
    /// The variant tag of this cell.
    #[must_use]
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::ObjectRef(_) => CellKind::ObjectRef,
            Cell::Point(_) => CellKind::Point,
            Cell::Signal(_) => CellKind::Signal,
            Cell::Section(_) => CellKind::Section,
            Cell::Direction(_) => CellKind::Direction,
            Cell::Length(_) => CellKind::Length,
            Cell::Coordinate { .. } => CellKind::Coordinate,
            Cell::SortKey(_) => CellKind::SortKey,
        }
    }

    /// The name carried by a name-like cell.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Cell::ObjectRef(s) | Cell::Point(s) | Cell::Signal(s) | Cell::Section(s) => Some(s),
            _ => None,
        }
    }

    /// The direction carried by a direction cell.
    #[must_use]
    pub fn as_direction(&self) -> Option<Direction> {
        match self {
            Cell::Direction(d) => Some(*d),
            _ => None,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A broken structural contract.
///
/// These indicate an engine or caller bug, never bad input. Callers must not
/// try to recover from them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// An interface was connected to itself.
    #[error("interface {0} cannot be connected to itself")]
    SelfLoop(InterfaceId),

    /// Two interfaces of the same node were connected.
    #[error("interfaces {0} and {1} belong to the same node")]
    SameNode(InterfaceId, InterfaceId),

    /// The edge already has a choice at this interface.
    #[error("edge {edge} is already registered at {interface}")]
    DuplicateEdge { interface: InterfaceId, edge: EdgeId },

    /// The edge has no choice at this interface.
    #[error("edge {edge} is not registered at {interface}")]
    ForeignEdge { interface: InterfaceId, edge: EdgeId },

    /// More than one choice is active at one interface.
    #[error("{count} active choices at {interface}")]
    MultipleActive { interface: InterfaceId, count: usize },

    /// A deterministic walk hit a junction whose position was never set.
    #[error("blind node {node}: {interface} has several edges and no chosen one")]
    BlindNode { node: NodeId, interface: InterfaceId },

    /// The operation needs the sentinel nodes.
    #[error("graph has no sentinel nodes")]
    MissingSentinels,

    /// Sentinel nodes are permanent.
    #[error("sentinel node {0} cannot be removed")]
    SentinelNode(NodeId),

    /// The node does not exist in this graph.
    #[error("node not found: {0}")]
    UnknownNode(NodeId),

    /// The edge does not exist in this graph.
    #[error("edge not found: {0}")]
    UnknownEdge(EdgeId),

    /// No edge joins the two interfaces.
    #[error("{0} and {1} are not connected")]
    NotConnected(InterfaceId, InterfaceId),

    /// Templates merged by `aggregate` must be sentinel-free.
    #[error("inserted graph carries sentinel nodes")]
    TemplateHasSentinels,
}

/// Errors returned by every fallible graph operation.
///
/// - `Contract` wraps a [`ContractViolation`] and is never recoverable
/// - every other variant is a domain validation failure, always raised before
///   the live graph is mutated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A structural contract was broken.
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),

    /// A walk revisited a node.
    #[error("cycle detected through nodes {nodes:?}")]
    CycleDetected { nodes: Vec<NodeId> },

    /// Nodes not reachable from the source sentinel.
    #[error("nodes unreachable from the source sentinel: {nodes:?}")]
    Isolated { nodes: Vec<NodeId> },

    /// Two routes expected to be disjoint share nodes.
    #[error("routes overlap at nodes {nodes:?}")]
    RoutesOverlap { nodes: Vec<NodeId> },

    /// No route joins the two nodes.
    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },

    /// A merge interface of the inserted graph already has edges.
    #[error("merge interface {0} of the inserted graph is already connected")]
    MergeInterfaceConnected(InterfaceId),

    /// The inserted graph does not join two merge points the base graph joins.
    #[error("route between merge points {from} and {to} has no counterpart in the inserted graph")]
    SpliceUnreachable { from: InterfaceId, to: InterfaceId },

    /// Objects whose references form a cycle.
    #[error("cycle in dependencies: {}", names.join(" -> "))]
    DependencyCycle { names: Vec<String> },

    /// Objects the source cannot reach although no cycle was found.
    #[error("objects unreachable from the source: {}", names.join(", "))]
    IsolatedObjects { names: Vec<String> },

    /// An object name that is not part of the graph.
    #[error("unknown object: {0}")]
    UnknownObject(String),

    /// An object name used twice.
    #[error("duplicate object: {0}")]
    DuplicateObject(String),

    /// A point name that is not part of the topology.
    #[error("unknown point: {0}")]
    UnknownPoint(String),

    /// A point name used twice.
    #[error("duplicate point: {0}")]
    DuplicatePoint(String),

    /// A switch without a leg tagged with the given direction.
    #[error("point {point} has no {direction} leg")]
    MissingLeg { point: String, direction: Direction },

    /// The two legs of a switch share track beyond the switch itself.
    #[error("legs of point {point} overlap at {}", shared.join(", "))]
    OverlappingLegs { point: String, shared: Vec<String> },

    /// A name that is empty or longer than [`MAX_NAME_LENGTH`].
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Input could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl GraphError {
    /// Whether a caller may reject the edit and carry on.
    ///
    /// Contract violations return `false`.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GraphError::Contract(_))
    }
}

/// Longest object or point name accepted by the consumers.
pub const MAX_NAME_LENGTH: usize = 256;

/// Reject empty and oversized names before they reach the graph.
pub(crate) fn validate_name(name: &str) -> Result<(), GraphError> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(GraphError::InvalidName(name.to_string()));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_opposite_is_involution() {
        for end in End::BOTH {
            assert_ne!(end, end.opposite());
            assert_eq!(end, end.opposite().opposite());
        }
    }

    #[test]
    fn interface_display() {
        let iface = InterfaceId::pos(NodeId(7));
        assert_eq!(iface.to_string(), "n7.pos");
        assert_eq!(iface.opposite().to_string(), "n7.neg");
    }

    #[test]
    fn cell_kind_matches_variant() {
        assert_eq!(Cell::Point("P1".into()).kind(), CellKind::Point);
        assert_eq!(Cell::Coordinate { x: 1, y: 2 }.kind(), CellKind::Coordinate);
        assert_eq!(Cell::Length(5).as_name(), None);
        assert_eq!(Cell::Signal("S3".into()).as_name(), Some("S3"));
        assert_eq!(
            Cell::Direction(Direction::Minus).as_direction(),
            Some(Direction::Minus)
        );
    }

    #[test]
    fn contract_violations_are_not_recoverable() {
        let fatal = GraphError::from(ContractViolation::MissingSentinels);
        assert!(!fatal.is_recoverable());

        let domain = GraphError::CycleDetected {
            nodes: vec![NodeId(1)],
        };
        assert!(domain.is_recoverable());
    }

    #[test]
    fn names_are_bounded() {
        assert!(validate_name("P15").is_ok());
        assert!(matches!(validate_name(""), Err(GraphError::InvalidName(_))));
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(validate_name(&long).is_err());
    }

    #[test]
    fn dependency_cycle_message_lists_names() {
        let err = GraphError::DependencyCycle {
            names: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cycle in dependencies: a -> b -> a");
    }
}
