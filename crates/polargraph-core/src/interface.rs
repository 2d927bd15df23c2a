//! # Node Interfaces
//!
//! The connector living at one side of a polar node.
//!
//! An interface owns an ordered mapping `edge -> choice`. A [`Choice`] is the
//! selectable state "leave this interface through this edge"; its `active`
//! flag is the only traversal-relevant mutable state in the whole graph. It
//! encodes a switch position for track topologies and the selected edge for
//! dependency graphs alike.
//!
//! ## Invariants
//!
//! - At most one choice is active.
//! - Whenever the interface has edges, exactly one choice is active.
//! - The first edge registered on an empty interface becomes active.

use crate::{Cell, ContractViolation, EdgeId, GraphError, InterfaceId};
use std::collections::BTreeMap;

/// "Take this edge from this interface."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    edge: EdgeId,
    active: bool,
    pub(crate) cells: Vec<Cell>,
}

impl Choice {
    /// The edge this choice leaves through.
    #[must_use]
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    /// Whether this is the current position of its interface.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Payload cells attached to this choice.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// One side of a polar node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInterface {
    id: InterfaceId,
    /// Keyed by EdgeId; ids are allocated monotonically so this is insertion order.
    choices: BTreeMap<EdgeId, Choice>,
    /// The active choice was selected through `choose` rather than defaulted.
    set: bool,
}

impl NodeInterface {
    pub(crate) fn new(id: InterfaceId) -> Self {
        Self {
            id,
            choices: BTreeMap::new(),
            set: false,
        }
    }

    /// The identity of this interface.
    #[must_use]
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    /// Register a new edge.
    ///
    /// The new choice becomes active only if no other choice was active.
    pub fn add_edge(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        if self.choices.contains_key(&edge) {
            return Err(ContractViolation::DuplicateEdge {
                interface: self.id,
                edge,
            }
            .into());
        }
        let active = !self.choices.values().any(Choice::is_active);
        self.choices.insert(
            edge,
            Choice {
                edge,
                active,
                cells: Vec::new(),
            },
        );
        Ok(())
    }

    /// Deregister an edge and return its choice.
    ///
    /// If the removed choice was active, the first remaining choice takes over
    /// and the interface counts as unset again.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<Choice, GraphError> {
        let removed = self
            .choices
            .remove(&edge)
            .ok_or(ContractViolation::ForeignEdge {
                interface: self.id,
                edge,
            })?;
        if removed.active {
            self.set = false;
            if let Some(first) = self.choices.values_mut().next() {
                first.active = true;
            }
        }
        Ok(removed)
    }

    /// Make the choice for `edge` the active one.
    pub fn choose(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        self.activate(edge, true)
    }

    /// Activate `edge` and record whether the position counts as set.
    pub(crate) fn activate(&mut self, edge: EdgeId, set: bool) -> Result<(), GraphError> {
        if !self.choices.contains_key(&edge) {
            return Err(ContractViolation::ForeignEdge {
                interface: self.id,
                edge,
            }
            .into());
        }
        for choice in self.choices.values_mut() {
            choice.active = choice.edge == edge;
        }
        self.set = set;
        Ok(())
    }

    /// Whether no edge is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Number of registered edges.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.choices.len()
    }

    /// Registered edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.choices.keys().copied()
    }

    /// All choices in insertion order.
    pub fn choices(&self) -> impl Iterator<Item = &Choice> {
        self.choices.values()
    }

    /// The choice for one edge.
    #[must_use]
    pub fn choice(&self, edge: EdgeId) -> Option<&Choice> {
        self.choices.get(&edge)
    }

    pub(crate) fn choice_mut(&mut self, edge: EdgeId) -> Option<&mut Choice> {
        self.choices.get_mut(&edge)
    }

    /// Whether `edge` is registered here.
    #[must_use]
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.choices.contains_key(&edge)
    }

    /// The active choice, `None` when the interface is empty.
    ///
    /// More than one active choice is a structural violation.
    pub fn active_choice(&self) -> Result<Option<&Choice>, GraphError> {
        let mut active = self.choices.values().filter(|c| c.active);
        let first = active.next();
        let extra = active.count();
        if extra > 0 {
            return Err(ContractViolation::MultipleActive {
                interface: self.id,
                count: extra.saturating_add(1),
            }
            .into());
        }
        Ok(first)
    }

    /// Whether the active choice was selected explicitly.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Whether a deterministic walk can leave through this interface
    /// without guessing: at most one edge, or an explicitly chosen one.
    #[must_use]
    pub fn is_determined(&self) -> bool {
        self.choices.len() <= 1 || self.set
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    fn iface() -> NodeInterface {
        NodeInterface::new(InterfaceId::pos(NodeId(1)))
    }

    fn active_edges(i: &NodeInterface) -> Vec<EdgeId> {
        i.choices()
            .filter(|c| c.is_active())
            .map(Choice::edge)
            .collect()
    }

    #[test]
    fn first_edge_becomes_active() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        i.add_edge(EdgeId(2)).expect("add");

        assert_eq!(active_edges(&i), vec![EdgeId(1)]);
        assert_eq!(i.degree(), 2);
        assert!(!i.is_set());
    }

    #[test]
    fn duplicate_edge_is_contract_violation() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        let err = i.add_edge(EdgeId(1)).expect_err("duplicate");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn choose_switches_active_choice() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        i.add_edge(EdgeId(2)).expect("add");
        i.choose(EdgeId(2)).expect("choose");

        assert_eq!(active_edges(&i), vec![EdgeId(2)]);
        assert!(i.is_set());
        assert!(i.is_determined());
    }

    #[test]
    fn choose_foreign_edge_fails() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        let err = i.choose(EdgeId(9)).expect_err("foreign");
        assert!(matches!(
            err,
            GraphError::Contract(ContractViolation::ForeignEdge { .. })
        ));
        assert_eq!(active_edges(&i), vec![EdgeId(1)]);
    }

    #[test]
    fn removing_active_edge_rederives() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        i.add_edge(EdgeId(2)).expect("add");
        i.add_edge(EdgeId(3)).expect("add");
        i.choose(EdgeId(3)).expect("choose");

        let removed = i.remove_edge(EdgeId(3)).expect("remove");
        assert!(removed.is_active());
        assert_eq!(active_edges(&i), vec![EdgeId(1)]);
        assert!(!i.is_set());
    }

    #[test]
    fn removing_inactive_edge_keeps_position() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        i.add_edge(EdgeId(2)).expect("add");
        i.choose(EdgeId(2)).expect("choose");

        i.remove_edge(EdgeId(1)).expect("remove");
        assert_eq!(active_edges(&i), vec![EdgeId(2)]);
        assert!(i.is_set());
    }

    #[test]
    fn removing_last_edge_leaves_none_active() {
        let mut i = iface();
        i.add_edge(EdgeId(4)).expect("add");
        i.remove_edge(EdgeId(4)).expect("remove");

        assert!(i.is_empty());
        assert!(i.active_choice().expect("active").is_none());
    }

    #[test]
    fn unset_junction_is_not_determined() {
        let mut i = iface();
        i.add_edge(EdgeId(1)).expect("add");
        assert!(i.is_determined());
        i.add_edge(EdgeId(2)).expect("add");
        assert!(!i.is_determined());
    }
}
