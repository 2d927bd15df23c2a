//! # Copy & Splice
//!
//! Structural copies with an old → new identity mapping, graph splicing
//! (`aggregate`) and the copy-validate-commit helper (`transact`).
//!
//! A copy is the only way to obtain a second mutable graph: [`PolarGraph`]
//! is not `Clone`. Payload cells are deep-copied with their elements, and
//! active choices (with their set flag) survive the copy.

use crate::graph::PolarGraph;
use crate::{ContractViolation, EdgeId, GraphError, InterfaceId, NodeId};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// MAPPING
// =============================================================================

/// Old → new identities produced by a copy or splice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphMapping {
    nodes: BTreeMap<NodeId, NodeId>,
    edges: BTreeMap<EdgeId, EdgeId>,
}

impl GraphMapping {
    /// The new identity of a node.
    #[must_use]
    pub fn node(&self, old: NodeId) -> Option<NodeId> {
        self.nodes.get(&old).copied()
    }

    /// The new identity of an edge.
    #[must_use]
    pub fn edge(&self, old: EdgeId) -> Option<EdgeId> {
        self.edges.get(&old).copied()
    }

    /// The new identity of an interface.
    #[must_use]
    pub fn interface(&self, old: InterfaceId) -> Option<InterfaceId> {
        self.node(old.node).map(|n| InterfaceId::new(n, old.end))
    }

    /// `(old, new)` node pairs in old-id order.
    pub fn node_pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes.iter().map(|(&a, &b)| (a, b))
    }

    /// `(old, new)` edge pairs in old-id order.
    pub fn edge_pairs(&self) -> impl Iterator<Item = (EdgeId, EdgeId)> + '_ {
        self.edges.iter().map(|(&a, &b)| (a, b))
    }

    /// Whether every identity maps to itself.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.nodes.iter().all(|(a, b)| a == b) && self.edges.iter().all(|(a, b)| a == b)
    }
}

// =============================================================================
// COPY
// =============================================================================

impl PolarGraph {
    /// A full copy keeping every identity and the id counters.
    ///
    /// Because identities match, an edit applied to the copy can be replayed
    /// verbatim on the original. The returned mapping is the identity.
    #[must_use]
    pub fn copy(&self) -> (PolarGraph, GraphMapping) {
        let graph = PolarGraph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            sentinels: self.sentinels,
            next_node_id: self.next_node_id,
            next_edge_id: self.next_edge_id,
        };
        let mapping = GraphMapping {
            nodes: self.nodes.keys().map(|&n| (n, n)).collect(),
            edges: self.edges.keys().map(|&e| (e, e)).collect(),
        };
        (graph, mapping)
    }

    /// A new sentinel-free graph over `edges` and their endpoint nodes.
    ///
    /// When `edges` covers the whole graph, nodes without edges are copied
    /// too. Identities are renumbered; sentinel endpoints become ordinary
    /// nodes.
    pub fn copy_part(
        &self,
        edges: &BTreeSet<EdgeId>,
    ) -> Result<(PolarGraph, GraphMapping), GraphError> {
        let whole = self.edges.keys().all(|e| edges.contains(e));
        let mut nodes: BTreeSet<NodeId> = if whole {
            self.nodes.keys().copied().collect()
        } else {
            BTreeSet::new()
        };
        for &edge in edges {
            let (a, b) = self.edge(edge)?.ends();
            nodes.insert(a.node);
            nodes.insert(b.node);
        }
        let mut part = PolarGraph::new();
        let mapping = part.graft(self, &nodes, edges)?;
        tracing::debug!(
            nodes = part.node_count(),
            edges = part.edge_count(),
            "copied partial graph"
        );
        Ok((part, mapping))
    }

    /// Copy `nodes` and `edges` of `src` into `self` under fresh identities.
    ///
    /// Edges are copied in id order so every interface keeps its relative
    /// edge order. Every edge endpoint must be in `nodes`.
    fn graft(
        &mut self,
        src: &PolarGraph,
        nodes: &BTreeSet<NodeId>,
        edges: &BTreeSet<EdgeId>,
    ) -> Result<GraphMapping, GraphError> {
        let mut mapping = GraphMapping::default();
        for &old in nodes {
            let cells = src.node(old)?.cells.clone();
            let new = self.allocate_node(false);
            if let Some(node) = self.nodes.get_mut(&new) {
                node.cells = cells;
            }
            mapping.nodes.insert(old, new);
        }

        for &old in edges {
            let link = src.edge(old)?;
            let (a, b) = link.ends();
            let (Some(na), Some(nb)) = (mapping.interface(a), mapping.interface(b)) else {
                return Err(ContractViolation::UnknownEdge(old).into());
            };
            let new = self.connect(na, nb)?;
            if let Some(copied) = self.edges.get_mut(&new) {
                copied.cells = link.cells.clone();
            }
            for (from, to) in [(a, na), (b, nb)] {
                if let Some(choice) = src.interface(from)?.choice(old) {
                    let cells = choice.cells.clone();
                    if let Some(target) = self.interface_mut(to)?.choice_mut(new) {
                        target.cells = cells;
                    }
                }
            }
            mapping.edges.insert(old, new);
        }

        // Restore positions whose active edge made it into the copy.
        for (&old, &new) in &mapping.nodes {
            for end in crate::End::BOTH {
                let from = src.interface(InterfaceId::new(old, end))?;
                let Some(active) = from.active_choice()?.map(|c| c.edge()) else {
                    continue;
                };
                if let Some(&copied) = mapping.edges.get(&active) {
                    self.interface_mut(InterfaceId::new(new, end))?
                        .activate(copied, from.is_set())?;
                }
            }
        }
        Ok(mapping)
    }

    // -------------------------------------------------------------------------
    // Aggregate
    // -------------------------------------------------------------------------

    /// Splice a self-contained graph into this one.
    ///
    /// `merges` pairs a base interface with an interface of `inserted`; each
    /// pair is joined by a new edge. Whenever the base graph joins two merge
    /// points, the inserted graph must join the corresponding points too, and
    /// direct base edges between merge points are replaced by the insert.
    /// Every check runs before the base graph is touched.
    ///
    /// Returns the mapping from `inserted` identities to their new ones.
    pub fn aggregate(
        &mut self,
        inserted: &PolarGraph,
        merges: &[(InterfaceId, InterfaceId)],
    ) -> Result<GraphMapping, GraphError> {
        if inserted.sentinels().is_some() {
            return Err(ContractViolation::TemplateHasSentinels.into());
        }
        for &(base, template) in merges {
            self.interface(base)?;
            if !inserted.interface(template)?.is_empty() {
                return Err(GraphError::MergeInterfaceConnected(template));
            }
        }

        let merge_nodes: BTreeSet<NodeId> = merges.iter().map(|(b, _)| b.node).collect();
        let mut direct = BTreeSet::new();
        for (i, &(bi, ti)) in merges.iter().enumerate() {
            let reached: Vec<InterfaceId> = self
                .walk(bi, merge_nodes.iter().copied())?
                .filter(|r| !r.is_cycle())
                .map(|r| r.end())
                .collect();
            for (j, &(bj, tj)) in merges.iter().enumerate() {
                if i == j || !reached.contains(&bj) {
                    continue;
                }
                if !template_joins(inserted, ti, tj)? {
                    return Err(GraphError::SpliceUnreachable { from: bi, to: bj });
                }
                direct.extend(self.edges_between(bi, bj)?);
            }
        }

        let nodes: BTreeSet<NodeId> = inserted.nodes.keys().copied().collect();
        let edges: BTreeSet<EdgeId> = inserted.edges.keys().copied().collect();
        let mapping = self.graft(inserted, &nodes, &edges)?;

        for &(base, template) in merges {
            let target = mapping
                .interface(template)
                .ok_or(ContractViolation::UnknownNode(template.node))?;
            self.connect_with_sentinel_handling(base, target)?;
        }
        for edge in direct {
            if self.contains_edge(edge) {
                self.remove_edge(edge)?;
            }
        }
        for (_, new) in mapping.node_pairs() {
            for end in crate::End::BOTH {
                self.reattach_if_empty(InterfaceId::new(new, end))?;
            }
        }
        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            merges = merges.len(),
            "aggregated graph"
        );
        Ok(mapping)
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    /// Copy, edit the copy, validate it, and only then replay the edit here.
    ///
    /// Any error from `edit` or `validate` on the draft is returned with the
    /// live graph untouched.
    pub fn transact<T, E, V>(&mut self, mut edit: E, validate: V) -> Result<T, GraphError>
    where
        E: FnMut(&mut PolarGraph) -> Result<T, GraphError>,
        V: FnOnce(&PolarGraph) -> Result<(), GraphError>,
    {
        let (mut draft, _) = self.copy();
        let checked = edit(&mut draft).and_then(|_| validate(&draft));
        if let Err(err) = checked {
            tracing::debug!(error = %err, "draft rejected");
            return Err(err);
        }
        edit(self)
    }
}

/// Whether a route through `inserted` enters at `from` and leaves at `to`.
fn template_joins(
    inserted: &PolarGraph,
    from: InterfaceId,
    to: InterfaceId,
) -> Result<bool, GraphError> {
    if from.node == to.node {
        return Ok(from.end != to.end);
    }
    let exit = to.opposite();
    Ok(inserted
        .walk(from.opposite(), [to.node])?
        .any(|r| !r.is_cycle() && r.end() == exit))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, ElementRef, End};

    fn chain() -> (PolarGraph, NodeId, NodeId) {
        let mut graph = PolarGraph::with_sentinels();
        let a = graph.insert_node(None, None).expect("a");
        let b = graph
            .insert_node(Some(InterfaceId::pos(a)), None)
            .expect("b");
        (graph, a, b)
    }

    #[test]
    fn full_copy_keeps_identities() {
        let (graph, a, _) = chain();
        let (copy, mapping) = graph.copy();

        assert!(mapping.is_identity());
        assert_eq!(copy.node_count(), graph.node_count());
        assert_eq!(copy.edge_count(), graph.edge_count());
        assert_eq!(copy.sentinels(), graph.sentinels());
        assert_eq!(copy.node(a).expect("a"), graph.node(a).expect("a"));
    }

    #[test]
    fn copy_is_independent() {
        let (mut graph, a, _) = chain();
        let (copy, _) = graph.copy();
        graph.remove_node(a).expect("remove");
        assert!(copy.contains_node(a));
    }

    #[test]
    fn copy_part_maps_and_preserves_state() {
        let mut graph = PolarGraph::with_sentinels();
        let hub = graph.insert_node(None, None).expect("hub");
        let x = graph.insert_node(None, None).expect("x");
        let y = graph.insert_node(None, None).expect("y");
        let ex = graph
            .connect_with_sentinel_handling(InterfaceId::pos(hub), InterfaceId::neg(x))
            .expect("x");
        let ey = graph
            .connect_with_sentinel_handling(InterfaceId::pos(hub), InterfaceId::neg(y))
            .expect("y");
        graph.choose(InterfaceId::pos(hub), ey).expect("choose");
        graph
            .attach(ElementRef::Node(hub), Cell::Point("H".into()))
            .expect("cell");
        graph
            .attach(ElementRef::Choice(InterfaceId::pos(hub), ey), Cell::Length(7))
            .expect("cell");

        let (part, mapping) = graph
            .copy_part(&BTreeSet::from([ex, ey]))
            .expect("copy part");

        assert_eq!(part.node_count(), 3);
        assert_eq!(part.edge_count(), 2);
        assert!(part.sentinels().is_none());

        let new_hub = mapping.node(hub).expect("hub mapped");
        let new_ey = mapping.edge(ey).expect("ey mapped");
        let hub_pos = part.interface(InterfaceId::pos(new_hub)).expect("hub.pos");
        assert_eq!(
            hub_pos.active_choice().expect("active").map(|c| c.edge()),
            Some(new_ey)
        );
        assert!(hub_pos.is_set());
        assert_eq!(
            part.cells(ElementRef::Node(new_hub)).expect("cells"),
            &[Cell::Point("H".into())]
        );
        assert_eq!(
            part.cells(ElementRef::Choice(InterfaceId::pos(new_hub), new_ey))
                .expect("cells"),
            &[Cell::Length(7)]
        );
    }

    #[test]
    fn copy_part_rejects_unknown_edge() {
        let (graph, ..) = chain();
        let err = graph
            .copy_part(&BTreeSet::from([EdgeId(999)]))
            .expect_err("unknown");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn copy_part_of_every_edge_keeps_lone_nodes() {
        let mut graph = PolarGraph::new();
        let a = graph.insert_node(None, None).expect("a");
        let b = graph.insert_node(None, None).expect("b");
        let lone = graph.insert_node(None, None).expect("lone");
        let ab = graph
            .connect(InterfaceId::pos(a), InterfaceId::neg(b))
            .expect("a-b");

        let all: BTreeSet<EdgeId> = graph.edges().map(|l| l.id()).collect();
        let (copy, mapping) = graph.copy_part(&all).expect("copy");

        assert_eq!(copy.node_count(), graph.node_count());
        assert_eq!(copy.edge_count(), graph.edge_count());
        let new_lone = mapping.node(lone).expect("lone mapped");
        for end in End::BOTH {
            assert!(copy
                .interface(InterfaceId::new(new_lone, end))
                .expect("lone side")
                .is_empty());
        }
        let new_ab = mapping.edge(ab).expect("edge mapped");
        assert!(copy.edge(new_ab).expect("copied edge").joins(
            mapping.interface(InterfaceId::pos(a)).expect("a.pos"),
            mapping.interface(InterfaceId::neg(b)).expect("b.neg"),
        ));

        // A strict subset still copies only endpoint nodes.
        let (part, _) = graph.copy_part(&BTreeSet::new()).expect("empty");
        assert_eq!(part.node_count(), 0);
    }

    /// t0 -> t1, sentinel-free.
    fn template() -> (PolarGraph, NodeId, NodeId) {
        let mut t = PolarGraph::new();
        let t0 = t.insert_node(None, None).expect("t0");
        let t1 = t.insert_node(None, None).expect("t1");
        t.connect(InterfaceId::pos(t0), InterfaceId::neg(t1))
            .expect("t0-t1");
        (t, t0, t1)
    }

    #[test]
    fn aggregate_splices_between_merge_points() {
        let (mut graph, a, b) = chain();
        let (t, t0, t1) = template();

        let mapping = graph
            .aggregate(
                &t,
                &[
                    (InterfaceId::pos(a), InterfaceId::neg(t0)),
                    (InterfaceId::neg(b), InterfaceId::pos(t1)),
                ],
            )
            .expect("aggregate");

        let n0 = mapping.node(t0).expect("t0");
        let n1 = mapping.node(t1).expect("t1");
        assert!(graph
            .edges_between(InterfaceId::pos(a), InterfaceId::neg(b))
            .expect("between")
            .is_empty());
        let route = graph.routes_between(a, b).expect("routes");
        assert_eq!(route.len(), 1);
        assert_eq!(route[0].nodes(), &[a, n0, n1, b]);
        graph.check_acyclic().expect("still acyclic");
    }

    #[test]
    fn aggregate_rejects_connected_merge_interface() {
        let (mut graph, a, b) = chain();
        let (t, t0, t1) = template();
        let err = graph
            .aggregate(
                &t,
                &[
                    (InterfaceId::pos(a), InterfaceId::pos(t0)),
                    (InterfaceId::neg(b), InterfaceId::pos(t1)),
                ],
            )
            .expect_err("connected");
        assert_eq!(
            err,
            GraphError::MergeInterfaceConnected(InterfaceId::pos(t0))
        );
    }

    #[test]
    fn aggregate_rejects_unjoined_template() {
        let (mut graph, a, b) = chain();
        let mut t = PolarGraph::new();
        let t0 = t.insert_node(None, None).expect("t0");
        let t1 = t.insert_node(None, None).expect("t1");
        let before = graph.edge_count();

        let err = graph
            .aggregate(
                &t,
                &[
                    (InterfaceId::pos(a), InterfaceId::neg(t0)),
                    (InterfaceId::neg(b), InterfaceId::pos(t1)),
                ],
            )
            .expect_err("unreachable");
        assert!(matches!(err, GraphError::SpliceUnreachable { .. }));
        assert_eq!(graph.edge_count(), before);
    }

    #[test]
    fn aggregate_rejects_sentinel_template() {
        let (mut graph, ..) = chain();
        let t = PolarGraph::with_sentinels();
        let err = graph.aggregate(&t, &[]).expect_err("sentinels");
        assert_eq!(
            err,
            GraphError::from(ContractViolation::TemplateHasSentinels)
        );
    }

    #[test]
    fn transact_commits_valid_edit() {
        let (mut graph, _, b) = chain();
        let added = graph
            .transact(
                |g| g.insert_node(Some(InterfaceId::pos(b)), None),
                PolarGraph::check_acyclic,
            )
            .expect("commit");
        assert!(graph.contains_node(added));
        assert_eq!(graph.rectify().expect("order").last(), Some(&added));
    }

    #[test]
    fn transact_rejects_invalid_edit_untouched() {
        let (mut graph, a, b) = chain();
        let edges_before: Vec<EdgeId> = graph.edges().map(|l| l.id()).collect();

        let err = graph
            .transact(
                |g| g.connect_with_sentinel_handling(InterfaceId::pos(b), InterfaceId::neg(a)),
                PolarGraph::check_acyclic,
            )
            .expect_err("cycle");

        assert!(matches!(err, GraphError::CycleDetected { .. }));
        let edges_after: Vec<EdgeId> = graph.edges().map(|l| l.id()).collect();
        assert_eq!(edges_before, edges_after);
    }
}
