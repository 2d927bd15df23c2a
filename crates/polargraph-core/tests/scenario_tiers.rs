//! # Scenario Tier Tests (T0-T3)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: Interface Integrity
//! - T1: Sentinel Wiring
//! - T2: Walks and Cycles
//! - T3: Copy, Splice and Transactions

use polargraph_core::{ContractViolation, End, GraphError, InterfaceId, NodeId, PolarGraph, Route};
use std::collections::BTreeSet;

/// Nodes chained source -> n[0] -> n[1] -> ... -> sink.
fn chain(len: usize) -> (PolarGraph, Vec<NodeId>) {
    let mut graph = PolarGraph::with_sentinels();
    let mut nodes = Vec::with_capacity(len);
    for _ in 0..len {
        let prev = nodes.last().map(|&n| InterfaceId::pos(n));
        nodes.push(graph.insert_node(prev, None).expect("insert"));
    }
    (graph, nodes)
}

fn active_count(graph: &PolarGraph, iface: InterfaceId) -> usize {
    graph
        .interface(iface)
        .expect("iface")
        .choices()
        .filter(|c| c.is_active())
        .count()
}

// =============================================================================
// TIER T0: INTERFACE INTEGRITY
// =============================================================================

mod t0_interface_integrity {
    use super::*;

    /// T0.1: Every non-empty interface has exactly one active choice.
    #[test]
    fn one_active_choice_per_interface() {
        let (mut graph, nodes) = chain(3);
        graph
            .connect_with_sentinel_handling(InterfaceId::pos(nodes[0]), InterfaceId::neg(nodes[2]))
            .expect("shortcut");

        for node in graph.nodes() {
            for end in End::BOTH {
                let iface = InterfaceId::new(node.id(), end);
                let expected = usize::from(!graph.interface(iface).expect("iface").is_empty());
                assert_eq!(active_count(&graph, iface), expected, "at {iface}");
            }
        }
    }

    /// T0.2: Connecting a node to itself is a contract violation.
    #[test]
    fn self_connection_is_fatal() {
        let (mut graph, nodes) = chain(1);
        let err = graph
            .connect(InterfaceId::neg(nodes[0]), InterfaceId::pos(nodes[0]))
            .expect_err("same node");
        assert!(matches!(
            err,
            GraphError::Contract(ContractViolation::SameNode(..))
        ));
        assert!(!err.is_recoverable());
    }

    /// T0.3: Choosing an edge of another interface is a contract violation.
    #[test]
    fn foreign_choice_is_fatal() {
        let (mut graph, nodes) = chain(2);
        let edge = graph
            .edges_between(InterfaceId::pos(nodes[0]), InterfaceId::neg(nodes[1]))
            .expect("between")[0];
        let err = graph
            .choose(InterfaceId::neg(nodes[0]), edge)
            .expect_err("foreign");
        assert!(!err.is_recoverable());
    }
}

// =============================================================================
// TIER T1: SENTINEL WIRING
// =============================================================================

mod t1_sentinel_wiring {
    use super::*;

    /// T1.1: Scenario C - splicing into an edge leaves exactly two edges.
    #[test]
    fn insert_node_splices_edge() {
        let (mut graph, nodes) = chain(2);
        let (p, q) = (InterfaceId::pos(nodes[0]), InterfaceId::neg(nodes[1]));
        let edges_before = graph.edge_count();

        let new = graph.insert_node(Some(p), Some(q)).expect("splice");

        assert!(graph.edges_between(p, q).expect("between").is_empty());
        assert_eq!(
            graph
                .edges_between(p, InterfaceId::neg(new))
                .expect("p-new")
                .len(),
            1
        );
        assert_eq!(
            graph
                .edges_between(InterfaceId::pos(new), q)
                .expect("new-q")
                .len(),
            1
        );
        assert_eq!(graph.edge_count(), edges_before + 1);
    }

    /// T1.2: No real interface is ever left empty.
    #[test]
    fn disconnect_reattaches_to_sentinels() {
        let (mut graph, nodes) = chain(3);
        graph
            .disconnect_with_sentinel_handling(
                InterfaceId::pos(nodes[1]),
                InterfaceId::neg(nodes[2]),
            )
            .expect("disconnect");

        for node in graph.real_nodes() {
            for end in End::BOTH {
                let iface = InterfaceId::new(node.id(), end);
                assert!(!graph.interface(iface).expect("iface").is_empty());
            }
        }
        graph.check_acyclic().expect("still acyclic");
    }

    /// T1.3: Removing every node restores the bare sentinel pair.
    #[test]
    fn removing_all_nodes_restores_sentinels() {
        let (mut graph, nodes) = chain(4);
        for node in nodes {
            graph.remove_node(node).expect("remove");
        }
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}

// =============================================================================
// TIER T2: WALKS AND CYCLES
// =============================================================================

mod t2_walks_and_cycles {
    use super::*;

    /// T2.1: Scenario A - a chain rectifies in chain order.
    #[test]
    fn scenario_a_chain_order() {
        let (graph, nodes) = chain(3);
        assert_eq!(graph.rectify().expect("rectify"), nodes);
    }

    /// T2.2: Scenario B - a 2-cycle is rejected and yields no order.
    #[test]
    fn scenario_b_two_cycle() {
        let mut graph = PolarGraph::with_sentinels();
        let a = graph.insert_node(None, None).expect("a");
        let b = graph.insert_node(None, None).expect("b");
        graph
            .connect_with_sentinel_handling(InterfaceId::pos(a), InterfaceId::neg(b))
            .expect("a-b");
        graph
            .connect_with_sentinel_handling(InterfaceId::pos(b), InterfaceId::neg(a))
            .expect("b-a");

        let err = graph.check_acyclic().expect_err("cycle");
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        assert!(graph.rectify().is_err());
    }

    /// T2.3: Scenario D - a three-way junction blinds free_roll but not walk.
    #[test]
    fn scenario_d_blind_junction() {
        let mut graph = PolarGraph::with_sentinels();
        let hub = graph.insert_node(None, None).expect("hub");
        let legs: Vec<NodeId> = (0..3)
            .map(|_| graph.insert_node(None, None).expect("leg"))
            .collect();
        for &leg in &legs {
            graph
                .connect_with_sentinel_handling(InterfaceId::pos(hub), InterfaceId::neg(leg))
                .expect("leg");
        }
        let start = InterfaceId::pos(hub);

        let err = graph.free_roll(start, []).expect_err("blind");
        assert_eq!(
            err,
            GraphError::from(ContractViolation::BlindNode {
                node: hub,
                interface: start,
            })
        );
        assert!(!err.is_recoverable());

        let routes: Vec<Route> = graph.walk(start, []).expect("walk").collect();
        assert_eq!(routes.len(), 3);
        let second_nodes: BTreeSet<NodeId> = routes.iter().map(|r| r.nodes()[1]).collect();
        assert_eq!(second_nodes, legs.into_iter().collect());
    }

    /// T2.4: A reachable cycle shows up as a cyclic route.
    #[test]
    fn reachable_cycle_is_flagged() {
        let (mut graph, nodes) = chain(3);
        // Raw connect keeps the sentinel edges, so the cycle stays reachable.
        graph
            .connect(InterfaceId::pos(nodes[2]), InterfaceId::neg(nodes[0]))
            .expect("back edge");

        let routes: Vec<Route> = graph
            .walk(graph.source().expect("source"), [])
            .expect("walk")
            .collect();
        assert!(routes.iter().any(Route::is_cycle));
    }

    /// T2.5: Every node of an acyclic graph lies on some walked route.
    #[test]
    fn acyclic_walk_covers_every_node() {
        let (mut graph, nodes) = chain(4);
        graph
            .connect_with_sentinel_handling(InterfaceId::pos(nodes[0]), InterfaceId::neg(nodes[3]))
            .expect("shortcut");

        let routes: Vec<Route> = graph
            .walk(graph.source().expect("source"), [])
            .expect("walk")
            .collect();
        let seen: BTreeSet<NodeId> = routes.iter().flat_map(|r| r.nodes()).copied().collect();
        let all: BTreeSet<NodeId> = graph.nodes().map(|n| n.id()).collect();
        assert_eq!(seen, all);
    }

    /// T2.6: Route search between two nodes.
    #[test]
    fn routes_between_nodes() {
        let (graph, nodes) = chain(4);
        let routes = graph.routes_between(nodes[0], nodes[3]).expect("routes");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].nodes(), nodes.as_slice());
        assert!(!routes[0].is_cycle());
    }
}

// =============================================================================
// TIER T3: COPY, SPLICE AND TRANSACTIONS
// =============================================================================

mod t3_copy_and_splice {
    use super::*;

    /// T3.1: copy_part over every edge is isomorphic under its mapping.
    #[test]
    fn copy_part_is_isomorphic() {
        let (mut graph, nodes) = chain(3);
        let shortcut = graph
            .connect_with_sentinel_handling(InterfaceId::pos(nodes[0]), InterfaceId::neg(nodes[2]))
            .expect("shortcut");
        graph
            .choose(InterfaceId::pos(nodes[0]), shortcut)
            .expect("choose");

        let all: BTreeSet<_> = graph.edges().map(|l| l.id()).collect();
        let (copy, mapping) = graph.copy_part(&all).expect("copy");

        assert_eq!(copy.node_count(), graph.node_count());
        assert_eq!(copy.edge_count(), graph.edge_count());
        for (old, new) in mapping.node_pairs() {
            for end in End::BOTH {
                let before = graph
                    .interface(InterfaceId::new(old, end))
                    .expect("old")
                    .active_choice()
                    .expect("active")
                    .map(|c| c.edge());
                let after = copy
                    .interface(InterfaceId::new(new, end))
                    .expect("new")
                    .active_choice()
                    .expect("active")
                    .map(|c| c.edge());
                assert_eq!(before.and_then(|e| mapping.edge(e)), after);
            }
        }
    }

    /// T3.2: A rejected transaction leaves the live graph as it was.
    #[test]
    fn rejected_transaction_is_invisible() {
        let (mut graph, nodes) = chain(3);
        let order = graph.rectify().expect("order");

        let result = graph.transact(
            |g| {
                g.connect_with_sentinel_handling(
                    InterfaceId::pos(nodes[2]),
                    InterfaceId::neg(nodes[0]),
                )
            },
            PolarGraph::check_acyclic,
        );

        assert!(result.is_err());
        assert_eq!(graph.rectify().expect("order"), order);
    }

    /// T3.3: Aggregating a template keeps the base acyclic and routes through it.
    #[test]
    fn aggregate_template() {
        let (mut graph, nodes) = chain(2);
        let mut template = PolarGraph::new();
        let t0 = template.insert_node(None, None).expect("t0");
        let t1 = template.insert_node(None, None).expect("t1");
        let t2 = template.insert_node(None, None).expect("t2");
        template
            .connect(InterfaceId::pos(t0), InterfaceId::neg(t1))
            .expect("t0-t1");
        template
            .connect(InterfaceId::pos(t1), InterfaceId::neg(t2))
            .expect("t1-t2");

        let mapping = graph
            .aggregate(
                &template,
                &[
                    (InterfaceId::pos(nodes[0]), InterfaceId::neg(t0)),
                    (InterfaceId::neg(nodes[1]), InterfaceId::pos(t2)),
                ],
            )
            .expect("aggregate");

        let order = graph.rectify().expect("order");
        assert_eq!(order.len(), 5);
        let middle = mapping.node(t1).expect("t1");
        let at = |n: NodeId| order.iter().position(|&x| x == n).expect("ordered");
        assert!(at(nodes[0]) < at(middle));
        assert!(at(middle) < at(nodes[1]));
    }
}
