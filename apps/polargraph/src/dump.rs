//! # Structural Dump
//!
//! A JSON-serialisable snapshot of a graph: every node with its cells and
//! both interfaces (choices, active flag, set flag), and every edge with its
//! ends and cells. Ordering follows the graph's identifier order.

use polargraph_core::{Cell, EdgeId, End, GraphError, InterfaceId, NodeId, PolarGraph};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDump {
    pub source: Option<InterfaceId>,
    pub sink: Option<InterfaceId>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDump {
    pub id: NodeId,
    pub sentinel: bool,
    pub cells: Vec<Cell>,
    pub neg: InterfaceDump,
    pub pos: InterfaceDump,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDump {
    /// Whether the active choice was chosen explicitly.
    pub set: bool,
    pub choices: Vec<ChoiceDump>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceDump {
    pub edge: EdgeId,
    pub active: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeDump {
    pub id: EdgeId,
    pub ends: (InterfaceId, InterfaceId),
    pub cells: Vec<Cell>,
}

impl GraphDump {
    /// Snapshot `graph`.
    pub fn from_graph(graph: &PolarGraph) -> Result<Self, GraphError> {
        let nodes = graph
            .nodes()
            .map(|node| {
                Ok(NodeDump {
                    id: node.id(),
                    sentinel: node.is_sentinel(),
                    cells: node.cells().to_vec(),
                    neg: interface_dump(graph, InterfaceId::new(node.id(), End::Neg))?,
                    pos: interface_dump(graph, InterfaceId::new(node.id(), End::Pos))?,
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        let edges = graph
            .edges()
            .map(|link| EdgeDump {
                id: link.id(),
                ends: link.ends(),
                cells: link.cells().to_vec(),
            })
            .collect();
        Ok(Self {
            source: graph.source().ok(),
            sink: graph.sink().ok(),
            nodes,
            edges,
        })
    }
}

fn interface_dump(graph: &PolarGraph, id: InterfaceId) -> Result<InterfaceDump, GraphError> {
    let iface = graph.interface(id)?;
    Ok(InterfaceDump {
        set: iface.is_set(),
        choices: iface
            .choices()
            .map(|choice| ChoiceDump {
                edge: choice.edge(),
                active: choice.is_active(),
                cells: choice.cells().to_vec(),
            })
            .collect(),
    })
}
