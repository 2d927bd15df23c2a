//! # Track Topology
//!
//! Points along rail lines and the links between them, on top of a sentinel
//! graph. A switch is a point whose interface carries several links; the
//! active choice of that interface is the switch position.
//!
//! Geometry (coordinates, sort keys, lengths) and railway tags (signals,
//! sections, leg directions) ride along as payload cells. The graph never
//! interprets them.

use crate::graph::PolarGraph;
use crate::types::validate_name;
use crate::walk::Route;
use crate::{Cell, CellKind, Direction, EdgeId, ElementRef, End, GraphError, InterfaceId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// LAYOUT INPUT
// =============================================================================

/// A named point with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSpec {
    pub name: String,
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub sort_key: Option<i64>,
    /// A signal placed at this point; routes traced by
    /// [`TrackTopology::current_route`] stop here.
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

/// A link between two point interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub from: String,
    pub from_end: End,
    pub to: String,
    pub to_end: End,
    /// Millimetres.
    #[serde(default)]
    pub length: Option<u64>,
    /// Switch leg tag at the `from` side.
    #[serde(default)]
    pub direction: Option<Direction>,
}

/// The position of one switch: leave `point` through `end` toward `toward`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchSpec {
    pub point: String,
    pub end: End,
    pub toward: String,
}

/// A whole track layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSpec {
    pub points: Vec<PointSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub switches: Vec<SwitchSpec>,
}

/// The points strictly between two points, and the track length joining them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub points: Vec<String>,
    /// Sum of the lengths of every covered link, in millimetres.
    pub length: u64,
}

// =============================================================================
// TOPOLOGY
// =============================================================================

/// A track layout on top of a sentinel graph.
#[derive(Debug)]
pub struct TrackTopology {
    graph: PolarGraph,
    points: BTreeMap<String, NodeId>,
}

impl TrackTopology {
    /// Build a topology from a layout and reject closed loops.
    pub fn build(layout: &LayoutSpec) -> Result<Self, GraphError> {
        let mut topo = Self {
            graph: PolarGraph::with_sentinels(),
            points: BTreeMap::new(),
        };
        for point in &layout.points {
            let node = topo.add_point(&point.name)?;
            let element = ElementRef::Node(node);
            topo.graph.attach(
                element,
                Cell::Coordinate {
                    x: point.x,
                    y: point.y,
                },
            )?;
            if let Some(key) = point.sort_key {
                topo.graph.attach(element, Cell::SortKey(key))?;
            }
            if let Some(signal) = &point.signal {
                topo.graph.attach(element, Cell::Signal(signal.clone()))?;
            }
            if let Some(section) = &point.section {
                topo.graph.attach(element, Cell::Section(section.clone()))?;
            }
        }
        for link in &layout.links {
            let a = topo.interface(&link.from, link.from_end)?;
            let b = topo.interface(&link.to, link.to_end)?;
            let edge = topo.graph.connect_with_sentinel_handling(a, b)?;
            if let Some(length) = link.length {
                topo.graph.attach(ElementRef::Edge(edge), Cell::Length(length))?;
            }
            if let Some(direction) = link.direction {
                let from = InterfaceId::new(topo.point(&link.from)?, link.from_end);
                topo.graph
                    .attach(ElementRef::Choice(from, edge), Cell::Direction(direction))?;
            }
        }
        for switch in &layout.switches {
            topo.set_switch(&switch.point, switch.end, &switch.toward)?;
        }
        topo.check_layout()?;
        tracing::debug!(
            points = topo.points.len(),
            links = layout.links.len(),
            "built track topology"
        );
        Ok(topo)
    }

    /// The underlying polar graph.
    #[must_use]
    pub fn graph(&self) -> &PolarGraph {
        &self.graph
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The node of a point.
    pub fn point(&self, name: &str) -> Result<NodeId, GraphError> {
        self.points
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownPoint(name.to_string()))
    }

    /// The point name of a node.
    #[must_use]
    pub fn name_of(&self, node: NodeId) -> Option<&str> {
        self.graph
            .find_cell(ElementRef::Node(node), CellKind::Point)
            .and_then(Cell::as_name)
    }

    /// Point names for a node list; sentinels and untagged nodes are skipped.
    #[must_use]
    pub fn names(&self, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|&n| self.name_of(n))
            .map(str::to_string)
            .collect()
    }

    fn interface(&self, name: &str, end: End) -> Result<InterfaceId, GraphError> {
        Ok(InterfaceId::new(self.point(name)?, end))
    }

    fn claim_name(&self, name: &str) -> Result<(), GraphError> {
        validate_name(name)?;
        if self.points.contains_key(name) {
            return Err(GraphError::DuplicatePoint(name.to_string()));
        }
        Ok(())
    }

    /// Create a point hung from the sentinels. Used while building, before
    /// the single layout check.
    fn add_point(&mut self, name: &str) -> Result<NodeId, GraphError> {
        self.claim_name(name)?;
        let node = self.graph.insert_node(None, None)?;
        self.graph
            .attach(ElementRef::Node(node), Cell::Point(name.to_string()))?;
        self.points.insert(name.to_string(), node);
        Ok(node)
    }

    /// Run `edit` on a draft, check the draft layout, then apply it here.
    fn commit<T>(
        &mut self,
        edit: impl FnMut(&mut PolarGraph) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let points = &self.points;
        self.graph
            .transact(edit, |draft| validate_layout(draft, points))
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Link two point interfaces.
    pub fn connect(
        &mut self,
        from: &str,
        from_end: End,
        to: &str,
        to_end: End,
    ) -> Result<EdgeId, GraphError> {
        let a = self.interface(from, from_end)?;
        let b = self.interface(to, to_end)?;
        self.commit(|g| g.connect_with_sentinel_handling(a, b))
    }

    /// Remove the link between two point interfaces.
    pub fn disconnect(
        &mut self,
        from: &str,
        from_end: End,
        to: &str,
        to_end: End,
    ) -> Result<(), GraphError> {
        let a = self.interface(from, from_end)?;
        let b = self.interface(to, to_end)?;
        if self.graph.edges_between(a, b)?.is_empty() {
            return Err(GraphError::NoRoute {
                from: a.node,
                to: b.node,
            });
        }
        self.graph.disconnect_with_sentinel_handling(a, b)?;
        Ok(())
    }

    /// Splice a new point into the link joining `a` and `b`.
    ///
    /// The new point's negative side faces `a`.
    pub fn insert_between(
        &mut self,
        name: &str,
        a: (&str, End),
        b: (&str, End),
    ) -> Result<NodeId, GraphError> {
        let a = self.interface(a.0, a.1)?;
        let b = self.interface(b.0, b.1)?;
        if self.graph.edges_between(a, b)?.is_empty() {
            return Err(GraphError::NoRoute {
                from: a.node,
                to: b.node,
            });
        }
        self.claim_name(name)?;
        let node = self.commit(|g| {
            let node = g.insert_node(Some(a), Some(b))?;
            g.attach(ElementRef::Node(node), Cell::Point(name.to_string()))?;
            Ok(node)
        })?;
        self.points.insert(name.to_string(), node);
        tracing::debug!(point = %name, "point spliced into link");
        Ok(node)
    }

    /// Put a new point in front of a junction.
    ///
    /// Every link of `point`'s `end` side moves to the new point, which is
    /// then linked to `point`.
    pub fn insert_neck(&mut self, name: &str, point: &str, end: End) -> Result<NodeId, GraphError> {
        self.claim_name(name)?;
        let iface = self.interface(point, end)?;
        let node = self.commit(|g| {
            let node = g.insert_node_neck(iface)?;
            g.attach(ElementRef::Node(node), Cell::Point(name.to_string()))?;
            Ok(node)
        })?;
        self.points.insert(name.to_string(), node);
        Ok(node)
    }

    /// Set the switch at `point`'s `end` side to lead toward `toward`.
    pub fn set_switch(&mut self, point: &str, end: End, toward: &str) -> Result<(), GraphError> {
        let iface = self.interface(point, end)?;
        let target = self.point(toward)?;
        let edge = self
            .graph
            .interface(iface)?
            .edges()
            .find(|&e| {
                self.graph
                    .opposite(e, iface)
                    .is_ok_and(|other| other.node == target)
            })
            .ok_or(GraphError::NoRoute {
                from: iface.node,
                to: target,
            })?;
        self.graph.choose(iface, edge)?;
        tracing::debug!(%point, %end, %toward, "switch set");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    /// Every route between two points.
    pub fn routes(&self, from: &str, to: &str) -> Result<Vec<Route>, GraphError> {
        self.routes_limited(from, to, usize::MAX)
    }

    /// At most `limit` routes between two points.
    pub fn routes_limited(
        &self,
        from: &str,
        to: &str,
        limit: usize,
    ) -> Result<Vec<Route>, GraphError> {
        self.graph
            .routes_between_limited(self.point(from)?, self.point(to)?, limit)
    }

    /// The route the current switch positions give when leaving `from`
    /// through `end`, up to the next signal or the end of the line.
    pub fn current_route(&self, from: &str, end: End) -> Result<Route, GraphError> {
        let start = self.interface(from, end)?;
        let signals: Vec<NodeId> = self
            .points
            .values()
            .copied()
            .filter(|&n| {
                n != start.node
                    && self
                        .graph
                        .find_cell(ElementRef::Node(n), CellKind::Signal)
                        .is_some()
            })
            .collect();
        self.graph.free_roll(start, signals)
    }

    /// The edge of the leg of `node` tagged `direction`.
    fn leg(&self, node: NodeId, direction: Direction) -> Option<EdgeId> {
        End::BOTH.into_iter().find_map(|end| {
            let iface = InterfaceId::new(node, end);
            self.graph.interface(iface).ok()?.edges().find(|&e| {
                self.graph
                    .find_cell(ElementRef::Choice(iface, e), CellKind::Direction)
                    .and_then(Cell::as_direction)
                    == Some(direction)
            })
        })
    }

    /// Check that the "+" leg of `point` reaches `plus_to`, the "-" leg
    /// reaches `minus_to`, and the two shortest such routes share no track
    /// beyond the switch.
    pub fn validate_switch(
        &self,
        point: &str,
        plus_to: &str,
        minus_to: &str,
    ) -> Result<(), GraphError> {
        let node = self.point(point)?;
        let mut legs = Vec::with_capacity(2);
        for (direction, target) in [(Direction::Plus, plus_to), (Direction::Minus, minus_to)] {
            let edge = self.leg(node, direction).ok_or_else(|| GraphError::MissingLeg {
                point: point.to_string(),
                direction,
            })?;
            let target = self.point(target)?;
            let shortest = self
                .graph
                .routes_between(node, target)?
                .into_iter()
                .filter(|r| r.edges().first() == Some(&edge))
                .min_by_key(Route::len)
                .ok_or(GraphError::NoRoute { from: node, to: target })?;
            legs.push(shortest);
        }
        if let [plus, minus] = legs.as_slice() {
            plus.ensure_disjoint(minus).map_err(|err| match err {
                GraphError::RoutesOverlap { nodes } => GraphError::OverlappingLegs {
                    point: point.to_string(),
                    shared: self.names(&nodes),
                },
                other => other,
            })?;
        }
        Ok(())
    }

    /// The points strictly between two points and the length of track
    /// joining them.
    pub fn section_between(&self, a: &str, b: &str) -> Result<SectionSummary, GraphError> {
        let coverage = self.graph.between(self.point(a)?, self.point(b)?)?;
        let nodes: Vec<NodeId> = coverage.nodes.iter().copied().collect();
        let length = coverage
            .edges
            .iter()
            .filter_map(|&e| self.graph.find_cell(ElementRef::Edge(e), CellKind::Length))
            .filter_map(|c| match c {
                Cell::Length(l) => Some(*l),
                _ => None,
            })
            .fold(0u64, u64::saturating_add);
        Ok(SectionSummary {
            points: self.names(&nodes),
            length,
        })
    }

    /// Reject layouts containing a closed loop.
    ///
    /// Walks from both sentinels, then from both sides of any point neither
    /// walk reached.
    pub fn check_layout(&self) -> Result<(), GraphError> {
        validate_layout(&self.graph, &self.points)
    }
}

fn validate_layout(
    graph: &PolarGraph,
    points: &BTreeMap<String, NodeId>,
) -> Result<(), GraphError> {
    let mut reached = BTreeSet::new();
    for start in [graph.source()?, graph.sink()?] {
        for route in graph.walk(start, [])? {
            if route.is_cycle() {
                return Err(GraphError::CycleDetected {
                    nodes: route.cycle_nodes(),
                });
            }
            reached.extend(route.nodes().iter().copied());
        }
    }
    let unreached: Vec<NodeId> = points
        .values()
        .copied()
        .filter(|n| !reached.contains(n))
        .collect();
    for &node in &unreached {
        for end in End::BOTH {
            if let Some(cyclic) = graph.find_loops(InterfaceId::new(node, end))?.first() {
                return Err(GraphError::CycleDetected {
                    nodes: cyclic.cycle_nodes(),
                });
            }
        }
    }
    if unreached.is_empty() {
        Ok(())
    } else {
        Err(GraphError::Isolated { nodes: unreached })
    }
}

// =============================================================================
// TESTS
// =============================================================================
