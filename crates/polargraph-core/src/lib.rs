//! # polargraph-core
//!
//! A deterministic polar-graph engine.
//!
//! Every node has exactly two sides, negative and positive. Each side is an
//! interface holding an ordered set of edges, exactly one of which is the
//! active choice. Two permanent sentinel nodes keep every interface
//! connected, so walks always end at a border instead of dangling.
//!
//! ## Layers
//!
//! - `types`, `interface`, `graph`: primitives and the container
//! - `walk`: route enumeration and the deterministic `free_roll`
//! - `analysis`, `copy`: cycle check, rectification, route search, coverage,
//!   copies, splicing and copy-validate-commit transactions
//! - `dependency`, `topology`: the two consumers (object dependencies and
//!   rail track layouts)
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and synchronous; no I/O
//! - `BTreeMap`/`BTreeSet` only, so every traversal order is reproducible
//! - Never panics: structural violations come back as
//!   [`GraphError::Contract`] and are not recoverable

// =============================================================================
// MODULES
// =============================================================================

pub mod analysis;
pub mod copy;
pub mod dependency;
pub mod graph;
pub mod interface;
pub mod topology;
pub mod types;
pub mod walk;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Cell, CellKind, ContractViolation, Direction, EdgeId, ElementRef, End, GraphError,
    InterfaceId, MAX_NAME_LENGTH, NodeId,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use analysis::Coverage;
pub use copy::GraphMapping;
pub use graph::{Link, PolarGraph, PolarNode, Sentinels};
pub use interface::{Choice, NodeInterface};
pub use walk::{Route, Step, Walk};

// =============================================================================
// RE-EXPORTS: Consumers
// =============================================================================

pub use dependency::{DependencyGraph, ObjectSpec};
pub use topology::{LayoutSpec, LinkSpec, PointSpec, SectionSummary, SwitchSpec, TrackTopology};
