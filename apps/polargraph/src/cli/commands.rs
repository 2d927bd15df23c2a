//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands, plus
//! the loaders that turn input files into engine structures.

use crate::config::Limits;
use crate::dump::GraphDump;
use polargraph_core::{
    DependencyGraph, End, GraphError, LayoutSpec, ObjectSpec, Route, TrackTopology,
};
use std::path::{Path, PathBuf};

// =============================================================================
// INPUT VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GraphError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GraphError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn read_input(path: &Path, limits: &Limits) -> Result<Vec<u8>, GraphError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, limits.max_file_size)?;
    std::fs::read(&validated).map_err(|e| GraphError::Io(format!("Read file: {}", e)))
}

// =============================================================================
// LOADERS
// =============================================================================

/// Read an object list: a JSON array of `{ "name", "references" }`.
pub fn load_objects(path: &Path, limits: &Limits) -> Result<Vec<ObjectSpec>, GraphError> {
    let contents = read_input(path, limits)?;
    serde_json::from_slice(&contents)
        .map_err(|e| GraphError::Parse(format!("Object list '{}': {}", path.display(), e)))
}

/// Read a track layout: a JSON object with `points`, `links` and `switches`.
pub fn load_layout(path: &Path, limits: &Limits) -> Result<LayoutSpec, GraphError> {
    let contents = read_input(path, limits)?;
    serde_json::from_slice(&contents)
        .map_err(|e| GraphError::Parse(format!("Layout '{}': {}", path.display(), e)))
}

/// Load and build a dependency graph.
pub fn load_dependencies(path: &Path, limits: &Limits) -> Result<DependencyGraph, GraphError> {
    let objects = load_objects(path, limits)?;
    tracing::info!("Loaded {} objects from {:?}", objects.len(), path);
    DependencyGraph::build(&objects)
}

/// Load and build a track topology.
pub fn load_topology(path: &Path, limits: &Limits) -> Result<TrackTopology, GraphError> {
    let layout = load_layout(path, limits)?;
    tracing::info!(
        "Loaded {} points, {} links from {:?}",
        layout.points.len(),
        layout.links.len(),
        path
    );
    TrackTopology::build(&layout)
}

/// Parse an interface side: `neg` or `pos`.
pub fn parse_end(value: &str) -> Result<End, GraphError> {
    match value {
        "neg" | "-" => Ok(End::Neg),
        "pos" | "+" => Ok(End::Pos),
        other => Err(GraphError::Parse(format!(
            "Unknown end '{}' (expected neg or pos)",
            other
        ))),
    }
}

/// The point names along each route.
pub fn route_names(topology: &TrackTopology, routes: &[Route]) -> Vec<Vec<String>> {
    routes
        .iter()
        .map(|route| topology.names(route.nodes()))
        .collect()
}

/// Point names of at most `max_routes` routes, and whether more exist.
pub fn list_routes(
    topology: &TrackTopology,
    from: &str,
    to: &str,
    max_routes: usize,
) -> Result<(Vec<Vec<String>>, bool), GraphError> {
    let mut routes = topology.routes_limited(from, to, max_routes.saturating_add(1))?;
    let truncated = routes.len() > max_routes;
    routes.truncate(max_routes);
    Ok((route_names(topology, &routes), truncated))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// ORDER COMMAND
// =============================================================================

/// Print the evaluation order of an object list.
pub fn cmd_order(file: &Path, limits: &Limits, json_mode: bool) -> Result<(), GraphError> {
    let deps = load_dependencies(file, limits)?;
    let order = deps.evaluation_order()?;

    if json_mode {
        print_json(&serde_json::json!({ "order": order }));
        return Ok(());
    }

    println!("Evaluation Order");
    println!("================");
    for (index, name) in order.iter().enumerate() {
        println!("{:>4}  {}", index + 1, name);
    }

    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate an object list or a layout.
///
/// Loading already rejects cycles; a successful load is a passing check.
pub fn cmd_check(
    file: &Path,
    kind: &str,
    limits: &Limits,
    json_mode: bool,
) -> Result<(), GraphError> {
    let (count, noun) = match kind {
        "objects" => {
            let deps = load_dependencies(file, limits)?;
            deps.check()?;
            (deps.len(), "objects")
        }
        "layout" => {
            let topology = load_topology(file, limits)?;
            topology.check_layout()?;
            (topology.len(), "points")
        }
        other => {
            return Err(GraphError::Parse(format!("Unknown input kind: {}", other)));
        }
    };

    if json_mode {
        print_json(&serde_json::json!({
            "file": file.to_string_lossy(),
            "kind": kind,
            "valid": true,
            "count": count
        }));
        return Ok(());
    }

    println!("OK: {} {} checked, no cycles", count, noun);
    Ok(())
}

// =============================================================================
// DEPENDENTS COMMAND
// =============================================================================

/// List the objects downstream of `object`, in evaluation order.
pub fn cmd_dependents(
    file: &Path,
    object: &str,
    limits: &Limits,
    json_mode: bool,
) -> Result<(), GraphError> {
    let deps = load_dependencies(file, limits)?;
    let dependents = deps.dependents(object)?;
    let dependencies = deps.dependencies(object)?;

    if json_mode {
        print_json(&serde_json::json!({
            "object": object,
            "dependencies": dependencies,
            "dependents": dependents
        }));
        return Ok(());
    }

    println!("Object: {}", object);
    println!("References: {}", dependencies.join(", "));
    println!();
    if dependents.is_empty() {
        println!("No dependents");
    } else {
        println!("Dependents ({}):", dependents.len());
        for name in &dependents {
            println!("  {}", name);
        }
    }

    Ok(())
}

// =============================================================================
// ROUTES COMMAND
// =============================================================================

/// List the routes between two points, at most `limits.max_routes`.
pub fn cmd_routes(
    file: &Path,
    from: &str,
    to: &str,
    limits: &Limits,
    json_mode: bool,
) -> Result<(), GraphError> {
    let topology = load_topology(file, limits)?;
    let (named, truncated) = list_routes(&topology, from, to, limits.max_routes)?;
    if truncated {
        tracing::warn!("Route listing stopped at {} routes", limits.max_routes);
    }

    if json_mode {
        print_json(&serde_json::json!({
            "from": from,
            "to": to,
            "routes": named,
            "truncated": truncated
        }));
        return Ok(());
    }

    if named.is_empty() {
        println!("No route from {} to {}", from, to);
        return Ok(());
    }
    println!("Routes from {} to {} ({}):", from, to, named.len());
    for route in &named {
        println!("  {}", route.join(" -> "));
    }

    Ok(())
}

// =============================================================================
// TRACE COMMAND
// =============================================================================

/// Follow the current switch positions from `from`.
pub fn cmd_trace(
    file: &Path,
    from: &str,
    end: &str,
    limits: &Limits,
    json_mode: bool,
) -> Result<(), GraphError> {
    let end = parse_end(end)?;
    let topology = load_topology(file, limits)?;
    let route = topology.current_route(from, end)?;
    let points = topology.names(route.nodes());

    if json_mode {
        print_json(&serde_json::json!({
            "from": from,
            "end": end,
            "points": points,
            "cyclic": route.is_cycle()
        }));
        return Ok(());
    }

    println!("Trace from {}.{}:", from, end);
    println!("  {}", points.join(" -> "));

    Ok(())
}

// =============================================================================
// DUMP COMMAND
// =============================================================================

/// Print the structure of a loaded graph as JSON.
pub fn cmd_dump(file: &Path, kind: &str, limits: &Limits) -> Result<(), GraphError> {
    let dump = match kind {
        "objects" => GraphDump::from_graph(load_dependencies(file, limits)?.graph())?,
        "layout" => GraphDump::from_graph(load_topology(file, limits)?.graph())?,
        other => {
            return Err(GraphError::Parse(format!("Unknown input kind: {}", other)));
        }
    };

    let text = serde_json::to_string_pretty(&dump)
        .map_err(|e| GraphError::Parse(format!("Serialize dump: {}", e)))?;
    println!("{}", text);

    Ok(())
}
