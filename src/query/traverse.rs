//! Bounded breadth-first traversal.
//!
//! Every traversal is capped by `max_depth` and `max_nodes`, expands only
//! resolved edges, and breaks ties deterministically: higher kind bonus
//! first, then shallower depth, then lexicographic node id. Cycles are
//! handled with a visited set keyed by node id.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::query::search::kind_bonus;
use crate::types::{CodeEdge, CodeNode, EdgeKind, NodeKind};

// ---------------------------------------------------------------------------
// Options & results
// ---------------------------------------------------------------------------

/// Which edge direction a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outbound,
    Inbound,
    Both,
}

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Maximum hops from an entry point.
    pub max_depth: u32,
    /// Maximum nodes in the result, entry points included.
    pub max_nodes: usize,
    /// Restrict expansion to these edge kinds (all kinds when `None`).
    pub edge_kinds: Option<Vec<EdgeKind>>,
    /// Restrict expansion to these node kinds (all kinds when `None`).
    pub node_kinds: Option<Vec<NodeKind>>,
    pub direction: Direction,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_nodes: 50,
            edge_kinds: None,
            node_kinds: None,
            direction: Direction::Outbound,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub max_depth_reached: u32,
    /// True when `max_nodes` cut the expansion short.
    pub truncated: bool,
}

/// A bounded slice of the graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub nodes: HashMap<String, CodeNode>,
    pub edges: Vec<CodeEdge>,
    pub entry_points: Vec<String>,
    pub stats: TraversalStats,
}

// ---------------------------------------------------------------------------
// BFS
// ---------------------------------------------------------------------------

/// Breadth-first expansion from `starts` under `options`.
pub fn traverse(
    store: &GraphStore,
    starts: &[String],
    options: &TraversalOptions,
) -> Result<Subgraph> {
    let mut subgraph = Subgraph::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();

    for id in starts {
        if subgraph.nodes.len() >= options.max_nodes {
            subgraph.stats.truncated = true;
            break;
        }
        if let Some(node) = store.get_node(id)? {
            if visited.insert(node.id.clone()) {
                subgraph.entry_points.push(node.id.clone());
                queue.push_back((node.id.clone(), 0));
                subgraph.nodes.insert(node.id.clone(), node);
            }
        }
    }

    while let Some((id, depth)) = queue.pop_front() {
        subgraph.stats.max_depth_reached = subgraph.stats.max_depth_reached.max(depth);
        if depth >= options.max_depth {
            continue;
        }

        let mut neighbors: Vec<CodeNode> = Vec::new();
        for (edge, neighbor_id) in neighbor_edges(store, &id, options)? {
            if !edge.resolved {
                continue;
            }
            if visited.contains(&neighbor_id) {
                continue;
            }
            if let Some(node) = store.get_node(&neighbor_id)? {
                if let Some(ref kinds) = options.node_kinds {
                    if !kinds.contains(&node.kind) {
                        continue;
                    }
                }
                if neighbors.iter().all(|n| n.id != node.id) {
                    neighbors.push(node);
                }
            }
        }

        // Deterministic expansion order: kind bonus, then id.
        neighbors.sort_by(|a, b| {
            kind_bonus(b.kind)
                .partial_cmp(&kind_bonus(a.kind))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        for node in neighbors {
            if subgraph.nodes.len() >= options.max_nodes {
                subgraph.stats.truncated = true;
                break;
            }
            visited.insert(node.id.clone());
            queue.push_back((node.id.clone(), depth + 1));
            subgraph.nodes.insert(node.id.clone(), node);
        }
    }

    subgraph.stats.nodes_visited = subgraph.nodes.len();

    // Edges between included nodes; none at depth zero.
    if options.max_depth > 0 && subgraph.nodes.len() > 1 {
        let ids: Vec<&str> = subgraph.nodes.keys().map(String::as_str).collect();
        let mut edges = store.get_edges_between(&ids)?;
        if let Some(ref kinds) = options.edge_kinds {
            edges.retain(|e| kinds.contains(&e.kind) || e.kind == EdgeKind::Contains);
        }
        subgraph.edges = edges;
    }

    Ok(subgraph)
}

/// The (edge, neighbor id) pairs leaving `id` in the traversal direction,
/// filtered by edge kind.
fn neighbor_edges(
    store: &GraphStore,
    id: &str,
    options: &TraversalOptions,
) -> Result<Vec<(CodeEdge, String)>> {
    let mut pairs: Vec<(CodeEdge, String)> = Vec::new();

    let kind_allowed = |kind: EdgeKind| match options.edge_kinds {
        Some(ref kinds) => kinds.contains(&kind),
        None => true,
    };

    if matches!(options.direction, Direction::Outbound | Direction::Both) {
        for edge in store.get_edges_from(id, None)? {
            if kind_allowed(edge.kind) {
                let target = edge.target_id.clone();
                pairs.push((edge, target));
            }
        }
    }
    if matches!(options.direction, Direction::Inbound | Direction::Both) {
        for edge in store.get_edges_to(id, None)? {
            if kind_allowed(edge.kind) {
                let source = edge.source_id.clone();
                pairs.push((edge, source));
            }
        }
    }
    Ok(pairs)
}

// ---------------------------------------------------------------------------
// Simple paths
// ---------------------------------------------------------------------------

/// Enumerate up to `max_paths` simple paths from `from` to `to`, shortest
/// first, over resolved edges of the significant kinds.
pub fn find_paths(
    store: &GraphStore,
    from: &str,
    to: &str,
    max_depth: u32,
    max_paths: usize,
) -> Result<Vec<Vec<CodeNode>>> {
    let mut paths: Vec<Vec<String>> = Vec::new();
    if max_paths == 0 || store.get_node(from)?.is_none() || store.get_node(to)?.is_none() {
        return Ok(Vec::new());
    }

    // Iterative deepening keeps shorter paths ahead of longer ones.
    for depth_cap in 1..=max_depth {
        let mut stack: Vec<String> = vec![from.to_string()];
        let mut on_path: HashSet<String> = HashSet::new();
        on_path.insert(from.to_string());
        dfs_paths(
            store,
            to,
            depth_cap,
            &mut stack,
            &mut on_path,
            &mut paths,
            max_paths,
        )?;
        if paths.len() >= max_paths {
            break;
        }
    }

    // Dedup across deepening rounds while preserving order.
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut unique: Vec<Vec<String>> = Vec::new();
    for path in paths {
        if seen.insert(path.clone()) {
            unique.push(path);
        }
        if unique.len() >= max_paths {
            break;
        }
    }

    let mut result: Vec<Vec<CodeNode>> = Vec::new();
    for path in unique {
        let mut nodes = Vec::with_capacity(path.len());
        for id in &path {
            if let Some(node) = store.get_node(id)? {
                nodes.push(node);
            }
        }
        if nodes.len() == path.len() {
            result.push(nodes);
        }
    }
    Ok(result)
}

fn dfs_paths(
    store: &GraphStore,
    target: &str,
    depth_left: u32,
    stack: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    paths: &mut Vec<Vec<String>>,
    max_paths: usize,
) -> Result<()> {
    if paths.len() >= max_paths {
        return Ok(());
    }
    let current = stack.last().cloned().unwrap_or_default();
    if current == target && stack.len() > 1 {
        paths.push(stack.clone());
        return Ok(());
    }
    if depth_left == 0 {
        return Ok(());
    }

    let mut next: Vec<String> = store
        .get_edges_from(&current, None)?
        .into_iter()
        .filter(|e| e.resolved && EdgeKind::significant().contains(&e.kind))
        .map(|e| e.target_id)
        .collect();
    next.sort();
    next.dedup();

    for neighbor in next {
        if on_path.contains(&neighbor) {
            continue;
        }
        stack.push(neighbor.clone());
        on_path.insert(neighbor.clone());
        dfs_paths(store, target, depth_left - 1, stack, on_path, paths, max_paths)?;
        on_path.remove(&neighbor);
        stack.pop();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
