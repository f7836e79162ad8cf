//! Graph queries: direct-edge lookups, bounded traversal, impact radius,
//! path enumeration, and lexical search.

pub mod search;
pub mod traverse;

pub use search::{extract_terms, kind_bonus, ScoredNode, SearchOptions};
pub use traverse::{Direction, Subgraph, TraversalOptions, TraversalStats};

use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::types::{CodeNode, EdgeKind};

// ---------------------------------------------------------------------------
// QueryEngine
// ---------------------------------------------------------------------------

pub struct QueryEngine<'a> {
    store: &'a GraphStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    // -------------------------------------------------------------------
    // Direct-edge queries
    // -------------------------------------------------------------------

    /// Nodes with a resolved `calls` edge into `id`.
    pub fn get_callers(&self, id: &str) -> Result<Vec<CodeNode>> {
        let mut nodes = Vec::new();
        for edge in self.store.get_edges_to(id, Some("calls"))? {
            if !edge.resolved {
                continue;
            }
            if let Some(node) = self.store.get_node(&edge.source_id)? {
                if nodes.iter().all(|n: &CodeNode| n.id != node.id) {
                    nodes.push(node);
                }
            }
        }
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    /// Nodes `id` has a resolved `calls` edge into.
    pub fn get_callees(&self, id: &str) -> Result<Vec<CodeNode>> {
        let mut nodes = Vec::new();
        for edge in self.store.get_edges_from(id, Some("calls"))? {
            if !edge.resolved {
                continue;
            }
            if let Some(node) = self.store.get_node(&edge.target_id)? {
                if nodes.iter().all(|n: &CodeNode| n.id != node.id) {
                    nodes.push(node);
                }
            }
        }
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    /// Direct outbound neighbors over the significant edge kinds.
    pub fn get_dependencies(&self, id: &str) -> Result<Vec<CodeNode>> {
        self.direct_neighbors(id, Direction::Outbound)
    }

    /// Direct inbound neighbors over the significant edge kinds.
    pub fn get_dependents(&self, id: &str) -> Result<Vec<CodeNode>> {
        self.direct_neighbors(id, Direction::Inbound)
    }

    fn direct_neighbors(&self, id: &str, direction: Direction) -> Result<Vec<CodeNode>> {
        let edges = match direction {
            Direction::Outbound => self.store.get_edges_from(id, None)?,
            _ => self.store.get_edges_to(id, None)?,
        };

        let mut nodes: Vec<CodeNode> = Vec::new();
        for edge in edges {
            if !edge.resolved || !EdgeKind::significant().contains(&edge.kind) {
                continue;
            }
            let neighbor_id = match direction {
                Direction::Outbound => &edge.target_id,
                _ => &edge.source_id,
            };
            if let Some(node) = self.store.get_node(neighbor_id)? {
                if nodes.iter().all(|n| n.id != node.id) {
                    nodes.push(node);
                }
            }
        }
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    // -------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------

    /// Bounded BFS from the given entry points.
    pub fn traverse(&self, starts: &[String], options: &TraversalOptions) -> Result<Subgraph> {
        traverse::traverse(self.store, starts, options)
    }

    /// Inbound transitive closure of `id`: everything a change could
    /// affect, bounded by the traversal limits.
    pub fn get_impact_radius(&self, id: &str, options: &TraversalOptions) -> Result<Subgraph> {
        let mut inbound = options.clone();
        inbound.direction = Direction::Inbound;
        if inbound.edge_kinds.is_none() {
            inbound.edge_kinds = Some(EdgeKind::significant().to_vec());
        }
        traverse::traverse(self.store, &[id.to_string()], &inbound)
    }

    /// Up to `max_paths` simple paths from `from` to `to`, shortest first.
    pub fn find_paths(
        &self,
        from: &str,
        to: &str,
        max_depth: u32,
        max_paths: usize,
    ) -> Result<Vec<Vec<CodeNode>>> {
        traverse::find_paths(self.store, from, to, max_depth, max_paths)
    }

    // -------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------

    /// Ranked lexical search over the stored nodes.
    pub fn search_nodes(&self, text: &str, options: &SearchOptions) -> Result<Vec<ScoredNode>> {
        search::search_nodes(self.store, text, options)
    }

    /// Resolve a user-facing target: a node id first, then a qualified
    /// name, then the best bare-name match.
    pub fn resolve_node(&self, target: &str) -> Result<Option<CodeNode>> {
        if let Some(node) = self.store.get_node(target)? {
            return Ok(Some(node));
        }
        if let Some(node) = self.store.get_node_by_qualified_name(target)? {
            return Ok(Some(node));
        }
        let mut by_name = self.store.get_nodes_by_name(target)?;
        by_name.sort_by(|a, b| {
            kind_bonus(b.kind)
                .partial_cmp(&kind_bonus(a.kind))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(by_name.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
