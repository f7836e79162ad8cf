//! The context-building pipeline.
//!
//! Given a task description: extract search terms, pick entry points by
//! lexical search (fused with the semantic collaborator when present),
//! expand each entry point through a bounded traversal over the significant
//! edge kinds, load code slices from disk for the top entry points, and
//! emit either a Markdown document or a structured record. Every bound is
//! hard: node count, code block count, and code block size.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::context::budget::{clip_code_block, compact_signature, estimate_tokens, truncate_to_tokens};
use crate::context::semantic::{fuse_by_reciprocal_rank, SemanticIndex};
use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::query::{QueryEngine, SearchOptions, Subgraph, TraversalOptions};
use crate::types::{CodeNode, EdgeKind};

// ---------------------------------------------------------------------------
// Options & result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Maximum entry points picked from search.
    pub search_limit: usize,
    /// Expansion depth around each entry point.
    pub traversal_depth: u32,
    /// Hard cap on nodes in the assembled subgraph.
    pub max_nodes: usize,
    /// Code blocks are loaded for at most this many entry points.
    pub max_code_blocks: usize,
    /// Character cap per code block.
    pub max_code_block_size: usize,
    /// Token budget for the rendered Markdown document.
    pub token_budget: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            search_limit: 10,
            traversal_depth: 2,
            max_nodes: 50,
            max_code_blocks: 5,
            max_code_block_size: 2_000,
            token_budget: 8_000,
        }
    }
}

/// A source slice for one entry point.
#[derive(Debug, Clone, Serialize)]
pub struct CodeBlock {
    pub node_id: String,
    pub name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub code: String,
    pub truncated: bool,
}

/// The assembled context: entry points, expanded subgraph, code excerpts.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResult {
    pub query: String,
    pub entry_points: Vec<CodeNode>,
    pub subgraph: Subgraph,
    pub code_blocks: Vec<CodeBlock>,
}

// ---------------------------------------------------------------------------
// ContextBuilder
// ---------------------------------------------------------------------------

pub struct ContextBuilder<'a> {
    store: &'a GraphStore,
    root: PathBuf,
    semantic: Option<&'a dyn SemanticIndex>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(store: &'a GraphStore, root: &Path) -> Self {
        Self {
            store,
            root: root.to_path_buf(),
            semantic: None,
        }
    }

    /// Attach a semantic similarity collaborator.
    pub fn with_semantic(mut self, semantic: &'a dyn SemanticIndex) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Assemble the subgraph most relevant to `task`.
    pub fn build_context(&self, task: &str, options: &ContextOptions) -> Result<ContextResult> {
        let engine = QueryEngine::new(self.store);

        // 1–2. Terms → entry points, semantic fusion when available.
        let lexical = engine.search_nodes(
            task,
            &SearchOptions {
                limit: Some(options.search_limit * 2),
                ..Default::default()
            },
        )?;
        let lexical_ids: Vec<String> = lexical.iter().map(|r| r.node.id.clone()).collect();

        let entry_ids: Vec<String> = match self.semantic {
            Some(semantic) => {
                let matches = semantic
                    .rank(task, options.search_limit * 2)
                    .unwrap_or_default();
                let semantic_ids: Vec<String> =
                    matches.into_iter().map(|m| m.node_id).collect();
                fuse_by_reciprocal_rank(&lexical_ids, &semantic_ids, 60.0)
            }
            None => lexical_ids,
        };

        let mut entry_points: Vec<CodeNode> = Vec::new();
        for id in entry_ids.iter().take(options.search_limit) {
            if let Some(node) = self.store.get_node(id)? {
                entry_points.push(node);
            }
        }

        // 3. Bounded expansion over the significant edge kinds.
        let starts: Vec<String> = entry_points.iter().map(|n| n.id.clone()).collect();
        let subgraph = engine.traverse(
            &starts,
            &TraversalOptions {
                max_depth: options.traversal_depth,
                max_nodes: options.max_nodes,
                edge_kinds: Some(EdgeKind::significant().to_vec()),
                node_kinds: None,
                direction: crate::query::Direction::Both,
            },
        )?;

        // 4. Code blocks for the top entry points only.
        let mut code_blocks: Vec<CodeBlock> = Vec::new();
        for node in entry_points.iter().take(options.max_code_blocks) {
            if let Some(block) = self.load_code_block(node, options.max_code_block_size) {
                code_blocks.push(block);
            }
        }

        Ok(ContextResult {
            query: task.to_string(),
            entry_points,
            subgraph,
            code_blocks,
        })
    }

    /// Slice `[start_line, end_line]` of the node's file from disk,
    /// clipped to the block size cap.
    fn load_code_block(&self, node: &CodeNode, max_chars: usize) -> Option<CodeBlock> {
        let path = self.root.join(&node.file_path);
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot load code block");
                return None;
            }
        };

        let start = node.start_line.saturating_sub(1) as usize;
        let end = node.end_line as usize;
        let lines: Vec<&str> = source.lines().collect();
        if start >= lines.len() {
            return None;
        }
        let slice = lines[start..end.min(lines.len())].join("\n");
        let (code, truncated) = clip_code_block(&slice, max_chars);

        Some(CodeBlock {
            node_id: node.id.clone(),
            name: node.name.clone(),
            file_path: node.file_path.clone(),
            start_line: node.start_line,
            end_line: node.end_line,
            language: node.language.as_str().to_string(),
            code,
            truncated,
        })
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

impl ContextResult {
    /// Render the compact Markdown document: query echo, entry points with
    /// locations and signatures, related symbols grouped by file, code
    /// blocks. Bounded by `token_budget`.
    pub fn to_markdown(&self, token_budget: usize) -> String {
        let mut sections: Vec<String> = Vec::new();

        sections.push(format!("# Context: {}", self.query));

        if self.entry_points.is_empty() {
            sections.push("No relevant symbols found.".to_string());
            return sections.join("\n\n");
        }

        let mut entries = String::from("## Entry points\n");
        for node in &self.entry_points {
            let signature = node
                .signature
                .as_deref()
                .map(compact_signature)
                .map(|s| format!(" — `{s}`"))
                .unwrap_or_default();
            entries.push_str(&format!(
                "- **{}** ({}) `{}:{}-{}`{}\n",
                node.name,
                node.kind,
                node.file_path,
                node.start_line,
                node.end_line,
                signature,
            ));
        }
        sections.push(entries.trim_end().to_string());

        // Related symbols: subgraph members that are not entry points,
        // grouped by file for scanability.
        let entry_ids: std::collections::HashSet<&str> =
            self.entry_points.iter().map(|n| n.id.as_str()).collect();
        let mut by_file: BTreeMap<&str, Vec<&CodeNode>> = BTreeMap::new();
        for node in self.subgraph.nodes.values() {
            if !entry_ids.contains(node.id.as_str()) {
                by_file.entry(node.file_path.as_str()).or_default().push(node);
            }
        }
        if !by_file.is_empty() {
            let mut related = String::from("## Related symbols\n");
            for (file, mut nodes) in by_file {
                nodes.sort_by_key(|n| (n.start_line, n.id.as_str()));
                let names: Vec<String> = nodes
                    .iter()
                    .map(|n| format!("`{}` ({})", n.name, n.kind))
                    .collect();
                related.push_str(&format!("- {}: {}\n", file, names.join(", ")));
            }
            sections.push(related.trim_end().to_string());
        }

        if !self.code_blocks.is_empty() {
            let mut code = String::from("## Code\n");
            for block in &self.code_blocks {
                code.push_str(&format!(
                    "\n### {} (`{}:{}-{}`)\n\n```{}\n{}\n```\n",
                    block.name,
                    block.file_path,
                    block.start_line,
                    block.end_line,
                    block.language,
                    block.code,
                ));
            }
            sections.push(code.trim_end().to_string());
        }

        let document = sections.join("\n\n");
        if estimate_tokens(&document) > token_budget {
            truncate_to_tokens(&document, token_budget)
        } else {
            document
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
