//! Tree-to-graph extraction.
//!
//! Walks a parse tree depth-first with a stack of open containers, applying
//! the language's rule table to turn concrete syntax into nodes, containment
//! edges, same-file call edges, and unresolved references. Unresolvable
//! names are data, never errors; a parse failure ends the file's extraction
//! with an error entry but never aborts an indexing pass.

use std::collections::HashMap;
use std::time::Instant;

use tree_sitter::Node;

use crate::indexer::registry::GrammarRegistry;
use crate::indexer::rules::{
    node_text, rules_for, HeritageRef, LanguageRules, NodeRole,
};
use crate::types::{
    make_node_id, make_qualified_name, sha256_hex, unix_now, CodeEdge, CodeNode, EdgeKind,
    ExtractionResult, Language, NodeKind, UnresolvedRef, MAX_SNIPPET_CHARS,
};

/// Sentinel for definitions with no extractable name.
const ANONYMOUS: &str = "<anonymous>";

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct Extractor<'a> {
    registry: &'a GrammarRegistry,
}

impl<'a> Extractor<'a> {
    pub fn new(registry: &'a GrammarRegistry) -> Self {
        Self { registry }
    }

    /// Extract nodes, edges, and unresolved references from one file.
    pub fn extract(
        &self,
        file_path: &str,
        source: &str,
        language: Language,
    ) -> ExtractionResult {
        let started = Instant::now();
        let mut result = match language {
            Language::Vue => extract_vue(file_path, source),
            _ => self.extract_tree(file_path, source, language),
        };
        result.duration_ms = started.elapsed().as_millis();
        result
    }

    fn extract_tree(
        &self,
        file_path: &str,
        source: &str,
        language: Language,
    ) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        let Some(rules) = rules_for(language) else {
            return result;
        };
        let Some(mut parser) = self.registry.make_parser(language) else {
            // Grammar unavailable on this host: degrade to empty output.
            return result;
        };

        let Some(tree) = parser.parse(source, None) else {
            result
                .errors
                .push(format!("{file_path}: parser returned no tree"));
            return result;
        };
        if tree.root_node().has_error() {
            // Partial trees still yield useful symbols; note the error and
            // keep whatever the grammar could recover.
            result
                .errors
                .push(format!("{file_path}: syntax errors present"));
        }

        let mut walk = Walk {
            rules,
            file_path,
            src: source.as_bytes(),
            language,
            now: unix_now(),
            stack: Vec::new(),
            seen_ids: HashMap::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            refs: Vec::new(),
            calls: Vec::new(),
        };

        let file_node = walk.make_file_node(source);
        let file_id = file_node.id.clone();
        walk.seen_ids.insert(file_node.id.clone(), 0);
        walk.nodes.push(file_node);
        walk.stack.push(StackEntry {
            id: file_id,
            name: String::new(),
            is_container: false,
        });

        walk.visit(tree.root_node());
        walk.resolve_same_file_calls();

        result.nodes = walk.nodes;
        result.edges = walk.edges;
        result.unresolved_refs = walk.refs;
        result
    }
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

struct StackEntry {
    id: String,
    /// Empty for the file-scope entry and unnamed scopes.
    name: String,
    is_container: bool,
}

/// A call reference pending same-file resolution.
struct PendingCall {
    owner_id: String,
    callee: String,
    line: u32,
    column: u32,
}

struct Walk<'a> {
    rules: &'static LanguageRules,
    file_path: &'a str,
    src: &'a [u8],
    language: Language,
    now: i64,
    stack: Vec<StackEntry>,
    seen_ids: HashMap<String, usize>,
    nodes: Vec<CodeNode>,
    edges: Vec<CodeEdge>,
    refs: Vec<UnresolvedRef>,
    calls: Vec<PendingCall>,
}

impl<'a> Walk<'a> {
    // -------------------------------------------------------------------
    // Visiting
    // -------------------------------------------------------------------

    fn visit(&mut self, node: Node) {
        match self.rules.classify(node) {
            Some(NodeRole::Import) => self.record_import(node),
            Some(NodeRole::Call) => {
                self.record_call(node);
                self.recurse(node);
            }
            Some(NodeRole::Definition(kind)) => self.visit_definition(node, kind),
            Some(NodeRole::Scope) => self.visit_scope(node),
            None => self.recurse(node),
        }
    }

    fn recurse(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_definition(&mut self, node: Node, declared_kind: NodeKind) {
        let name = self.extract_name(node);
        if name == ANONYMOUS {
            // Anonymous definitions produce no node; their bodies still
            // belong to the enclosing scope.
            self.recurse(node);
            return;
        }

        // A function directly inside a type-like container is a method;
        // functions under modules and namespaces stay functions.
        let kind = if declared_kind == NodeKind::Function
            && self.stack.last().map(|top| top.is_container).unwrap_or(false)
        {
            NodeKind::Method
        } else {
            declared_kind
        };

        let start_line = node.start_position().row as u32 + 1;
        let id = make_node_id(kind, self.file_path, &name, start_line);
        if self.seen_ids.contains_key(&id) {
            self.recurse(node);
            return;
        }

        let scopes: Vec<String> = self
            .stack
            .iter()
            .filter(|entry| !entry.name.is_empty())
            .map(|entry| entry.name.clone())
            .collect();

        let raw = node_text(node, self.src);
        let code_node = CodeNode {
            id: id.clone(),
            kind,
            name: name.clone(),
            qualified_name: make_qualified_name(self.file_path, &scopes, &name),
            file_path: self.file_path.to_string(),
            language: self.language,
            start_line,
            end_line: node.end_position().row as u32 + 1,
            start_column: node.start_position().column as u32,
            end_column: node.end_position().column as u32,
            signature: self.extract_signature(node),
            docstring: self.extract_docstring(node),
            code_snippet: Some(truncate_chars(&raw, MAX_SNIPPET_CHARS)),
            code_hash: Some(sha256_hex(raw.as_bytes())),
            visibility: self.rules.visibility.and_then(|f| f(node, self.src)),
            is_exported: self
                .rules
                .is_exported
                .map(|f| f(node, self.src, &name))
                .unwrap_or(false),
            is_async: self
                .rules
                .is_async
                .map(|f| f(node, self.src))
                .unwrap_or(false),
            is_static: self
                .rules
                .is_static
                .map(|f| f(node, self.src))
                .unwrap_or(false),
            metadata: None,
            updated_at: self.now,
        };

        // Containment from the immediate stack parent.
        if let Some(parent) = self.stack.last() {
            self.edges.push(CodeEdge::resolved(
                &parent.id,
                &id,
                EdgeKind::Contains,
                start_line,
            ));
        }

        // Inheritance clauses become unresolved references, one per parent.
        if let Some(heritage) = self.rules.heritage {
            for href in heritage(node, self.src) {
                self.push_heritage_ref(&id, href);
            }
        }

        self.seen_ids.insert(id.clone(), self.nodes.len());
        self.nodes.push(code_node);

        self.stack.push(StackEntry {
            id,
            name,
            is_container: matches!(
                kind,
                NodeKind::Class
                    | NodeKind::Interface
                    | NodeKind::Trait
                    | NodeKind::Struct
                    | NodeKind::Enum
                    | NodeKind::Protocol
            ),
        });
        self.recurse(node);
        self.stack.pop();
    }

    fn visit_scope(&mut self, node: Node) {
        let scope_name = node
            .child_by_field_name(self.rules.scope_name_field)
            .map(|n| node_text(n, self.src))
            .map(|text| text.split('<').next().unwrap_or(&text).trim().to_string())
            .unwrap_or_default();

        // An impl-style scope's heritage belongs to the type it names, when
        // that type is defined in this file; the file node otherwise.
        if let Some(heritage) = self.rules.heritage {
            let owner = self
                .nodes
                .iter()
                .find(|n| {
                    n.name == scope_name
                        && matches!(n.kind, NodeKind::Struct | NodeKind::Enum | NodeKind::Class)
                })
                .map(|n| n.id.clone())
                .unwrap_or_else(|| self.file_node_id());
            for href in heritage(node, self.src) {
                self.push_heritage_ref(&owner, href);
            }
        }

        self.stack.push(StackEntry {
            id: self.file_node_id(),
            name: scope_name,
            is_container: true,
        });
        self.recurse(node);
        self.stack.pop();
    }

    // -------------------------------------------------------------------
    // References
    // -------------------------------------------------------------------

    fn record_import(&mut self, node: Node) {
        let Some(name) = (self.rules.import_name)(node, self.src) else {
            return;
        };
        let owner = self.innermost_owner_id();
        self.refs.push(UnresolvedRef {
            from_node_id: owner,
            reference_name: name,
            reference_kind: EdgeKind::Imports,
            line: node.start_position().row as u32 + 1,
            column: node.start_position().column as u32,
            file_path: self.file_path.to_string(),
            language: self.language,
        });
    }

    fn record_call(&mut self, node: Node) {
        let Some(callee) = (self.rules.callee_name)(node, self.src) else {
            return;
        };
        self.calls.push(PendingCall {
            owner_id: self.innermost_owner_id(),
            callee,
            line: node.start_position().row as u32 + 1,
            column: node.start_position().column as u32,
        });
    }

    fn push_heritage_ref(&mut self, from_id: &str, href: HeritageRef) {
        self.refs.push(UnresolvedRef {
            from_node_id: from_id.to_string(),
            reference_name: href.name,
            reference_kind: href.kind,
            line: href.line,
            column: href.column,
            file_path: self.file_path.to_string(),
            language: self.language,
        });
    }

    /// Call references that name a definition in this file become resolved
    /// edges immediately; the rest stay pending for the indexer.
    fn resolve_same_file_calls(&mut self) {
        let by_name: HashMap<&str, &str> = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Function | NodeKind::Method))
            .map(|n| (n.name.as_str(), n.id.as_str()))
            .collect();

        let calls = std::mem::take(&mut self.calls);
        for call in calls {
            let bare = call.callee.rsplit("::").next().unwrap_or(&call.callee);
            let bare = bare.rsplit('.').next().unwrap_or(bare);
            match by_name.get(bare) {
                Some(target_id) if *target_id != call.owner_id => {
                    self.edges.push(CodeEdge::resolved(
                        &call.owner_id,
                        target_id,
                        EdgeKind::Calls,
                        call.line,
                    ));
                }
                Some(_) => {
                    // Direct recursion still counts as a call edge.
                    let owner = call.owner_id.clone();
                    self.edges.push(CodeEdge::resolved(
                        &owner,
                        &owner,
                        EdgeKind::Calls,
                        call.line,
                    ));
                }
                None => {
                    self.refs.push(UnresolvedRef {
                        from_node_id: call.owner_id,
                        reference_name: call.callee,
                        reference_kind: EdgeKind::Calls,
                        line: call.line,
                        column: call.column,
                        file_path: self.file_path.to_string(),
                        language: self.language,
                    });
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Extraction details
    // -------------------------------------------------------------------

    fn extract_name(&self, node: Node) -> String {
        // Leaf definitions (bare enum members) are their own name.
        if node.kind().contains("identifier") {
            let text = node_text(node, self.src);
            if !text.is_empty() {
                return text;
            }
        }

        if let Some(name_node) = node.child_by_field_name(self.rules.name_field) {
            let text = node_text(name_node, self.src);
            if !text.is_empty() {
                return text;
            }
        }

        // `const f = () => {}`: the declarator names the function.
        if let Some(parent) = node.parent() {
            if matches!(parent.kind(), "variable_declarator" | "assignment_expression") {
                if let Some(name_node) = parent
                    .child_by_field_name("name")
                    .or_else(|| parent.child_by_field_name("left"))
                {
                    if name_node.kind().contains("identifier") {
                        let text = node_text(name_node, self.src);
                        if !text.is_empty() {
                            return text;
                        }
                    }
                }
            }
        }

        // Declarator-style definitions name themselves one level down
        // (e.g. a field declaration holding a variable declarator).
        if let Some(declarator) = node.child_by_field_name("declarator") {
            if let Some(name_node) = declarator.child_by_field_name("name") {
                let text = node_text(name_node, self.src);
                if !text.is_empty() {
                    return text;
                }
            }
        }

        // First identifier-like child.
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|c| c.kind().contains("identifier"))
            .map(|c| node_text(c, self.src));
        match found {
            Some(text) if !text.is_empty() => text,
            _ => ANONYMOUS.to_string(),
        }
    }

    fn extract_signature(&self, node: Node) -> Option<String> {
        let params = node
            .child_by_field_name(self.rules.params_field)
            .map(|p| compact_whitespace(&node_text(p, self.src)));
        let ret = node
            .child_by_field_name(self.rules.return_type_field)
            .map(|r| compact_whitespace(&node_text(r, self.src)));

        match (params, ret) {
            (Some(p), Some(r)) => {
                let sep = if self.rules.return_sep.is_empty() { "" } else { self.rules.return_sep };
                Some(format!("{p}{sep}{r}"))
            }
            (Some(p), None) => Some(p),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        }
    }

    fn extract_docstring(&self, node: Node) -> Option<String> {
        if let Some(hook) = self.rules.docstring {
            if let Some(doc) = hook(node, self.src) {
                return Some(doc);
            }
        }

        // Preceding contiguous comment siblings. Exported declarations are
        // wrapped, so the walk starts at the outermost statement.
        let anchor = match node.parent() {
            Some(parent) if parent.kind() == "export_statement" => parent,
            _ => node,
        };

        let mut lines: Vec<String> = Vec::new();
        let mut expected_row = anchor.start_position().row;
        let mut current = anchor.prev_sibling();
        while let Some(sibling) = current {
            if !self.rules.comment_types.contains(&sibling.kind()) {
                break;
            }
            // Contiguity: the comment must end on the line directly above.
            if sibling.end_position().row + 1 < expected_row {
                break;
            }
            lines.push(node_text(sibling, self.src));
            expected_row = sibling.start_position().row;
            current = sibling.prev_sibling();
        }

        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        let text = lines.join("\n");
        let cleaned = strip_comment_markers(&text);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    // -------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------

    fn make_file_node(&self, source: &str) -> CodeNode {
        let name = std::path::Path::new(self.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.to_string());
        let line_count = source.lines().count().max(1) as u32;
        CodeNode {
            id: make_node_id(NodeKind::File, self.file_path, &name, 1),
            kind: NodeKind::File,
            name,
            qualified_name: self.file_path.to_string(),
            file_path: self.file_path.to_string(),
            language: self.language,
            start_line: 1,
            end_line: line_count,
            start_column: 0,
            end_column: 0,
            signature: None,
            docstring: None,
            code_snippet: None,
            code_hash: Some(sha256_hex(source.as_bytes())),
            visibility: None,
            is_exported: false,
            is_async: false,
            is_static: false,
            metadata: None,
            updated_at: self.now,
        }
    }

    fn file_node_id(&self) -> String {
        self.nodes[0].id.clone()
    }

    /// The innermost node id references attach to: the nearest stack entry
    /// that owns a real node (scopes reuse the file node).
    fn innermost_owner_id(&self) -> String {
        self.stack
            .last()
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| self.file_node_id())
    }
}

// ---------------------------------------------------------------------------
// Vue (regex-based)
// ---------------------------------------------------------------------------

/// Lightweight template-language extraction: one component node per file
/// plus import references from its script block. No tree parser involved.
fn extract_vue(file_path: &str, source: &str) -> ExtractionResult {
    use regex::Regex;

    let mut result = ExtractionResult::default();
    let now = unix_now();
    let line_count = source.lines().count().max(1) as u32;

    let component_name = std::path::Path::new(file_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string());

    let file_name = std::path::Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string());

    let file_node = CodeNode {
        id: make_node_id(NodeKind::File, file_path, &file_name, 1),
        kind: NodeKind::File,
        name: file_name,
        qualified_name: file_path.to_string(),
        file_path: file_path.to_string(),
        language: Language::Vue,
        start_line: 1,
        end_line: line_count,
        start_column: 0,
        end_column: 0,
        signature: None,
        docstring: None,
        code_snippet: None,
        code_hash: Some(sha256_hex(source.as_bytes())),
        visibility: None,
        is_exported: false,
        is_async: false,
        is_static: false,
        metadata: None,
        updated_at: now,
    };

    let component = CodeNode {
        id: make_node_id(NodeKind::Component, file_path, &component_name, 1),
        kind: NodeKind::Component,
        name: component_name.clone(),
        qualified_name: make_qualified_name(file_path, &[], &component_name),
        file_path: file_path.to_string(),
        language: Language::Vue,
        start_line: 1,
        end_line: line_count,
        start_column: 0,
        end_column: 0,
        signature: None,
        docstring: None,
        code_snippet: Some(truncate_chars(source, MAX_SNIPPET_CHARS)),
        code_hash: Some(sha256_hex(source.as_bytes())),
        visibility: Some(crate::types::Visibility::Public),
        is_exported: true,
        is_async: false,
        is_static: false,
        metadata: None,
        updated_at: now,
    };

    result.edges.push(CodeEdge::resolved(
        &file_node.id,
        &component.id,
        EdgeKind::Contains,
        1,
    ));

    // Import specifiers from the script block.
    if let Ok(import_re) =
        Regex::new(r#"(?m)^\s*import\s+(?:[\w$\{\}\s,*]+\s+from\s+)?['"]([^'"]+)['"]"#)
    {
        for (idx, line) in source.lines().enumerate() {
            if let Some(captures) = import_re.captures(line) {
                if let Some(specifier) = captures.get(1) {
                    result.unresolved_refs.push(UnresolvedRef {
                        from_node_id: component.id.clone(),
                        reference_name: specifier.as_str().to_string(),
                        reference_kind: EdgeKind::Imports,
                        line: idx as u32 + 1,
                        column: 0,
                        file_path: file_path.to_string(),
                        language: Language::Vue,
                    });
                }
            }
        }
    }

    result.nodes.push(file_node);
    result.nodes.push(component);
    result
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

fn compact_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip line/block comment markers and join the remaining lines.
fn strip_comment_markers(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("/**")
                .trim_start_matches("/*!")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches("///")
                .trim_start_matches("//!")
                .trim_start_matches("//")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
