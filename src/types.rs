//! Core domain types for the code knowledge graph.
//!
//! Nodes are code entities (files, classes, functions, ...), edges are the
//! typed relationships between them, and unresolved references are name-only
//! edges awaiting a later resolution pass.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Supported source languages.
///
/// Vue is extracted with a lightweight regex pass rather than a tree parser;
/// the grammar registry still reports it as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Python,
    Rust,
    Go,
    Java,
    Vue,
}

impl Language {
    /// Map a file extension (including the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".ts" | ".mts" | ".cts" => Some(Self::TypeScript),
            ".tsx" => Some(Self::Tsx),
            ".js" | ".mjs" | ".cjs" => Some(Self::JavaScript),
            ".jsx" => Some(Self::Jsx),
            ".py" | ".pyi" => Some(Self::Python),
            ".rs" => Some(Self::Rust),
            ".go" => Some(Self::Go),
            ".java" => Some(Self::Java),
            ".vue" => Some(Self::Vue),
            _ => None,
        }
    }

    /// String representation used in the database and over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::Vue => "vue",
        }
    }

    /// Parse from a string (case-insensitive, common aliases accepted).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "typescript" | "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "javascript" | "js" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "python" | "py" => Some(Self::Python),
            "rust" | "rs" => Some(Self::Rust),
            "go" | "golang" => Some(Self::Go),
            "java" => Some(Self::Java),
            "vue" => Some(Self::Vue),
            _ => None,
        }
    }

    /// True when extraction for this language is regex-based and needs no
    /// tree parser.
    pub fn is_regex_based(&self) -> bool {
        matches!(self, Self::Vue)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Kinds of entities in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Module,
    Namespace,
    Class,
    Interface,
    Trait,
    Struct,
    Enum,
    Function,
    Method,
    Variable,
    Constant,
    Property,
    Field,
    Parameter,
    TypeAlias,
    Component,
    Route,
    Import,
    Export,
    Protocol,
    EnumMember,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Module => "module",
            Self::Namespace => "namespace",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Function => "function",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Property => "property",
            Self::Field => "field",
            Self::Parameter => "parameter",
            Self::TypeAlias => "type_alias",
            Self::Component => "component",
            Self::Route => "route",
            Self::Import => "import",
            Self::Export => "export",
            Self::Protocol => "protocol",
            Self::EnumMember => "enum_member",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "module" => Some(Self::Module),
            "namespace" | "package" => Some(Self::Namespace),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "trait" => Some(Self::Trait),
            "struct" => Some(Self::Struct),
            "enum" => Some(Self::Enum),
            "function" | "fn" => Some(Self::Function),
            "method" => Some(Self::Method),
            "variable" | "var" => Some(Self::Variable),
            "constant" | "const" => Some(Self::Constant),
            "property" => Some(Self::Property),
            "field" => Some(Self::Field),
            "parameter" | "param" => Some(Self::Parameter),
            "type_alias" | "type" => Some(Self::TypeAlias),
            "component" => Some(Self::Component),
            "route" => Some(Self::Route),
            "import" => Some(Self::Import),
            "export" => Some(Self::Export),
            "protocol" => Some(Self::Protocol),
            "enum_member" => Some(Self::EnumMember),
            _ => None,
        }
    }

    /// True for kinds that can contain other definitions (used for
    /// method-vs-function discrimination and qualified names).
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Class
                | Self::Interface
                | Self::Trait
                | Self::Struct
                | Self::Enum
                | Self::Module
                | Self::Namespace
                | Self::Protocol
                | Self::Component
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EdgeKind
// ---------------------------------------------------------------------------

/// Kinds of directed relationships between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
    Exports,
    Calls,
    Extends,
    Implements,
    ReturnsType,
    Throws,
    Reads,
    Writes,
    Renders,
    Instantiates,
    Decorates,
    DependsOn,
    References,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Imports => "imports",
            Self::Exports => "exports",
            Self::Calls => "calls",
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::ReturnsType => "returns_type",
            Self::Throws => "throws",
            Self::Reads => "reads",
            Self::Writes => "writes",
            Self::Renders => "renders",
            Self::Instantiates => "instantiates",
            Self::Decorates => "decorates",
            Self::DependsOn => "depends_on",
            Self::References => "references",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "contains" => Some(Self::Contains),
            "imports" => Some(Self::Imports),
            "exports" => Some(Self::Exports),
            "calls" => Some(Self::Calls),
            "extends" => Some(Self::Extends),
            "implements" => Some(Self::Implements),
            "returns_type" => Some(Self::ReturnsType),
            "throws" => Some(Self::Throws),
            "reads" => Some(Self::Reads),
            "writes" => Some(Self::Writes),
            "renders" => Some(Self::Renders),
            "instantiates" => Some(Self::Instantiates),
            "decorates" => Some(Self::Decorates),
            "depends_on" => Some(Self::DependsOn),
            "references" => Some(Self::References),
            _ => None,
        }
    }

    /// The edge kinds that carry dependency semantics for impact and
    /// context queries.
    pub fn significant() -> &'static [EdgeKind] {
        &[
            Self::Calls,
            Self::Extends,
            Self::Implements,
            Self::Imports,
            Self::References,
        ]
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Internal => "internal",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "protected" => Some(Self::Protected),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CodeNode
// ---------------------------------------------------------------------------

/// Maximum stored snippet length, in characters.
pub const MAX_SNIPPET_CHARS: usize = 500;

/// An entity in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub language: Language,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub is_exported: bool,
    pub is_async: bool,
    pub is_static: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    pub updated_at: i64,
}

// ---------------------------------------------------------------------------
// CodeEdge
// ---------------------------------------------------------------------------

/// Prefix used for the synthetic target id of an unresolved edge.
pub const UNRESOLVED_TARGET_PREFIX: &str = "unresolved:";

/// A directed, typed relationship between two nodes.
///
/// When `resolved` is false the edge dangles: `target_id` is a synthetic
/// `unresolved:<name>` id and `target_name` carries the raw identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEdge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    pub line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl CodeEdge {
    /// Build a resolved edge between two known nodes.
    pub fn resolved(source_id: &str, target_id: &str, kind: EdgeKind, line: u32) -> Self {
        Self {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            resolved: true,
            target_name: None,
            line_number: line,
            metadata: None,
        }
    }

    /// Build a dangling edge whose target is a raw name.
    pub fn unresolved(source_id: &str, target_name: &str, kind: EdgeKind, line: u32) -> Self {
        Self {
            source_id: source_id.to_string(),
            target_id: format!("{UNRESOLVED_TARGET_PREFIX}{target_name}"),
            kind,
            resolved: false,
            target_name: Some(target_name.to_string()),
            line_number: line,
            metadata: None,
        }
    }
}

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// One row per indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content_hash: String,
    pub language: Language,
    pub size: u64,
    pub modified_at: i64,
    pub indexed_at: i64,
    pub node_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

// ---------------------------------------------------------------------------
// UnresolvedRef
// ---------------------------------------------------------------------------

/// A pending edge whose target is a name, not an id. File path and language
/// are denormalized so later resolution passes need no joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedRef {
    pub from_node_id: String,
    pub reference_name: String,
    pub reference_kind: EdgeKind,
    pub line: u32,
    pub column: u32,
    pub file_path: String,
    pub language: Language,
}

// ---------------------------------------------------------------------------
// ExtractionResult
// ---------------------------------------------------------------------------

/// Everything the extractor produced for a single file.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub nodes: Vec<CodeNode>,
    pub edges: Vec<CodeEdge>,
    pub unresolved_refs: Vec<UnresolvedRef>,
    pub errors: Vec<String>,
    pub duration_ms: u128,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a deterministic node id: `<kind>:<digest16>`.
///
/// The digest is the first 16 hex characters of SHA-256 over the id
/// components, NUL-separated so `("ab", "c")` and `("a", "bc")` differ.
/// Identical inputs yield identical ids across runs.
pub fn make_node_id(kind: NodeKind, file_path: &str, name: &str, start_line: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0]);
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(start_line.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}:{}", kind.as_str(), &digest[..16])
}

/// Join the containing scopes into a qualified name:
/// `file_path::Outer::Inner::name`.
pub fn make_qualified_name(file_path: &str, scopes: &[String], name: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(scopes.len() + 2);
    parts.push(file_path);
    for scope in scopes {
        parts.push(scope);
    }
    parts.push(name);
    parts.join("::")
}

/// SHA-256 of `content` as lowercase hex: the strong digest used for file
/// content hashes and node code hashes.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_deterministic() {
        let a = make_node_id(NodeKind::Function, "src/main.ts", "hello", 10);
        let b = make_node_id(NodeKind::Function, "src/main.ts", "hello", 10);
        assert_eq!(a, b);
        assert!(a.starts_with("function:"));
        // kind prefix + 16 hex chars
        assert_eq!(a.len(), "function:".len() + 16);
    }

    #[test]
    fn node_id_varies_with_each_component() {
        let base = make_node_id(NodeKind::Function, "a.ts", "f", 1);
        assert_ne!(base, make_node_id(NodeKind::Method, "a.ts", "f", 1));
        assert_ne!(base, make_node_id(NodeKind::Function, "b.ts", "f", 1));
        assert_ne!(base, make_node_id(NodeKind::Function, "a.ts", "g", 1));
        assert_ne!(base, make_node_id(NodeKind::Function, "a.ts", "f", 2));
    }

    #[test]
    fn node_id_components_do_not_collide_on_concatenation() {
        // NUL separation keeps shifted boundaries apart.
        let a = make_node_id(NodeKind::Function, "ab", "c", 1);
        let b = make_node_id(NodeKind::Function, "a", "bc", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn qualified_name_joins_scopes() {
        let qn = make_qualified_name(
            "src/auth.ts",
            &["AuthService".to_string()],
            "login",
        );
        assert_eq!(qn, "src/auth.ts::AuthService::login");

        let top = make_qualified_name("src/auth.ts", &[], "helper");
        assert_eq!(top, "src/auth.ts::helper");
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_extension(".ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension(".tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension(".mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension(".py"), Some(Language::Python));
        assert_eq!(Language::from_extension(".rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension(".go"), Some(Language::Go));
        assert_eq!(Language::from_extension(".java"), Some(Language::Java));
        assert_eq!(Language::from_extension(".vue"), Some(Language::Vue));
        assert_eq!(Language::from_extension(".txt"), None);
    }

    #[test]
    fn language_roundtrip() {
        for lang in [
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Jsx,
            Language::Python,
            Language::Rust,
            Language::Go,
            Language::Java,
            Language::Vue,
        ] {
            assert_eq!(Language::from_str_loose(lang.as_str()), Some(lang));
        }
    }

    #[test]
    fn node_kind_roundtrip() {
        for kind in [
            NodeKind::File,
            NodeKind::Module,
            NodeKind::Namespace,
            NodeKind::Class,
            NodeKind::Interface,
            NodeKind::Trait,
            NodeKind::Struct,
            NodeKind::Enum,
            NodeKind::Function,
            NodeKind::Method,
            NodeKind::Variable,
            NodeKind::Constant,
            NodeKind::Property,
            NodeKind::Field,
            NodeKind::Parameter,
            NodeKind::TypeAlias,
            NodeKind::Component,
            NodeKind::Route,
            NodeKind::Import,
            NodeKind::Export,
            NodeKind::Protocol,
            NodeKind::EnumMember,
        ] {
            assert_eq!(NodeKind::from_str_loose(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn edge_kind_roundtrip() {
        for kind in [
            EdgeKind::Contains,
            EdgeKind::Imports,
            EdgeKind::Exports,
            EdgeKind::Calls,
            EdgeKind::Extends,
            EdgeKind::Implements,
            EdgeKind::ReturnsType,
            EdgeKind::Throws,
            EdgeKind::Reads,
            EdgeKind::Writes,
            EdgeKind::Renders,
            EdgeKind::Instantiates,
            EdgeKind::Decorates,
            EdgeKind::DependsOn,
            EdgeKind::References,
        ] {
            assert_eq!(EdgeKind::from_str_loose(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn container_kinds() {
        assert!(NodeKind::Class.is_container());
        assert!(NodeKind::Struct.is_container());
        assert!(NodeKind::Namespace.is_container());
        assert!(!NodeKind::Function.is_container());
        assert!(!NodeKind::File.is_container());
    }

    #[test]
    fn unresolved_edge_carries_name_and_synthetic_target() {
        let edge = CodeEdge::unresolved("n1", "generate_token", EdgeKind::Calls, 42);
        assert!(!edge.resolved);
        assert_eq!(edge.target_id, "unresolved:generate_token");
        assert_eq!(edge.target_name.as_deref(), Some("generate_token"));
        assert_eq!(edge.line_number, 42);
    }

    #[test]
    fn sha256_hex_is_64_chars() {
        let h = sha256_hex(b"hello world");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn serde_roundtrip_node() {
        let node = CodeNode {
            id: make_node_id(NodeKind::Function, "src/main.ts", "hello", 10),
            kind: NodeKind::Function,
            name: "hello".to_string(),
            qualified_name: "src/main.ts::hello".to_string(),
            file_path: "src/main.ts".to_string(),
            language: Language::TypeScript,
            start_line: 10,
            end_line: 15,
            start_column: 0,
            end_column: 1,
            signature: Some("(name: string): string".to_string()),
            docstring: None,
            code_snippet: Some("function hello() {}".to_string()),
            code_hash: Some(sha256_hex(b"function hello() {}")),
            visibility: Some(Visibility::Public),
            is_exported: true,
            is_async: false,
            is_static: false,
            metadata: None,
            updated_at: 1_700_000_000,
        };

        let json = serde_json::to_string(&node).unwrap();
        let back: CodeNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, node.id);
        assert_eq!(back.kind, NodeKind::Function);
        assert_eq!(back.qualified_name, node.qualified_name);
        assert!(back.docstring.is_none());
    }
}
