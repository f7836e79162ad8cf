//! Per-language extraction rule tables.
//!
//! Each supported language is a [`LanguageRules`] value: sets of concrete
//! syntax node types recognized as functions, classes, methods, interfaces,
//! structs, enums, imports, and calls; the field names used to reach names,
//! bodies, parameters, and return types; and a handful of optional hooks
//! for the places grammars genuinely diverge (visibility, exports, heritage
//! clauses, callee spelling). Adding a language is adding a table entry.

use tree_sitter::Node;

use crate::types::{EdgeKind, Language, NodeKind, Visibility};

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// A reference discovered in a heritage clause (`extends` / `implements`).
#[derive(Debug, Clone)]
pub struct HeritageRef {
    pub kind: EdgeKind,
    pub name: String,
    pub line: u32,
    pub column: u32,
}

pub struct LanguageRules {
    pub language: Language,

    /// Node types producing Function (or Method when inside a container).
    pub function_types: &'static [&'static str],
    /// Node types that are unconditionally methods (explicit receivers,
    /// method definition forms).
    pub method_types: &'static [&'static str],
    pub class_types: &'static [&'static str],
    pub interface_types: &'static [&'static str],
    pub trait_types: &'static [&'static str],
    pub struct_types: &'static [&'static str],
    pub enum_types: &'static [&'static str],
    pub module_types: &'static [&'static str],
    /// Node types that open a naming scope without producing a node
    /// (e.g. an impl block).
    pub scope_types: &'static [&'static str],
    pub import_types: &'static [&'static str],
    pub call_types: &'static [&'static str],
    /// Field / property declarations inside containers.
    pub field_types: &'static [&'static str],
    pub property_types: &'static [&'static str],
    /// Enum member declarations; only honored directly under one of
    /// `enum_body_types`.
    pub enum_member_types: &'static [&'static str],
    pub enum_body_types: &'static [&'static str],

    pub name_field: &'static str,
    pub body_field: &'static str,
    pub params_field: &'static str,
    pub return_type_field: &'static str,
    /// Separator between parameter list and return type in signatures.
    pub return_sep: &'static str,
    /// Field holding the scope name for `scope_types` nodes.
    pub scope_name_field: &'static str,

    pub comment_types: &'static [&'static str],

    /// Refine the kind of a matched struct-set node (e.g. a type
    /// declaration that may be a struct, interface, or alias).
    pub specialize: Option<fn(Node) -> Option<NodeKind>>,
    /// Collect extends/implements references from a definition node.
    pub heritage: Option<fn(Node, &[u8]) -> Vec<HeritageRef>>,
    /// The callee's textual name for a call-set node.
    pub callee_name: fn(Node, &[u8]) -> Option<String>,
    /// The imported module/specifier text for an import-set node.
    pub import_name: fn(Node, &[u8]) -> Option<String>,

    pub visibility: Option<fn(Node, &[u8]) -> Option<Visibility>>,
    pub is_exported: Option<fn(Node, &[u8], &str) -> bool>,
    pub is_async: Option<fn(Node, &[u8]) -> bool>,
    pub is_static: Option<fn(Node, &[u8]) -> bool>,
    /// Override docstring extraction (languages that keep documentation
    /// inside the body rather than in preceding comments).
    pub docstring: Option<fn(Node, &[u8]) -> Option<String>>,
}

/// Look up the rule table for a language. Regex-based languages have none.
pub fn rules_for(language: Language) -> Option<&'static LanguageRules> {
    match language {
        Language::TypeScript | Language::Tsx => Some(&TYPESCRIPT_RULES),
        Language::JavaScript | Language::Jsx => Some(&JAVASCRIPT_RULES),
        Language::Python => Some(&PYTHON_RULES),
        Language::Rust => Some(&RUST_RULES),
        Language::Go => Some(&GO_RULES),
        Language::Java => Some(&JAVA_RULES),
        Language::Vue => None,
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// UTF-8 text of a node.
pub fn node_text(node: Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or_default().to_string()
}

/// First direct child with the given kind.
pub fn child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Whether any direct child has the given kind.
pub fn has_child_kind(node: Node, kind: &str) -> bool {
    child_of_kind(node, kind).is_some()
}

/// Whether any ancestor has the given kind.
pub fn has_ancestor_kind(node: Node, kind: &str) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == kind {
            return true;
        }
        current = parent.parent();
    }
    false
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

/// Default callee spelling: member access yields the property name, scoped
/// calls preserve the scope, plain identifiers pass through.
fn default_callee_name(node: Node, src: &[u8]) -> Option<String> {
    let callee = node.child_by_field_name("function")?;
    callee_from_expression(callee, src)
}

fn callee_from_expression(callee: Node, src: &[u8]) -> Option<String> {
    match callee.kind() {
        "identifier" | "field_identifier" | "property_identifier" => {
            Some(node_text(callee, src))
        }
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|p| node_text(p, src)),
        "field_expression" => callee
            .child_by_field_name("field")
            .map(|p| node_text(p, src)),
        "attribute" => callee
            .child_by_field_name("attribute")
            .map(|p| node_text(p, src)),
        "selector_expression" => callee
            .child_by_field_name("field")
            .map(|p| node_text(p, src)),
        // Scoped calls keep their scope text (e.g. `mod::func`).
        "scoped_identifier" => Some(node_text(callee, src)),
        _ => {
            let text = node_text(callee, src);
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TypeScript / TSX
// ---------------------------------------------------------------------------

fn ts_heritage(node: Node, src: &[u8]) -> Vec<HeritageRef> {
    let mut refs = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_heritage" => {
                let mut inner = child.walk();
                for clause in child.children(&mut inner) {
                    let kind = match clause.kind() {
                        "extends_clause" => EdgeKind::Extends,
                        "implements_clause" => EdgeKind::Implements,
                        _ => continue,
                    };
                    let mut c2 = clause.walk();
                    for target in clause.named_children(&mut c2) {
                        push_heritage(&mut refs, kind, target, src);
                    }
                }
            }
            // Interfaces: `interface A extends B, C`
            "extends_type_clause" => {
                let mut c2 = child.walk();
                for target in child.named_children(&mut c2) {
                    push_heritage(&mut refs, EdgeKind::Extends, target, src);
                }
            }
            _ => {}
        }
    }
    refs
}

fn push_heritage(refs: &mut Vec<HeritageRef>, kind: EdgeKind, target: Node, src: &[u8]) {
    let name = node_text(target, src);
    // Strip type arguments: `Base<T>` references `Base`.
    let name = name.split('<').next().unwrap_or(&name).trim().to_string();
    if name.is_empty() {
        return;
    }
    refs.push(HeritageRef {
        kind,
        name,
        line: target.start_position().row as u32 + 1,
        column: target.start_position().column as u32,
    });
}

fn ts_import_name(node: Node, src: &[u8]) -> Option<String> {
    node.child_by_field_name("source")
        .map(|s| strip_quotes(&node_text(s, src)))
}

fn ts_visibility(node: Node, src: &[u8]) -> Option<Visibility> {
    let modifier = child_of_kind(node, "accessibility_modifier")?;
    Visibility::from_str_loose(&node_text(modifier, src))
}

fn ts_is_exported(node: Node, _src: &[u8], _name: &str) -> bool {
    has_ancestor_kind(node, "export_statement")
}

fn keyword_child(node: Node, src: &[u8], keyword: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && node_text(c, src) == keyword);
    found
}

fn ts_is_async(node: Node, src: &[u8]) -> bool {
    keyword_child(node, src, "async")
}

fn ts_is_static(node: Node, src: &[u8]) -> bool {
    keyword_child(node, src, "static")
}

static TYPESCRIPT_RULES: LanguageRules = LanguageRules {
    language: Language::TypeScript,
    function_types: &[
        "function_declaration",
        "generator_function_declaration",
        "function_expression",
        "arrow_function",
    ],
    method_types: &["method_definition"],
    class_types: &["class_declaration", "abstract_class_declaration"],
    interface_types: &["interface_declaration"],
    trait_types: &[],
    struct_types: &[],
    enum_types: &["enum_declaration"],
    module_types: &["internal_module"],
    scope_types: &[],
    import_types: &["import_statement"],
    call_types: &["call_expression", "new_expression"],
    field_types: &[],
    property_types: &["public_field_definition"],
    enum_member_types: &["enum_assignment", "property_identifier"],
    enum_body_types: &["enum_body"],
    name_field: "name",
    body_field: "body",
    params_field: "parameters",
    return_type_field: "return_type",
    return_sep: "",
    scope_name_field: "name",
    comment_types: &["comment"],
    specialize: None,
    heritage: Some(ts_heritage),
    callee_name: ts_callee_name,
    import_name: ts_import_name,
    visibility: Some(ts_visibility),
    is_exported: Some(ts_is_exported),
    is_async: Some(ts_is_async),
    is_static: Some(ts_is_static),
    docstring: None,
};

fn ts_callee_name(node: Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        // `new Foo(...)` instantiates Foo.
        "new_expression" => node
            .child_by_field_name("constructor")
            .map(|c| node_text(c, src)),
        _ => default_callee_name(node, src),
    }
}

static JAVASCRIPT_RULES: LanguageRules = LanguageRules {
    language: Language::JavaScript,
    function_types: &[
        "function_declaration",
        "generator_function_declaration",
        "function_expression",
        "arrow_function",
    ],
    method_types: &["method_definition"],
    class_types: &["class_declaration"],
    interface_types: &[],
    trait_types: &[],
    struct_types: &[],
    enum_types: &[],
    module_types: &[],
    scope_types: &[],
    import_types: &["import_statement"],
    call_types: &["call_expression", "new_expression"],
    field_types: &[],
    property_types: &["field_definition"],
    enum_member_types: &[],
    enum_body_types: &[],
    name_field: "name",
    body_field: "body",
    params_field: "parameters",
    return_type_field: "return_type",
    return_sep: "",
    scope_name_field: "name",
    comment_types: &["comment"],
    specialize: None,
    heritage: Some(ts_heritage),
    callee_name: ts_callee_name,
    import_name: ts_import_name,
    visibility: None,
    is_exported: Some(ts_is_exported),
    is_async: Some(ts_is_async),
    is_static: Some(ts_is_static),
    docstring: None,
};

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn py_heritage(node: Node, src: &[u8]) -> Vec<HeritageRef> {
    let mut refs = Vec::new();
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for target in superclasses.named_children(&mut cursor) {
            if matches!(target.kind(), "identifier" | "attribute") {
                push_heritage(&mut refs, EdgeKind::Extends, target, src);
            }
        }
    }
    refs
}

fn py_import_name(node: Node, src: &[u8]) -> Option<String> {
    if node.kind() == "import_from_statement" {
        return node
            .child_by_field_name("module_name")
            .map(|m| node_text(m, src));
    }
    // `import a.b.c`: take the first dotted name.
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "dotted_name" | "aliased_import"))
        .map(|c| match c.kind() {
            "aliased_import" => c
                .child_by_field_name("name")
                .map(|n| node_text(n, src))
                .unwrap_or_default(),
            _ => node_text(c, src),
        });
    found.filter(|name| !name.is_empty())
}

fn py_visibility(node: Node, src: &[u8]) -> Option<Visibility> {
    let name = node.child_by_field_name("name")?;
    let text = node_text(name, src);
    if text.starts_with("__") && !text.ends_with("__") {
        Some(Visibility::Private)
    } else if text.starts_with('_') {
        Some(Visibility::Internal)
    } else {
        Some(Visibility::Public)
    }
}

fn py_is_exported(_node: Node, _src: &[u8], name: &str) -> bool {
    !name.starts_with('_')
}

fn py_is_async(node: Node, src: &[u8]) -> bool {
    keyword_child(node, src, "async")
}

/// Python documentation lives in the body: a leading string expression.
fn py_docstring(node: Node, src: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let raw = node_text(string, src);
    let trimmed = raw
        .trim_start_matches(|c| c == 'r' || c == 'b' || c == 'u' || c == 'f')
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

static PYTHON_RULES: LanguageRules = LanguageRules {
    language: Language::Python,
    function_types: &["function_definition"],
    method_types: &[],
    class_types: &["class_definition"],
    interface_types: &[],
    trait_types: &[],
    struct_types: &[],
    enum_types: &[],
    module_types: &[],
    scope_types: &[],
    import_types: &["import_statement", "import_from_statement"],
    call_types: &["call"],
    field_types: &[],
    property_types: &[],
    enum_member_types: &[],
    enum_body_types: &[],
    name_field: "name",
    body_field: "body",
    params_field: "parameters",
    return_type_field: "return_type",
    return_sep: " -> ",
    scope_name_field: "name",
    comment_types: &["comment"],
    specialize: None,
    heritage: Some(py_heritage),
    callee_name: default_callee_name,
    import_name: py_import_name,
    visibility: Some(py_visibility),
    is_exported: Some(py_is_exported),
    is_async: Some(py_is_async),
    is_static: None,
    docstring: Some(py_docstring),
};

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

fn rust_heritage(node: Node, src: &[u8]) -> Vec<HeritageRef> {
    let mut refs = Vec::new();
    // `impl Trait for Type`: the trait field names what is implemented.
    if node.kind() == "impl_item" {
        if let Some(trait_node) = node.child_by_field_name("trait") {
            push_heritage(&mut refs, EdgeKind::Implements, trait_node, src);
        }
    }
    // `trait Sub: Super` lists supertraits in the bounds.
    if node.kind() == "trait_item" {
        if let Some(bounds) = child_of_kind(node, "trait_bounds") {
            let mut cursor = bounds.walk();
            for target in bounds.named_children(&mut cursor) {
                if matches!(target.kind(), "type_identifier" | "scoped_type_identifier") {
                    push_heritage(&mut refs, EdgeKind::Extends, target, src);
                }
            }
        }
    }
    refs
}

fn rust_import_name(node: Node, src: &[u8]) -> Option<String> {
    node.child_by_field_name("argument")
        .map(|a| node_text(a, src))
}

fn rust_visibility(node: Node, src: &[u8]) -> Option<Visibility> {
    match child_of_kind(node, "visibility_modifier") {
        Some(vis) => {
            let text = node_text(vis, src);
            if text == "pub" {
                Some(Visibility::Public)
            } else {
                // pub(crate), pub(super), pub(in ...)
                Some(Visibility::Internal)
            }
        }
        None => Some(Visibility::Private),
    }
}

fn rust_is_exported(node: Node, src: &[u8], _name: &str) -> bool {
    matches!(rust_visibility(node, src), Some(Visibility::Public))
}

fn rust_is_async(node: Node, src: &[u8]) -> bool {
    keyword_child(node, src, "async")
}

static RUST_RULES: LanguageRules = LanguageRules {
    language: Language::Rust,
    function_types: &["function_item"],
    method_types: &[],
    class_types: &[],
    interface_types: &[],
    trait_types: &["trait_item"],
    struct_types: &["struct_item"],
    enum_types: &["enum_item"],
    module_types: &["mod_item"],
    scope_types: &["impl_item"],
    import_types: &["use_declaration"],
    call_types: &["call_expression"],
    field_types: &["field_declaration"],
    property_types: &[],
    enum_member_types: &["enum_variant"],
    enum_body_types: &["enum_variant_list"],
    name_field: "name",
    body_field: "body",
    params_field: "parameters",
    return_type_field: "return_type",
    return_sep: " -> ",
    scope_name_field: "type",
    comment_types: &["line_comment", "block_comment"],
    specialize: None,
    heritage: Some(rust_heritage),
    callee_name: default_callee_name,
    import_name: rust_import_name,
    visibility: Some(rust_visibility),
    is_exported: Some(rust_is_exported),
    is_async: Some(rust_is_async),
    is_static: None,
    docstring: None,
};

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

fn go_specialize(node: Node) -> Option<NodeKind> {
    // A type_spec is a struct, an interface, or a plain alias, depending on
    // the declared type.
    let declared = node.child_by_field_name("type")?;
    match declared.kind() {
        "struct_type" => Some(NodeKind::Struct),
        "interface_type" => Some(NodeKind::Interface),
        _ => Some(NodeKind::TypeAlias),
    }
}

fn go_import_name(node: Node, src: &[u8]) -> Option<String> {
    node.child_by_field_name("path")
        .map(|p| strip_quotes(&node_text(p, src)))
}

fn go_is_exported(_node: Node, _src: &[u8], name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn go_visibility(node: Node, src: &[u8]) -> Option<Visibility> {
    let name = node.child_by_field_name("name")?;
    if node_text(name, src)
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase())
    {
        Some(Visibility::Public)
    } else {
        Some(Visibility::Internal)
    }
}

static GO_RULES: LanguageRules = LanguageRules {
    language: Language::Go,
    function_types: &["function_declaration"],
    method_types: &["method_declaration"],
    class_types: &[],
    interface_types: &[],
    trait_types: &[],
    struct_types: &["type_spec"],
    enum_types: &[],
    module_types: &[],
    scope_types: &[],
    import_types: &["import_spec"],
    call_types: &["call_expression"],
    field_types: &["field_declaration"],
    property_types: &[],
    enum_member_types: &[],
    enum_body_types: &[],
    name_field: "name",
    body_field: "body",
    params_field: "parameters",
    return_type_field: "result",
    return_sep: " ",
    scope_name_field: "name",
    comment_types: &["comment"],
    specialize: Some(go_specialize),
    heritage: None,
    callee_name: default_callee_name,
    import_name: go_import_name,
    visibility: Some(go_visibility),
    is_exported: Some(go_is_exported),
    is_async: None,
    is_static: None,
    docstring: None,
};

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn java_heritage(node: Node, src: &[u8]) -> Vec<HeritageRef> {
    let mut refs = Vec::new();
    if let Some(superclass) = node.child_by_field_name("superclass") {
        let mut cursor = superclass.walk();
        for target in superclass.named_children(&mut cursor) {
            push_heritage(&mut refs, EdgeKind::Extends, target, src);
        }
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        // super_interfaces > type_list > types
        let mut cursor = interfaces.walk();
        for list in interfaces.named_children(&mut cursor) {
            let mut c2 = list.walk();
            for target in list.named_children(&mut c2) {
                push_heritage(&mut refs, EdgeKind::Implements, target, src);
            }
        }
    }
    refs
}

fn java_import_name(node: Node, src: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| node_text(c, src));
    found
}

fn java_callee_name(node: Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "method_invocation" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, src)),
        "object_creation_expression" => node
            .child_by_field_name("type")
            .map(|t| node_text(t, src)),
        _ => default_callee_name(node, src),
    }
}

fn java_modifier(node: Node, src: &[u8], modifier: &str) -> bool {
    match child_of_kind(node, "modifiers") {
        Some(modifiers) => node_text(modifiers, src)
            .split_whitespace()
            .any(|m| m == modifier),
        None => false,
    }
}

fn java_visibility(node: Node, src: &[u8]) -> Option<Visibility> {
    if java_modifier(node, src, "public") {
        Some(Visibility::Public)
    } else if java_modifier(node, src, "private") {
        Some(Visibility::Private)
    } else if java_modifier(node, src, "protected") {
        Some(Visibility::Protected)
    } else {
        Some(Visibility::Internal)
    }
}

fn java_is_exported(node: Node, src: &[u8], _name: &str) -> bool {
    java_modifier(node, src, "public")
}

fn java_is_static(node: Node, src: &[u8]) -> bool {
    java_modifier(node, src, "static")
}

static JAVA_RULES: LanguageRules = LanguageRules {
    language: Language::Java,
    function_types: &[],
    method_types: &["method_declaration", "constructor_declaration"],
    class_types: &["class_declaration"],
    interface_types: &["interface_declaration"],
    trait_types: &[],
    struct_types: &[],
    enum_types: &["enum_declaration"],
    module_types: &[],
    scope_types: &[],
    import_types: &["import_declaration"],
    call_types: &["method_invocation", "object_creation_expression"],
    field_types: &["field_declaration"],
    property_types: &[],
    enum_member_types: &["enum_constant"],
    enum_body_types: &["enum_body"],
    name_field: "name",
    body_field: "body",
    params_field: "parameters",
    return_type_field: "type",
    return_sep: ": ",
    scope_name_field: "name",
    comment_types: &["line_comment", "block_comment"],
    specialize: None,
    heritage: Some(java_heritage),
    callee_name: java_callee_name,
    import_name: java_import_name,
    visibility: Some(java_visibility),
    is_exported: Some(java_is_exported),
    is_async: None,
    is_static: Some(java_is_static),
    docstring: None,
};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The structural role a syntax node plays during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Definition(NodeKind),
    Scope,
    Import,
    Call,
}

impl LanguageRules {
    /// Classify a concrete syntax node, or `None` for nodes the extractor
    /// only recurses through.
    pub fn classify(&self, node: Node) -> Option<NodeRole> {
        let kind = node.kind();
        if self.import_types.contains(&kind) {
            return Some(NodeRole::Import);
        }
        if self.call_types.contains(&kind) {
            return Some(NodeRole::Call);
        }
        if self.method_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Method));
        }
        if self.class_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Class));
        }
        if self.interface_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Interface));
        }
        if self.trait_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Trait));
        }
        if self.struct_types.contains(&kind) {
            let refined = self
                .specialize
                .and_then(|f| f(node))
                .unwrap_or(NodeKind::Struct);
            return Some(NodeRole::Definition(refined));
        }
        if self.enum_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Enum));
        }
        if self.module_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Module));
        }
        if self.function_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Function));
        }
        if self.scope_types.contains(&kind) {
            return Some(NodeRole::Scope);
        }
        if self.field_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Field));
        }
        if self.property_types.contains(&kind) {
            return Some(NodeRole::Definition(NodeKind::Property));
        }
        if self.enum_member_types.contains(&kind) {
            let parent_is_enum_body = node
                .parent()
                .map(|p| self.enum_body_types.contains(&p.kind()))
                .unwrap_or(false);
            if parent_is_enum_body {
                return Some(NodeRole::Definition(NodeKind::EnumMember));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
