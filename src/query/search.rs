//! Lexical node search and ranking.
//!
//! Scores combine a kind bonus (functions and methods first, routes and
//! components close behind, parameters and files never), path relevance
//! (file name beats directory beats substring), and textual match against
//! name and qualified name. Queries are lowered, stripped of punctuation
//! and stop words, and terms under two characters are dropped. Identifier
//! tokens split on case and underscore boundaries match at half weight.

use serde::Serialize;

use crate::error::Result;
use crate::graph::store::{GraphStore, StoreSearchOptions};
use crate::types::{CodeNode, Language, NodeKind};

// ---------------------------------------------------------------------------
// Options & results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Maximum results (default 20).
    pub limit: Option<usize>,
    pub kinds: Option<Vec<NodeKind>>,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub node: CodeNode,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Scoring pieces
// ---------------------------------------------------------------------------

/// How much a node kind matters in ranking and traversal tie-breaks.
pub fn kind_bonus(kind: NodeKind) -> f64 {
    match kind {
        NodeKind::Function | NodeKind::Method => 10.0,
        NodeKind::Route | NodeKind::Component => 8.0,
        NodeKind::Class
        | NodeKind::Interface
        | NodeKind::Trait
        | NodeKind::Struct
        | NodeKind::Enum => 6.0,
        NodeKind::Module | NodeKind::Namespace | NodeKind::Protocol => 4.0,
        NodeKind::TypeAlias | NodeKind::Constant | NodeKind::Export => 3.0,
        NodeKind::Variable
        | NodeKind::Property
        | NodeKind::Field
        | NodeKind::EnumMember
        | NodeKind::Import => 1.0,
        NodeKind::Parameter | NodeKind::File => 0.0,
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "bug", "but", "by", "can", "do", "en", "fix",
    "for", "from", "how", "i", "in", "is", "issue", "it", "make", "my", "of", "on", "or",
    "our", "should", "that", "the", "this", "to", "we", "what", "when", "where", "which",
    "why", "with", "you",
];

/// Lower, strip punctuation, drop stop words and sub-2-char terms.
pub fn extract_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in text.split_whitespace() {
        let cleaned: String = raw
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
            .collect();
        for piece in cleaned.split_whitespace() {
            let term = piece.to_lowercase();
            if term.len() < 2 {
                continue;
            }
            if STOP_WORDS.contains(&term.as_str()) {
                continue;
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

/// Split an identifier into lowercase tokens on case, underscore, and dash
/// boundaries: `getUserById` → [get, user, by, id].
pub fn split_identifier(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' || c == '-' || c == '.' {
            if !current.is_empty() {
                tokens.push(current.to_lowercase());
                current = String::new();
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(current.to_lowercase());
            current = String::new();
        }
        prev_lower = c.is_lowercase();
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current.to_lowercase());
    }
    tokens
}

/// Score one node against the extracted terms. Zero means "no match".
pub fn score_node(node: &CodeNode, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let name = node.name.to_lowercase();
    let qualified = node.qualified_name.to_lowercase();
    let path = node.file_path.to_lowercase();
    let file_name = std::path::Path::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tokens = split_identifier(&node.name);

    let mut text_score = 0.0;
    let mut matched = false;

    for term in terms {
        if name == *term {
            text_score += 10.0;
            matched = true;
        } else if name.starts_with(term.as_str()) {
            text_score += 6.0;
            matched = true;
        } else if tokens.iter().any(|t| t == term) {
            // Camel/snake token hits count at half the exact-match weight.
            text_score += 5.0;
            matched = true;
        } else if name.contains(term.as_str()) {
            text_score += 4.0;
            matched = true;
        } else if qualified.contains(term.as_str()) {
            text_score += 2.0;
            matched = true;
        }

        // Path relevance: file name beats directory beats bare substring.
        if file_name.contains(term.as_str()) {
            text_score += 3.0;
            matched = true;
        } else if path
            .split('/')
            .rev()
            .skip(1)
            .any(|dir| dir.contains(term.as_str()))
        {
            text_score += 2.0;
            matched = true;
        } else if path.contains(term.as_str()) {
            text_score += 1.0;
            matched = true;
        }
    }

    if !matched {
        return 0.0;
    }
    text_score + kind_bonus(node.kind)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Lexical search: candidate collection through the store's full-text
/// index, then in-memory ranking with deterministic tie-breaks.
pub fn search_nodes(
    store: &GraphStore,
    text: &str,
    options: &SearchOptions,
) -> Result<Vec<ScoredNode>> {
    let limit = options.limit.unwrap_or(20);
    let terms = extract_terms(text);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    // Generous candidate pool: each term contributes matches.
    let mut candidates: Vec<CodeNode> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let store_options = StoreSearchOptions {
        limit: Some((limit * 5).max(50)),
        ..Default::default()
    };
    for term in &terms {
        for node in store.search_nodes(term, &store_options)? {
            if seen.insert(node.id.clone()) {
                candidates.push(node);
            }
        }
        // FTS tokenizes whole identifiers, so camelCase fragments need a
        // substring pass too.
        for node in store.find_nodes_containing(term, (limit * 5).max(50))? {
            if seen.insert(node.id.clone()) {
                candidates.push(node);
            }
        }
    }

    let mut scored: Vec<ScoredNode> = candidates
        .into_iter()
        .filter(|node| {
            options
                .kinds
                .as_ref()
                .map(|kinds| kinds.contains(&node.kind))
                .unwrap_or(true)
        })
        .filter(|node| {
            options
                .language
                .map(|language| node.language == language)
                .unwrap_or(true)
        })
        .filter_map(|node| {
            let score = score_node(&node, &terms);
            if score > 0.0 {
                Some(ScoredNode { node, score })
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                kind_bonus(b.node.kind)
                    .partial_cmp(&kind_bonus(a.node.kind))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.node.file_path.len().cmp(&b.node.file_path.len()))
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
    scored.truncate(limit);
    Ok(scored)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{make_node_id, make_qualified_name, unix_now, FileRecord};

    fn setup() -> GraphStore {
        GraphStore::open_in_memory().unwrap()
    }

    fn seed(store: &GraphStore, name: &str, file: &str, kind: NodeKind) -> String {
        if store.get_file_by_path(file).unwrap().is_none() {
            store
                .upsert_file(&FileRecord {
                    path: file.to_string(),
                    content_hash: format!("h-{file}"),
                    language: Language::TypeScript,
                    size: 0,
                    modified_at: 0,
                    indexed_at: 0,
                    node_count: 0,
                    errors: None,
                })
                .unwrap();
        }
        let node = CodeNode {
            id: make_node_id(kind, file, name, 1),
            kind,
            name: name.to_string(),
            qualified_name: make_qualified_name(file, &[], name),
            file_path: file.to_string(),
            language: Language::TypeScript,
            start_line: 1,
            end_line: 3,
            start_column: 0,
            end_column: 0,
            signature: None,
            docstring: None,
            code_snippet: None,
            code_hash: None,
            visibility: None,
            is_exported: true,
            is_async: false,
            is_static: false,
            metadata: None,
            updated_at: unix_now(),
        };
        let id = node.id.clone();
        store.insert_nodes(&[node]).unwrap();
        id
    }

    // -- term extraction ----------------------------------------------------

    #[test]
    fn extract_terms_removes_stop_words_and_short_terms() {
        let terms = extract_terms("fix the login bug in a handler!");
        assert_eq!(terms, vec!["login".to_string(), "handler".to_string()]);
    }

    #[test]
    fn extract_terms_strips_punctuation() {
        let terms = extract_terms("AuthService.login()");
        assert_eq!(
            terms,
            vec!["authservice".to_string(), "login".to_string()]
        );
    }

    #[test]
    fn extract_terms_dedups() {
        let terms = extract_terms("login login LOGIN");
        assert_eq!(terms, vec!["login".to_string()]);
    }

    // -- identifier splitting -----------------------------------------------

    #[test]
    fn split_identifier_handles_camel_and_snake() {
        assert_eq!(
            split_identifier("getUserById"),
            vec!["get", "user", "by", "id"]
        );
        assert_eq!(
            split_identifier("verify_password"),
            vec!["verify", "password"]
        );
        assert_eq!(split_identifier("HTTPServer"), vec!["httpserver"]);
    }

    // -- scoring ------------------------------------------------------------

    #[test]
    fn functions_outrank_variables_for_the_same_name() {
        let store = setup();
        seed(&store, "login", "src/auth.ts", NodeKind::Function);
        seed(&store, "login", "src/other.ts", NodeKind::Variable);

        let results = search_nodes(&store, "login", &SearchOptions::default()).unwrap();
        assert_eq!(results[0].node.kind, NodeKind::Function);
    }

    #[test]
    fn exact_name_beats_substring() {
        let store = setup();
        seed(&store, "login", "src/a.ts", NodeKind::Function);
        seed(&store, "loginHandler", "src/b.ts", NodeKind::Function);

        let results = search_nodes(&store, "login", &SearchOptions::default()).unwrap();
        assert_eq!(results[0].node.name, "login");
    }

    #[test]
    fn camel_case_tokens_match_at_half_weight() {
        let node_name = "getUserById";
        let store = setup();
        seed(&store, node_name, "src/users.ts", NodeKind::Function);

        let results = search_nodes(&store, "user", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node.name, node_name);
    }

    #[test]
    fn parameters_and_files_score_zero_bonus() {
        assert_eq!(kind_bonus(NodeKind::Parameter), 0.0);
        assert_eq!(kind_bonus(NodeKind::File), 0.0);
        assert!(kind_bonus(NodeKind::Function) > kind_bonus(NodeKind::Class));
        assert!(kind_bonus(NodeKind::Route) > kind_bonus(NodeKind::Class));
    }

    #[test]
    fn stop_word_only_query_returns_empty() {
        let store = setup();
        seed(&store, "the_thing", "src/a.ts", NodeKind::Function);
        let results = search_nodes(&store, "the in of", &SearchOptions::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn kind_and_language_filters_apply() {
        let store = setup();
        seed(&store, "pay", "src/pay.ts", NodeKind::Function);
        seed(&store, "pay", "src/pay2.ts", NodeKind::Class);

        let results = search_nodes(
            &store,
            "pay",
            &SearchOptions {
                kinds: Some(vec![NodeKind::Class]),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(results.iter().all(|r| r.node.kind == NodeKind::Class));

        let none = search_nodes(
            &store,
            "pay",
            &SearchOptions {
                language: Some(Language::Python),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn results_are_limited_and_deterministic() {
        let store = setup();
        for i in 0..30 {
            seed(
                &store,
                &format!("handler{i}"),
                "src/handlers.ts",
                NodeKind::Function,
            );
        }

        let limited = search_nodes(
            &store,
            "handler",
            &SearchOptions {
                limit: Some(10),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(limited.len(), 10);

        let again = search_nodes(
            &store,
            "handler",
            &SearchOptions {
                limit: Some(10),
                ..Default::default()
            },
        )
        .unwrap();
        let ids_a: Vec<&String> = limited.iter().map(|r| &r.node.id).collect();
        let ids_b: Vec<&String> = again.iter().map(|r| &r.node.id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
