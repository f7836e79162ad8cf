//! Grammar registry: extension detection and cached parser loading.
//!
//! Grammars are linked statically, but loading one into a parser can still
//! fail on an ABI version mismatch between the grammar crate and the
//! tree-sitter runtime. Loads are attempted once per language; a failure is
//! warned once and memoized, and later lookups return "unavailable" without
//! retrying. Regex-based languages have no tree parser and are reported as
//! supported anyway.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::scanner::detect_language;
use crate::types::Language;

// ---------------------------------------------------------------------------
// GrammarRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct GrammarRegistry {
    cache: Mutex<HashMap<Language, Option<tree_sitter::Language>>>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect the language for a path. Pure function over the extension.
    pub fn detect_language(&self, path: &str) -> Option<Language> {
        detect_language(path)
    }

    /// Whether extraction exists for this language at all (including
    /// regex-based languages without a tree parser).
    pub fn is_supported(&self, _language: Language) -> bool {
        // Every Language variant has either a grammar or a regex extractor.
        true
    }

    /// The tree-sitter grammar for `language`, loaded and verified at most
    /// once. `None` for regex-based languages and for grammars that failed
    /// to load on this host.
    pub fn get_parser(&self, language: Language) -> Option<tree_sitter::Language> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(language)
            .or_insert_with(|| load_grammar(language))
            .clone()
    }

    /// Build a parser ready to parse `language`, or `None` when the
    /// grammar is unavailable.
    pub fn make_parser(&self, language: Language) -> Option<tree_sitter::Parser> {
        let grammar = self.get_parser(language)?;
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&grammar).ok()?;
        Some(parser)
    }
}

/// Load and verify the grammar for `language`. Verification runs
/// `set_language` once so an ABI mismatch surfaces here, not mid-index.
fn load_grammar(language: Language) -> Option<tree_sitter::Language> {
    let grammar: tree_sitter::Language = match language {
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::JavaScript | Language::Jsx => tree_sitter_javascript::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::Vue => return None,
    };

    let mut probe = tree_sitter::Parser::new();
    if let Err(e) = probe.set_language(&grammar) {
        tracing::warn!(
            language = language.as_str(),
            error = %e,
            "grammar unavailable on this host; files will be skipped"
        );
        return None;
    }
    Some(grammar)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_delegates_to_extension_map() {
        let registry = GrammarRegistry::new();
        assert_eq!(
            registry.detect_language("src/app.tsx"),
            Some(Language::Tsx)
        );
        assert_eq!(registry.detect_language("src/app.unknown"), None);
    }

    #[test]
    fn tree_languages_have_parsers() {
        let registry = GrammarRegistry::new();
        for lang in [
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Python,
            Language::Rust,
            Language::Go,
            Language::Java,
        ] {
            assert!(registry.get_parser(lang).is_some(), "{lang} should load");
            assert!(registry.make_parser(lang).is_some());
        }
    }

    #[test]
    fn vue_is_supported_without_a_tree_parser() {
        let registry = GrammarRegistry::new();
        assert!(registry.is_supported(Language::Vue));
        assert!(registry.get_parser(Language::Vue).is_none());
    }

    #[test]
    fn parser_loads_are_cached() {
        let registry = GrammarRegistry::new();
        let first = registry.get_parser(Language::TypeScript);
        let second = registry.get_parser(Language::TypeScript);
        assert_eq!(first.is_some(), second.is_some());
        assert_eq!(registry.cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn parse_smoke_test() {
        let registry = GrammarRegistry::new();
        let mut parser = registry.make_parser(Language::TypeScript).unwrap();
        let tree = parser.parse("export function hi() {}", None).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
        assert!(!tree.root_node().has_error());
    }
}
