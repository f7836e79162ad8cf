//! Indexing pipeline.
//!
//! Orchestrates scan → read → extract → store. File reads inside a batch
//! are issued in parallel; extraction and store writes stay sequential, so
//! no transaction is ever held across a file read. Each file commits in one
//! transaction: stale delete, node/edge/ref inserts, file record upsert.
//! A cooperative cancellation flag is probed between batches and between
//! files; cancellation yields a partial result flagged unsuccessful with
//! every committed transaction intact.

pub mod extractor;
pub mod registry;
pub mod rules;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::observability::resolve_within_root;
use crate::scanner::{detect_language, FileScanner};
use crate::types::{
    sha256_hex, unix_now, CodeEdge, FileRecord, NodeKind, UnresolvedRef,
    UNRESOLVED_TARGET_PREFIX,
};

pub use extractor::Extractor;
pub use registry::GrammarRegistry;

/// Files whose reads are issued together.
pub const BATCH_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Progress & cancellation
// ---------------------------------------------------------------------------

/// Pipeline phases reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Parsing,
    Storing,
    Resolving,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Parsing => "parsing",
            Self::Storing => "storing",
            Self::Resolving => "resolving",
        }
    }
}

/// `progress(phase, current, total, current_file)`.
pub type ProgressFn = dyn Fn(Phase, usize, usize, Option<&str>) + Send + Sync;

/// Cooperative cancellation probe. Cloneable; all clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// IndexResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct IndexResult {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub nodes_created: usize,
    pub edges_created: usize,
    pub refs_resolved: usize,
    pub errors: Vec<String>,
    pub duration_ms: u128,
    /// False when the run was cancelled before completing.
    pub success: bool,
}

impl std::fmt::Display for IndexResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "indexed {} files ({} skipped, {} failed): {} nodes, {} edges in {}ms",
            self.files_indexed,
            self.files_skipped,
            self.files_failed,
            self.nodes_created,
            self.edges_created,
            self.duration_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// Indexer
// ---------------------------------------------------------------------------

pub struct Indexer<'a> {
    store: &'a GraphStore,
    registry: GrammarRegistry,
    root: PathBuf,
    config: ProjectConfig,
    progress: Option<Box<ProgressFn>>,
    cancel: CancelFlag,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a GraphStore, root: &Path, config: ProjectConfig) -> Self {
        Self {
            store,
            registry: GrammarRegistry::new(),
            root: root.to_path_buf(),
            config,
            progress: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Install a progress callback.
    pub fn with_progress(
        mut self,
        progress: impl Fn(Phase, usize, usize, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn report(&self, phase: Phase, current: usize, total: usize, file: Option<&str>) {
        if let Some(ref progress) = self.progress {
            progress(phase, current, total, file);
        }
    }

    /// Index every indexable file under the project root.
    pub fn index_all(&self) -> Result<IndexResult> {
        self.report(Phase::Scanning, 0, 0, None);
        let scanner = FileScanner::new(&self.root, &self.config)?;
        let paths = scanner.scan()?;
        self.index_paths(&paths)
    }

    /// Index only the given relative paths. Equivalent to `index_all`
    /// restricted to the list, provided nothing else changed.
    pub fn index_files(&self, paths: &[String]) -> Result<IndexResult> {
        let scanner = FileScanner::new(&self.root, &self.config)?;
        let mut result_errors = Vec::new();
        let indexable: Vec<String> = paths
            .iter()
            .filter(|path| match resolve_within_root(&self.root, path) {
                Ok(_) => true,
                Err(e) => {
                    result_errors.push(e.to_string());
                    false
                }
            })
            .filter(|path| scanner.is_indexable(path))
            .cloned()
            .collect();

        let mut result = self.index_paths(&indexable)?;
        result.errors.extend(result_errors);
        Ok(result)
    }

    // -------------------------------------------------------------------
    // Core loop
    // -------------------------------------------------------------------

    fn index_paths(&self, paths: &[String]) -> Result<IndexResult> {
        let started = Instant::now();
        let mut result = IndexResult {
            success: true,
            ..Default::default()
        };
        let extractor = Extractor::new(&self.registry);
        let total = paths.len();
        let mut position = 0usize;
        let mut stored_paths: Vec<String> = Vec::new();
        // The parallel section must not touch the store: the connection is
        // single-threaded. Reads only capture the project root.
        let root = self.root.clone();

        'batches: for batch in paths.chunks(BATCH_SIZE) {
            if self.cancel.is_cancelled() {
                result.success = false;
                break;
            }

            // Read the whole batch in parallel; everything after is
            // sequential.
            let contents: Vec<(String, std::io::Result<(String, u64, i64)>)> = batch
                .par_iter()
                .map(|path| (path.clone(), read_file(&root, path)))
                .collect();

            for (path, read) in contents {
                position += 1;
                if self.cancel.is_cancelled() {
                    result.success = false;
                    break 'batches;
                }
                self.report(Phase::Parsing, position, total, Some(&path));

                let (source, size, modified_at) = match read {
                    Ok(parts) => parts,
                    Err(e) => {
                        result.files_failed += 1;
                        let message = format!("{path}: {e}");
                        tracing::warn!("{message}");
                        result.errors.push(message);
                        continue;
                    }
                };

                let Some(language) = detect_language(&path) else {
                    result.files_skipped += 1;
                    continue;
                };
                if size > self.config.max_file_size {
                    tracing::warn!(path = %path, size, "skipping oversized file");
                    result.files_skipped += 1;
                    continue;
                }

                let content_hash = sha256_hex(source.as_bytes());
                let existing = self.store.get_file_by_path(&path)?;
                if existing
                    .as_ref()
                    .is_some_and(|record| record.content_hash == content_hash)
                {
                    result.files_skipped += 1;
                    continue;
                }

                let extraction = extractor.extract(&path, &source, language);
                for error in &extraction.errors {
                    tracing::warn!("{error}");
                    result.errors.push(error.clone());
                }

                self.report(Phase::Storing, position, total, Some(&path));
                let record = FileRecord {
                    path: path.clone(),
                    content_hash,
                    language,
                    size,
                    modified_at,
                    indexed_at: unix_now(),
                    node_count: extraction.nodes.len(),
                    errors: if extraction.errors.is_empty() {
                        None
                    } else {
                        Some(extraction.errors.join("; "))
                    },
                };

                let stale = existing.is_some();
                let stored = self.store.transaction(|store| {
                    if stale {
                        store.delete_file(&path)?;
                    }
                    store.upsert_file(&record)?;
                    store.insert_nodes(&extraction.nodes)?;
                    store.insert_edges(&extraction.edges)?;
                    // Pending references also surface as dangling edges so
                    // the graph model is complete before resolution runs.
                    let dangling: Vec<CodeEdge> = extraction
                        .unresolved_refs
                        .iter()
                        .map(|r| {
                            CodeEdge::unresolved(
                                &r.from_node_id,
                                &r.reference_name,
                                r.reference_kind,
                                r.line,
                            )
                        })
                        .collect();
                    store.insert_edges(&dangling)?;
                    store.insert_unresolved_refs(&extraction.unresolved_refs)?;
                    Ok(())
                });

                match stored {
                    Ok(()) => {
                        result.files_indexed += 1;
                        result.nodes_created += extraction.nodes.len();
                        result.edges_created += extraction.edges.len();
                        stored_paths.push(path);
                    }
                    Err(e) => {
                        result.files_failed += 1;
                        let message = format!("{path}: {e}");
                        tracing::warn!("{message}");
                        result.errors.push(message);
                    }
                }
            }
        }

        if result.success {
            result.refs_resolved = self.resolve_pending(&stored_paths, total)?;
        }

        result.duration_ms = started.elapsed().as_millis();
        Ok(result)
    }

    // -------------------------------------------------------------------
    // Resolution pass
    // -------------------------------------------------------------------

    /// Try to upgrade pending references from freshly indexed files into
    /// resolved edges against the whole store. Unresolvable names stay
    /// pending; they are an expected outcome, not an error.
    fn resolve_pending(&self, paths: &[String], total: usize) -> Result<usize> {
        let mut resolved = 0usize;
        for (current, path) in paths.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.report(Phase::Resolving, current + 1, total, Some(path));

            let refs = self.store.get_unresolved_refs_for_file(path)?;
            if refs.is_empty() {
                continue;
            }
            self.store.transaction(|store| {
                for r in &refs {
                    if let Some(target_id) = self.resolve_target(store, r)? {
                        store.delete_edge(
                            &r.from_node_id,
                            &format!("{UNRESOLVED_TARGET_PREFIX}{}", r.reference_name),
                            r.reference_kind.as_str(),
                            r.line,
                        )?;
                        store.insert_edges(&[CodeEdge::resolved(
                            &r.from_node_id,
                            &target_id,
                            r.reference_kind,
                            r.line,
                        )])?;
                        store.delete_unresolved_ref(r)?;
                        resolved += 1;
                    }
                }
                Ok(())
            })?;
        }
        Ok(resolved)
    }

    /// Match a pending reference against stored nodes by bare name, with a
    /// kind preference per reference kind. First candidate in id order wins
    /// for determinism.
    fn resolve_target(&self, store: &GraphStore, r: &UnresolvedRef) -> Result<Option<String>> {
        let bare = r
            .reference_name
            .rsplit("::")
            .next()
            .unwrap_or(&r.reference_name);
        let bare = bare.rsplit('.').next().unwrap_or(bare);
        if bare.is_empty() {
            return Ok(None);
        }

        let candidates = store.get_nodes_by_name(bare)?;
        let preferred = candidates.iter().find(|n| {
            use crate::types::EdgeKind::*;
            match r.reference_kind {
                Calls => matches!(n.kind, NodeKind::Function | NodeKind::Method),
                Extends | Implements => matches!(
                    n.kind,
                    NodeKind::Class
                        | NodeKind::Interface
                        | NodeKind::Trait
                        | NodeKind::Struct
                        | NodeKind::Enum
                        | NodeKind::Component
                ),
                Imports => matches!(
                    n.kind,
                    NodeKind::File | NodeKind::Module | NodeKind::Component
                ),
                _ => true,
            }
        });
        // A call naming a type is an instantiation; accept the type when
        // no callable matched.
        let preferred = preferred.or_else(|| {
            if r.reference_kind == crate::types::EdgeKind::Calls {
                candidates.iter().find(|n| {
                    matches!(n.kind, NodeKind::Class | NodeKind::Struct | NodeKind::Component)
                })
            } else {
                None
            }
        });
        Ok(preferred
            .filter(|n| n.id != r.from_node_id)
            .map(|n| n.id.clone()))
    }
}

fn read_file(root: &Path, relative: &str) -> std::io::Result<(String, u64, i64)> {
    let path = root.join(relative);
    let metadata = std::fs::metadata(&path)?;
    let source = std::fs::read_to_string(&path)?;
    let modified_at = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok((source, metadata.len(), modified_at))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
