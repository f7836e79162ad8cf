//! Incremental sync: reconcile the store with the filesystem.
//!
//! The fast path parses VCS status into added / modified / deleted sets;
//! the fallback rescans the tree and diffs it against the file records.
//! Hash comparison decides what actually gets re-extracted, so touching a
//! file without changing it is free.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::indexer::{CancelFlag, Indexer};
use crate::scanner::{run_with_timeout, FileScanner};
use crate::types::sha256_hex;

const GIT_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Filesystem divergence from the indexed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangedFiles {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SyncResult {
    pub files_checked: usize,
    pub files_added: usize,
    pub files_modified: usize,
    pub files_removed: usize,
    pub nodes_updated: usize,
    pub duration_ms: u128,
    pub changed_paths: Vec<String>,
}

impl std::fmt::Display for SyncResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "checked {} files: {} added, {} modified, {} removed ({} nodes) in {}ms",
            self.files_checked,
            self.files_added,
            self.files_modified,
            self.files_removed,
            self.nodes_updated,
            self.duration_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

pub struct SyncEngine<'a> {
    store: &'a GraphStore,
    root: PathBuf,
    config: ProjectConfig,
    cancel: CancelFlag,
}

impl<'a> SyncEngine<'a> {
    pub fn new(store: &'a GraphStore, root: &Path, config: ProjectConfig) -> Self {
        Self {
            store,
            root: root.to_path_buf(),
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    // -------------------------------------------------------------------
    // Change detection
    // -------------------------------------------------------------------

    /// Detect added/modified/deleted files, via VCS status when available,
    /// otherwise by a full rescan against the stored file records.
    pub fn get_changed_files(&self) -> Result<ChangedFiles> {
        if let Some(changed) = self.changed_from_git()? {
            return Ok(changed);
        }
        self.changed_from_rescan()
    }

    /// Parse `git status --porcelain`. `None` when the fast path is
    /// unavailable (no repository, git missing, timeout).
    fn changed_from_git(&self) -> Result<Option<ChangedFiles>> {
        if !self.root.join(".git").exists() {
            return Ok(None);
        }
        let Some(output) = run_with_timeout(
            Command::new("git")
                .arg("-C")
                .arg(&self.root)
                .args(["status", "--porcelain"]),
            GIT_STATUS_TIMEOUT,
        ) else {
            return Ok(None);
        };

        let scanner = FileScanner::new(&self.root, &self.config)?;
        let mut changed = ChangedFiles::default();

        for line in output.lines() {
            if line.len() < 4 {
                continue;
            }
            let (status, rest) = line.split_at(2);
            let rest = rest.trim_start();

            // Renames read `old -> new`: the old path is gone, the new one
            // appears.
            if status.contains('R') {
                if let Some((old, new)) = rest.split_once(" -> ") {
                    changed.deleted.push(unquote(old));
                    let new = unquote(new);
                    if scanner.is_indexable(&new) {
                        changed.added.push(new);
                    }
                }
                continue;
            }

            let path = unquote(rest);
            if status.contains('D') {
                changed.deleted.push(path);
            } else if status == "??" {
                // Untracked directories come back as `dir/`; expand them.
                if let Some(dir) = path.strip_suffix('/') {
                    self.collect_untracked_dir(&scanner, dir, &mut changed.added);
                } else if scanner.is_indexable(&path) {
                    changed.added.push(path);
                }
            } else if scanner.is_indexable(&path) {
                changed.modified.push(path);
            }
        }

        // The porcelain output only covers uncommitted divergence; stored
        // files the working tree no longer has must still be caught.
        for record in self.store.get_all_files()? {
            if !self.root.join(&record.path).exists()
                && !changed.deleted.contains(&record.path)
            {
                changed.deleted.push(record.path);
            }
        }

        Ok(Some(changed))
    }

    /// Gather indexable files under an untracked directory.
    fn collect_untracked_dir(
        &self,
        scanner: &FileScanner,
        dir: &str,
        added: &mut Vec<String>,
    ) {
        let mut stack = vec![self.root.join(dir)];
        while let Some(current) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&current) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if scanner.is_indexable(&rel) {
                        added.push(rel);
                    }
                }
            }
        }
    }

    /// Full scan: diff the current indexable set against the file records.
    fn changed_from_rescan(&self) -> Result<ChangedFiles> {
        let scanner = FileScanner::new(&self.root, &self.config)?;
        let on_disk = scanner.scan()?;
        let records = self.store.get_all_files()?;

        let mut changed = ChangedFiles::default();
        let known: std::collections::HashMap<&str, &str> = records
            .iter()
            .map(|r| (r.path.as_str(), r.content_hash.as_str()))
            .collect();

        for path in &on_disk {
            match known.get(path.as_str()) {
                None => changed.added.push(path.clone()),
                Some(stored_hash) => {
                    let current = std::fs::read(self.root.join(path))
                        .map(|bytes| sha256_hex(&bytes))
                        .unwrap_or_default();
                    if current != **stored_hash {
                        changed.modified.push(path.clone());
                    }
                }
            }
        }

        let disk_set: std::collections::HashSet<&str> =
            on_disk.iter().map(String::as_str).collect();
        for record in &records {
            if !disk_set.contains(record.path.as_str()) {
                changed.deleted.push(record.path.clone());
            }
        }

        Ok(changed)
    }

    // -------------------------------------------------------------------
    // Sync
    // -------------------------------------------------------------------

    /// Reconcile the store with the filesystem: remove stale subgraphs,
    /// re-index modified files whose content hash actually differs, and
    /// index additions.
    pub fn sync(&self) -> Result<SyncResult> {
        let started = Instant::now();
        let changed = self.get_changed_files()?;
        let mut result = SyncResult::default();
        result.files_checked =
            changed.added.len() + changed.modified.len() + changed.deleted.len();

        // Removals first so renames don't leave stale subgraphs behind.
        for path in &changed.deleted {
            if self.store.get_file_by_path(path)?.is_some() {
                self.store.transaction(|store| store.delete_file(path))?;
                result.files_removed += 1;
                result.changed_paths.push(path.clone());
            }
        }

        // Hash-compare the modified set; unchanged content is not re-indexed.
        let mut to_index: Vec<String> = Vec::new();
        let mut added_set: std::collections::HashSet<String> = std::collections::HashSet::new();
        for path in &changed.added {
            if self.store.get_file_by_path(path)?.is_none() {
                added_set.insert(path.clone());
            }
            to_index.push(path.clone());
        }
        for path in &changed.modified {
            match self.store.get_file_by_path(path)? {
                Some(record) => {
                    let current = std::fs::read(self.root.join(path))
                        .map(|bytes| sha256_hex(&bytes))
                        .unwrap_or_default();
                    if current != record.content_hash {
                        to_index.push(path.clone());
                    }
                }
                None => {
                    added_set.insert(path.clone());
                    to_index.push(path.clone());
                }
            }
        }
        to_index.sort();
        to_index.dedup();

        if !to_index.is_empty() {
            let indexer = Indexer::new(self.store, &self.root, self.config.clone())
                .with_cancel_flag(self.cancel.clone());
            let index_result = indexer.index_files(&to_index)?;
            result.nodes_updated = index_result.nodes_created;

            for path in &to_index {
                if added_set.contains(path) {
                    result.files_added += 1;
                } else {
                    result.files_modified += 1;
                }
                result.changed_paths.push(path.clone());
            }
        }

        result.duration_ms = started.elapsed().as_millis();
        Ok(result)
    }
}

fn unquote(path: &str) -> String {
    path.trim().trim_matches('"').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
