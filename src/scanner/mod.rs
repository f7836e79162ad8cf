//! File discovery.
//!
//! The scanner produces the set of indexable paths (relative to the project
//! root) consistent with the project configuration. Projects under version
//! control use a `git ls-files` fast path, which inherits ignore rules at
//! every level; everything else goes through a filesystem walk that honors
//! the `.atlasignore` marker, exclude globs, and symlink cycles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::{ProjectConfig, IGNORE_MARKER};
use crate::error::{AtlasError, Result};
use crate::types::Language;

/// Upper bound on a VCS subprocess before falling back to the walk.
const GIT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// FileScanner
// ---------------------------------------------------------------------------

pub struct FileScanner {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    max_file_size: u64,
}

impl FileScanner {
    /// Build a scanner for `root` using the project's include/exclude
    /// patterns. Malformed globs are config errors.
    pub fn new(root: &Path, config: &ProjectConfig) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            include: build_glob_set(&config.include)?,
            exclude: build_glob_set(&config.exclude)?,
            max_file_size: config.max_file_size,
        })
    }

    /// Enumerate indexable files, relative to the root.
    ///
    /// Tries the VCS fast path first; any failure (not a repository, git
    /// missing, timeout) falls back to the filesystem walk.
    pub fn scan(&self) -> Result<Vec<String>> {
        if let Some(paths) = self.scan_git() {
            return Ok(paths);
        }
        self.scan_walk()
    }

    /// Whether `relative` is an indexable file under the current
    /// configuration (language known, not excluded, within the size cap).
    pub fn is_indexable(&self, relative: &str) -> bool {
        if detect_language(relative).is_none() {
            return false;
        }
        if self.is_excluded(relative) {
            return false;
        }
        if !self.include.is_match(relative) {
            return false;
        }
        match std::fs::metadata(self.root.join(relative)) {
            Ok(meta) if meta.is_file() => {
                if meta.len() > self.max_file_size {
                    tracing::warn!(
                        path = relative,
                        size = meta.len(),
                        "skipping file over max_file_size"
                    );
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    // -------------------------------------------------------------------
    // VCS fast path
    // -------------------------------------------------------------------

    /// Ask git for tracked plus untracked-but-not-ignored files. Returns
    /// `None` when the fast path is unavailable.
    fn scan_git(&self) -> Option<Vec<String>> {
        if !self.root.join(".git").exists() {
            return None;
        }

        let output = run_with_timeout(
            Command::new("git")
                .arg("-C")
                .arg(&self.root)
                .args(["ls-files", "--cached", "--others", "--exclude-standard"]),
            GIT_TIMEOUT,
        )?;

        let mut paths: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| self.is_indexable(line))
            .map(str::to_string)
            .collect();
        paths.sort();
        paths.dedup();
        Some(paths)
    }

    // -------------------------------------------------------------------
    // Filesystem fallback
    // -------------------------------------------------------------------

    /// Depth-first walk from the root. Skips `.atlasignore`-marked
    /// directories and excluded paths, resolves symlinks, and breaks
    /// cycles with a visited set of real directory paths.
    fn scan_walk(&self) -> Result<Vec<String>> {
        let mut files: Vec<String> = Vec::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();

        if let Ok(real_root) = self.root.canonicalize() {
            visited.insert(real_root);
        }
        self.walk_dir(&self.root, &mut visited, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn walk_dir(
        &self,
        dir: &Path,
        visited: &mut HashSet<PathBuf>,
        files: &mut Vec<String>,
    ) -> Result<()> {
        if dir.join(IGNORE_MARKER).exists() {
            tracing::debug!(dir = %dir.display(), "skipping marked directory");
            return Ok(());
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot read directory");
                return Ok(());
            }
        };

        let mut children: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        children.sort();

        for child in children {
            let relative = match child.strip_prefix(&self.root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            // Hidden bookkeeping directories never get indexed.
            if relative.starts_with('.') || relative.contains("/.") {
                continue;
            }

            let file_type = match std::fs::symlink_metadata(&child) {
                Ok(meta) => meta.file_type(),
                Err(e) => {
                    tracing::warn!(path = %child.display(), error = %e, "cannot stat entry");
                    continue;
                }
            };

            let is_dir = if file_type.is_symlink() {
                // Resolve the link; a broken target is logged and skipped.
                match child.canonicalize() {
                    Ok(real) => {
                        if real.is_dir() {
                            if !visited.insert(real) {
                                tracing::debug!(path = %child.display(), "symlink cycle broken");
                                continue;
                            }
                            true
                        } else {
                            false
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %child.display(), error = %e, "broken symlink");
                        continue;
                    }
                }
            } else if file_type.is_dir() {
                match child.canonicalize() {
                    Ok(real) => {
                        if !visited.insert(real) {
                            continue;
                        }
                    }
                    Err(_) => {}
                }
                true
            } else {
                false
            };

            if is_dir {
                // Excludes match the directory path both bare and with a
                // trailing separator.
                if self.is_excluded(&relative) || self.is_excluded(&format!("{relative}/")) {
                    continue;
                }
                self.walk_dir(&child, visited, files)?;
            } else if self.is_indexable(&relative) {
                files.push(relative);
            }
        }
        Ok(())
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude.is_match(relative)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Detect a path's language from its extension.
pub fn detect_language(path: &str) -> Option<Language> {
    let ext = Path::new(path).extension()?.to_str()?;
    Language::from_extension(&format!(".{ext}"))
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| AtlasError::Config(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AtlasError::Config(format!("cannot build glob set: {e}")))
}

/// Run `command`, capturing stdout, killing the child at `timeout`.
/// Returns `None` on spawn failure, non-zero exit, or timeout.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Option<String> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    // Drain stdout on a separate thread: a child producing more than the
    // pipe buffer would otherwise block and never exit.
    let mut stdout = child.stdout.take()?;
    let reader = std::thread::spawn(move || {
        use std::io::Read;
        let mut buffer = String::new();
        stdout.read_to_string(&mut buffer).ok().map(|_| buffer)
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let output = reader.join().ok().flatten();
                return if status.success() { output } else { None };
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    tracing::warn!("VCS subprocess timed out; falling back");
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => {
                let _ = child.kill();
                let _ = reader.join();
                return None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
