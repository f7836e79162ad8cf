//! Structured logging setup and path-safety helpers.

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::error::{AtlasError, Result};

/// Initialize structured logging with `RUST_LOG` support.
///
/// Defaults to `codeatlas=info` when `RUST_LOG` is not set. Call once at
/// program startup; repeated calls are ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeatlas=info"));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve `relative` against `root` and reject results that escape it.
///
/// Both a lexical check and realpath resolution are applied, so symlinks
/// pointing outside the project root are caught as well.
pub fn resolve_within_root(root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = root.join(relative);

    // Lexical check: a path with enough `..` components escapes before the
    // filesystem is ever consulted.
    let mut depth: i32 = 0;
    for component in Path::new(relative).components() {
        match component {
            std::path::Component::ParentDir => depth -= 1,
            std::path::Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return Err(AtlasError::file(
                relative,
                "path escapes the project root",
            ));
        }
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| AtlasError::file(root, format!("cannot resolve project root: {e}")))?;
    let canonical = candidate
        .canonicalize()
        .map_err(|e| AtlasError::file(&candidate, format!("cannot resolve path: {e}")))?;

    if !canonical.starts_with(&canonical_root) {
        return Err(AtlasError::file(
            relative,
            "path escapes the project root",
        ));
    }

    Ok(canonical)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
