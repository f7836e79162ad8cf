//! Project configuration and on-disk layout.
//!
//! Each indexed project carries a hidden `.codeatlas/` directory at its root
//! holding the SQLite database, a JSON configuration file, the writer lock,
//! and a local `.gitignore` shielding the database from version control.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

/// Name of the hidden project directory.
pub const ATLAS_DIR: &str = ".codeatlas";
/// Database file name inside [`ATLAS_DIR`].
pub const DB_FILE: &str = "codeatlas.db";
/// Config file name inside [`ATLAS_DIR`].
pub const CONFIG_FILE: &str = "config.json";
/// Writer lock file name inside [`ATLAS_DIR`].
pub const LOCK_FILE: &str = "codeatlas.lock";
/// In-tree ignore marker: a directory containing this file is skipped
/// entirely by the fallback scanner.
pub const IGNORE_MARKER: &str = ".atlasignore";

/// Current config schema major version.
pub const CONFIG_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Config enums
// ---------------------------------------------------------------------------

/// Identifier of the optional vector collaborator's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModel {
    #[default]
    None,
    MiniLm,
    JinaCode,
}

/// How the vector collaborator sees code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    #[default]
    Ast,
    Hybrid,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_exclude() -> Vec<String> {
    [
        "**/node_modules",
        "**/target",
        "**/dist",
        "**/build",
        "**/.git",
        "**/vendor",
        "**/__pycache__",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024
}

/// Per-project JSON configuration (`.codeatlas/config.json`).
///
/// A missing file is not an error: defaults apply. An unreadable or
/// structurally invalid file is a `Config` error, fatal to the invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Config schema major version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Glob patterns to consider.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns to reject (checked before includes).
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Advisory framework hints for future resolution passes.
    #[serde(default)]
    pub frameworks: Vec<String>,

    /// Vector collaborator model identifier.
    #[serde(default)]
    pub embedding_model: EmbeddingModel,

    /// How vectors see code.
    #[serde(default)]
    pub chunk_strategy: ChunkStrategy,

    /// Files above this size (bytes) are skipped with a warning.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            include: default_include(),
            exclude: default_exclude(),
            frameworks: Vec::new(),
            embedding_model: EmbeddingModel::default(),
            chunk_strategy: ChunkStrategy::default(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl ProjectConfig {
    /// Load the configuration for `project_root`, falling back to defaults
    /// when no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = config_path(project_root);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .map_err(|e| AtlasError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| AtlasError::Config(format!("invalid {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `.codeatlas/config.json`.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let dir = atlas_dir(project_root);
        fs::create_dir_all(&dir)?;
        let path = config_path(project_root);
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(&path, raw)?;
        Ok(())
    }

    /// Reject structurally valid but semantically broken values.
    pub fn validate(&self) -> Result<()> {
        if self.version > CONFIG_VERSION {
            return Err(AtlasError::Config(format!(
                "config version {} is newer than supported version {CONFIG_VERSION}",
                self.version
            )));
        }
        if self.max_file_size == 0 {
            return Err(AtlasError::Config(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        if self.include.is_empty() {
            return Err(AtlasError::Config(
                "include must contain at least one pattern".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

/// The hidden project directory for `project_root`.
pub fn atlas_dir(project_root: &Path) -> PathBuf {
    project_root.join(ATLAS_DIR)
}

/// The database path for `project_root` (fixed relative to the layout).
pub fn db_path(project_root: &Path) -> PathBuf {
    atlas_dir(project_root).join(DB_FILE)
}

/// The config file path for `project_root`.
pub fn config_path(project_root: &Path) -> PathBuf {
    atlas_dir(project_root).join(CONFIG_FILE)
}

/// The writer lock path for `project_root`.
pub fn lock_path(project_root: &Path) -> PathBuf {
    atlas_dir(project_root).join(LOCK_FILE)
}

/// Create the `.codeatlas/` layout: directory, default config (if absent),
/// and a `.gitignore` that keeps the database out of version control.
pub fn init_layout(project_root: &Path) -> Result<ProjectConfig> {
    let dir = atlas_dir(project_root);
    fs::create_dir_all(&dir)?;

    let gitignore = dir.join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, "*.db\n*.db-shm\n*.db-wal\n*.lock\n")?;
    }

    let config = if config_path(project_root).exists() {
        ProjectConfig::load(project_root)?
    } else {
        let config = ProjectConfig::default();
        config.save(project_root)?;
        config
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_config_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(tmp.path()).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
        assert!(config.exclude.iter().any(|p| p.contains("node_modules")));
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.frameworks = vec!["react".to_string()];
        config.max_file_size = 1024;
        config.save(tmp.path()).unwrap();

        let loaded = ProjectConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded.frameworks, vec!["react".to_string()]);
        assert_eq!(loaded.max_file_size, 1024);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(atlas_dir(tmp.path())).unwrap();
        fs::write(
            config_path(tmp.path()),
            r#"{ "exclude": ["**/generated"] }"#,
        )
        .unwrap();

        let config = ProjectConfig::load(tmp.path()).unwrap();
        assert_eq!(config.exclude, vec!["**/generated".to_string()]);
        assert_eq!(config.version, CONFIG_VERSION);
        assert!(!config.include.is_empty());
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(atlas_dir(tmp.path())).unwrap();
        fs::write(config_path(tmp.path()), "{ not json").unwrap();

        let err = ProjectConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }

    #[test]
    fn zero_max_file_size_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(atlas_dir(tmp.path())).unwrap();
        fs::write(config_path(tmp.path()), r#"{ "max_file_size": 0 }"#).unwrap();

        assert!(matches!(
            ProjectConfig::load(tmp.path()),
            Err(AtlasError::Config(_))
        ));
    }

    #[test]
    fn newer_version_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(atlas_dir(tmp.path())).unwrap();
        fs::write(config_path(tmp.path()), r#"{ "version": 99 }"#).unwrap();

        assert!(matches!(
            ProjectConfig::load(tmp.path()),
            Err(AtlasError::Config(_))
        ));
    }

    #[test]
    fn init_layout_creates_dir_config_and_gitignore() {
        let tmp = tempfile::tempdir().unwrap();
        init_layout(tmp.path()).unwrap();

        assert!(atlas_dir(tmp.path()).is_dir());
        assert!(config_path(tmp.path()).is_file());
        let gitignore = fs::read_to_string(atlas_dir(tmp.path()).join(".gitignore")).unwrap();
        assert!(gitignore.contains("*.db"));
    }

    #[test]
    fn db_path_is_fixed_relative_to_layout() {
        let root = Path::new("/some/project");
        assert_eq!(
            db_path(root),
            Path::new("/some/project/.codeatlas/codeatlas.db")
        );
    }
}
