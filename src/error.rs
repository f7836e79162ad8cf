//! Unified error type for codeatlas.
//!
//! Per-file file and parse errors are collected into indexing results and
//! never abort a run; config and lock errors are fatal to the invocation.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("file error at {path}: {message}")]
    File { path: PathBuf, message: String },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("search error: {0}")]
    Search(String),

    #[error("vector collaborator error: {0}")]
    Vector(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("database is locked by another process (pid {pid}); lock file: {lock_file}")]
    Lock { pid: String, lock_file: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for AtlasError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Database {
            operation: "query",
            source,
        }
    }
}

impl AtlasError {
    /// Attach an operation name to a database error.
    pub fn db(operation: &'static str, source: rusqlite::Error) -> Self {
        Self::Database { operation, source }
    }

    /// Build a file error for `path`.
    pub fn file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
