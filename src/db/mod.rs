//! Database layer.
//!
//! - [`schema`] — DDL, pragmas, and `schema_version` migrations.
//! - [`backend`] — native/portable backend seam (named-parameter
//!   translation, pragma filtering, statement finalization).
//! - [`convert`] — row-to-struct converters.
//! - [`lock`] — the single-writer PID lock.

pub mod backend;
pub mod convert;
pub mod lock;
pub mod schema;

pub use backend::BackendKind;
pub use convert::{row_to_edge, row_to_file, row_to_node, row_to_unresolved};
pub use lock::WriterLock;
pub use schema::{initialize_database, SCHEMA_VERSION};
