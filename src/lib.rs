//! codeatlas — local-first code knowledge graph engine.
//!
//! Indexes a project directory into an embedded SQLite graph of code
//! entities and typed relationships, keeps the graph in sync with the
//! filesystem via content hashing, and answers graph queries and
//! context-assembly requests programmatically or over line-delimited
//! JSON-RPC.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod observability;
pub mod query;
pub mod scanner;
pub mod server;
pub mod sync;
pub mod types;
