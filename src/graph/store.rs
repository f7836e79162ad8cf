//! SQLite CRUD layer for the code graph.
//!
//! Every query goes through `prepare_cached`, so the first call compiles a
//! statement and subsequent calls reuse it. Writes happen through a single
//! writer guarded by the process lock; readers open independently and rely
//! on WAL for read-your-writes within the process.

use std::path::Path;

use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use crate::config;
use crate::db::backend::{self, BackendKind};
use crate::db::convert::{row_to_edge, row_to_file, row_to_node, row_to_unresolved};
use crate::db::lock::WriterLock;
use crate::db::schema::initialize_database;
use crate::error::{AtlasError, Result};
use crate::types::{CodeEdge, CodeNode, FileRecord, UnresolvedRef};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Aggregate statistics about the stored graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct GraphStats {
    pub files: usize,
    pub nodes: usize,
    pub edges: usize,
    pub unresolved_refs: usize,
}

/// Options for the store-level lexical search.
#[derive(Debug, Clone, Default)]
pub struct StoreSearchOptions {
    /// Maximum rows to return (default 50).
    pub limit: Option<usize>,
    /// Restrict to a node kind (database string form).
    pub kind: Option<String>,
    /// Restrict to a language (database string form).
    pub language: Option<String>,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

// Named-parameter statements are routed through the backend seam, which
// rewrites them for engines that only take positional placeholders.
const UPSERT_FILE_SQL: &str = "\
INSERT INTO files (path, content_hash, language, size, modified_at, indexed_at, node_count, errors)
VALUES (:path, :hash, :language, :size, :modified_at, :indexed_at, :node_count, :errors)
ON CONFLICT(path) DO UPDATE SET
  content_hash = excluded.content_hash,
  language = excluded.language,
  size = excluded.size,
  modified_at = excluded.modified_at,
  indexed_at = excluded.indexed_at,
  node_count = excluded.node_count,
  errors = excluded.errors";

const DELETE_FILE_SQL: &str = "DELETE FROM files WHERE path = :path";

const INSERT_NODE_SQL: &str = "\
INSERT INTO nodes (id, kind, name, qualified_name, file_path, language,
                   start_line, end_line, start_column, end_column,
                   signature, docstring, code_snippet, code_hash, visibility,
                   is_exported, is_async, is_static, metadata, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
ON CONFLICT(id) DO UPDATE SET
  kind = excluded.kind,
  name = excluded.name,
  qualified_name = excluded.qualified_name,
  file_path = excluded.file_path,
  language = excluded.language,
  start_line = excluded.start_line,
  end_line = excluded.end_line,
  start_column = excluded.start_column,
  end_column = excluded.end_column,
  signature = excluded.signature,
  docstring = excluded.docstring,
  code_snippet = excluded.code_snippet,
  code_hash = excluded.code_hash,
  visibility = excluded.visibility,
  is_exported = excluded.is_exported,
  is_async = excluded.is_async,
  is_static = excluded.is_static,
  metadata = excluded.metadata,
  updated_at = excluded.updated_at";

const INSERT_EDGE_SQL: &str = "\
INSERT INTO edges (source_id, target_id, kind, resolved, target_name, line_number, metadata)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(source_id, target_id, kind, line_number) DO UPDATE SET
  resolved = excluded.resolved,
  target_name = excluded.target_name,
  metadata = excluded.metadata";

const INSERT_UNRESOLVED_SQL: &str = "\
INSERT INTO unresolved_refs (from_node_id, reference_name, reference_kind, line, column_number, file_path, language)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const FTS_SEARCH_SQL: &str = "\
SELECT n.*
FROM fts_nodes fts
JOIN nodes n ON n.rowid = fts.rowid
WHERE fts_nodes MATCH ?1
ORDER BY fts.rank
LIMIT ?2";

const PREFIX_SEARCH_SQL: &str = "\
SELECT * FROM nodes
WHERE name LIKE ?1 ESCAPE '\\'
ORDER BY length(name) ASC, id ASC
LIMIT ?2";

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Typed CRUD wrapper around the graph database.
pub struct GraphStore {
    pub conn: Connection,
    backend: BackendKind,
    _write_lock: Option<WriterLock>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl GraphStore {
    /// Open (or create) the database at `db_path` without a writer lock.
    /// Suitable for read-only use and tests.
    pub fn open(db_path: &str, backend: BackendKind) -> Result<Self> {
        let conn = initialize_database(db_path, backend)?;
        Ok(Self {
            conn,
            backend,
            _write_lock: None,
        })
    }

    /// Open the project database as the single writer, acquiring the
    /// process lock first. Fails with a `Lock` error naming the lock file
    /// when another live process holds it.
    pub fn open_writer(project_root: &Path, backend: BackendKind) -> Result<Self> {
        let lock = WriterLock::acquire(&config::lock_path(project_root))?;
        let db = config::db_path(project_root);
        let conn = initialize_database(
            db.to_str().ok_or_else(|| {
                AtlasError::file(&db, "database path is not valid UTF-8")
            })?,
            backend,
        )?;
        Ok(Self {
            conn,
            backend,
            _write_lock: Some(lock),
        })
    }

    /// Open the project database read-only (no writer lock).
    pub fn open_reader(project_root: &Path, backend: BackendKind) -> Result<Self> {
        let db = config::db_path(project_root);
        Self::open(
            db.to_str().ok_or_else(|| {
                AtlasError::file(&db, "database path is not valid UTF-8")
            })?,
            backend,
        )
    }

    /// In-memory store with the full schema applied. Test helper.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:", BackendKind::Native)
    }

    /// Finalize all prepared statements and close the connection, releasing
    /// the database file lock.
    pub fn close(self) -> Result<()> {
        backend::close(self.conn)
    }

    // -------------------------------------------------------------------
    // Named-parameter execution (backend seam)
    // -------------------------------------------------------------------

    fn execute_named(&self, sql: &str, bindings: &[(&str, &dyn ToSql)]) -> Result<usize> {
        let (rewritten, order) = backend::translate_named(sql);
        let sql_for_engine = match self.backend {
            BackendKind::Native => sql,
            BackendKind::Portable => rewritten.as_str(),
        };
        let mut stmt = self
            .conn
            .prepare_cached(sql_for_engine)
            .map_err(|e| AtlasError::db("prepare", e))?;

        match self.backend {
            BackendKind::Native => {
                let named: Vec<(&str, &dyn ToSql)> = bindings
                    .iter()
                    .map(|(name, value)| (*name, *value))
                    .collect();
                // rusqlite takes ":name" keys; our constants use bare names.
                let keyed: Vec<(String, &dyn ToSql)> = named
                    .iter()
                    .map(|(name, value)| (format!(":{name}"), *value))
                    .collect();
                let borrowed: Vec<(&str, &dyn ToSql)> = keyed
                    .iter()
                    .map(|(name, value)| (name.as_str(), *value))
                    .collect();
                stmt.execute(borrowed.as_slice())
                    .map_err(|e| AtlasError::db("execute", e))
            }
            BackendKind::Portable => {
                let positional: Vec<&dyn ToSql> = order
                    .iter()
                    .map(|name| {
                        bindings
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, value)| *value)
                            .ok_or_else(|| {
                                AtlasError::Search(format!("missing bind parameter :{name}"))
                            })
                    })
                    .collect::<Result<_>>()?;
                stmt.execute(positional.as_slice())
                    .map_err(|e| AtlasError::db("execute", e))
            }
        }
    }

    // -------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------

    /// Insert or update a file record.
    pub fn upsert_file(&self, record: &FileRecord) -> Result<()> {
        let size = record.size as i64;
        let node_count = record.node_count as i64;
        self.execute_named(
            UPSERT_FILE_SQL,
            &[
                ("path", &record.path),
                ("hash", &record.content_hash),
                ("language", &record.language.as_str()),
                ("size", &size),
                ("modified_at", &record.modified_at),
                ("indexed_at", &record.indexed_at),
                ("node_count", &node_count),
                ("errors", &record.errors),
            ],
        )?;
        Ok(())
    }

    /// Delete a file record; cascades to its nodes, their outbound edges,
    /// and their pending references. Inbound edges from other files would
    /// survive the cascade and dangle as resolved, so they go explicitly.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "DELETE FROM edges WHERE target_id IN
                   (SELECT id FROM nodes WHERE file_path = ?1)",
            )
            .map_err(|e| AtlasError::db("prepare", e))?;
        stmt.execute(params![path])
            .map_err(|e| AtlasError::db("delete inbound edges", e))?;

        self.execute_named(DELETE_FILE_SQL, &[("path", &path)])?;
        Ok(())
    }

    /// Fetch a single file record.
    pub fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM files WHERE path = ?1")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let mut rows = stmt.query_and_then(params![path], row_to_file)?;
        match rows.next() {
            Some(Ok(file)) => Ok(Some(file)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Every file record, ordered by path.
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM files ORDER BY path")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let rows = stmt.query_and_then([], row_to_file)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------

    /// Batch-insert nodes with the caller's transaction (or autocommit).
    pub fn insert_nodes(&self, nodes: &[CodeNode]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(INSERT_NODE_SQL)
            .map_err(|e| AtlasError::db("prepare", e))?;
        for node in nodes {
            let metadata = node
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            stmt.execute(params![
                node.id,
                node.kind.as_str(),
                node.name,
                node.qualified_name,
                node.file_path,
                node.language.as_str(),
                node.start_line,
                node.end_line,
                node.start_column,
                node.end_column,
                node.signature,
                node.docstring,
                node.code_snippet,
                node.code_hash,
                node.visibility.map(|v| v.as_str()),
                node.is_exported as i64,
                node.is_async as i64,
                node.is_static as i64,
                metadata,
                node.updated_at,
            ])
            .map_err(|e| AtlasError::db("insert node", e))?;
        }
        Ok(())
    }

    /// Retrieve a node by id.
    pub fn get_node(&self, id: &str) -> Result<Option<CodeNode>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM nodes WHERE id = ?1")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let mut rows = stmt.query_and_then(params![id], row_to_node)?;
        match rows.next() {
            Some(Ok(node)) => Ok(Some(node)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Retrieve a node by its qualified name.
    pub fn get_node_by_qualified_name(&self, qualified_name: &str) -> Result<Option<CodeNode>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM nodes WHERE qualified_name = ?1 LIMIT 1")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let mut rows = stmt.query_and_then(params![qualified_name], row_to_node)?;
        match rows.next() {
            Some(Ok(node)) => Ok(Some(node)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Every node of the given kind.
    pub fn get_nodes_by_kind(&self, kind: &str) -> Result<Vec<CodeNode>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM nodes WHERE kind = ?1 ORDER BY id")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let rows = stmt.query_and_then(params![kind], row_to_node)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Every node in the given file, in tree order.
    pub fn get_nodes_by_file(&self, path: &str) -> Result<Vec<CodeNode>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT * FROM nodes WHERE file_path = ?1 ORDER BY start_line, start_column",
            )
            .map_err(|e| AtlasError::db("prepare", e))?;
        let rows = stmt.query_and_then(params![path], row_to_node)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Every node with the given bare name.
    pub fn get_nodes_by_name(&self, name: &str) -> Result<Vec<CodeNode>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM nodes WHERE name = ?1 ORDER BY id")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let rows = stmt.query_and_then(params![name], row_to_node)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // Lexical search
    // -------------------------------------------------------------------

    /// Full-text search over name / qualified name / docstring, ranked by
    /// BM25, with a prefix fallback for identifier fragments FTS cannot
    /// tokenize.
    pub fn search_nodes(&self, term: &str, options: &StoreSearchOptions) -> Result<Vec<CodeNode>> {
        let limit = options.limit.unwrap_or(50);
        let fts_query = sanitize_fts_query(term);

        let mut results: Vec<CodeNode> = Vec::new();
        if !fts_query.is_empty() {
            let mut stmt = self
                .conn
                .prepare_cached(FTS_SEARCH_SQL)
                .map_err(|e| AtlasError::db("prepare", e))?;
            let rows = stmt.query_and_then(params![fts_query, limit as i64], row_to_node)?;
            results = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        }

        if results.is_empty() && !term.trim().is_empty() {
            let escaped = term
                .trim()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let pattern = format!("{escaped}%");
            let mut stmt = self
                .conn
                .prepare_cached(PREFIX_SEARCH_SQL)
                .map_err(|e| AtlasError::db("prepare", e))?;
            let rows = stmt.query_and_then(params![pattern, limit as i64], row_to_node)?;
            results = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        }

        if let Some(ref kind) = options.kind {
            results.retain(|n| n.kind.as_str() == kind);
        }
        if let Some(ref language) = options.language {
            results.retain(|n| n.language.as_str() == language);
        }
        results.truncate(limit);
        Ok(results)
    }

    /// Substring scan over node names, for ranking layers that need
    /// candidates FTS tokenization misses (camelCase fragments).
    pub fn find_nodes_containing(&self, term: &str, limit: usize) -> Result<Vec<CodeNode>> {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT * FROM nodes WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY length(name) ASC, id ASC LIMIT ?2",
            )
            .map_err(|e| AtlasError::db("prepare", e))?;
        let rows = stmt.query_and_then(params![pattern, limit as i64], row_to_node)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------

    /// Batch-insert edges; exact duplicates update in place.
    pub fn insert_edges(&self, edges: &[CodeEdge]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(INSERT_EDGE_SQL)
            .map_err(|e| AtlasError::db("prepare", e))?;
        for edge in edges {
            let metadata = edge
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            stmt.execute(params![
                edge.source_id,
                edge.target_id,
                edge.kind.as_str(),
                edge.resolved as i64,
                edge.target_name,
                edge.line_number,
                metadata,
            ])
            .map_err(|e| AtlasError::db("insert edge", e))?;
        }
        Ok(())
    }

    /// Outgoing edges from `id`, optionally filtered by kind.
    pub fn get_edges_from(&self, id: &str, kind: Option<&str>) -> Result<Vec<CodeEdge>> {
        match kind {
            Some(k) => {
                let mut stmt = self
                    .conn
                    .prepare_cached(
                        "SELECT * FROM edges WHERE source_id = ?1 AND kind = ?2 ORDER BY id",
                    )
                    .map_err(|e| AtlasError::db("prepare", e))?;
                let rows = stmt.query_and_then(params![id, k], row_to_edge)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(Into::into)
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT * FROM edges WHERE source_id = ?1 ORDER BY id")
                    .map_err(|e| AtlasError::db("prepare", e))?;
                let rows = stmt.query_and_then(params![id], row_to_edge)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(Into::into)
            }
        }
    }

    /// Incoming edges to `id`, optionally filtered by kind.
    pub fn get_edges_to(&self, id: &str, kind: Option<&str>) -> Result<Vec<CodeEdge>> {
        match kind {
            Some(k) => {
                let mut stmt = self
                    .conn
                    .prepare_cached(
                        "SELECT * FROM edges WHERE target_id = ?1 AND kind = ?2 ORDER BY id",
                    )
                    .map_err(|e| AtlasError::db("prepare", e))?;
                let rows = stmt.query_and_then(params![id, k], row_to_edge)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(Into::into)
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT * FROM edges WHERE target_id = ?1 ORDER BY id")
                    .map_err(|e| AtlasError::db("prepare", e))?;
                let rows = stmt.query_and_then(params![id], row_to_edge)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(Into::into)
            }
        }
    }

    /// Edges whose endpoints are both inside `ids`.
    pub fn get_edges_between(&self, ids: &[&str]) -> Result<Vec<CodeEdge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT * FROM edges WHERE source_id IN ({placeholders}) AND target_id IN ({placeholders}) ORDER BY id"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| AtlasError::db("prepare", e))?;

        let mut bindings: Vec<&dyn ToSql> = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            bindings.push(id);
        }
        for id in ids {
            bindings.push(id);
        }
        let rows = stmt.query_and_then(bindings.as_slice(), row_to_edge)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // Unresolved references
    // -------------------------------------------------------------------

    /// Batch-insert pending references.
    pub fn insert_unresolved_refs(&self, refs: &[UnresolvedRef]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(INSERT_UNRESOLVED_SQL)
            .map_err(|e| AtlasError::db("prepare", e))?;
        for r in refs {
            stmt.execute(params![
                r.from_node_id,
                r.reference_name,
                r.reference_kind.as_str(),
                r.line,
                r.column,
                r.file_path,
                r.language.as_str(),
            ])
            .map_err(|e| AtlasError::db("insert unresolved ref", e))?;
        }
        Ok(())
    }

    /// Drop one pending reference, typically after upgrading it to a
    /// resolved edge.
    pub fn delete_unresolved_ref(&self, r: &UnresolvedRef) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "DELETE FROM unresolved_refs
                 WHERE from_node_id = ?1 AND reference_name = ?2
                   AND reference_kind = ?3 AND line = ?4",
            )
            .map_err(|e| AtlasError::db("prepare", e))?;
        stmt.execute(params![
            r.from_node_id,
            r.reference_name,
            r.reference_kind.as_str(),
            r.line,
        ])
        .map_err(|e| AtlasError::db("delete unresolved ref", e))?;
        Ok(())
    }

    /// Drop a single edge row.
    pub fn delete_edge(
        &self,
        source_id: &str,
        target_id: &str,
        kind: &str,
        line_number: u32,
    ) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "DELETE FROM edges
                 WHERE source_id = ?1 AND target_id = ?2 AND kind = ?3 AND line_number = ?4",
            )
            .map_err(|e| AtlasError::db("prepare", e))?;
        stmt.execute(params![source_id, target_id, kind, line_number])
            .map_err(|e| AtlasError::db("delete edge", e))?;
        Ok(())
    }

    /// Pending references recorded for a file.
    pub fn get_unresolved_refs_for_file(&self, path: &str) -> Result<Vec<UnresolvedRef>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM unresolved_refs WHERE file_path = ?1 ORDER BY id")
            .map_err(|e| AtlasError::db("prepare", e))?;
        let rows = stmt.query_and_then(params![path], row_to_unresolved)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| AtlasError::db("begin", e))?;
        match f(self) {
            Ok(value) => {
                tx.commit().map_err(|e| AtlasError::db("commit", e))?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back.
                drop(tx);
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------
    // Stats
    // -------------------------------------------------------------------

    pub fn stats(&self) -> Result<GraphStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(|e| AtlasError::db("count", e))?;
            Ok(n as usize)
        };
        Ok(GraphStats {
            files: count("SELECT count(*) FROM files")?,
            nodes: count("SELECT count(*) FROM nodes")?,
            edges: count("SELECT count(*) FROM edges")?,
            unresolved_refs: count("SELECT count(*) FROM unresolved_refs")?,
        })
    }
}

// ---------------------------------------------------------------------------
// FTS sanitization
// ---------------------------------------------------------------------------

/// Quote each token for FTS5 MATCH, stripping operator characters, and join
/// with OR for broad recall.
pub fn sanitize_fts_query(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .filter_map(|token| {
            let clean: String = token
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if clean.is_empty() {
                None
            } else {
                Some(format!("\"{clean}\""))
            }
        })
        .collect();
    tokens.join(" OR ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        make_node_id, make_qualified_name, unix_now, EdgeKind, Language, NodeKind,
    };

    fn setup() -> GraphStore {
        GraphStore::open_in_memory().expect("in-memory store should open")
    }

    fn make_file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            content_hash: format!("hash-{path}"),
            language: Language::TypeScript,
            size: 100,
            modified_at: 1_700_000_000,
            indexed_at: unix_now(),
            node_count: 0,
            errors: None,
        }
    }

    fn make_node(name: &str, file: &str, kind: NodeKind, line: u32) -> CodeNode {
        CodeNode {
            id: make_node_id(kind, file, name, line),
            kind,
            name: name.to_string(),
            qualified_name: make_qualified_name(file, &[], name),
            file_path: file.to_string(),
            language: Language::TypeScript,
            start_line: line,
            end_line: line + 5,
            start_column: 0,
            end_column: 1,
            signature: None,
            docstring: None,
            code_snippet: Some(format!("function {name}() {{}}")),
            code_hash: None,
            visibility: None,
            is_exported: true,
            is_async: false,
            is_static: false,
            metadata: None,
            updated_at: unix_now(),
        }
    }

    fn seed_file_with_nodes(store: &GraphStore, path: &str, names: &[&str]) -> Vec<CodeNode> {
        store.upsert_file(&make_file(path)).unwrap();
        let nodes: Vec<CodeNode> = names
            .iter()
            .enumerate()
            .map(|(i, name)| make_node(name, path, NodeKind::Function, (i as u32 + 1) * 10))
            .collect();
        store.insert_nodes(&nodes).unwrap();
        nodes
    }

    // -- files --------------------------------------------------------------

    #[test]
    fn upsert_and_get_file() {
        let store = setup();
        store.upsert_file(&make_file("src/a.ts")).unwrap();

        let file = store.get_file_by_path("src/a.ts").unwrap().unwrap();
        assert_eq!(file.content_hash, "hash-src/a.ts");
        assert_eq!(file.language, Language::TypeScript);
    }

    #[test]
    fn upsert_file_updates_in_place() {
        let store = setup();
        let mut record = make_file("src/a.ts");
        store.upsert_file(&record).unwrap();

        record.content_hash = "new-hash".to_string();
        record.node_count = 7;
        store.upsert_file(&record).unwrap();

        let file = store.get_file_by_path("src/a.ts").unwrap().unwrap();
        assert_eq!(file.content_hash, "new-hash");
        assert_eq!(file.node_count, 7);
        assert_eq!(store.get_all_files().unwrap().len(), 1);
    }

    #[test]
    fn delete_file_cascades_to_nodes_and_edges() {
        let store = setup();
        let nodes = seed_file_with_nodes(&store, "src/a.ts", &["f", "g"]);
        store
            .insert_edges(&[CodeEdge::resolved(
                &nodes[0].id,
                &nodes[1].id,
                EdgeKind::Calls,
                12,
            )])
            .unwrap();
        store
            .insert_unresolved_refs(&[UnresolvedRef {
                from_node_id: nodes[0].id.clone(),
                reference_name: "external".to_string(),
                reference_kind: EdgeKind::Imports,
                line: 1,
                column: 0,
                file_path: "src/a.ts".to_string(),
                language: Language::TypeScript,
            }])
            .unwrap();

        store.delete_file("src/a.ts").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats, GraphStats::default());
    }

    #[test]
    fn delete_file_also_drops_inbound_edges_from_other_files() {
        let store = setup();
        let callers = seed_file_with_nodes(&store, "src/a.ts", &["caller"]);
        let targets = seed_file_with_nodes(&store, "src/b.ts", &["target"]);
        store
            .insert_edges(&[CodeEdge::resolved(
                &callers[0].id,
                &targets[0].id,
                EdgeKind::Calls,
                5,
            )])
            .unwrap();

        store.delete_file("src/b.ts").unwrap();

        // The caller survives; its resolved edge into the deleted file
        // must not dangle.
        assert!(store.get_node(&callers[0].id).unwrap().is_some());
        assert!(store.get_edges_from(&callers[0].id, None).unwrap().is_empty());
    }

    // -- nodes --------------------------------------------------------------

    #[test]
    fn get_node_by_id_and_qualified_name() {
        let store = setup();
        let nodes = seed_file_with_nodes(&store, "src/a.ts", &["hello"]);

        let by_id = store.get_node(&nodes[0].id).unwrap().unwrap();
        assert_eq!(by_id.name, "hello");

        let by_qn = store
            .get_node_by_qualified_name("src/a.ts::hello")
            .unwrap()
            .unwrap();
        assert_eq!(by_qn.id, nodes[0].id);

        assert!(store.get_node("missing").unwrap().is_none());
    }

    #[test]
    fn get_nodes_by_kind_and_file_and_name() {
        let store = setup();
        seed_file_with_nodes(&store, "src/a.ts", &["f", "g"]);
        seed_file_with_nodes(&store, "src/b.ts", &["f"]);

        assert_eq!(store.get_nodes_by_kind("function").unwrap().len(), 3);
        assert_eq!(store.get_nodes_by_file("src/a.ts").unwrap().len(), 2);
        assert_eq!(store.get_nodes_by_name("f").unwrap().len(), 2);
    }

    #[test]
    fn nodes_by_file_come_back_in_tree_order() {
        let store = setup();
        store.upsert_file(&make_file("src/a.ts")).unwrap();
        let late = make_node("late", "src/a.ts", NodeKind::Function, 50);
        let early = make_node("early", "src/a.ts", NodeKind::Function, 5);
        store.insert_nodes(&[late, early]).unwrap();

        let nodes = store.get_nodes_by_file("src/a.ts").unwrap();
        assert_eq!(nodes[0].name, "early");
        assert_eq!(nodes[1].name, "late");
    }

    // -- search -------------------------------------------------------------

    #[test]
    fn fts_search_finds_by_name() {
        let store = setup();
        seed_file_with_nodes(&store, "src/a.ts", &["generate_token", "verify_password"]);

        let results = store
            .search_nodes("generate_token", &StoreSearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "generate_token");
    }

    #[test]
    fn prefix_fallback_matches_identifier_fragments() {
        let store = setup();
        seed_file_with_nodes(&store, "src/a.ts", &["getUserById"]);

        // FTS tokenizes on word boundaries, so a camelCase prefix fragment
        // falls through to the LIKE path.
        let results = store
            .search_nodes("getUser", &StoreSearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "getUserById");
    }

    #[test]
    fn search_respects_kind_filter_and_limit() {
        let store = setup();
        store.upsert_file(&make_file("src/a.ts")).unwrap();
        let f = make_node("payment", "src/a.ts", NodeKind::Function, 1);
        let mut c = make_node("payment", "src/a.ts", NodeKind::Class, 20);
        c.id = make_node_id(NodeKind::Class, "src/a.ts", "payment", 20);
        store.insert_nodes(&[f, c]).unwrap();

        let only_classes = store
            .search_nodes(
                "payment",
                &StoreSearchOptions {
                    kind: Some("class".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(only_classes.len(), 1);
        assert_eq!(only_classes[0].kind, NodeKind::Class);

        let limited = store
            .search_nodes(
                "payment",
                &StoreSearchOptions {
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn search_with_empty_term_returns_empty() {
        let store = setup();
        seed_file_with_nodes(&store, "src/a.ts", &["f"]);
        let results = store
            .search_nodes("   ", &StoreSearchOptions::default())
            .unwrap();
        assert!(results.is_empty());
    }

    // -- edges --------------------------------------------------------------

    #[test]
    fn edges_from_and_to_with_kind_filter() {
        let store = setup();
        let nodes = seed_file_with_nodes(&store, "src/a.ts", &["f", "g", "h"]);
        store
            .insert_edges(&[
                CodeEdge::resolved(&nodes[0].id, &nodes[1].id, EdgeKind::Calls, 11),
                CodeEdge::resolved(&nodes[0].id, &nodes[2].id, EdgeKind::References, 12),
            ])
            .unwrap();

        let all = store.get_edges_from(&nodes[0].id, None).unwrap();
        assert_eq!(all.len(), 2);

        let calls = store.get_edges_from(&nodes[0].id, Some("calls")).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target_id, nodes[1].id);

        let incoming = store.get_edges_to(&nodes[1].id, Some("calls")).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source_id, nodes[0].id);
    }

    #[test]
    fn duplicate_edge_insert_is_idempotent() {
        let store = setup();
        let nodes = seed_file_with_nodes(&store, "src/a.ts", &["f", "g"]);
        let edge = CodeEdge::resolved(&nodes[0].id, &nodes[1].id, EdgeKind::Calls, 11);
        store.insert_edges(&[edge.clone()]).unwrap();
        store.insert_edges(&[edge]).unwrap();

        assert_eq!(store.stats().unwrap().edges, 1);
    }

    #[test]
    fn edges_between_restricts_both_endpoints() {
        let store = setup();
        let nodes = seed_file_with_nodes(&store, "src/a.ts", &["f", "g", "h"]);
        store
            .insert_edges(&[
                CodeEdge::resolved(&nodes[0].id, &nodes[1].id, EdgeKind::Calls, 11),
                CodeEdge::resolved(&nodes[1].id, &nodes[2].id, EdgeKind::Calls, 21),
            ])
            .unwrap();

        let ids: Vec<&str> = vec![&nodes[0].id, &nodes[1].id];
        let edges = store.get_edges_between(&ids).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_id, nodes[1].id);

        assert!(store.get_edges_between(&[]).unwrap().is_empty());
    }

    // -- transactions -------------------------------------------------------

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = setup();
        store.upsert_file(&make_file("src/a.ts")).unwrap();

        let result: Result<()> = store.transaction(|s| {
            s.insert_nodes(&[make_node("doomed", "src/a.ts", NodeKind::Function, 1)])?;
            Err(AtlasError::Search("forced failure".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.stats().unwrap().nodes, 0);
    }

    #[test]
    fn transaction_commits_on_success() {
        let store = setup();
        store.upsert_file(&make_file("src/a.ts")).unwrap();

        store
            .transaction(|s| {
                s.insert_nodes(&[make_node("kept", "src/a.ts", NodeKind::Function, 1)])
            })
            .unwrap();
        assert_eq!(store.stats().unwrap().nodes, 1);
    }

    // -- lifecycle ----------------------------------------------------------

    #[test]
    fn close_finalizes_statements() {
        let store = setup();
        seed_file_with_nodes(&store, "src/a.ts", &["f"]);
        store.close().unwrap();
    }

    #[test]
    fn writer_lock_is_exclusive_per_project() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = GraphStore::open_writer(tmp.path(), BackendKind::Native).unwrap();
        let err = GraphStore::open_writer(tmp.path(), BackendKind::Native).unwrap_err();
        assert!(matches!(err, AtlasError::Lock { .. }));
        drop(writer);
        GraphStore::open_writer(tmp.path(), BackendKind::Native).unwrap();
    }

    #[test]
    fn portable_backend_round_trips() {
        let store = GraphStore::open(":memory:", BackendKind::Portable).unwrap();
        store.upsert_file(&make_file("src/a.ts")).unwrap();
        store
            .insert_nodes(&[make_node("f", "src/a.ts", NodeKind::Function, 1)])
            .unwrap();
        assert_eq!(store.stats().unwrap().nodes, 1);
        store.delete_file("src/a.ts").unwrap();
        assert_eq!(store.stats().unwrap().nodes, 0);
        store.close().unwrap();
    }
}
