//! SQLite schema and migrations.
//!
//! The schema version lives in the `meta` table; migrations run at open and
//! bring older databases forward one step at a time. Cascades enforce the
//! ownership chain: deleting a file record deletes its nodes, and deleting
//! a node deletes its outbound edges and pending references.

use rusqlite::Connection;

use crate::db::backend::BackendKind;
use crate::error::{AtlasError, Result};

/// Current schema version, stored under `meta.schema_version`.
pub const SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_META: &str = "\
CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
)";

const CREATE_FILES: &str = "\
CREATE TABLE IF NOT EXISTS files (
  path TEXT PRIMARY KEY,
  content_hash TEXT NOT NULL,
  language TEXT NOT NULL,
  size INTEGER NOT NULL DEFAULT 0,
  modified_at INTEGER NOT NULL DEFAULT 0,
  indexed_at INTEGER NOT NULL DEFAULT 0,
  node_count INTEGER NOT NULL DEFAULT 0,
  errors TEXT
)";

const CREATE_NODES: &str = "\
CREATE TABLE IF NOT EXISTS nodes (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  name TEXT NOT NULL,
  qualified_name TEXT NOT NULL,
  file_path TEXT NOT NULL,
  language TEXT NOT NULL,
  start_line INTEGER NOT NULL,
  end_line INTEGER NOT NULL,
  start_column INTEGER NOT NULL DEFAULT 0,
  end_column INTEGER NOT NULL DEFAULT 0,
  signature TEXT,
  docstring TEXT,
  code_snippet TEXT,
  code_hash TEXT,
  visibility TEXT,
  is_exported INTEGER NOT NULL DEFAULT 0,
  is_async INTEGER NOT NULL DEFAULT 0,
  is_static INTEGER NOT NULL DEFAULT 0,
  metadata TEXT,
  updated_at INTEGER NOT NULL DEFAULT 0,
  FOREIGN KEY (file_path) REFERENCES files(path) ON DELETE CASCADE
)";

// target_id carries no foreign key: unresolved edges may dangle.
const CREATE_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS edges (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  source_id TEXT NOT NULL,
  target_id TEXT NOT NULL,
  kind TEXT NOT NULL,
  resolved INTEGER NOT NULL DEFAULT 0,
  target_name TEXT,
  line_number INTEGER NOT NULL DEFAULT 0,
  metadata TEXT,
  FOREIGN KEY (source_id) REFERENCES nodes(id) ON DELETE CASCADE,
  UNIQUE (source_id, target_id, kind, line_number)
)";

const CREATE_UNRESOLVED_REFS: &str = "\
CREATE TABLE IF NOT EXISTS unresolved_refs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  from_node_id TEXT NOT NULL,
  reference_name TEXT NOT NULL,
  reference_kind TEXT NOT NULL,
  line INTEGER NOT NULL DEFAULT 0,
  column_number INTEGER NOT NULL DEFAULT 0,
  file_path TEXT NOT NULL,
  language TEXT NOT NULL,
  FOREIGN KEY (from_node_id) REFERENCES nodes(id) ON DELETE CASCADE
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_language ON nodes(language)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_qualified ON nodes(qualified_name)",
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind)",
    "CREATE INDEX IF NOT EXISTS idx_edges_resolved ON edges(resolved)",
    "CREATE INDEX IF NOT EXISTS idx_unresolved_file ON unresolved_refs(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_unresolved_name ON unresolved_refs(reference_name)",
];

const CREATE_FTS: &str = "\
CREATE VIRTUAL TABLE IF NOT EXISTS fts_nodes USING fts5(
  name, qualified_name, docstring,
  content='nodes', content_rowid='rowid'
)";

const CREATE_FTS_TRIGGERS: &[&str] = &[
    "\
CREATE TRIGGER IF NOT EXISTS nodes_ai AFTER INSERT ON nodes BEGIN
  INSERT INTO fts_nodes(rowid, name, qualified_name, docstring)
  VALUES (new.rowid, new.name, new.qualified_name, new.docstring);
END",
    "\
CREATE TRIGGER IF NOT EXISTS nodes_ad AFTER DELETE ON nodes BEGIN
  INSERT INTO fts_nodes(fts_nodes, rowid, name, qualified_name, docstring)
  VALUES ('delete', old.rowid, old.name, old.qualified_name, old.docstring);
END",
    "\
CREATE TRIGGER IF NOT EXISTS nodes_au AFTER UPDATE ON nodes BEGIN
  INSERT INTO fts_nodes(fts_nodes, rowid, name, qualified_name, docstring)
  VALUES ('delete', old.rowid, old.name, old.qualified_name, old.docstring);
  INSERT INTO fts_nodes(rowid, name, qualified_name, docstring)
  VALUES (new.rowid, new.name, new.qualified_name, new.docstring);
END",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the database at `db_path`, apply pragmas for `backend`,
/// create the schema, and run any pending migrations.
pub fn initialize_database(db_path: &str, backend: BackendKind) -> Result<Connection> {
    let conn = Connection::open(db_path).map_err(|e| AtlasError::db("open", e))?;
    backend.apply_pragmas(&conn)?;
    apply_schema(&conn)?;
    migrate(&conn)?;
    Ok(conn)
}

fn apply_schema(conn: &Connection) -> Result<()> {
    for ddl in [
        CREATE_META,
        CREATE_FILES,
        CREATE_NODES,
        CREATE_EDGES,
        CREATE_UNRESOLVED_REFS,
    ] {
        conn.execute_batch(ddl)
            .map_err(|e| AtlasError::db("create table", e))?;
    }
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)
            .map_err(|e| AtlasError::db("create index", e))?;
    }
    conn.execute_batch(CREATE_FTS)
        .map_err(|e| AtlasError::db("create fts", e))?;
    for trigger in CREATE_FTS_TRIGGERS {
        conn.execute_batch(trigger)
            .map_err(|e| AtlasError::db("create trigger", e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

/// Read the stored schema version (0 when unset).
pub fn stored_schema_version(conn: &Connection) -> Result<u32> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(AtlasError::db("read schema version", other)),
        })?;
    Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [version.to_string()],
    )
    .map_err(|e| AtlasError::db("write schema version", e))?;
    Ok(())
}

/// Bring the database forward to [`SCHEMA_VERSION`], one step at a time.
fn migrate(conn: &Connection) -> Result<()> {
    let mut version = stored_schema_version(conn)?;
    if version == 0 {
        // Fresh database: the DDL above already matches the current schema.
        set_schema_version(conn, SCHEMA_VERSION)?;
        return Ok(());
    }

    while version < SCHEMA_VERSION {
        match version {
            1 => {
                // v2 added per-file indexing error capture.
                if !column_exists(conn, "files", "errors")? {
                    conn.execute_batch("ALTER TABLE files ADD COLUMN errors TEXT")
                        .map_err(|e| AtlasError::db("migrate v1->v2", e))?;
                }
            }
            other => {
                return Err(AtlasError::Config(format!(
                    "database schema version {other} is newer than supported {SCHEMA_VERSION}"
                )));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| AtlasError::db("table_info", e))?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| AtlasError::db("table_info", e))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names.iter().any(|n| n == column))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        initialize_database(":memory:", BackendKind::Native)
            .expect("schema creation should succeed on :memory:")
    }

    fn object_exists(conn: &Connection, obj_type: &str, obj_name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                rusqlite::params![obj_type, obj_name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn core_tables_exist() {
        let conn = setup();
        for table in &["meta", "files", "nodes", "edges", "unresolved_refs", "fts_nodes"] {
            assert!(
                object_exists(&conn, "table", table),
                "table '{table}' should exist"
            );
        }
    }

    #[test]
    fn indexes_exist() {
        let conn = setup();
        for idx in &[
            "idx_nodes_file",
            "idx_nodes_kind",
            "idx_nodes_name",
            "idx_nodes_language",
            "idx_edges_source",
            "idx_edges_target",
            "idx_edges_kind",
            "idx_edges_resolved",
        ] {
            assert!(object_exists(&conn, "index", idx), "index '{idx}' should exist");
        }
    }

    #[test]
    fn schema_version_is_stamped() {
        let conn = setup();
        assert_eq!(stored_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn foreign_keys_are_on() {
        let conn = setup();
        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn deleting_a_file_cascades_to_nodes_edges_and_refs() {
        let conn = setup();
        conn.execute(
            "INSERT INTO files (path, content_hash, language) VALUES ('a.ts', 'h', 'typescript')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO nodes (id, kind, name, qualified_name, file_path, language, start_line, end_line)
             VALUES ('n1', 'function', 'f', 'a.ts::f', 'a.ts', 'typescript', 1, 3)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO edges (source_id, target_id, kind, resolved) VALUES ('n1', 'unresolved:g', 'calls', 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO unresolved_refs (from_node_id, reference_name, reference_kind, file_path, language)
             VALUES ('n1', 'g', 'calls', 'a.ts', 'typescript')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM files WHERE path = 'a.ts'", []).unwrap();

        let nodes: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0)).unwrap();
        let edges: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0)).unwrap();
        let refs: i64 = conn
            .query_row("SELECT COUNT(*) FROM unresolved_refs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(nodes, 0);
        assert_eq!(edges, 0);
        assert_eq!(refs, 0);
    }

    #[test]
    fn edge_uniqueness_covers_line_number() {
        let conn = setup();
        conn.execute(
            "INSERT INTO files (path, content_hash, language) VALUES ('a.ts', 'h', 'typescript')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO nodes (id, kind, name, qualified_name, file_path, language, start_line, end_line)
             VALUES ('n1', 'function', 'f', 'a.ts::f', 'a.ts', 'typescript', 1, 3)",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO edges (source_id, target_id, kind, resolved, line_number)
                      VALUES ('n1', 'unresolved:g', 'calls', 0, ?1)";
        conn.execute(insert, [2]).unwrap();
        // Same call on a different line is a distinct edge.
        conn.execute(insert, [5]).unwrap();
        // Exact duplicate violates the unique constraint.
        assert!(conn.execute(insert, [2]).is_err());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn fts_triggers_track_inserts_and_deletes() {
        let conn = setup();
        conn.execute(
            "INSERT INTO files (path, content_hash, language) VALUES ('a.ts', 'h', 'typescript')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO nodes (id, kind, name, qualified_name, file_path, language, start_line, end_line)
             VALUES ('n1', 'function', 'greet', 'a.ts::greet', 'a.ts', 'typescript', 1, 3)",
            [],
        )
        .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fts_nodes WHERE fts_nodes MATCH 'greet'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);

        conn.execute("DELETE FROM nodes WHERE id = 'n1'", []).unwrap();
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fts_nodes WHERE fts_nodes MATCH 'greet'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0);
    }

    #[test]
    fn migration_adds_errors_column_to_v1_database() {
        let conn = Connection::open_in_memory().unwrap();
        BackendKind::Native.apply_pragmas(&conn).unwrap();
        // Seed a v1 layout: files table without the errors column.
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE files (
               path TEXT PRIMARY KEY,
               content_hash TEXT NOT NULL,
               language TEXT NOT NULL,
               size INTEGER NOT NULL DEFAULT 0,
               modified_at INTEGER NOT NULL DEFAULT 0,
               indexed_at INTEGER NOT NULL DEFAULT 0,
               node_count INTEGER NOT NULL DEFAULT 0
             );
             INSERT INTO meta (key, value) VALUES ('schema_version', '1');",
        )
        .unwrap();

        apply_schema(&conn).unwrap();
        migrate(&conn).unwrap();

        assert!(column_exists(&conn, "files", "errors").unwrap());
        assert_eq!(stored_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta (key, value) VALUES ('schema_version', '99');",
        )
        .unwrap();
        apply_schema(&conn).unwrap();
        // 99 > SCHEMA_VERSION: migrate must not touch it, and the loop exits
        // without error because version >= SCHEMA_VERSION.
        migrate(&conn).unwrap();
        assert_eq!(stored_schema_version(&conn).unwrap(), 99);
    }
}
