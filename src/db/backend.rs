//! Backend seam between the native and portable database engines.
//!
//! The store speaks one interface; the engine underneath may be the native
//! embedded build or a portable one with a narrower surface. Three
//! differences are load-bearing:
//!
//! - the portable engine only accepts positional placeholders, so named
//!   parameters are translated before prepare;
//! - the portable engine rejects several pragmas, so pragma application is
//!   filtered through a support list instead of failing;
//! - every prepared statement handle must be finalized before close, or the
//!   database file lock never releases.

use std::borrow::Cow;

use rusqlite::Connection;

use crate::error::{AtlasError, Result};

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

/// Which engine variant backs the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Full-featured embedded engine.
    #[default]
    Native,
    /// Portable engine: positional parameters only, reduced pragma surface.
    Portable,
}

/// Pragmas applied at open, in order.
const PRAGMAS: &[(&str, &str)] = &[
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("foreign_keys", "ON"),
    ("busy_timeout", "5000"),
];

/// Pragmas the portable engine understands.
const PORTABLE_PRAGMAS: &[&str] = &["foreign_keys", "busy_timeout"];

impl BackendKind {
    /// Whether this backend supports the given pragma.
    pub fn supports_pragma(&self, name: &str) -> bool {
        match self {
            Self::Native => true,
            Self::Portable => PORTABLE_PRAGMAS.contains(&name),
        }
    }

    /// Apply the standard pragma set, skipping unsupported ones.
    pub fn apply_pragmas(&self, conn: &Connection) -> Result<()> {
        for (name, value) in PRAGMAS {
            if !self.supports_pragma(name) {
                tracing::debug!(pragma = name, "skipping unsupported pragma");
                continue;
            }
            conn.pragma_update(None, name, value)
                .map_err(|e| AtlasError::db("pragma", e))?;
        }
        Ok(())
    }

    /// Rewrite `sql` for this backend. The native engine takes named
    /// parameters as-is; the portable engine needs positional placeholders.
    pub fn rewrite<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::Native => Cow::Borrowed(sql),
            Self::Portable => Cow::Owned(translate_named(sql).0),
        }
    }
}

// ---------------------------------------------------------------------------
// Named-parameter translation
// ---------------------------------------------------------------------------

/// Translate `:name` placeholders to positional `?N` placeholders.
///
/// Returns the rewritten SQL and the parameter names in binding order.
/// Repeated names reuse their first position. String literals and quoted
/// identifiers are left untouched.
pub fn translate_named(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut chars = sql.char_indices().peekable();
    let mut in_string: Option<char> = None;

    while let Some((_, c)) = chars.next() {
        if let Some(quote) = in_string {
            out.push(c);
            if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                in_string = Some(c);
                out.push(c);
            }
            ':' if chars
                .peek()
                .map(|(_, n)| n.is_alphabetic() || *n == '_')
                .unwrap_or(false) =>
            {
                let mut name = String::new();
                while let Some((_, n)) = chars.peek() {
                    if n.is_alphanumeric() || *n == '_' {
                        name.push(*n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let position = match names.iter().position(|existing| *existing == name) {
                    Some(idx) => idx + 1,
                    None => {
                        names.push(name);
                        names.len()
                    }
                };
                out.push('?');
                out.push_str(&position.to_string());
            }
            _ => out.push(c),
        }
    }

    (out, names)
}

/// Finalize all cached statement handles, then close the connection.
///
/// Closing with live statements leaves the database file locked; the flush
/// must happen first.
pub fn close(conn: Connection) -> Result<()> {
    conn.flush_prepared_statement_cache();
    conn.close()
        .map_err(|(_, e)| AtlasError::db("close", e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_simple_named_params() {
        let (sql, names) =
            translate_named("SELECT * FROM nodes WHERE id = :id AND kind = :kind");
        assert_eq!(sql, "SELECT * FROM nodes WHERE id = ?1 AND kind = ?2");
        assert_eq!(names, vec!["id", "kind"]);
    }

    #[test]
    fn translate_reuses_position_for_repeated_name() {
        let (sql, names) = translate_named(
            "DELETE FROM edges WHERE source_id = :id OR target_id = :id",
        );
        assert_eq!(
            sql,
            "DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1"
        );
        assert_eq!(names, vec!["id"]);
    }

    #[test]
    fn translate_ignores_colons_in_string_literals() {
        let (sql, names) =
            translate_named("SELECT ':not_a_param' WHERE name = :name");
        assert_eq!(sql, "SELECT ':not_a_param' WHERE name = ?1");
        assert_eq!(names, vec!["name"]);
    }

    #[test]
    fn translate_leaves_plain_sql_alone() {
        let (sql, names) = translate_named("SELECT count(*) FROM nodes");
        assert_eq!(sql, "SELECT count(*) FROM nodes");
        assert!(names.is_empty());
    }

    #[test]
    fn portable_backend_filters_pragmas() {
        assert!(BackendKind::Native.supports_pragma("journal_mode"));
        assert!(!BackendKind::Portable.supports_pragma("journal_mode"));
        assert!(BackendKind::Portable.supports_pragma("foreign_keys"));
    }

    #[test]
    fn native_rewrite_is_identity() {
        let sql = "SELECT * FROM nodes WHERE id = :id";
        assert_eq!(BackendKind::Native.rewrite(sql), sql);
        assert_eq!(
            BackendKind::Portable.rewrite(sql),
            "SELECT * FROM nodes WHERE id = ?1"
        );
    }

    #[test]
    fn apply_pragmas_succeeds_on_memory_db() {
        let conn = Connection::open_in_memory().unwrap();
        BackendKind::Native.apply_pragmas(&conn).unwrap();
        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn close_releases_with_cached_statements() {
        let conn = Connection::open_in_memory().unwrap();
        {
            let mut stmt = conn.prepare_cached("SELECT 1").unwrap();
            let _: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
        }
        close(conn).unwrap();
    }
}
