//! Row-to-struct converters for database queries.

use std::collections::HashMap;

use rusqlite::Row;

use crate::types::{
    CodeEdge, CodeNode, EdgeKind, FileRecord, Language, NodeKind, UnresolvedRef, Visibility,
};

/// Convert a `SELECT * FROM nodes` row into a [`CodeNode`].
pub fn row_to_node(row: &Row<'_>) -> rusqlite::Result<CodeNode> {
    let kind_str: String = row.get("kind")?;
    let language_str: String = row.get("language")?;
    let visibility_str: Option<String> = row.get("visibility")?;
    let metadata_json: Option<String> = row.get("metadata")?;

    let metadata: Option<HashMap<String, String>> = metadata_json
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());

    Ok(CodeNode {
        id: row.get("id")?,
        kind: NodeKind::from_str_loose(&kind_str).unwrap_or(NodeKind::Variable),
        name: row.get("name")?,
        qualified_name: row.get("qualified_name")?,
        file_path: row.get("file_path")?,
        language: Language::from_str_loose(&language_str).unwrap_or(Language::TypeScript),
        start_line: row.get("start_line")?,
        end_line: row.get("end_line")?,
        start_column: row.get("start_column")?,
        end_column: row.get("end_column")?,
        signature: row.get("signature")?,
        docstring: row.get("docstring")?,
        code_snippet: row.get("code_snippet")?,
        code_hash: row.get("code_hash")?,
        visibility: visibility_str
            .as_deref()
            .and_then(Visibility::from_str_loose),
        is_exported: row.get::<_, i64>("is_exported")? != 0,
        is_async: row.get::<_, i64>("is_async")? != 0,
        is_static: row.get::<_, i64>("is_static")? != 0,
        metadata,
        updated_at: row.get("updated_at")?,
    })
}

/// Convert a `SELECT * FROM edges` row into a [`CodeEdge`].
pub fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<CodeEdge> {
    let kind_str: String = row.get("kind")?;
    let metadata_json: Option<String> = row.get("metadata")?;
    let metadata: Option<HashMap<String, String>> = metadata_json
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());

    Ok(CodeEdge {
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        kind: EdgeKind::from_str_loose(&kind_str).unwrap_or(EdgeKind::References),
        resolved: row.get::<_, i64>("resolved")? != 0,
        target_name: row.get("target_name")?,
        line_number: row.get("line_number")?,
        metadata,
    })
}

/// Convert a `SELECT * FROM files` row into a [`FileRecord`].
pub fn row_to_file(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let language_str: String = row.get("language")?;
    Ok(FileRecord {
        path: row.get("path")?,
        content_hash: row.get("content_hash")?,
        language: Language::from_str_loose(&language_str).unwrap_or(Language::TypeScript),
        size: row.get::<_, i64>("size")? as u64,
        modified_at: row.get("modified_at")?,
        indexed_at: row.get("indexed_at")?,
        node_count: row.get::<_, i64>("node_count")? as usize,
        errors: row.get("errors")?,
    })
}

/// Convert a `SELECT * FROM unresolved_refs` row into an [`UnresolvedRef`].
pub fn row_to_unresolved(row: &Row<'_>) -> rusqlite::Result<UnresolvedRef> {
    let kind_str: String = row.get("reference_kind")?;
    let language_str: String = row.get("language")?;
    Ok(UnresolvedRef {
        from_node_id: row.get("from_node_id")?,
        reference_name: row.get("reference_name")?,
        reference_kind: EdgeKind::from_str_loose(&kind_str).unwrap_or(EdgeKind::References),
        line: row.get("line")?,
        column: row.get("column_number")?,
        file_path: row.get("file_path")?,
        language: Language::from_str_loose(&language_str).unwrap_or(Language::TypeScript),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
