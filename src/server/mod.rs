//! Request-response server: line-delimited JSON-RPC 2.0 over stdio.
//!
//! One request per line, one response per line. Methods map one-to-one to
//! the query engine and context builder; `initialize` advertises the
//! capability set. Errors use the reserved codes: -32700 parse, -32600
//! invalid request, -32601 method not found, -32602 invalid params,
//! -32603 internal.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{ContextBuilder, ContextOptions};
use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::query::{
    Direction, QueryEngine, SearchOptions, TraversalOptions,
};
use crate::types::{EdgeKind, NodeKind};

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// The closed list of supported operations.
pub const METHODS: &[&str] = &[
    "initialize",
    "search_nodes",
    "get_callers",
    "get_callees",
    "get_dependencies",
    "get_dependents",
    "traverse",
    "impact_radius",
    "find_paths",
    "build_context",
    "status",
    "shutdown",
];

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Value,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

struct RpcFailure {
    code: i64,
    message: String,
}

impl RpcFailure {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

fn success(id: Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

fn failure(id: Value, error: RpcFailure) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": error.code, "message": error.message },
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    limit: Option<usize>,
    kind: Option<String>,
}

#[derive(Deserialize)]
struct TargetParams {
    /// Node id, qualified name, or bare name.
    target: String,
}

#[derive(Deserialize)]
struct TraverseParams {
    starts: Vec<String>,
    max_depth: Option<u32>,
    max_nodes: Option<usize>,
    edge_kinds: Option<Vec<String>>,
    direction: Option<String>,
}

#[derive(Deserialize)]
struct ImpactParams {
    target: String,
    max_depth: Option<u32>,
    max_nodes: Option<usize>,
}

#[derive(Deserialize)]
struct PathsParams {
    from: String,
    to: String,
    max_depth: Option<u32>,
    max_paths: Option<usize>,
}

#[derive(Deserialize)]
struct ContextParams {
    task: String,
    search_limit: Option<usize>,
    traversal_depth: Option<u32>,
    max_nodes: Option<usize>,
    max_code_blocks: Option<usize>,
    max_code_block_size: Option<usize>,
    /// `markdown` (default) or `json`.
    format: Option<String>,
}

// ---------------------------------------------------------------------------
// RpcServer
// ---------------------------------------------------------------------------

pub struct RpcServer<'a> {
    store: &'a GraphStore,
    root: PathBuf,
}

impl<'a> RpcServer<'a> {
    pub fn new(store: &'a GraphStore, root: &Path) -> Self {
        Self {
            store,
            root: root.to_path_buf(),
        }
    }

    /// Serve until EOF or a `shutdown` request.
    pub fn serve(&self, reader: impl BufRead, mut writer: impl Write) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (response, shutdown) = self.handle_line(&line);
            writeln!(writer, "{response}")?;
            writer.flush()?;
            if shutdown {
                break;
            }
        }
        Ok(())
    }

    /// Handle one request line. Returns the response and whether to stop.
    pub fn handle_line(&self, line: &str) -> (String, bool) {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return (
                    failure(Value::Null, RpcFailure::new(PARSE_ERROR, e.to_string())),
                    false,
                );
            }
        };

        let id = request.id.clone();
        if request.jsonrpc.as_deref() != Some("2.0") {
            return (
                failure(
                    id,
                    RpcFailure::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
                ),
                false,
            );
        }
        let Some(method) = request.method else {
            return (
                failure(id, RpcFailure::new(INVALID_REQUEST, "missing method")),
                false,
            );
        };

        if method == "shutdown" {
            return (success(id, Value::Null), true);
        }

        match self.dispatch(&method, request.params) {
            Ok(result) => (success(id, result), false),
            Err(error) => (failure(id, error), false),
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFailure> {
        let engine = QueryEngine::new(self.store);
        match method {
            "initialize" => Ok(json!({
                "server": "codeatlas",
                "version": env!("CARGO_PKG_VERSION"),
                "capabilities": { "methods": METHODS },
            })),

            "search_nodes" => {
                let p: SearchParams = parse_params(params)?;
                let kinds = match p.kind.as_deref() {
                    Some(raw) => Some(vec![NodeKind::from_str_loose(raw).ok_or_else(
                        || RpcFailure::invalid_params(format!("unknown node kind '{raw}'")),
                    )?]),
                    None => None,
                };
                let results = engine
                    .search_nodes(
                        &p.query,
                        &SearchOptions {
                            limit: p.limit,
                            kinds,
                            language: None,
                        },
                    )
                    .map_err(internal)?;
                Ok(serde_json::to_value(results).map_err(internal)?)
            }

            "get_callers" | "get_callees" | "get_dependencies" | "get_dependents" => {
                let p: TargetParams = parse_params(params)?;
                let node = self.resolve_target(&engine, &p.target)?;
                let nodes = match method {
                    "get_callers" => engine.get_callers(&node.id),
                    "get_callees" => engine.get_callees(&node.id),
                    "get_dependencies" => engine.get_dependencies(&node.id),
                    _ => engine.get_dependents(&node.id),
                }
                .map_err(internal)?;
                Ok(serde_json::to_value(nodes).map_err(internal)?)
            }

            "traverse" => {
                let p: TraverseParams = parse_params(params)?;
                let options = traversal_options(
                    p.max_depth,
                    p.max_nodes,
                    p.edge_kinds,
                    p.direction,
                )?;
                let subgraph = engine.traverse(&p.starts, &options).map_err(internal)?;
                Ok(serde_json::to_value(subgraph).map_err(internal)?)
            }

            "impact_radius" => {
                let p: ImpactParams = parse_params(params)?;
                let node = self.resolve_target(&engine, &p.target)?;
                let options = TraversalOptions {
                    max_depth: p.max_depth.unwrap_or(2),
                    max_nodes: p.max_nodes.unwrap_or(50),
                    ..Default::default()
                };
                let subgraph = engine
                    .get_impact_radius(&node.id, &options)
                    .map_err(internal)?;
                Ok(serde_json::to_value(subgraph).map_err(internal)?)
            }

            "find_paths" => {
                let p: PathsParams = parse_params(params)?;
                let from = self.resolve_target(&engine, &p.from)?;
                let to = self.resolve_target(&engine, &p.to)?;
                let paths = engine
                    .find_paths(
                        &from.id,
                        &to.id,
                        p.max_depth.unwrap_or(4),
                        p.max_paths.unwrap_or(5),
                    )
                    .map_err(internal)?;
                Ok(serde_json::to_value(paths).map_err(internal)?)
            }

            "build_context" => {
                let p: ContextParams = parse_params(params)?;
                let defaults = ContextOptions::default();
                let options = ContextOptions {
                    search_limit: p.search_limit.unwrap_or(defaults.search_limit),
                    traversal_depth: p.traversal_depth.unwrap_or(defaults.traversal_depth),
                    max_nodes: p.max_nodes.unwrap_or(defaults.max_nodes),
                    max_code_blocks: p.max_code_blocks.unwrap_or(defaults.max_code_blocks),
                    max_code_block_size: p
                        .max_code_block_size
                        .unwrap_or(defaults.max_code_block_size),
                    token_budget: defaults.token_budget,
                };
                let builder = ContextBuilder::new(self.store, &self.root);
                let result = builder.build_context(&p.task, &options).map_err(internal)?;
                match p.format.as_deref() {
                    Some("json") => Ok(serde_json::to_value(result).map_err(internal)?),
                    Some("markdown") | None => Ok(json!({
                        "document": result.to_markdown(options.token_budget),
                    })),
                    Some(other) => Err(RpcFailure::invalid_params(format!(
                        "unknown format '{other}'"
                    ))),
                }
            }

            "status" => {
                let stats = self.store.stats().map_err(internal)?;
                Ok(serde_json::to_value(stats).map_err(internal)?)
            }

            _ => Err(RpcFailure::new(
                METHOD_NOT_FOUND,
                format!("unknown method '{method}'"),
            )),
        }
    }

    fn resolve_target(
        &self,
        engine: &QueryEngine<'_>,
        target: &str,
    ) -> std::result::Result<crate::types::CodeNode, RpcFailure> {
        engine
            .resolve_node(target)
            .map_err(internal)?
            .ok_or_else(|| RpcFailure::invalid_params(format!("unknown target '{target}'")))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Value,
) -> std::result::Result<T, RpcFailure> {
    serde_json::from_value(params).map_err(|e| RpcFailure::invalid_params(e.to_string()))
}

fn internal(e: impl std::fmt::Display) -> RpcFailure {
    RpcFailure::new(INTERNAL_ERROR, e.to_string())
}

fn traversal_options(
    max_depth: Option<u32>,
    max_nodes: Option<usize>,
    edge_kinds: Option<Vec<String>>,
    direction: Option<String>,
) -> std::result::Result<TraversalOptions, RpcFailure> {
    let edge_kinds = match edge_kinds {
        Some(raw) => {
            let mut kinds = Vec::with_capacity(raw.len());
            for name in raw {
                kinds.push(EdgeKind::from_str_loose(&name).ok_or_else(|| {
                    RpcFailure::invalid_params(format!("unknown edge kind '{name}'"))
                })?);
            }
            Some(kinds)
        }
        None => None,
    };
    let direction = match direction.as_deref() {
        Some("outbound") | None => Direction::Outbound,
        Some("inbound") => Direction::Inbound,
        Some("both") => Direction::Both,
        Some(other) => {
            return Err(RpcFailure::invalid_params(format!(
                "unknown direction '{other}'"
            )));
        }
    };
    Ok(TraversalOptions {
        max_depth: max_depth.unwrap_or(2),
        max_nodes: max_nodes.unwrap_or(50),
        edge_kinds,
        node_kinds: None,
        direction,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
