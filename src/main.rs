use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use codeatlas::config;
use codeatlas::context::{ContextBuilder, ContextOptions};
use codeatlas::db::BackendKind;
use codeatlas::error::AtlasError;
use codeatlas::graph::store::GraphStore;
use codeatlas::indexer::{Indexer, Phase};
use codeatlas::observability::init_logging;
use codeatlas::query::{QueryEngine, SearchOptions, TraversalOptions};
use codeatlas::server::RpcServer;
use codeatlas::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(version, about = "Local-first code knowledge graph engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the .codeatlas layout and default configuration
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        directory: String,
    },
    /// Index the whole project
    Index {
        /// Project directory
        #[arg(default_value = ".")]
        directory: String,
        /// Drop the existing index and rebuild from scratch
        #[arg(long)]
        force: bool,
    },
    /// Reconcile the index with the filesystem
    Sync {
        /// Project directory
        #[arg(default_value = ".")]
        directory: String,
    },
    /// Direct-edge queries by node id or name
    Query {
        /// One of: callers, callees, dependencies, dependents, search
        operation: String,
        /// Node id, qualified name, bare name, or search text
        target: String,
        /// Project directory
        #[arg(long, default_value = ".")]
        directory: String,
        /// Maximum results for search
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Show what a change to a symbol could affect
    Impact {
        /// Node id, qualified name, or bare name
        target: String,
        /// Traversal depth
        #[arg(long, default_value_t = 2)]
        depth: u32,
        /// Project directory
        #[arg(long, default_value = ".")]
        directory: String,
    },
    /// Build a context document for a task description
    Context {
        /// Natural-language task description
        task: String,
        /// Project directory
        #[arg(long, default_value = ".")]
        directory: String,
        /// Emit the full JSON record instead of Markdown
        #[arg(long)]
        json: bool,
    },
    /// Show index statistics
    Status {
        /// Project directory
        #[arg(default_value = ".")]
        directory: String,
    },
    /// Serve line-delimited JSON-RPC over stdio
    Serve {
        /// Project directory
        #[arg(default_value = ".")]
        directory: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { directory } => cmd_init(&directory),
        Commands::Index { directory, force } => cmd_index(&directory, force),
        Commands::Sync { directory } => cmd_sync(&directory),
        Commands::Query {
            operation,
            target,
            directory,
            limit,
        } => cmd_query(&operation, &target, &directory, limit),
        Commands::Impact {
            target,
            depth,
            directory,
        } => cmd_impact(&target, depth, &directory),
        Commands::Context {
            task,
            directory,
            json,
        } => cmd_context(&task, &directory, json),
        Commands::Status { directory } => cmd_status(&directory),
        Commands::Serve { directory } => cmd_serve(&directory),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Exit codes: 0 success, 1 failure, 2 database locked elsewhere.
fn bail(error: AtlasError) -> ! {
    eprintln!("error: {error}");
    let code = match error {
        AtlasError::Lock { .. } => 2,
        _ => 1,
    };
    process::exit(code);
}

fn resolve_root(directory: &str) -> PathBuf {
    PathBuf::from(directory).canonicalize().unwrap_or_else(|e| {
        eprintln!("error: cannot resolve directory '{directory}': {e}");
        process::exit(1);
    })
}

fn open_writer(root: &Path) -> GraphStore {
    GraphStore::open_writer(root, BackendKind::Native).unwrap_or_else(|e| bail(e))
}

fn open_reader(root: &Path) -> GraphStore {
    let db = config::db_path(root);
    if !db.exists() {
        eprintln!("error: no index at '{}'", db.display());
        eprintln!("Run `codeatlas index` first.");
        process::exit(1);
    }
    GraphStore::open_reader(root, BackendKind::Native).unwrap_or_else(|e| bail(e))
}

fn load_config(root: &Path) -> config::ProjectConfig {
    config::ProjectConfig::load(root).unwrap_or_else(|e| bail(e))
}

fn index_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(directory: &str) {
    let root = resolve_root(directory);
    match config::init_layout(&root) {
        Ok(_) => {
            println!("Initialized {}", config::atlas_dir(&root).display());
            println!("Next: codeatlas index {directory}");
        }
        Err(e) => bail(e),
    }
}

fn cmd_index(directory: &str, force: bool) {
    let root = resolve_root(directory);
    let project_config = match config::init_layout(&root) {
        Ok(cfg) => cfg,
        Err(e) => bail(e),
    };

    if force {
        let db = config::db_path(&root);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", db.display()));
        }
    }

    let store = open_writer(&root);
    let bar = index_progress_bar();
    let bar_for_progress = bar.clone();

    let indexer = Indexer::new(&store, &root, project_config).with_progress(
        move |phase, current, total, file| {
            let location = file.unwrap_or("");
            bar_for_progress.set_message(match phase {
                Phase::Scanning => "scanning files".to_string(),
                _ => format!("{} {current}/{total} {location}", phase.as_str()),
            });
            bar_for_progress.tick();
        },
    );

    match indexer.index_all() {
        Ok(result) => {
            bar.finish_and_clear();
            println!("{result}");
            for warning in &result.errors {
                eprintln!("warning: {warning}");
            }
            match store.stats() {
                Ok(stats) => println!(
                    "Totals: {} files, {} nodes, {} edges, {} pending refs",
                    stats.files, stats.nodes, stats.edges, stats.unresolved_refs,
                ),
                Err(e) => bail(e),
            }
            if !result.success {
                process::exit(1);
            }
        }
        Err(e) => {
            bar.finish_and_clear();
            bail(e);
        }
    }
}

fn cmd_sync(directory: &str) {
    let root = resolve_root(directory);
    let project_config = load_config(&root);
    let store = open_writer(&root);

    match SyncEngine::new(&store, &root, project_config).sync() {
        Ok(result) => {
            println!("{result}");
            for path in &result.changed_paths {
                println!("  {path}");
            }
        }
        Err(e) => bail(e),
    }
}

fn cmd_query(operation: &str, target: &str, directory: &str, limit: usize) {
    let root = resolve_root(directory);
    let store = open_reader(&root);
    let engine = QueryEngine::new(&store);

    if operation == "search" {
        let results = engine
            .search_nodes(
                target,
                &SearchOptions {
                    limit: Some(limit),
                    ..Default::default()
                },
            )
            .unwrap_or_else(|e| bail(e));
        if results.is_empty() {
            println!("No results for \"{target}\".");
            return;
        }
        for (i, result) in results.iter().enumerate() {
            println!(
                "{}. {} ({}) — {}:{} [score {:.1}]",
                i + 1,
                result.node.name,
                result.node.kind,
                result.node.file_path,
                result.node.start_line,
                result.score,
            );
        }
        return;
    }

    let node = match engine.resolve_node(target) {
        Ok(Some(node)) => node,
        Ok(None) => {
            eprintln!("error: no node matches '{target}'");
            process::exit(1);
        }
        Err(e) => bail(e),
    };

    let neighbors = match operation {
        "callers" => engine.get_callers(&node.id),
        "callees" => engine.get_callees(&node.id),
        "dependencies" => engine.get_dependencies(&node.id),
        "dependents" => engine.get_dependents(&node.id),
        other => {
            eprintln!(
                "error: unknown operation '{other}' (expected callers, callees, dependencies, dependents, search)"
            );
            process::exit(1);
        }
    }
    .unwrap_or_else(|e| bail(e));

    println!(
        "{} of {} ({}):",
        operation, node.qualified_name, node.kind
    );
    if neighbors.is_empty() {
        println!("  (none)");
    }
    for neighbor in neighbors {
        println!(
            "  {} ({}) — {}:{}",
            neighbor.qualified_name, neighbor.kind, neighbor.file_path, neighbor.start_line,
        );
    }
}

fn cmd_impact(target: &str, depth: u32, directory: &str) {
    let root = resolve_root(directory);
    let store = open_reader(&root);
    let engine = QueryEngine::new(&store);

    let node = match engine.resolve_node(target) {
        Ok(Some(node)) => node,
        Ok(None) => {
            eprintln!("error: no node matches '{target}'");
            process::exit(1);
        }
        Err(e) => bail(e),
    };

    let subgraph = engine
        .get_impact_radius(
            &node.id,
            &TraversalOptions {
                max_depth: depth,
                ..Default::default()
            },
        )
        .unwrap_or_else(|e| bail(e));

    println!("Impact radius of {} (depth {depth}):", node.qualified_name);
    let mut affected: Vec<_> = subgraph
        .nodes
        .values()
        .filter(|n| n.id != node.id)
        .collect();
    affected.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
    if affected.is_empty() {
        println!("  nothing depends on it");
    }
    for n in affected {
        println!("  {} ({}) — {}:{}", n.qualified_name, n.kind, n.file_path, n.start_line);
    }
    if subgraph.stats.truncated {
        println!("  … truncated at {} nodes", subgraph.nodes.len());
    }
}

fn cmd_context(task: &str, directory: &str, json: bool) {
    let root = resolve_root(directory);
    let store = open_reader(&root);
    let options = ContextOptions::default();

    let result = ContextBuilder::new(&store, &root)
        .build_context(task, &options)
        .unwrap_or_else(|e| bail(e));

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(record) => println!("{record}"),
            Err(e) => bail(e.into()),
        }
    } else {
        println!("{}", result.to_markdown(options.token_budget));
    }
}

fn cmd_status(directory: &str) {
    let root = resolve_root(directory);
    let store = open_reader(&root);
    match store.stats() {
        Ok(stats) => {
            println!("codeatlas index at {}", config::db_path(&root).display());
            println!("  files:        {}", stats.files);
            println!("  nodes:        {}", stats.nodes);
            println!("  edges:        {}", stats.edges);
            println!("  pending refs: {}", stats.unresolved_refs);
        }
        Err(e) => bail(e),
    }
}

fn cmd_serve(directory: &str) {
    let root = resolve_root(directory);
    let store = open_reader(&root);
    let server = RpcServer::new(&store, &root);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = server.serve(stdin.lock(), stdout.lock()) {
        bail(e);
    }
}
