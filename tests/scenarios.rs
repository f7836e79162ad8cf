//! End-to-end scenarios over real project trees on disk: index, mutate the
//! tree, sync, and query through the public API.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use codeatlas::config::ProjectConfig;
use codeatlas::context::{ContextBuilder, ContextOptions};
use codeatlas::graph::store::GraphStore;
use codeatlas::indexer::Indexer;
use codeatlas::query::{QueryEngine, SearchOptions, TraversalOptions};
use codeatlas::sync::SyncEngine;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn index(store: &GraphStore, root: &Path) {
    let result = Indexer::new(store, root, ProjectConfig::default())
        .index_all()
        .unwrap();
    assert!(result.success);
}

fn sync(store: &GraphStore, root: &Path) -> codeatlas::sync::SyncResult {
    SyncEngine::new(store, root, ProjectConfig::default())
        .sync()
        .unwrap()
}

fn search_names(store: &GraphStore, text: &str) -> Vec<String> {
    QueryEngine::new(store)
        .search_nodes(text, &SearchOptions::default())
        .unwrap()
        .into_iter()
        .map(|r| r.node.name)
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios 1–3: add / modify / delete
// ---------------------------------------------------------------------------

#[test]
fn scenario_add_file() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "src/hello.ts",
        "export function hello() { return 'world'; }\n",
    );
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    write(
        tmp.path(),
        "src/new.ts",
        "export function new_func() { return 1; }\n",
    );

    let engine = SyncEngine::new(&store, tmp.path(), ProjectConfig::default());
    let changed = engine.get_changed_files().unwrap();
    assert_eq!(changed.added, vec!["src/new.ts".to_string()]);

    let result = engine.sync().unwrap();
    assert_eq!(result.files_added, 1);

    assert!(search_names(&store, "new_func").contains(&"new_func".to_string()));
}

#[test]
fn scenario_modify_file() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "src/hello.ts",
        "export function hello() { return 'world'; }\n",
    );
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    write(
        tmp.path(),
        "src/hello.ts",
        "export function goodbye() { return 'farewell'; }\n",
    );

    let result = sync(&store, tmp.path());
    assert_eq!(result.files_modified, 1);

    assert!(search_names(&store, "hello").is_empty());
    assert!(!search_names(&store, "goodbye").is_empty());
}

#[test]
fn scenario_delete_file() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "src/hello.ts",
        "export function hello() { return 'world'; }\n",
    );
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    fs::remove_file(tmp.path().join("src/hello.ts")).unwrap();

    let result = sync(&store, tmp.path());
    assert_eq!(result.files_removed, 1);
    assert!(search_names(&store, "hello").is_empty());
    assert_eq!(store.stats().unwrap().files, 0);
}

// ---------------------------------------------------------------------------
// Scenarios 4–6: call graph
// ---------------------------------------------------------------------------

fn seed_call_graph(root: &Path) {
    write(
        root,
        "src/tokens.ts",
        "export function generate_token(userId: string): string {\n    return userId;\n}\n\nexport function verify_password(user: any, password: string): boolean {\n    return true;\n}\n\nexport function create_token(user: any): string {\n    return user.id;\n}\n",
    );
    write(
        root,
        "src/db.ts",
        "export function find_user_by_email(email: string): any {\n    return { email };\n}\n",
    );
    write(
        root,
        "src/auth.ts",
        "export class AuthService {\n    register(email: string): string {\n        return generate_token(email);\n    }\n\n    login(email: string, password: string): string {\n        const user = db.find_user_by_email(email);\n        verify_password(user, password);\n        return create_token(user);\n    }\n}\n",
    );
    write(
        root,
        "src/payments.ts",
        "export class PaymentService {\n    process_payment(orderId: string): string {\n        return generate_token(orderId);\n    }\n\n    refund_payment(orderId: string): string {\n        return generate_token(orderId);\n    }\n}\n",
    );
    write(
        root,
        "src/orders.ts",
        "export class OrderService {\n    pay_order(orderId: string): string {\n        return payments.process_payment(orderId);\n    }\n}\n",
    );
}

#[test]
fn scenario_callers_of_generate_token() {
    let tmp = tempfile::tempdir().unwrap();
    seed_call_graph(tmp.path());
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    let engine = QueryEngine::new(&store);
    let token = engine.resolve_node("generate_token").unwrap().unwrap();
    let callers = engine.get_callers(&token.id).unwrap();

    let names: HashSet<&str> = callers.iter().map(|n| n.name.as_str()).collect();
    let expected: HashSet<&str> = ["register", "login", "process_payment", "refund_payment"]
        .into_iter()
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn scenario_callees_of_login() {
    let tmp = tempfile::tempdir().unwrap();
    seed_call_graph(tmp.path());
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    let engine = QueryEngine::new(&store);
    let login = engine
        .resolve_node("src/auth.ts::AuthService::login")
        .unwrap()
        .unwrap();
    let callees = engine.get_callees(&login.id).unwrap();

    let names: HashSet<&str> = callees.iter().map(|n| n.name.as_str()).collect();
    let expected: HashSet<&str> = ["find_user_by_email", "verify_password", "create_token"]
        .into_iter()
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn scenario_impact_radius_of_generate_token() {
    let tmp = tempfile::tempdir().unwrap();
    seed_call_graph(tmp.path());
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    let engine = QueryEngine::new(&store);
    let token = engine.resolve_node("generate_token").unwrap().unwrap();
    let radius = engine
        .get_impact_radius(
            &token.id,
            &TraversalOptions {
                max_depth: 2,
                ..Default::default()
            },
        )
        .unwrap();

    let names: HashSet<&str> = radius.nodes.values().map(|n| n.name.as_str()).collect();
    for direct in ["register", "login", "process_payment", "refund_payment"] {
        assert!(names.contains(direct), "missing direct caller {direct}");
    }
    // pay_order reaches generate_token through process_payment.
    assert!(names.contains("pay_order"));
}

// ---------------------------------------------------------------------------
// Scenario 7: context assembly
// ---------------------------------------------------------------------------

#[test]
fn scenario_context_for_login_bug() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "src/users.ts",
        "export class User {\n    id: string;\n    email: string;\n}\n",
    );
    write(
        tmp.path(),
        "src/auth.ts",
        "export function verify_password(user: any, password: string): boolean {\n    return true;\n}\n\nexport class AuthService {\n    login(email: string, password: string): string {\n        const user = new User();\n        verify_password(user, password);\n        return email;\n    }\n}\n",
    );
    write(
        tmp.path(),
        "src/orders.ts",
        "export class OrderService {\n    cancel_order(id: string): void {}\n}\n",
    );

    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    let result = ContextBuilder::new(&store, tmp.path())
        .build_context("fix login bug", &ContextOptions::default())
        .unwrap();
    let doc = result.to_markdown(8_000);

    assert!(doc.contains("login"), "document:\n{doc}");
    assert!(doc.contains("verify_password"), "document:\n{doc}");
    assert!(doc.contains("User"), "document:\n{doc}");
    assert!(!doc.contains("cancel_order"), "document:\n{doc}");
}

// ---------------------------------------------------------------------------
// Idempotence & boundaries
// ---------------------------------------------------------------------------

#[test]
fn index_then_sync_reports_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    seed_call_graph(tmp.path());
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    let result = sync(&store, tmp.path());
    assert_eq!(result.files_added, 0);
    assert_eq!(result.files_modified, 0);
    assert_eq!(result.files_removed, 0);
}

#[test]
fn reindexing_unchanged_content_is_byte_stable() {
    let tmp = tempfile::tempdir().unwrap();
    seed_call_graph(tmp.path());
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    let before = store.stats().unwrap();
    let ids_before: Vec<String> = store
        .get_nodes_by_file("src/auth.ts")
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();

    index(&store, tmp.path());

    assert_eq!(store.stats().unwrap(), before);
    let ids_after: Vec<String> = store
        .get_nodes_by_file("src/auth.ts")
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids_before, ids_after);
}

#[test]
fn resolved_edges_always_point_at_real_nodes() {
    let tmp = tempfile::tempdir().unwrap();
    seed_call_graph(tmp.path());
    let store = GraphStore::open_in_memory().unwrap();
    index(&store, tmp.path());

    for file in store.get_all_files().unwrap() {
        for node in store.get_nodes_by_file(&file.path).unwrap() {
            for edge in store.get_edges_from(&node.id, None).unwrap() {
                if edge.resolved {
                    assert!(
                        store.get_node(&edge.target_id).unwrap().is_some(),
                        "resolved edge {} -> {} dangles",
                        edge.source_id,
                        edge.target_id
                    );
                }
            }
        }
    }
}

#[test]
fn oversized_files_contribute_no_nodes() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "src/ok.ts", "export function ok() {}\n");
    let big = format!("export function big() {{ return \"{}\"; }}\n", "x".repeat(4096));
    write(tmp.path(), "src/big.ts", &big);

    let mut config = ProjectConfig::default();
    config.max_file_size = 1024;
    let store = GraphStore::open_in_memory().unwrap();
    Indexer::new(&store, tmp.path(), config).index_all().unwrap();

    assert!(store.get_file_by_path("src/big.ts").unwrap().is_none());
    assert!(store.get_nodes_by_name("big").unwrap().is_empty());
    assert!(!store.get_nodes_by_name("ok").unwrap().is_empty());
}
