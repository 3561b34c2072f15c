//! End-to-end lifecycle: chart creation, draft saves, named versions,
//! plans and checkout, exercised through the public API only.

use std::collections::BTreeMap;

use planemgr_core::chart::{ChartStore, FileUpdate};
use planemgr_core::diff::{PlanAction, PlanTarget};
use planemgr_core::history::{DRAFT_SUBJECT, HistoryManager};
use planemgr_core::model::{Edge, EdgeKind, Graph, Layer, Node, NodeKind, Position};
use planemgr_core::snapshot;
use serde_json::json;
use tempfile::TempDir;

fn store() -> (TempDir, ChartStore) {
    let dir = TempDir::new().unwrap();
    let store = ChartStore::new(dir.path().join("charts"));
    (dir, store)
}

fn web_tier() -> (Graph, Vec<Layer>) {
    let (_, layers) = snapshot::default_chart();
    let mut graph = Graph::new();

    let mut cloud = Node::new("cloud-1", NodeKind::Platform, "Cloud account", "physical");
    cloud.position = Position::new(40.0, 40.0);
    graph.nodes.push(cloud);

    let mut web = Node::new("web-1", NodeKind::Compute, "Web server", "service");
    web.position = Position::new(220.0, 120.0);
    web.config.insert("platformId".to_string(), json!("cloud-1"));
    web.config.insert("image".to_string(), json!("nginx:1.27"));
    graph.nodes.push(web);

    let mut db = Node::new("db-1", NodeKind::Storage, "Database", "infra");
    db.position = Position::new(220.0, 320.0);
    db.config.insert("engine".to_string(), json!("postgres"));
    graph.nodes.push(db);

    graph
        .edges
        .push(Edge::new("e-web-db", EdgeKind::Data, "web-1", "db-1"));

    (graph, layers)
}

#[test]
fn full_edit_version_plan_restore_cycle() {
    let (_dir, store) = store();
    let chart_id = store.create().unwrap();
    let history = HistoryManager::new(&store, &chart_id);

    // A fresh chart loads as the seeded default workspace.
    let workspace = history.load_workspace().unwrap();
    assert!(workspace.graph.nodes.is_empty());
    assert_eq!(workspace.layers.len(), 4);

    // Build the first revision and seal it.
    let (graph, layers) = web_tier();
    let outcome = history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();
    assert!(outcome.committed);
    let v1 = history.create_version("v1", Some("initial web tier")).unwrap();
    assert_eq!(v1.name, "v1");
    assert_eq!(v1.graph.nodes.len(), 3);

    // Keep editing: swap the image, add a cache, drop the database.
    let (mut graph, layers) = web_tier();
    graph.nodes[1].config["image"] = json!("nginx:1.29");
    let mut cache = Node::new("cache-1", NodeKind::Storage, "Cache", "infra");
    cache.position = Position::new(420.0, 320.0);
    graph.nodes.push(cache);
    graph.nodes.retain(|n| n.id != "db-1");
    graph.edges.clear();
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();

    // The plan against v1 reflects exactly those edits, nodes before
    // edges, deletes last.
    let plan = history.build_plan(Some(&v1.id)).unwrap();
    assert_eq!(plan.base_version_id.as_deref(), Some(v1.id.as_str()));
    let shape: Vec<(PlanAction, PlanTarget, &str)> = plan
        .operations
        .iter()
        .map(|op| (op.action, op.target, op.target_id.as_str()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (PlanAction::Update, PlanTarget::Node, "web-1"),
            (PlanAction::Create, PlanTarget::Node, "cache-1"),
            (PlanAction::Delete, PlanTarget::Node, "db-1"),
            (PlanAction::Delete, PlanTarget::Edge, "e-web-db"),
        ]
    );
    assert_eq!(plan.stats.adds, 1);
    assert_eq!(plan.stats.updates, 1);
    assert_eq!(plan.stats.deletes, 2);

    // Seal the second revision, then restore the first.
    let v2 = history.create_version("v2", None).unwrap();
    let restored = history.checkout_version(&v1.id, false).unwrap();
    assert!(restored.graph.node("db-1").is_some());
    assert!(restored.graph.node("cache-1").is_none());

    // History: trailing draft, v2, its draft ancestry collapsed, v1, and
    // the restore never moved the branch backwards.
    let versions = history.list_versions().unwrap();
    let names: Vec<&str> = versions.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec![DRAFT_SUBJECT, "v2", "v1"]);
    assert_eq!(versions[2].id, v1.id);

    // The restored draft plans clean against v1.
    let plan = history.build_plan(Some(&v1.id)).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn rename_between_versions_is_a_single_label_update() {
    let (_dir, store) = store();
    let chart_id = store.create().unwrap();
    let history = HistoryManager::new(&store, &chart_id);

    let (graph, layers) = web_tier();
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();
    let v1 = history.create_version("before rename", None).unwrap();

    let (mut graph, layers) = web_tier();
    graph.nodes[1].label = "Web frontend".to_string();
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();

    let plan = history.build_plan(Some(&v1.id)).unwrap();
    assert_eq!(plan.operations.len(), 1);
    let op = &plan.operations[0];
    assert_eq!(op.action, PlanAction::Update);
    assert_eq!(op.target_id, "web-1");
    let changes = op.changes.as_ref().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes["label"].from, json!("Web server"));
    assert_eq!(changes["label"].to, json!("Web frontend"));
}

#[test]
fn moving_nodes_around_produces_no_plan_and_no_primary_change() {
    let (_dir, store) = store();
    let chart_id = store.create().unwrap();
    let history = HistoryManager::new(&store, &chart_id);

    let (graph, layers) = web_tier();
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();
    let v1 = history.create_version("layout baseline", None).unwrap();
    let primary_before = store
        .read_file(&chart_id, snapshot::CHART_FILE, None)
        .unwrap();

    let (mut graph, layers) = web_tier();
    for node in &mut graph.nodes {
        node.position = Position::new(node.position.x + 55.0, node.position.y - 10.0);
    }
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();

    let primary_after = store
        .read_file(&chart_id, snapshot::CHART_FILE, None)
        .unwrap();
    assert_eq!(primary_before.content, primary_after.content);

    let plan = history.build_plan(Some(&v1.id)).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn snapshot_bytes_are_reproducible_across_charts() {
    let (_dir, store) = store();
    let first = store.create().unwrap();
    let second = store.create().unwrap();

    let (graph, layers) = web_tier();
    HistoryManager::new(&store, &first)
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();

    let mut reordered = graph.clone();
    reordered.nodes.reverse();
    HistoryManager::new(&store, &second)
        .save_workspace(&reordered, &layers, &BTreeMap::new())
        .unwrap();

    let a = store.read_file(&first, snapshot::CHART_FILE, None).unwrap();
    let b = store.read_file(&second, snapshot::CHART_FILE, None).unwrap();
    assert_eq!(a.content, b.content);
}

#[test]
fn raw_file_commits_coexist_with_workspace_history() {
    let (_dir, store) = store();
    let chart_id = store.create().unwrap();
    let history = HistoryManager::new(&store, &chart_id);

    let (graph, layers) = web_tier();
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();
    history.create_version("v1", None).unwrap();

    // Park a terraform export next to the snapshot files.
    store
        .write_files(
            &chart_id,
            &[FileUpdate::new(
                "exports/planemgr.tf.json",
                "{\"resource\": {}}\n",
            )],
            "Add terraform export",
        )
        .unwrap();

    let listing = store.list_tree(&chart_id, None).unwrap();
    assert_eq!(
        listing.files,
        vec![
            "chart.json",
            "chart.meta.json",
            "exports/planemgr.tf.json",
        ]
    );

    // The export commit reads as a version (its snapshot is intact) and
    // subsequent saves carry the extra file along untouched.
    let versions = history.list_versions().unwrap();
    assert_eq!(versions[0].name, "Add terraform export");

    let (mut graph, layers) = web_tier();
    graph.nodes[1].label = "Web edited".to_string();
    history
        .save_workspace(&graph, &layers, &BTreeMap::new())
        .unwrap();
    let export = store
        .read_file(&chart_id, "exports/planemgr.tf.json", None)
        .unwrap();
    assert_eq!(export.content, "{\"resource\": {}}\n");
}
