//! Pure graph diff: current workspace vs. a base version.
//!
//! Produces a `Plan` of create/update/delete operations with field-level
//! changes. Only semantic fields participate; canvas position and size are
//! layout state and never produce operations. Operation order is
//! deterministic so the same pair of graphs always yields the same plan.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::model::{Edge, Graph, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTarget {
    Node,
    Edge,
}

/// Old and new value of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOperation {
    pub id: String,
    pub action: PlanAction,
    pub target: PlanTarget,
    /// Id of the node or edge the operation applies to.
    pub target_id: String,
    /// Human-readable one-liner for plan review.
    pub summary: String,
    /// Field-level changes, present on updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<BTreeMap<String, FieldChange>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub adds: usize,
    pub updates: usize,
    pub deletes: usize,
}

/// An ordered set of operations turning a base graph into the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub workspace_id: String,
    /// Commit hash of the base version, absent when planning against
    /// nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub operations: Vec<PlanOperation>,
    pub stats: PlanStats,
}

impl Plan {
    /// Diff `current` against `base`. `base = None` plans against an empty
    /// graph, so every element comes out as a create.
    ///
    /// Node operations come before edge operations. Creates and updates
    /// follow the current graph's order, deletes the base graph's order.
    pub fn between(
        workspace_id: &str,
        base_version_id: Option<&str>,
        current: &Graph,
        base: Option<&Graph>,
    ) -> Plan {
        let empty = Graph::new();
        let base = base.unwrap_or(&empty);

        let mut operations = diff_nodes(&current.nodes, &base.nodes);
        operations.extend(diff_edges(&current.edges, &base.edges));

        let mut stats = PlanStats::default();
        for op in &operations {
            match op.action {
                PlanAction::Create => stats.adds += 1,
                PlanAction::Update => stats.updates += 1,
                PlanAction::Delete => stats.deletes += 1,
            }
        }

        Plan {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            base_version_id: base_version_id.map(str::to_string),
            generated_at: Utc::now(),
            operations,
            stats,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn diff_nodes(current: &[Node], base: &[Node]) -> Vec<PlanOperation> {
    let base_by_id: HashMap<&str, &Node> = base.iter().map(|n| (n.id.as_str(), n)).collect();
    let current_ids: HashSet<&str> = current.iter().map(|n| n.id.as_str()).collect();

    let mut ops = Vec::new();
    for node in current {
        match base_by_id.get(node.id.as_str()) {
            None => ops.push(PlanOperation {
                id: Uuid::new_v4().to_string(),
                action: PlanAction::Create,
                target: PlanTarget::Node,
                target_id: node.id.clone(),
                summary: format!("Create {} node {}", node.kind, display_name(node)),
                changes: None,
            }),
            Some(old) => {
                let changes = node_changes(old, node);
                if !changes.is_empty() {
                    let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
                    ops.push(PlanOperation {
                        id: Uuid::new_v4().to_string(),
                        action: PlanAction::Update,
                        target: PlanTarget::Node,
                        target_id: node.id.clone(),
                        summary: format!(
                            "Update {} node {} ({})",
                            node.kind,
                            display_name(node),
                            fields.join(", ")
                        ),
                        changes: Some(changes),
                    });
                }
            }
        }
    }
    for node in base {
        if !current_ids.contains(node.id.as_str()) {
            ops.push(PlanOperation {
                id: Uuid::new_v4().to_string(),
                action: PlanAction::Delete,
                target: PlanTarget::Node,
                target_id: node.id.clone(),
                summary: format!("Delete {} node {}", node.kind, display_name(node)),
                changes: None,
            });
        }
    }
    ops
}

fn diff_edges(current: &[Edge], base: &[Edge]) -> Vec<PlanOperation> {
    let base_by_id: HashMap<&str, &Edge> = base.iter().map(|e| (e.id.as_str(), e)).collect();
    let current_ids: HashSet<&str> = current.iter().map(|e| e.id.as_str()).collect();

    let mut ops = Vec::new();
    for edge in current {
        match base_by_id.get(edge.id.as_str()) {
            None => ops.push(PlanOperation {
                id: Uuid::new_v4().to_string(),
                action: PlanAction::Create,
                target: PlanTarget::Edge,
                target_id: edge.id.clone(),
                summary: format!(
                    "Create {} edge {} -> {}",
                    edge.kind, edge.source, edge.target
                ),
                changes: None,
            }),
            Some(old) => {
                let changes = edge_changes(old, edge);
                if !changes.is_empty() {
                    let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
                    ops.push(PlanOperation {
                        id: Uuid::new_v4().to_string(),
                        action: PlanAction::Update,
                        target: PlanTarget::Edge,
                        target_id: edge.id.clone(),
                        summary: format!(
                            "Update {} edge {} -> {} ({})",
                            edge.kind,
                            edge.source,
                            edge.target,
                            fields.join(", ")
                        ),
                        changes: Some(changes),
                    });
                }
            }
        }
    }
    for edge in base {
        if !current_ids.contains(edge.id.as_str()) {
            ops.push(PlanOperation {
                id: Uuid::new_v4().to_string(),
                action: PlanAction::Delete,
                target: PlanTarget::Edge,
                target_id: edge.id.clone(),
                summary: format!(
                    "Delete {} edge {} -> {}",
                    edge.kind, edge.source, edge.target
                ),
                changes: None,
            });
        }
    }
    ops
}

/// Semantic node fields: kind, label, layer, config. Position and size are
/// layout state and never compared.
fn node_changes(old: &Node, new: &Node) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    if old.kind != new.kind {
        changes.insert(
            "kind".to_string(),
            FieldChange {
                from: json!(old.kind),
                to: json!(new.kind),
            },
        );
    }
    if old.label != new.label {
        changes.insert(
            "label".to_string(),
            FieldChange {
                from: json!(old.label),
                to: json!(new.label),
            },
        );
    }
    if old.layer_id != new.layer_id {
        changes.insert(
            "layerId".to_string(),
            FieldChange {
                from: json!(old.layer_id),
                to: json!(new.layer_id),
            },
        );
    }
    if old.config != new.config {
        changes.insert(
            "config".to_string(),
            FieldChange {
                from: Value::Object(old.config.clone()),
                to: Value::Object(new.config.clone()),
            },
        );
    }
    changes
}

fn edge_changes(old: &Edge, new: &Edge) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    if old.kind != new.kind {
        changes.insert(
            "kind".to_string(),
            FieldChange {
                from: json!(old.kind),
                to: json!(new.kind),
            },
        );
    }
    if old.source != new.source {
        changes.insert(
            "source".to_string(),
            FieldChange {
                from: json!(old.source),
                to: json!(new.source),
            },
        );
    }
    if old.target != new.target {
        changes.insert(
            "target".to_string(),
            FieldChange {
                from: json!(old.target),
                to: json!(new.target),
            },
        );
    }
    // A missing label and an empty one read the same on the canvas.
    let old_label = old.label.as_deref().unwrap_or("");
    let new_label = new.label.as_deref().unwrap_or("");
    if old_label != new_label {
        changes.insert(
            "label".to_string(),
            FieldChange {
                from: json!(old_label),
                to: json!(new_label),
            },
        );
    }
    changes
}

/// Label in quotes when present, bare id otherwise.
fn display_name(node: &Node) -> String {
    if node.label.is_empty() {
        node.id.clone()
    } else {
        format!("\"{}\"", node.label)
    }
}
