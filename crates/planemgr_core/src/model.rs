//! Domain types for infrastructure charts.
//!
//! A chart workspace is a graph of typed nodes and edges organized into
//! display layers, plus per-node drift annotations from reconciliation runs.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlanemgrError, Result};

/// Category of an infrastructure node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Hosting substrate (cloud account, cluster, hypervisor). May contain
    /// other nodes via their `platformId` config reference.
    Platform,
    Compute,
    Service,
    Network,
    Storage,
    Control,
    Data,
    Security,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Platform => "platform",
            NodeKind::Compute => "compute",
            NodeKind::Service => "service",
            NodeKind::Network => "network",
            NodeKind::Storage => "storage",
            NodeKind::Control => "control",
            NodeKind::Data => "data",
            NodeKind::Security => "security",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = PlanemgrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "platform" => Ok(NodeKind::Platform),
            "compute" => Ok(NodeKind::Compute),
            "service" => Ok(NodeKind::Service),
            "network" => Ok(NodeKind::Network),
            "storage" => Ok(NodeKind::Storage),
            "control" => Ok(NodeKind::Control),
            "data" => Ok(NodeKind::Data),
            "security" => Ok(NodeKind::Security),
            other => Err(PlanemgrError::InvalidInput(format!(
                "unknown node kind: {other}"
            ))),
        }
    }
}

/// Category of a connection between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Data,
    Control,
    Network,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Data => "data",
            EdgeKind::Control => "control",
            EdgeKind::Network => "network",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = PlanemgrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "data" => Ok(EdgeKind::Data),
            "control" => Ok(EdgeKind::Control),
            "network" => Ok(EdgeKind::Network),
            other => Err(PlanemgrError::InvalidInput(format!(
                "unknown edge kind: {other}"
            ))),
        }
    }
}

/// Canvas coordinates of a node. Transient layout state, not semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are real numbers (not NaN/inf).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Rendered dimensions of a resizable container node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// One element on the chart canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub label: String,
    /// Id of the display layer this node belongs to.
    pub layer_id: String,
    #[serde(default)]
    pub position: Position,
    /// Only meaningful for resizable containers (platform nodes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Free-form per-kind configuration (image, ports, cidr, engine, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub config: serde_json::Map<String, Value>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        kind: NodeKind,
        label: impl Into<String>,
        layer_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            layer_id: layer_id.into(),
            position: Position::default(),
            size: None,
            config: serde_json::Map::new(),
        }
    }

    /// Id of the platform node this node is hosted on, if any.
    pub fn platform_id(&self) -> Option<&str> {
        self.config.get("platformId").and_then(Value::as_str)
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub kind: EdgeKind,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        kind: EdgeKind,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }
}

fn default_visible() -> bool {
    true
}

/// A display layer grouping related nodes (physical, infra, control, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    pub name: String,
    /// Hex color used by the canvas.
    pub color: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Stacking position in the layer panel, lowest first.
    pub order: i64,
}

impl Layer {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        color: impl Into<String>,
        order: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            visible: true,
            order,
        }
    }
}

/// Reconciliation state of a node against the live environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    #[default]
    Unknown,
    InSync,
    Drifted,
}

/// Per-node drift annotation from the most recent reconciliation check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftItem {
    #[serde(default)]
    pub status: DriftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The semantic content of a chart: nodes and the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Check referential integrity before the graph is persisted.
    ///
    /// Rules: node and edge ids are non-empty and unique, every node's
    /// `layerId` names a layer, a `platformId` config reference names an
    /// existing platform node, and edge endpoints name existing nodes.
    pub fn validate(&self, layers: &[Layer]) -> Result<()> {
        let layer_ids: HashSet<&str> = layers.iter().map(|l| l.id.as_str()).collect();

        let mut node_ids: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(PlanemgrError::InvalidInput(
                    "node id must not be empty".to_string(),
                ));
            }
            if !node_ids.insert(node.id.as_str()) {
                return Err(PlanemgrError::InvalidInput(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
            if !layer_ids.contains(node.layer_id.as_str()) {
                return Err(PlanemgrError::InvalidInput(format!(
                    "node {} references unknown layer: {}",
                    node.id, node.layer_id
                )));
            }
        }

        for node in &self.nodes {
            if let Some(platform_id) = node.platform_id() {
                match self.node(platform_id) {
                    Some(host) if host.kind == NodeKind::Platform => {}
                    Some(_) => {
                        return Err(PlanemgrError::InvalidInput(format!(
                            "node {} is placed on {}, which is not a platform node",
                            node.id, platform_id
                        )));
                    }
                    None => {
                        return Err(PlanemgrError::InvalidInput(format!(
                            "node {} references unknown platform: {}",
                            node.id, platform_id
                        )));
                    }
                }
            }
        }

        let mut edge_ids: HashSet<&str> = HashSet::new();
        for edge in &self.edges {
            if edge.id.is_empty() {
                return Err(PlanemgrError::InvalidInput(
                    "edge id must not be empty".to_string(),
                ));
            }
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(PlanemgrError::InvalidInput(format!(
                    "duplicate edge id: {}",
                    edge.id
                )));
            }
            for endpoint in [&edge.source, &edge.target] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(PlanemgrError::InvalidInput(format!(
                        "edge {} references unknown node: {}",
                        edge.id, endpoint
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A chart's full editable state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub graph: Graph,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub drift: BTreeMap<String, DriftItem>,
    pub updated_at: DateTime<Utc>,
}

/// One named (or draft) point in a chart's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanVersion {
    /// Full commit hash.
    pub id: String,
    pub workspace_id: String,
    /// Commit subject. The draft sentinel subject for unsealed drafts.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub graph: Graph,
    pub layers: Vec<Layer>,
    pub created_at: DateTime<Utc>,
}
