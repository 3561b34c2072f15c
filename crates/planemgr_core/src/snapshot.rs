//! Workspace snapshot codec.
//!
//! The primary file (`chart.json`) carries the semantic graph and layers
//! with deterministic byte output, so unchanged content always encodes to
//! identical bytes and version diffs reflect real infrastructure changes.
//! Transient state (per-node canvas positions, drift annotations) lives in
//! a secondary metadata file that tooling is free to regenerate.
//!
//! The codec is pure: decoding never touches storage. When metadata is
//! missing or damaged the decoder repairs it in memory and reports
//! `needs_rewrite` so the caller can persist the healed pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlanemgrError, Result};
use crate::model::{DriftItem, Edge, Graph, Layer, Node, NodeKind, Position, Size};

/// Primary snapshot file: the semantic source of truth.
pub const CHART_FILE: &str = "chart.json";
/// Secondary file holding per-node positions and drift state.
pub const CHART_META_FILE: &str = "chart.meta.json";

/// Where the first synthesized position lands when metadata is missing.
const FIRST_POSITION: Position = Position { x: 120.0, y: 120.0 };
/// Offset between consecutively synthesized positions.
const POSITION_STEP: f64 = 40.0;

/// Node as stored in the primary file: everything except position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    id: String,
    kind: NodeKind,
    #[serde(default)]
    label: String,
    layer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<Size>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    config: serde_json::Map<String, Value>,
}

impl NodeRecord {
    fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind,
            label: node.label.clone(),
            layer_id: node.layer_id.clone(),
            size: node.size,
            config: node.config.clone(),
        }
    }

    fn into_node(self, position: Position) -> Node {
        Node {
            id: self.id,
            kind: self.kind,
            label: self.label,
            layer_id: self.layer_id,
            position,
            size: self.size,
            config: self.config,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChartDoc {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    layers: Vec<Layer>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetaDoc {
    #[serde(default)]
    positions: BTreeMap<String, Position>,
    #[serde(default)]
    drift: BTreeMap<String, DriftItem>,
}

/// Result of decoding a snapshot pair.
#[derive(Debug, Clone)]
pub struct DecodedChart {
    pub graph: Graph,
    pub layers: Vec<Layer>,
    pub drift: BTreeMap<String, DriftItem>,
    /// True when the decoder had to fill in missing or invalid metadata.
    /// The caller should persist the repaired pair so the next read is
    /// clean.
    pub needs_rewrite: bool,
}

/// Encode the primary snapshot.
///
/// Nodes and edges sort by id, layers by id, and object keys serialize in
/// sorted order, so encoding unchanged content yields byte-identical
/// output. Node positions are deliberately absent.
pub fn encode_chart(graph: &Graph, layers: &[Layer]) -> Result<String> {
    let mut nodes: Vec<NodeRecord> = graph.nodes.iter().map(NodeRecord::from_node).collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges = graph.edges.to_vec();
    edges.sort_by(|a, b| a.id.cmp(&b.id));

    let mut layers = layers.to_vec();
    layers.sort_by(|a, b| a.id.cmp(&b.id));

    to_pretty_json(&ChartDoc {
        nodes,
        edges,
        layers,
    })
}

/// Encode the secondary metadata file: positions and drift keyed by node
/// id. Entries for nodes absent from the graph are dropped.
pub fn encode_metadata(graph: &Graph, drift: &BTreeMap<String, DriftItem>) -> Result<String> {
    let mut doc = MetaDoc::default();
    for node in &graph.nodes {
        doc.positions.insert(node.id.clone(), node.position);
    }
    for (node_id, item) in drift {
        if graph.node(node_id).is_some() {
            doc.drift.insert(node_id.clone(), item.clone());
        }
    }
    to_pretty_json(&doc)
}

/// Decode the primary file plus optional metadata.
///
/// A malformed primary file is an error; live callers fail loudly while
/// history listings catch and skip. Missing or malformed metadata is
/// repaired instead: absent or non-finite positions are synthesized by
/// offsetting from the previously placed node, drift entries for unknown
/// nodes are dropped, and `needs_rewrite` reports the repair.
pub fn decode_chart(primary: &str, meta: Option<&str>) -> Result<DecodedChart> {
    let doc: ChartDoc = serde_json::from_str(primary)
        .map_err(|e| PlanemgrError::CorruptWorkspace(format!("unreadable chart file: {e}")))?;

    let mut needs_rewrite = false;
    let meta_doc = match meta {
        Some(raw) => match serde_json::from_str::<MetaDoc>(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("unreadable chart metadata, rebuilding: {e}");
                needs_rewrite = true;
                MetaDoc::default()
            }
        },
        None => {
            needs_rewrite = true;
            MetaDoc::default()
        }
    };

    let mut graph = Graph::new();
    graph.edges = doc.edges;

    let mut last: Option<Position> = None;
    for record in doc.nodes {
        let position = match meta_doc.positions.get(&record.id) {
            Some(p) if p.is_finite() => *p,
            _ => {
                needs_rewrite = true;
                match last {
                    Some(prev) => Position::new(prev.x + POSITION_STEP, prev.y + POSITION_STEP),
                    None => FIRST_POSITION,
                }
            }
        };
        last = Some(position);
        graph.nodes.push(record.into_node(position));
    }

    let mut drift = BTreeMap::new();
    for (node_id, item) in meta_doc.drift {
        if graph.node(&node_id).is_some() {
            drift.insert(node_id, item);
        } else {
            needs_rewrite = true;
        }
    }

    Ok(DecodedChart {
        graph,
        layers: doc.layers,
        drift,
        needs_rewrite,
    })
}

/// Built-in first-run seed: an empty graph plus the four standard layers.
pub fn default_chart() -> (Graph, Vec<Layer>) {
    let layers = vec![
        Layer::new("physical", "Physical", "#7aa2f7", 0),
        Layer::new("infra", "Infrastructure", "#9ece6a", 1),
        Layer::new("control", "Control", "#e0af68", 2),
        Layer::new("service", "Service", "#bb9af7", 3),
    ];
    (Graph::new(), layers)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}
