//! Draft and version lifecycle on top of the chart store.
//!
//! Every chart's history lives on a single branch. The tip is usually a
//! rolling draft commit carrying the latest saved state; consecutive saves
//! amend it in place so autosave-frequency edits collapse into one entry.
//! Naming a version retitles the draft, then a fresh trailing draft is
//! appended so later edits never rewrite the named commit. History only
//! ever moves forward: restoring an old version writes its content as new
//! draft content instead of moving the branch backwards.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::chart::{ChartStore, FileUpdate};
use crate::error::{PlanemgrError, Result};
use crate::git::CommitInfo;
use crate::model::{DriftItem, Graph, Layer, PlanVersion, Workspace};
use crate::snapshot::{self, CHART_FILE, CHART_META_FILE};

/// Subject line marking the rolling draft commit.
pub const DRAFT_SUBJECT: &str = "Draft: workspace";

/// What a save did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Tip commit after the save.
    pub commit_id: String,
    /// False when the content was already at the tip and nothing was
    /// written.
    pub committed: bool,
}

/// Workspace lifecycle operations for one chart.
pub struct HistoryManager<'a> {
    store: &'a ChartStore,
    chart_id: String,
}

impl<'a> HistoryManager<'a> {
    pub fn new(store: &'a ChartStore, chart_id: impl Into<String>) -> Self {
        Self {
            store,
            chart_id: chart_id.into(),
        }
    }

    pub fn chart_id(&self) -> &str {
        &self.chart_id
    }

    /// Load the workspace at the tip of history.
    ///
    /// A chart with no snapshot yet (fresh repo, or one populated through
    /// the raw file API) is seeded with the default chart. If decoding had
    /// to repair metadata, the healed pair is persisted with draft-save
    /// semantics before returning, so the next load is clean.
    pub fn load_workspace(&self) -> Result<Workspace> {
        let decoded = match self.read_optional(CHART_FILE, "HEAD")? {
            Some(primary) => {
                let meta = self.read_optional(CHART_META_FILE, "HEAD")?;
                snapshot::decode_chart(&primary, meta.as_deref())?
            }
            None => {
                let (graph, layers) = snapshot::default_chart();
                snapshot::DecodedChart {
                    graph,
                    layers,
                    drift: BTreeMap::new(),
                    needs_rewrite: true,
                }
            }
        };

        if decoded.needs_rewrite {
            log::debug!("chart {}: persisting repaired snapshot", self.chart_id);
            self.save_inner(&decoded.graph, &decoded.layers, &decoded.drift)?;
        }

        let updated_at = self
            .store
            .head_info(&self.chart_id)?
            .map(|info| info.timestamp)
            .unwrap_or_else(Utc::now);

        Ok(Workspace {
            id: self.chart_id.clone(),
            name: self.chart_id.clone(),
            graph: decoded.graph,
            layers: decoded.layers,
            drift: decoded.drift,
            updated_at,
        })
    }

    /// Persist the workspace as the current draft.
    ///
    /// Validates first, then encodes both snapshot files. A byte-identical
    /// save is a no-op. Otherwise the draft tip is amended in place, or a
    /// new draft commit is created when the tip is a named version (or the
    /// branch is unborn).
    pub fn save_workspace(
        &self,
        graph: &Graph,
        layers: &[Layer],
        drift: &BTreeMap<String, DriftItem>,
    ) -> Result<SaveOutcome> {
        graph.validate(layers)?;
        self.save_inner(graph, layers, drift)
    }

    /// Seal the current content as a named version.
    ///
    /// The draft tip is retitled in place; a non-draft tip gets a fresh
    /// commit with the same content. Either way a new trailing draft is
    /// appended afterwards so the named commit is never amended again.
    pub fn create_version(&self, name: &str, notes: Option<&str>) -> Result<PlanVersion> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlanemgrError::InvalidInput(
                "version name must not be empty".to_string(),
            ));
        }
        let message = match notes.map(str::trim).filter(|n| !n.is_empty()) {
            Some(notes) => format!("{name}\n\n{notes}"),
            None => name.to_string(),
        };

        if self.read_optional(CHART_FILE, "HEAD")?.is_none() {
            self.load_workspace()?;
        }

        let head = self.store.head_info(&self.chart_id)?.ok_or_else(|| {
            PlanemgrError::Internal("chart has no commits after seeding".to_string())
        })?;

        let named_id = if head.subject == DRAFT_SUBJECT {
            self.store.amend_files(&self.chart_id, &[], &message)?
        } else {
            let updates = self.current_file_updates()?;
            self.store.write_files(&self.chart_id, &updates, &message)?
        };

        let updates = self.current_file_updates()?;
        self.store
            .write_files(&self.chart_id, &updates, DRAFT_SUBJECT)?;
        log::debug!(
            "chart {}: sealed version {} ({name})",
            self.chart_id,
            &named_id[..8.min(named_id.len())]
        );

        self.version_at(&named_id)
    }

    /// Look up one version by commit hash (full or abbreviated).
    pub fn version_at(&self, version_ref: &str) -> Result<PlanVersion> {
        let info = self.resolve_version(version_ref)?;
        self.version_from_commit(info)
    }

    /// Restore a version's content as the working draft.
    ///
    /// `commit_draft_first = true` keeps the current draft as a history
    /// entry and appends a new draft with the restored content;
    /// `false` amends the draft tip away. Restoring content identical to
    /// the tip writes nothing. The branch never moves backwards.
    pub fn checkout_version(
        &self,
        version_ref: &str,
        commit_draft_first: bool,
    ) -> Result<Workspace> {
        let info = self.resolve_version(version_ref)?;
        let target_primary = self.read_optional(CHART_FILE, &info.id)?.ok_or_else(|| {
            PlanemgrError::CorruptWorkspace(format!(
                "version {} has no {CHART_FILE}",
                info.short_id
            ))
        })?;
        let target_meta = self.read_optional(CHART_META_FILE, &info.id)?;

        // Refuse to restore content the workspace could not load back.
        snapshot::decode_chart(&target_primary, target_meta.as_deref())?;

        let head_primary = self.read_optional(CHART_FILE, "HEAD")?;
        let head_meta = self.read_optional(CHART_META_FILE, "HEAD")?;
        if head_primary.as_deref() != Some(target_primary.as_str()) || head_meta != target_meta {
            let mut updates = vec![FileUpdate::new(CHART_FILE, target_primary)];
            if let Some(meta) = target_meta {
                updates.push(FileUpdate::new(CHART_META_FILE, meta));
            }
            let head = self.store.head_info(&self.chart_id)?;
            match head {
                Some(tip) if tip.subject == DRAFT_SUBJECT && !commit_draft_first => {
                    self.store
                        .amend_files(&self.chart_id, &updates, DRAFT_SUBJECT)?;
                }
                _ => {
                    self.store
                        .write_files(&self.chart_id, &updates, DRAFT_SUBJECT)?;
                }
            }
            log::debug!(
                "chart {}: restored content from {}",
                self.chart_id,
                info.short_id
            );
        }

        self.load_workspace()
    }

    /// All history entries, newest first, drafts included.
    ///
    /// Commits whose snapshot is missing or unreadable (written through
    /// the raw file API) are skipped rather than failing the listing.
    pub fn list_versions(&self) -> Result<Vec<PlanVersion>> {
        let mut versions = Vec::new();
        for info in self.store.log(&self.chart_id)? {
            let short_id = info.short_id.clone();
            match self.version_from_commit(info) {
                Ok(version) => versions.push(version),
                Err(PlanemgrError::CorruptWorkspace(reason)) => {
                    log::warn!(
                        "chart {}: skipping commit {short_id} in version list: {reason}",
                        self.chart_id
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(versions)
    }

    /// Diff the current workspace against a base version (or against
    /// nothing, in which case every element is a create).
    pub fn build_plan(&self, base_version_ref: Option<&str>) -> Result<crate::diff::Plan> {
        let workspace = self.load_workspace()?;
        let base = base_version_ref
            .map(|r| self.version_at(r))
            .transpose()?;
        Ok(crate::diff::Plan::between(
            &workspace.id,
            base.as_ref().map(|v| v.id.as_str()),
            &workspace.graph,
            base.as_ref().map(|v| &v.graph),
        ))
    }

    fn save_inner(
        &self,
        graph: &Graph,
        layers: &[Layer],
        drift: &BTreeMap<String, DriftItem>,
    ) -> Result<SaveOutcome> {
        let primary = snapshot::encode_chart(graph, layers)?;
        let meta = snapshot::encode_metadata(graph, drift)?;

        let head = self.store.head_info(&self.chart_id)?;
        if let Some(tip) = &head {
            let head_primary = self.read_optional(CHART_FILE, "HEAD")?;
            let head_meta = self.read_optional(CHART_META_FILE, "HEAD")?;
            if head_primary.as_deref() == Some(primary.as_str())
                && head_meta.as_deref() == Some(meta.as_str())
            {
                return Ok(SaveOutcome {
                    commit_id: tip.id.clone(),
                    committed: false,
                });
            }
        }

        let updates = [
            FileUpdate::new(CHART_FILE, primary),
            FileUpdate::new(CHART_META_FILE, meta),
        ];
        let commit_id = match &head {
            Some(tip) if tip.subject == DRAFT_SUBJECT => {
                self.store
                    .amend_files(&self.chart_id, &updates, DRAFT_SUBJECT)?
            }
            _ => self
                .store
                .write_files(&self.chart_id, &updates, DRAFT_SUBJECT)?,
        };
        Ok(SaveOutcome {
            commit_id,
            committed: true,
        })
    }

    fn resolve_version(&self, version_ref: &str) -> Result<CommitInfo> {
        self.store
            .commit_info(&self.chart_id, version_ref)
            .map_err(|e| match e {
                PlanemgrError::RefNotFound(r) => PlanemgrError::VersionNotFound(r),
                other => other,
            })
    }

    fn version_from_commit(&self, info: CommitInfo) -> Result<PlanVersion> {
        let primary = self.read_optional(CHART_FILE, &info.id)?.ok_or_else(|| {
            PlanemgrError::CorruptWorkspace(format!(
                "version {} has no {CHART_FILE}",
                info.short_id
            ))
        })?;
        let meta = self.read_optional(CHART_META_FILE, &info.id)?;
        let decoded = snapshot::decode_chart(&primary, meta.as_deref())?;
        Ok(PlanVersion {
            id: info.id,
            workspace_id: self.chart_id.clone(),
            name: info.subject,
            notes: info.body,
            graph: decoded.graph,
            layers: decoded.layers,
            created_at: info.timestamp,
        })
    }

    fn read_optional(&self, path: &str, refname: &str) -> Result<Option<String>> {
        match self.store.read_file(&self.chart_id, path, Some(refname)) {
            Ok(file) => Ok(Some(file.content)),
            Err(PlanemgrError::FileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn current_file_updates(&self) -> Result<Vec<FileUpdate>> {
        let mut updates = Vec::new();
        if let Some(primary) = self.read_optional(CHART_FILE, "HEAD")? {
            updates.push(FileUpdate::new(CHART_FILE, primary));
        }
        if let Some(meta) = self.read_optional(CHART_META_FILE, "HEAD")? {
            updates.push(FileUpdate::new(CHART_META_FILE, meta));
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeKind, Node, NodeKind, Position};
    use tempfile::TempDir;

    fn store() -> (TempDir, ChartStore) {
        let dir = TempDir::new().unwrap();
        let store = ChartStore::new(dir.path().join("charts"));
        (dir, store)
    }

    fn chart(store: &ChartStore) -> String {
        store.create().unwrap()
    }

    fn one_node_graph(id: &str, label: &str) -> (Graph, Vec<Layer>) {
        let (_, layers) = snapshot::default_chart();
        let mut graph = Graph::new();
        let mut node = Node::new(id, NodeKind::Compute, label, "service");
        node.position = Position::new(100.0, 100.0);
        graph.nodes.push(node);
        (graph, layers)
    }

    #[test]
    fn test_load_seeds_default_chart() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let workspace = history.load_workspace().unwrap();
        assert_eq!(workspace.id, id);
        assert!(workspace.graph.nodes.is_empty());
        assert_eq!(workspace.layers.len(), 4);

        // Seeding persisted an initial draft with both files.
        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].subject, DRAFT_SUBJECT);
        let listing = store.list_tree(&id, None).unwrap();
        assert_eq!(listing.files, vec![CHART_FILE, CHART_META_FILE]);

        // A second load finds clean content and writes nothing.
        let tip = store.head_info(&id).unwrap().unwrap();
        history.load_workspace().unwrap();
        assert_eq!(store.head_info(&id).unwrap().unwrap().id, tip.id);
    }

    #[test]
    fn test_saves_collapse_into_one_draft() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);
        history.load_workspace().unwrap();

        let (graph, layers) = one_node_graph("web-1", "Web");
        let first = history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        assert!(first.committed);

        let (graph, layers) = one_node_graph("web-1", "Web renamed");
        let second = history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        assert!(second.committed);
        assert_ne!(first.commit_id, second.commit_id);

        // Seeding created the draft and both saves amended it in place.
        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].subject, DRAFT_SUBJECT);
        assert_eq!(log[0].id, second.commit_id);
    }

    #[test]
    fn test_identical_save_is_a_no_op() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("db-1", "Database");
        let first = history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let second = history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();

        assert!(first.committed);
        assert!(!second.committed);
        assert_eq!(first.commit_id, second.commit_id);
    }

    #[test]
    fn test_invalid_graph_is_rejected_before_writing() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (mut graph, layers) = one_node_graph("web-1", "Web");
        graph.edges.push(Edge::new(
            "e1",
            EdgeKind::Data,
            "web-1",
            "missing-node",
        ));
        let err = history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, PlanemgrError::InvalidInput(_)));
        assert!(store.head_info(&id).unwrap().is_none());
    }

    #[test]
    fn test_create_version_retitles_draft_and_redrafts() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();

        let version = history
            .create_version("Initial deployment", Some("first cut"))
            .unwrap();
        assert_eq!(version.name, "Initial deployment");
        assert_eq!(version.notes.as_deref(), Some("first cut"));
        assert_eq!(version.workspace_id, id);
        assert_eq!(version.graph.nodes.len(), 1);

        // History is now: trailing draft on top of the named version.
        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].subject, DRAFT_SUBJECT);
        assert_eq!(log[1].subject, "Initial deployment");
        assert_eq!(log[1].id, version.id);

        // Further saves amend the trailing draft, never the version.
        let (graph, layers) = one_node_graph("web-1", "Web v2");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].id, version.id);
    }

    #[test]
    fn test_create_version_on_fresh_chart_seeds_first() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let version = history.create_version("Empty baseline", None).unwrap();
        assert!(version.graph.nodes.is_empty());
        assert_eq!(version.layers.len(), 4);
        assert!(version.notes.is_none());

        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].subject, DRAFT_SUBJECT);
        assert_eq!(log[1].subject, "Empty baseline");
    }

    #[test]
    fn test_create_version_requires_a_name() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let err = history.create_version("   ", None).unwrap_err();
        assert!(matches!(err, PlanemgrError::InvalidInput(_)));
    }

    #[test]
    fn test_list_versions_newest_first_with_drafts() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        history.create_version("v1", None).unwrap();

        let versions = history.list_versions().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].name, DRAFT_SUBJECT);
        assert_eq!(versions[1].name, "v1");
        assert_eq!(versions[1].graph.nodes[0].label, "Web");
    }

    #[test]
    fn test_list_versions_skips_malformed_commits() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        history.create_version("good", None).unwrap();

        // A raw write can put garbage in the snapshot file.
        store
            .write_files(
                &id,
                &[FileUpdate::new(CHART_FILE, "{broken")],
                "garbage in",
            )
            .unwrap();

        let versions = history.list_versions().unwrap();
        let names: Vec<&str> = versions.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec![DRAFT_SUBJECT, "good"]);
    }

    #[test]
    fn test_checkout_discarding_draft() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let version = history.create_version("v1", None).unwrap();

        let (graph, layers) = one_node_graph("web-1", "Edited since v1");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();

        let restored = history.checkout_version(&version.id, false).unwrap();
        assert_eq!(restored.graph.nodes[0].label, "Web");

        // The pending edit was amended away: history is draft + v1.
        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].subject, DRAFT_SUBJECT);
        assert_eq!(log[1].id, version.id);
    }

    #[test]
    fn test_checkout_preserving_draft() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let version = history.create_version("v1", None).unwrap();

        let (graph, layers) = one_node_graph("web-1", "Edited since v1");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let draft_tip = store.head_info(&id).unwrap().unwrap();

        let restored = history.checkout_version(&version.id, true).unwrap();
        assert_eq!(restored.graph.nodes[0].label, "Web");

        // The edited draft stays in history under the new one.
        let log = store.log(&id).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].subject, DRAFT_SUBJECT);
        assert_eq!(log[1].id, draft_tip.id);
        assert_eq!(log[2].id, version.id);
    }

    #[test]
    fn test_checkout_identical_content_writes_nothing() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let version = history.create_version("v1", None).unwrap();
        let tip = store.head_info(&id).unwrap().unwrap();

        // The trailing draft already carries v1's content.
        history.checkout_version(&version.id, true).unwrap();
        assert_eq!(store.head_info(&id).unwrap().unwrap().id, tip.id);
    }

    #[test]
    fn test_checkout_unknown_ref() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);
        history.load_workspace().unwrap();

        let err = history.checkout_version("deadbeef", false).unwrap_err();
        assert!(matches!(err, PlanemgrError::VersionNotFound(_)));
    }

    #[test]
    fn test_version_at_short_hash() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let version = history.create_version("v1", None).unwrap();

        let found = history.version_at(&version.id[..8]).unwrap();
        assert_eq!(found.id, version.id);
        assert_eq!(found.name, "v1");
    }

    #[test]
    fn test_build_plan_against_version() {
        let (_dir, store) = store();
        let id = chart(&store);
        let history = HistoryManager::new(&store, &id);

        let (graph, layers) = one_node_graph("web-1", "Web");
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();
        let version = history.create_version("v1", None).unwrap();

        let (mut graph, layers) = one_node_graph("web-1", "Web");
        let mut db = Node::new("db-1", NodeKind::Storage, "Database", "infra");
        db.position = Position::new(300.0, 200.0);
        graph.nodes.push(db);
        history
            .save_workspace(&graph, &layers, &BTreeMap::new())
            .unwrap();

        let plan = history.build_plan(Some(&version.id)).unwrap();
        assert_eq!(plan.workspace_id, id);
        assert_eq!(plan.base_version_id.as_deref(), Some(version.id.as_str()));
        assert_eq!(plan.stats.adds, 1);
        assert_eq!(plan.stats.updates, 0);
        assert_eq!(plan.stats.deletes, 0);
    }
}
