//! Chart repository management: one bare git repository per chart id.
//!
//! The store owns a root directory; every chart is a directory named by a
//! v4 UUID containing a bare repository. All writes land as single atomic
//! commits on `main`, so concurrent readers see either the old tip or the
//! fully written new one.

use std::collections::HashSet;
use std::path::PathBuf;

use git2::Repository;
use uuid::Uuid;

use crate::error::{PlanemgrError, Result};
use crate::git::{
    self, CommitInfo, amend_head, clean_chart_path, commit_tree, describe_commit, head_commit,
    init_chart_repo, insert_file, list_files_at_commit, open_chart_repo, read_file_at_commit,
    resolve_commit, write_blob,
};

/// How many fresh UUIDs to try before giving up on chart creation.
const CREATE_ATTEMPTS: usize = 5;

/// One file write within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpdate {
    /// Repo-relative path, cleaned before use.
    pub path: String,
    /// Full new file content.
    pub content: String,
}

impl FileUpdate {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Recursive file listing of a chart at one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeListing {
    /// Full hash the ref resolved to; empty while the chart has no commits.
    pub resolved_ref: String,
    pub files: Vec<String>,
}

/// Contents of a single chart file at one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    /// Full hash the ref resolved to.
    pub resolved_ref: String,
    /// Cleaned repo-relative path.
    pub path: String,
    pub content: String,
}

/// Manages the collection of chart repositories under one root directory.
pub struct ChartStore {
    root: PathBuf,
}

impl ChartStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a new empty chart and return its id.
    ///
    /// Retries with fresh UUIDs when the directory already exists.
    pub fn create(&self) -> Result<String> {
        std::fs::create_dir_all(&self.root)?;
        for _ in 0..CREATE_ATTEMPTS {
            let chart_id = Uuid::new_v4().to_string();
            let path = self.root.join(&chart_id);
            if path.exists() {
                continue;
            }
            init_chart_repo(&path)?;
            log::debug!("created chart repository {chart_id}");
            return Ok(chart_id);
        }
        Err(PlanemgrError::Internal(
            "could not allocate a unique chart id".to_string(),
        ))
    }

    /// Ids of all charts under the root, sorted ascending.
    ///
    /// A missing root directory yields an empty list. Entries that are not
    /// UUID-named directories are skipped.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut charts = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if Uuid::parse_str(&name).is_ok() {
                charts.push(name);
            }
        }
        charts.sort();
        Ok(charts)
    }

    pub fn exists(&self, chart_id: &str) -> bool {
        match self.checked_path(chart_id) {
            Ok(path) => path.is_dir(),
            Err(_) => false,
        }
    }

    /// Filesystem path of the chart's bare repository.
    ///
    /// Deploy tooling may fetch from this path read-only; all writes go
    /// through this store.
    pub fn repo_path(&self, chart_id: &str) -> Result<PathBuf> {
        let path = self.checked_path(chart_id)?;
        if !path.is_dir() {
            return Err(PlanemgrError::ChartNotFound(chart_id.to_string()));
        }
        Ok(path)
    }

    /// Recursive file listing at a ref (default HEAD).
    ///
    /// A chart with no commits yet lists as empty rather than failing.
    pub fn list_tree(&self, chart_id: &str, refname: Option<&str>) -> Result<TreeListing> {
        let repo = self.open(chart_id)?;
        let refname = refname.unwrap_or("HEAD");
        if refname == "HEAD" && head_commit(&repo)?.is_none() {
            return Ok(TreeListing {
                resolved_ref: String::new(),
                files: Vec::new(),
            });
        }
        let commit = resolve_commit(&repo, refname)?;
        let files = list_files_at_commit(&repo, commit)?;
        Ok(TreeListing {
            resolved_ref: commit.to_string(),
            files,
        })
    }

    /// Read one file at a ref (default HEAD).
    pub fn read_file(
        &self,
        chart_id: &str,
        path: &str,
        refname: Option<&str>,
    ) -> Result<FileContent> {
        let repo = self.open(chart_id)?;
        let clean = clean_chart_path(path)?;
        let refname = refname.unwrap_or("HEAD");
        if refname == "HEAD" && head_commit(&repo)?.is_none() {
            return Err(PlanemgrError::FileNotFound(clean));
        }
        let commit = resolve_commit(&repo, refname)?;
        let bytes = read_file_at_commit(&repo, commit, &clean)?;
        let content = String::from_utf8(bytes).map_err(|_| {
            PlanemgrError::CorruptWorkspace(format!("file {clean} is not valid UTF-8"))
        })?;
        Ok(FileContent {
            resolved_ref: commit.to_string(),
            path: clean,
            content,
        })
    }

    /// Apply a batch of file writes as one commit on `main`.
    ///
    /// Every path is validated before any object is written, so a rejected
    /// batch leaves the branch untouched. Files not named in the batch are
    /// carried over from the current tip unchanged.
    pub fn write_files(
        &self,
        chart_id: &str,
        updates: &[FileUpdate],
        message: &str,
    ) -> Result<String> {
        let repo = self.open(chart_id)?;
        let cleaned = validate_batch(updates, message, false)?;

        let base = head_tree(&repo)?;
        let tree = apply_updates(&repo, base, &cleaned, updates)?;
        let commit = commit_tree(&repo, tree, message)?;
        log::debug!(
            "chart {chart_id}: committed {} file(s) as {commit}",
            updates.len()
        );
        Ok(commit.to_string())
    }

    /// Apply a batch of file writes by rewriting the current tip in place.
    ///
    /// Used for draft maintenance: the tip keeps its parents and gets the
    /// updated tree and message. An empty batch is allowed here and means
    /// a message-only rewrite. Requires an existing tip.
    pub fn amend_files(
        &self,
        chart_id: &str,
        updates: &[FileUpdate],
        message: &str,
    ) -> Result<String> {
        let repo = self.open(chart_id)?;
        let cleaned = validate_batch(updates, message, true)?;

        let tree = if cleaned.is_empty() {
            None
        } else {
            let base = head_tree(&repo)?;
            Some(apply_updates(&repo, base, &cleaned, updates)?)
        };
        let commit = amend_head(&repo, tree, message)?;
        log::debug!(
            "chart {chart_id}: amended tip with {} file(s) as {commit}",
            updates.len()
        );
        Ok(commit.to_string())
    }

    /// Resolve a ref and describe the commit it points at.
    pub fn commit_info(&self, chart_id: &str, refname: &str) -> Result<CommitInfo> {
        let repo = self.open(chart_id)?;
        let oid = resolve_commit(&repo, refname)?;
        describe_commit(&repo, oid)
    }

    /// Describe the current tip, or `None` while the chart has no commits.
    pub fn head_info(&self, chart_id: &str) -> Result<Option<CommitInfo>> {
        let repo = self.open(chart_id)?;
        match head_commit(&repo)? {
            Some(oid) => Ok(Some(describe_commit(&repo, oid)?)),
            None => Ok(None),
        }
    }

    /// Full commit history, newest first.
    pub fn log(&self, chart_id: &str) -> Result<Vec<CommitInfo>> {
        let repo = self.open(chart_id)?;
        git::history(&repo)
    }

    fn open(&self, chart_id: &str) -> Result<Repository> {
        let path = self.checked_path(chart_id)?;
        open_chart_repo(&path).map_err(|_| PlanemgrError::ChartNotFound(chart_id.to_string()))
    }

    fn checked_path(&self, chart_id: &str) -> Result<PathBuf> {
        if Uuid::parse_str(chart_id).is_err() {
            return Err(PlanemgrError::InvalidInput(format!(
                "invalid chart id: {chart_id}"
            )));
        }
        Ok(self.root.join(chart_id))
    }
}

fn validate_batch(
    updates: &[FileUpdate],
    message: &str,
    allow_empty: bool,
) -> Result<Vec<String>> {
    if message.trim().is_empty() {
        return Err(PlanemgrError::InvalidInput(
            "commit message must not be empty".to_string(),
        ));
    }
    if updates.is_empty() && !allow_empty {
        return Err(PlanemgrError::InvalidInput("no files to write".to_string()));
    }

    let mut cleaned = Vec::with_capacity(updates.len());
    let mut seen: HashSet<String> = HashSet::new();
    for update in updates {
        let path = clean_chart_path(&update.path)?;
        if !seen.insert(path.clone()) {
            return Err(PlanemgrError::InvalidPath(format!(
                "duplicate path in batch: {path}"
            )));
        }
        cleaned.push(path);
    }
    Ok(cleaned)
}

fn head_tree(repo: &Repository) -> Result<Option<git2::Oid>> {
    match head_commit(repo)? {
        Some(oid) => Ok(Some(repo.find_commit(oid)?.tree_id())),
        None => Ok(None),
    }
}

fn apply_updates(
    repo: &Repository,
    base: Option<git2::Oid>,
    cleaned_paths: &[String],
    updates: &[FileUpdate],
) -> Result<git2::Oid> {
    let mut tree = base;
    for (path, update) in cleaned_paths.iter().zip(updates) {
        let blob = write_blob(repo, update.content.as_bytes())?;
        tree = Some(insert_file(repo, tree, path, blob)?);
    }
    tree.ok_or_else(|| PlanemgrError::InvalidInput("no files to write".to_string()))
}
