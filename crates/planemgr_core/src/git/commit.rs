//! Commit plumbing: create, amend, resolve, read files, walk history.

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, ObjectType, Oid, Repository, Signature, Tree};

use crate::error::{PlanemgrError, Result};

const AUTHOR_NAME: &str = "planemgr";
const AUTHOR_EMAIL: &str = "noreply@planemgr.local";

/// One history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// Full commit hash.
    pub id: String,
    /// Abbreviated hash for display.
    pub short_id: String,
    /// First line of the commit message.
    pub subject: String,
    /// Remaining message lines, when present.
    pub body: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    fn from_commit(commit: &Commit) -> Self {
        let id = commit.id().to_string();
        let short_id = id.chars().take(8).collect();
        let message = commit.message().unwrap_or_default();
        let subject = message.lines().next().unwrap_or_default().to_string();
        let body = message
            .split_once('\n')
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|rest| !rest.is_empty());
        let timestamp =
            DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default();
        Self {
            id,
            short_id,
            subject,
            body,
            timestamp,
        }
    }
}

/// Current HEAD commit id, or `None` while the branch is unborn.
pub fn head_commit(repo: &Repository) -> Result<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?.id())),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Create a commit for the given tree and advance HEAD (and thereby
/// `main`). Works for the root commit and for normal one-parent commits.
pub fn commit_tree(repo: &Repository, tree: Oid, message: &str) -> Result<Oid> {
    let tree = repo.find_tree(tree)?;
    let sig = Signature::now(AUTHOR_NAME, AUTHOR_EMAIL)?;

    let parent_commit = match head_commit(repo)? {
        Some(oid) => Some(repo.find_commit(oid)?),
        None => None,
    };
    let parents: Vec<&Commit> = parent_commit.iter().collect();

    Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
}

/// Rewrite the HEAD commit in place, keeping its parents.
///
/// `tree = None` keeps the existing tree (message-only amend). The branch
/// pointer moves to the rewritten commit; the old commit id becomes
/// unreachable.
pub fn amend_head(repo: &Repository, tree: Option<Oid>, message: &str) -> Result<Oid> {
    let head = match head_commit(repo)? {
        Some(oid) => repo.find_commit(oid)?,
        None => return Err(PlanemgrError::RefNotFound("HEAD".to_string())),
    };
    let sig = Signature::now(AUTHOR_NAME, AUTHOR_EMAIL)?;
    let new_tree: Option<Tree> = match tree {
        Some(oid) => Some(repo.find_tree(oid)?),
        None => None,
    };
    Ok(head.amend(
        Some("HEAD"),
        Some(&sig),
        Some(&sig),
        None,
        Some(message),
        new_tree.as_ref(),
    )?)
}

/// Describe one commit by id.
pub fn describe_commit(repo: &Repository, oid: Oid) -> Result<CommitInfo> {
    let commit = repo.find_commit(oid)?;
    Ok(CommitInfo::from_commit(&commit))
}

/// Resolve a ref string (full hash, unambiguous short hash, branch name,
/// HEAD) to a commit id.
pub fn resolve_commit(repo: &Repository, refname: &str) -> Result<Oid> {
    let object = repo
        .revparse_single(refname)
        .map_err(|_| PlanemgrError::RefNotFound(refname.to_string()))?;
    let commit = object
        .peel_to_commit()
        .map_err(|_| PlanemgrError::RefNotFound(refname.to_string()))?;
    Ok(commit.id())
}

/// Read one file's bytes out of a commit's tree.
pub fn read_file_at_commit(repo: &Repository, commit: Oid, path: &str) -> Result<Vec<u8>> {
    let commit = repo.find_commit(commit)?;
    let tree = commit.tree()?;
    let entry = tree.get_path(Path::new(path)).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            PlanemgrError::FileNotFound(path.to_string())
        } else {
            PlanemgrError::Git(e)
        }
    })?;
    if entry.kind() == Some(ObjectType::Tree) {
        return Err(PlanemgrError::PathIsDirectory(path.to_string()));
    }
    let blob = repo.find_blob(entry.id())?;
    Ok(blob.content().to_vec())
}

/// All file paths in a commit's tree, `/`-joined and sorted ascending.
pub fn list_files_at_commit(repo: &Repository, commit: Oid) -> Result<Vec<String>> {
    let commit = repo.find_commit(commit)?;
    let tree = commit.tree()?;
    let mut files = Vec::new();
    walk_tree(repo, &tree, "", &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_tree(repo: &Repository, tree: &Tree, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    for entry in tree.iter() {
        let name = entry.name().unwrap_or_default();
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        };
        match entry.kind() {
            Some(ObjectType::Tree) => {
                let subtree = repo.find_tree(entry.id())?;
                walk_tree(repo, &subtree, &path, out)?;
            }
            Some(ObjectType::Blob) => out.push(path),
            _ => {}
        }
    }
    Ok(())
}

/// Full history from HEAD, newest first. Empty while the branch is unborn.
pub fn history(repo: &Repository) -> Result<Vec<CommitInfo>> {
    if head_commit(repo)?.is_none() {
        return Ok(Vec::new());
    }
    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;

    let mut entries = Vec::new();
    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        entries.push(CommitInfo::from_commit(&commit));
    }
    Ok(entries)
}
