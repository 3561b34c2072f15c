//! Blob and tree construction for chart repositories.

use git2::{ObjectType, Oid, Repository};

use crate::error::{PlanemgrError, Result};

const FILE_MODE: i32 = 0o100644;
const DIR_MODE: i32 = 0o040000;

/// Normalize a repo-relative file path and reject anything that could
/// escape the repository root.
///
/// Rejected: empty paths, absolute paths, backslashes, traversal above the
/// root, and paths that normalize to nothing. `.` segments and redundant
/// separators are collapsed; interior `..` segments are resolved.
pub fn clean_chart_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Err(PlanemgrError::InvalidPath("empty path".to_string()));
    }
    if path.starts_with('/') {
        return Err(PlanemgrError::InvalidPath(format!("absolute path: {path}")));
    }
    if path.contains('\\') {
        return Err(PlanemgrError::InvalidPath(format!(
            "backslash in path: {path}"
        )));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return Err(PlanemgrError::InvalidPath(format!(
                        "path escapes repository root: {path}"
                    )));
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(PlanemgrError::InvalidPath(format!(
            "path names no file: {path}"
        )));
    }
    Ok(parts.join("/"))
}

/// Store raw content in the object database.
///
/// Content addressing applies: identical bytes yield the identical id.
pub fn write_blob(repo: &Repository, content: &[u8]) -> Result<Oid> {
    Ok(repo.blob(content)?)
}

/// Insert one blob into a tree at a cleaned repo-relative path, returning
/// the new root tree id.
///
/// Sibling entries at every level are preserved and intermediate directory
/// trees are created as needed. Replacing an existing file is allowed;
/// a collision between a file and a directory at any component fails with
/// a conflict so the caller can surface it distinctly from a bad path.
pub fn insert_file(
    repo: &Repository,
    base: Option<Oid>,
    path: &str,
    blob: Oid,
) -> Result<Oid> {
    let components: Vec<&str> = path.split('/').collect();
    insert_at_depth(repo, base, &components, 0, blob, path)
}

fn insert_at_depth(
    repo: &Repository,
    base: Option<Oid>,
    components: &[&str],
    depth: usize,
    blob: Oid,
    full_path: &str,
) -> Result<Oid> {
    let base_tree = match base {
        Some(oid) => Some(repo.find_tree(oid)?),
        None => None,
    };
    let mut builder = repo.treebuilder(base_tree.as_ref())?;
    let name = components[depth];

    if depth + 1 == components.len() {
        if let Some(existing) = builder.get(name)? {
            if existing.kind() == Some(ObjectType::Tree) {
                return Err(PlanemgrError::PathIsDirectory(full_path.to_string()));
            }
        }
        builder.insert(name, blob, FILE_MODE)?;
    } else {
        let sub_base = match builder.get(name)? {
            Some(entry) => {
                if entry.kind() != Some(ObjectType::Tree) {
                    return Err(PlanemgrError::PathIsDirectory(full_path.to_string()));
                }
                Some(entry.id())
            }
            None => None,
        };
        let sub_tree = insert_at_depth(repo, sub_base, components, depth + 1, blob, full_path)?;
        builder.insert(name, sub_tree, DIR_MODE)?;
    }

    Ok(builder.write()?)
}
