//! Bare repository management: create and open chart object stores.

use std::path::Path;

use git2::{Repository, RepositoryInitOptions};

use crate::error::Result;

/// Initialize a new bare repository for a chart.
///
/// HEAD is left as a symbolic reference to `refs/heads/main` before any
/// commit exists, so the first commit creates the branch. Fails if `path`
/// already holds a repository.
pub fn init_chart_repo(path: &Path) -> Result<Repository> {
    let mut opts = RepositoryInitOptions::new();
    opts.bare(true);
    opts.no_reinit(true);
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts)?;
    Ok(repo)
}

/// Open an existing chart repository at the given path.
pub fn open_chart_repo(path: &Path) -> Result<Repository> {
    Ok(Repository::open(path)?)
}
