//! Git object storage for chart repositories.
//!
//! Each chart lives in a bare repository. Commits are assembled directly
//! from blobs and trees in the object database; there is no working
//! directory or index involved, so a reader always sees either the old
//! branch tip or the fully written new one.

mod commit;
mod repo;
mod tree;

pub use commit::{
    CommitInfo, amend_head, commit_tree, describe_commit, head_commit, history,
    list_files_at_commit, read_file_at_commit, resolve_commit,
};
pub use repo::{init_chart_repo, open_chart_repo};
pub use tree::{clean_chart_path, insert_file, write_blob};
