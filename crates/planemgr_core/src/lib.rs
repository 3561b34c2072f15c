//! # `planemgr_core`
//!
//! Storage and versioning engine for planemgr infrastructure charts.
//!
//! Each chart lives in its own bare git repository. The modules layer on
//! top of each other: `git` wraps the object store, `chart` manages
//! per-chart repositories and raw file commits, `snapshot` encodes the
//! two workspace files deterministically, `history` runs the draft and
//! version lifecycle, and `diff` turns two graphs into a reviewable plan.

/// Per-chart repository management and raw file commits.
pub mod chart;

/// Pure graph diff producing plans.
pub mod diff;

pub mod error;

/// Low-level object store operations on bare repositories.
pub mod git;

/// Draft and version lifecycle on top of the chart store.
pub mod history;

pub mod model;

/// Deterministic workspace snapshot codec.
pub mod snapshot;
