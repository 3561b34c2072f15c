//! # `planemgr_server`
//!
//! HTTP API for planemgr charts: a thin axum surface over
//! `planemgr_core`. Handlers translate requests into store calls and map
//! core errors onto status codes; all domain logic lives in the core
//! crate.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod locks;
