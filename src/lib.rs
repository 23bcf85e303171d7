//! Item dependency graph and lifecycle engine.
//!
//! Items (tasks and epics) live in an embedded SQLite store, linked by
//! blocking dependencies that always form a DAG. The [`db::Database`] handle
//! exposes CRUD, readiness, status transitions, history and merges.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod id;
pub mod logging;
pub mod types;
