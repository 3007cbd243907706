//! Skein - a local-first, dependency-tracked issue store.
//!
//! Issues live as JSONL in a tracked directory. On top of that store the
//! crate provides:
//!
//! - [`graph`]: topological ordering, cycle detection, and critical-path
//!   analysis over issue dependencies, with ASCII/Mermaid/DOT rendering
//! - [`sync`]: a change ledger with conflict detection and resolution,
//!   a debounced directory watcher, and auto-sync
//! - [`github`]: reconciliation with GitHub Issues through the `gh` CLI

#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod github;
pub mod graph;
pub mod id_generation;
pub mod store;
pub mod sync;

// Public CLI module (needed by binary)
pub mod cli;

pub use error::{Error, Result};
