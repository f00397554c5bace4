//! End-to-end scenario planning and execution for workspace launcher CLIs.
//!
//! Catalog cases are planned per invocation surface, gated against the
//! environment snapshot, materialized, and run inside a lifecycle that always
//! removes the workspaces it created.
pub mod catalog;
pub mod cli;
pub mod config;
pub mod env;
pub mod equivalence;
pub mod exec;
pub mod gate;
pub mod lifecycle;
pub mod lock;
pub mod materialize;
pub mod paths;
pub mod plan;
pub mod record;
pub mod selection;
pub mod summary;
pub mod surface;
pub mod util;
