//! Database module: view models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: query slices returned to the scan engine.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `rollcall::db` — we re-export the
//! repository API and the view models for convenience.

pub mod model;
pub mod repo;

pub use model::{ChildForScan, ScanGuardian};
pub use repo::*;
