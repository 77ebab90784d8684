//! # pier-common
//!
//! Shared types, exit classes, the environment snapshot, and constants
//! used across the entire pier workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod constants;
pub mod env;
pub mod error;
pub mod types;
