//! # pier-config
//!
//! Resolves the effective bootstrap configuration.
//!
//! The local declarative file is loaded fail-open: a missing or malformed
//! file degrades to an empty configuration, because every required value may
//! also arrive through the environment. Environment overrides are applied to
//! an owned [`pier_common::env::Environment`] snapshot; the process
//! environment is never written.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod envfile;
pub mod error;
pub mod local;
pub mod store;

pub use error::ConfigError;
pub use local::{LocalConfig, Loaded};
pub use store::{ConfigStore, EffectiveConfig};
