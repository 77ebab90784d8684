//! # pier-core
//!
//! The individual bootstrap steps run by the orchestrator:
//! - **Checkout**: materializes a repository working tree with `git`.
//! - **Mount**: parses the `Mountfile`, seeds shared directories, and
//!   replaces local paths with symlinks into them.
//! - **Template**: renders config files in place.
//! - **Handover**: drops privileges and replaces the process image.
//!
//! External tools sit behind narrow traits ([`checkout::CommandRunner`],
//! [`template::Renderer`], [`handover::IdentityOps`]) so the steps can be
//! exercised without a VCS client, a template engine, or root.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

#[cfg(not(target_os = "linux"))]
compile_error!("pier bootstraps Linux containers and only builds for Linux targets");

pub mod checkout;
pub mod handover;
pub mod mount;
pub mod template;
