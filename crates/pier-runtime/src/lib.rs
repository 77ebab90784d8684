//! Bootstrap orchestration for pier.
//!
//! [`orchestrator::Orchestrator`] runs the stages in a fixed order and
//! either aborts with a [`error::BootstrapError`] or ends in a
//! [`orchestrator::Termination`]. Handing over to the application command is
//! the only terminal action that does not return.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod orchestrator;
