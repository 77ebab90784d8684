//! Configuration error types.

use std::path::PathBuf;

use pier_common::error::ExitClass;
use thiserror::Error;

/// Errors raised while resolving configuration.
///
/// Only [`ConfigError::MissingDestination`] and
/// [`ConfigError::IncompleteMountDirs`] abort a run; the rest are reported
/// and replaced by defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be read or written.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The local config file is not valid JSON of the expected shape.
    #[error("malformed config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The JSON context override could not be used.
    #[error("invalid {var} override: {message}")]
    Override {
        /// Name of the override variable.
        var: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// A repository URL was configured without a checkout destination.
    #[error("repository {url} has no checkout destination (set git.git_dst or GIT_DST)")]
    MissingDestination {
        /// The configured repository URL.
        url: String,
    },

    /// Only one of the two mount directories was configured.
    #[error("mount directories incomplete: dirs.{missing} is not set")]
    IncompleteMountDirs {
        /// Name of the missing key.
        missing: &'static str,
    },
}

impl ConfigError {
    /// Exit classification when this error aborts a run.
    #[must_use]
    pub const fn exit_class(&self) -> ExitClass {
        match self {
            Self::Io { .. }
            | Self::Parse { .. }
            | Self::Override { .. }
            | Self::MissingDestination { .. }
            | Self::IncompleteMountDirs { .. } => ExitClass::Config,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
