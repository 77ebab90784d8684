//! Shared-directory mounting through symlinks.
//!
//! A `Mountfile` lists `remote : local` bindings. For each binding the local
//! path under the working directory is replaced by a symlink to a directory
//! under the shared remote root (or a fresh temporary directory for
//! `ephemeral`). Content baked into the image is copied to an empty remote
//! directory before the local path is removed.
//!
//! Bindings are applied independently: one failing binding is reported and
//! the rest are still attempted.

pub mod executor;
pub mod manifest;
pub mod planner;
mod seed;

use std::path::PathBuf;

use thiserror::Error;

pub use executor::{MountExecutor, MountReport};
pub use manifest::parse_line;
pub use planner::MountPlanner;

/// Errors raised while planning or applying a single binding.
#[derive(Debug, Error)]
pub enum MountError {
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An ownership change failed.
    #[error("chown {path}: {source}")]
    Chown {
        /// Path whose ownership could not be changed.
        path: PathBuf,
        /// Underlying errno.
        source: nix::errno::Errno,
    },

    /// The local path would be created inside the remote tree.
    #[error("{local} resolves inside the remote root {remote}")]
    InsideRemote {
        /// Local path of the binding.
        local: PathBuf,
        /// Remote root.
        remote: PathBuf,
    },

    /// The local path is absolute or climbs out of the working directory.
    #[error("local path {local} escapes the working directory")]
    EscapesBase {
        /// Local relative path as written in the manifest.
        local: String,
    },

    /// The remote name is absolute or climbs out of the remote root.
    #[error("remote {remote} escapes the remote root")]
    EscapesRemote {
        /// Remote name as written in the manifest.
        remote: String,
    },
}

impl MountError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Convenience alias for mount results.
pub type Result<T> = std::result::Result<T, MountError>;
