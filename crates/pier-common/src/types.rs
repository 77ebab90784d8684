//! Domain primitive types used across the pier workspace.

use std::fmt;
use std::path::PathBuf;

use crate::constants::{DEFAULT_SPAWN_GID, DEFAULT_SPAWN_UID, EPHEMERAL_REMOTE};

/// Template context handed to the renderer.
pub type RuntimeContext = serde_json::Map<String, serde_json::Value>;

/// User and group the application process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Target user ID.
    pub uid: u32,
    /// Target group ID.
    pub gid: u32,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            uid: DEFAULT_SPAWN_UID,
            gid: DEFAULT_SPAWN_GID,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Which revision of the repository to check out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VcsRef {
    /// Tip of a named branch.
    Branch(String),
    /// A tag, checked out detached.
    Tag(String),
    /// An exact commit hash.
    Commit(String),
    /// The remote's default branch.
    Default,
}

impl fmt::Display for VcsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(b) => write!(f, "branch {b}"),
            Self::Tag(t) => write!(f, "tag {t}"),
            Self::Commit(h) => write!(f, "commit {h}"),
            Self::Default => write!(f, "default branch"),
        }
    }
}

/// Parameters for materializing a source checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsSpec {
    /// Repository URL.
    pub url: String,
    /// Pre-existing directory the working tree is cloned into.
    pub destination: PathBuf,
    /// Revision selector.
    pub reference: VcsRef,
}

/// Remote side of a mount binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteTarget {
    /// A path relative to the shared remote root. Empty means the root itself.
    Shared(String),
    /// A freshly allocated temporary directory.
    Ephemeral,
}

impl RemoteTarget {
    /// Interprets a manifest remote token, recognizing the ephemeral sentinel.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name == EPHEMERAL_REMOTE {
            Self::Ephemeral
        } else {
            Self::Shared(name.to_string())
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(name) => write!(f, "{name}"),
            Self::Ephemeral => write!(f, "{EPHEMERAL_REMOTE}"),
        }
    }
}

/// One `remote : local` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountBinding {
    /// Where the content lives.
    pub remote: RemoteTarget,
    /// Path relative to the local base directory that becomes a symlink.
    pub local: String,
}

impl MountBinding {
    /// Creates a binding from a remote token and a local relative path.
    #[must_use]
    pub fn new(remote: &str, local: impl Into<String>) -> Self {
        Self {
            remote: RemoteTarget::from_name(remote),
            local: local.into(),
        }
    }

    /// The synthetic binding that maps the whole remote root onto the base.
    #[must_use]
    pub const fn whole_root() -> Self {
        Self {
            remote: RemoteTarget::Shared(String::new()),
            local: String::new(),
        }
    }
}

impl fmt::Display for MountBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.remote, self.local)
    }
}

/// Ordered list of bindings to apply.
pub type MountPlan = Vec<MountBinding>;

/// Local base and shared remote root for mounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDirs {
    /// Local working directory bindings are relative to.
    pub base: PathBuf,
    /// Shared remote root.
    pub remote: PathBuf,
}
