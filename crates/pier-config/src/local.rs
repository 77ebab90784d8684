//! The local declarative config file baked into the image.

use std::path::{Path, PathBuf};

use pier_common::types::Identity;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Contents of the local JSON config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Identity the application is spawned as.
    pub user: Option<UserSection>,
    /// Source checkout settings.
    pub git: Option<GitSection>,
    /// Where to persist the environment for later steps.
    pub env_file_path: Option<PathBuf>,
    /// Mount directories.
    pub dirs: Option<DirsSection>,
    /// Template files rendered in place, in order.
    pub files: Vec<PathBuf>,
}

/// `user` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSection {
    /// Target user ID.
    pub uid: Option<u32>,
    /// Target group ID.
    pub gid: Option<u32>,
}

/// `git` section. Field names match the `GIT_*` override variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSection {
    /// Repository URL.
    pub git_url: Option<String>,
    /// Checkout destination.
    pub git_dst: Option<String>,
    /// Branch to check out.
    pub git_branch: Option<String>,
    /// Tag to check out.
    pub git_tag: Option<String>,
    /// Exact commit to check out.
    pub git_hash: Option<String>,
}

/// `dirs` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirsSection {
    /// Local base directory.
    pub working_dir: Option<PathBuf>,
    /// Shared remote root.
    pub remote_dir: Option<PathBuf>,
}

impl LocalConfig {
    /// Spawn identity, falling back to the 48:48 sentinel per field.
    #[must_use]
    pub fn identity(&self) -> Identity {
        let default = Identity::default();
        let user = self.user.clone().unwrap_or_default();
        Identity {
            uid: user.uid.unwrap_or(default.uid),
            gid: user.gid.unwrap_or(default.gid),
        }
    }
}

/// Outcome of loading the local config file.
///
/// Loading never fails: an unreadable or malformed file yields
/// [`Loaded::Fallback`] and the run continues with an empty configuration.
#[derive(Debug)]
pub enum Loaded {
    /// The file was read and parsed.
    Found(LocalConfig),
    /// The file was unusable; an empty configuration stands in.
    Fallback {
        /// Why the file was not used.
        reason: ConfigError,
    },
}

impl Loaded {
    /// Returns the parsed config, or the empty default on fallback.
    #[must_use]
    pub fn into_config(self) -> LocalConfig {
        match self {
            Self::Found(config) => config,
            Self::Fallback { .. } => LocalConfig::default(),
        }
    }

    /// Whether the file was unusable.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Loads the local config file at `path`.
pub fn load_local(path: &Path) -> Loaded {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            let reason = ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            };
            tracing::warn!(error = %reason, "config file unavailable, using empty configuration");
            return Loaded::Fallback { reason };
        }
    };

    match serde_json::from_str::<LocalConfig>(&content) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            Loaded::Found(config)
        }
        Err(e) => {
            let reason = ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            };
            tracing::warn!(error = %reason, "config file unusable, using empty configuration");
            Loaded::Fallback { reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_falls_back() {
        let loaded = load_local(Path::new("/nonexistent/pier.json"));
        assert!(loaded.is_fallback());
        assert_eq!(loaded.into_config(), LocalConfig::default());
    }

    #[test]
    fn load_empty_file_falls_back() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let loaded = load_local(file.path());
        assert!(matches!(
            loaded,
            Loaded::Fallback {
                reason: ConfigError::Parse { .. }
            }
        ));
    }

    #[test]
    fn load_full_file_reads_every_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pier.json");
        std::fs::write(
            &path,
            r#"{
                "user": {"uid": 1000, "gid": 1001},
                "git": {
                    "git_url": "https://example.com/app.git",
                    "git_dst": "/srv/www",
                    "git_tag": "v1.0"
                },
                "env_file_path": "/srv/env",
                "dirs": {"working_dir": "/srv/www", "remote_dir": "/mnt/shared"},
                "files": ["/etc/app.conf", "/etc/other.conf"]
            }"#,
        )
        .expect("write");

        let config = load_local(&path).into_config();
        assert_eq!(config.identity(), Identity { uid: 1000, gid: 1001 });
        let git = config.git.expect("git section");
        assert_eq!(git.git_tag.as_deref(), Some("v1.0"));
        assert_eq!(config.env_file_path, Some(PathBuf::from("/srv/env")));
        assert_eq!(config.files.len(), 2);
        assert_eq!(
            config.dirs.and_then(|d| d.remote_dir),
            Some(PathBuf::from("/mnt/shared"))
        );
    }

    #[test]
    fn identity_defaults_per_field() {
        let config: LocalConfig =
            serde_json::from_str(r#"{"user": {"uid": 500}}"#).expect("parse");
        assert_eq!(config.identity(), Identity { uid: 500, gid: 48 });
    }

    #[test]
    fn null_sections_are_accepted() {
        let config: LocalConfig =
            serde_json::from_str(r#"{"git": null, "dirs": null}"#).expect("parse");
        assert!(config.git.is_none());
        assert_eq!(config.identity(), Identity::default());
    }
}
