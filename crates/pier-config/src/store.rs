//! Effective configuration assembled from the local file and the
//! environment snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pier_common::constants::{CONFIG_OVERRIDE_VAR, VCS_OVERRIDE_PREFIX};
use pier_common::env::{Environment, strip_line_breaks};
use pier_common::types::{Identity, MountDirs, RuntimeContext, VcsRef, VcsSpec};
use serde_json::Value;

use crate::envfile;
use crate::error::{ConfigError, Result};
use crate::local::{self, LocalConfig, Loaded};

const VCS_FIELDS: &[&str] = &["git_url", "git_dst", "git_branch", "git_tag", "git_hash"];

/// Fully resolved configuration for one run. Immutable once built.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    /// Identity the application runs as and mounts are owned by.
    pub identity: Identity,
    /// Source checkout parameters, if a repository is configured.
    pub vcs: Option<VcsSpec>,
    /// Mount directories, if configured.
    pub mounts: Option<MountDirs>,
    /// Template files rendered in place, in order.
    pub template_files: Vec<PathBuf>,
    /// Context handed to the template renderer.
    pub runtime_context: RuntimeContext,
    /// Final environment for the exec'd command.
    pub env: Environment,
    /// Where the environment was persisted, if anywhere.
    pub env_file: Option<PathBuf>,
}

/// Holds the local config file and the environment snapshot, and derives
/// every configuration view from them.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    local: LocalConfig,
    env: Environment,
}

impl ConfigStore {
    /// Loads the local config file at `path`, never failing.
    ///
    /// A missing or malformed file is logged and replaced by an empty
    /// configuration.
    #[must_use]
    pub fn load(path: &Path, env: Environment) -> Self {
        Self::from_loaded(local::load_local(path), env)
    }

    /// Builds a store from an already loaded file.
    #[must_use]
    pub fn from_loaded(loaded: Loaded, env: Environment) -> Self {
        Self::new(loaded.into_config(), env)
    }

    /// Builds a store from explicit parts.
    #[must_use]
    pub const fn new(local: LocalConfig, env: Environment) -> Self {
        Self { local, env }
    }

    /// The parsed local config file.
    #[must_use]
    pub const fn local(&self) -> &LocalConfig {
        &self.local
    }

    /// The current environment snapshot.
    #[must_use]
    pub const fn env(&self) -> &Environment {
        &self.env
    }

    /// Overrides the env-file path named by the local file.
    #[must_use]
    pub fn with_env_file(mut self, path: PathBuf) -> Self {
        self.local.env_file_path = Some(path);
        self
    }

    /// Path the environment is persisted to, if configured.
    #[must_use]
    pub fn env_file_path(&self) -> Option<&Path> {
        self.local.env_file_path.as_deref()
    }

    /// Spawn identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.local.identity()
    }

    /// Template files in render order.
    #[must_use]
    pub fn template_files(&self) -> &[PathBuf] {
        &self.local.files
    }

    /// Merges a previously persisted env file into the snapshot.
    ///
    /// Live variables take precedence over persisted ones. An unreadable
    /// file is logged and leaves the snapshot unchanged.
    #[must_use]
    pub fn merge_persisted_env(self, path: &Path) -> Self {
        match envfile::read_env_file(path) {
            Ok(pairs) => {
                tracing::info!(
                    path = %path.display(),
                    count = pairs.len(),
                    "merging persisted environment"
                );
                Self {
                    env: self.env.with_fallbacks(pairs),
                    local: self.local,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "persisted environment unavailable");
                self
            }
        }
    }

    /// Writes the environment snapshot to `path` as `KEY=VALUE` lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn persist_env(&self, path: &Path) -> Result<usize> {
        envfile::write_env_file(path, &self.env)
    }

    /// Resolves the template context.
    ///
    /// A JSON object in `CONFIG` is used verbatim. Otherwise the whole
    /// environment is used with CR/LF removed from every value.
    #[must_use]
    pub fn resolve_runtime_env(&self) -> RuntimeContext {
        if let Some(raw) = self.env.get(CONFIG_OVERRIDE_VAR) {
            match parse_override(raw) {
                Ok(context) => {
                    tracing::debug!(
                        keys = context.len(),
                        "using {CONFIG_OVERRIDE_VAR} as template context"
                    );
                    return context;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring override, falling back to environment");
                }
            }
        }

        self.env
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(strip_line_breaks(v))))
            .collect()
    }

    /// Resolves checkout parameters from the `git` section and any `GIT*`
    /// environment variables, the environment winning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDestination`] if a URL is configured
    /// without a destination.
    pub fn resolve_vcs(&self) -> Result<Option<VcsSpec>> {
        let mut fields = BTreeMap::new();
        if let Some(git) = &self.local.git {
            let local = [
                ("git_url", &git.git_url),
                ("git_dst", &git.git_dst),
                ("git_branch", &git.git_branch),
                ("git_tag", &git.git_tag),
                ("git_hash", &git.git_hash),
            ];
            for (name, value) in local {
                if let Some(v) = value {
                    let _ = fields.insert(name, v.clone());
                }
            }
        }

        for (key, value) in self.env.iter() {
            if !has_vcs_prefix(key) || value.is_empty() {
                continue;
            }
            let name = key.to_ascii_lowercase();
            match VCS_FIELDS.iter().copied().find(|f| *f == name) {
                Some(field) => {
                    tracing::debug!(var = key, "environment overrides {field}");
                    let _ = fields.insert(field, value.to_string());
                }
                None => tracing::debug!(var = key, "ignoring unrecognized VCS variable"),
            }
        }

        let Some(url) = fields.remove("git_url") else {
            return Ok(None);
        };
        let Some(destination) = fields.remove("git_dst") else {
            return Err(ConfigError::MissingDestination { url });
        };

        let hash = fields.remove("git_hash");
        let tag = fields.remove("git_tag");
        let branch = fields.remove("git_branch");
        let selected = [&hash, &tag, &branch].iter().filter(|s| s.is_some()).count();
        if selected > 1 {
            tracing::warn!("several revision selectors set, using commit > tag > branch");
        }
        let reference = match (hash, tag, branch) {
            (Some(h), _, _) => VcsRef::Commit(h),
            (None, Some(t), _) => VcsRef::Tag(t),
            (None, None, Some(b)) => VcsRef::Branch(b),
            (None, None, None) => VcsRef::Default,
        };

        Ok(Some(VcsSpec {
            url,
            destination: PathBuf::from(destination),
            reference,
        }))
    }

    /// Mount directories from the `dirs` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IncompleteMountDirs`] if only one of
    /// `working_dir` and `remote_dir` is set.
    pub fn mount_dirs(&self) -> Result<Option<MountDirs>> {
        let dirs = self.local.dirs.clone().unwrap_or_default();
        match (dirs.working_dir, dirs.remote_dir) {
            (Some(base), Some(remote)) => Ok(Some(MountDirs { base, remote })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::IncompleteMountDirs {
                missing: "remote_dir",
            }),
            (None, Some(_)) => Err(ConfigError::IncompleteMountDirs {
                missing: "working_dir",
            }),
        }
    }

    /// Assembles the effective configuration from already resolved views.
    #[must_use]
    pub fn assemble(
        &self,
        runtime_context: RuntimeContext,
        vcs: Option<VcsSpec>,
        mounts: Option<MountDirs>,
    ) -> EffectiveConfig {
        EffectiveConfig {
            identity: self.identity(),
            vcs,
            mounts,
            template_files: self.template_files().to_vec(),
            runtime_context,
            env: self.env.clone(),
            env_file: self.local.env_file_path.clone(),
        }
    }

    /// Resolves every view and assembles the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the VCS or mount settings are incomplete.
    pub fn effective(&self) -> Result<EffectiveConfig> {
        let runtime_context = self.resolve_runtime_env();
        let vcs = self.resolve_vcs()?;
        let mounts = self.mount_dirs()?;
        Ok(self.assemble(runtime_context, vcs, mounts))
    }
}

fn has_vcs_prefix(key: &str) -> bool {
    key.get(..VCS_OVERRIDE_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(VCS_OVERRIDE_PREFIX))
}

fn parse_override(raw: &str) -> Result<RuntimeContext> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ConfigError::Override {
            var: CONFIG_OVERRIDE_VAR,
            message: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(ConfigError::Override {
            var: CONFIG_OVERRIDE_VAR,
            message: e.to_string(),
        }),
    }
}
