//! The bootstrap state machine.
//!
//! ```text
//! LoadConfig -> LoadPersistedEnv -> PersistEnv -> ResolveRuntimeConfig
//!   -> ResolveVcs -> Checkout -> Mounts -> Templates -> Handover
//! ```
//!
//! Stages run once, in order. Configuration loading, env-file handling and
//! mounts degrade and continue; incomplete settings, checkout and template
//! failures abort the run. The handover replaces the process image and has
//! no successor.

use std::path::{Path, PathBuf};

use pier_common::constants::DEFAULT_MOUNT_FILE;
use pier_common::env::Environment;
use pier_common::types::{Identity, MountDirs};
use pier_config::{ConfigStore, EffectiveConfig};
use pier_core::checkout::{self, CommandRunner, SystemRunner};
use pier_core::handover::{self, HandoverPlan, IdentityOps};
use pier_core::mount::{MountExecutor, MountPlanner, MountReport};
use pier_core::template::{self, Renderer, TeraRenderer};

use crate::error::{BootstrapError, Stage};

/// Inputs that come from the command line rather than the config file.
#[derive(Debug, Clone)]
pub struct Options {
    /// Path of the local config file.
    pub config_path: PathBuf,
    /// Env-file path overriding `env_file_path` from the config file.
    pub env_file: Option<PathBuf>,
    /// Merge an existing env file into the environment before persisting.
    pub reuse_env: bool,
    /// File name of the mount manifest.
    pub mount_file: String,
}

impl Options {
    /// Options for the config file at `config_path` with every other
    /// setting at its default.
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            env_file: None,
            reuse_env: false,
            mount_file: DEFAULT_MOUNT_FILE.to_string(),
        }
    }
}

/// How a successful run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Replace this process with the application command.
    Handover(HandoverPlan),
    /// No command was given; the environment is prepared and the run exits.
    Completed,
}

/// Result of the preparation stages.
#[derive(Debug)]
pub struct Prepared {
    /// The configuration every stage ran with.
    pub config: EffectiveConfig,
    /// Mount outcome, if mounting ran.
    pub mounts: Option<MountReport>,
    /// What happens next.
    pub termination: Termination,
}

/// Runs the bootstrap stages with pluggable VCS and template collaborators.
pub struct Orchestrator {
    options: Options,
    runner: Box<dyn CommandRunner>,
    renderer: Box<dyn Renderer>,
}

impl Orchestrator {
    /// Creates an orchestrator that runs the real `git` client and renders
    /// with Tera.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::with_collaborators(options, Box::new(SystemRunner), Box::new(TeraRenderer))
    }

    /// Creates an orchestrator with explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        options: Options,
        runner: Box<dyn CommandRunner>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            options,
            runner,
            renderer,
        }
    }

    /// Runs every stage up to, but not including, the handover.
    ///
    /// `env` is the environment snapshot the run starts from; `command` is
    /// the application command to hand over to, possibly empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete, the checkout
    /// fails, or a template fails to render.
    pub fn prepare(
        &self,
        env: Environment,
        command: Vec<String>,
    ) -> Result<Prepared, BootstrapError> {
        enter(Stage::LoadConfig);
        let mut store = ConfigStore::load(&self.options.config_path, env);
        if let Some(path) = &self.options.env_file {
            store = store.with_env_file(path.clone());
        }

        if self.options.reuse_env {
            enter(Stage::LoadPersistedEnv);
            match store.env_file_path().map(Path::to_path_buf) {
                Some(path) => store = store.merge_persisted_env(&path),
                None => tracing::warn!("no env file configured, nothing to reuse"),
            }
        }

        if let Some(path) = store.env_file_path() {
            enter(Stage::PersistEnv);
            if let Err(e) = store.persist_env(path) {
                tracing::warn!(error = %e, "could not persist environment");
            }
        }

        enter(Stage::ResolveRuntimeConfig);
        let runtime_context = store.resolve_runtime_env();

        enter(Stage::ResolveVcs);
        let vcs = store.resolve_vcs().map_err(|source| BootstrapError::Config {
            stage: Stage::ResolveVcs,
            source,
        })?;
        let mount_dirs = store.mount_dirs().map_err(|source| BootstrapError::Config {
            stage: Stage::Mounts,
            source,
        })?;
        let config = store.assemble(runtime_context, vcs, mount_dirs);

        if let Some(spec) = &config.vcs {
            enter(Stage::Checkout);
            checkout::run(spec, self.runner.as_ref())?;
        } else {
            tracing::info!("no repository configured, skipping checkout");
        }

        let mounts = config.mounts.as_ref().and_then(|dirs| {
            enter(Stage::Mounts);
            self.mount(dirs, config.identity)
        });

        if !config.template_files.is_empty() {
            enter(Stage::Templates);
            let _ = template::render_files(
                &config.template_files,
                &config.runtime_context,
                self.renderer.as_ref(),
            )?;
        }

        let termination = if command.is_empty() {
            Termination::Completed
        } else {
            Termination::Handover(HandoverPlan {
                command,
                identity: config.identity,
                env: config.env.clone(),
            })
        };

        Ok(Prepared {
            config,
            mounts,
            termination,
        })
    }

    fn mount(&self, dirs: &MountDirs, owner: Identity) -> Option<MountReport> {
        let planner =
            MountPlanner::new(dirs.clone()).with_manifest_name(self.options.mount_file.clone());
        match planner.build_plan() {
            Ok(Some(plan)) => {
                let report = MountExecutor::new(dirs.clone(), owner).apply(&plan);
                if !report.is_complete() {
                    tracing::warn!(
                        linked = report.linked.len(),
                        skipped = report.skipped.len(),
                        "some mounts were skipped"
                    );
                }
                Some(report)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not build mount plan, skipping mounts");
                None
            }
        }
    }
}

/// Performs the terminal action of a run.
///
/// Returns `Ok(())` for [`Termination::Completed`]. For
/// [`Termination::Handover`] it returns only if the handover fails.
///
/// # Errors
///
/// Returns the handover failure.
pub fn finish(termination: Termination, ops: &dyn IdentityOps) -> Result<(), BootstrapError> {
    match termination {
        Termination::Completed => {
            tracing::info!("no command given, bootstrap complete");
            Ok(())
        }
        Termination::Handover(plan) => {
            enter(Stage::Handover);
            Err(handover::execute(plan, ops).into())
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "entering stage");
}
