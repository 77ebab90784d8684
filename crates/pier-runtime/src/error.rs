//! Fatal bootstrap errors.

use std::fmt;

use pier_common::error::ExitClass;
use pier_config::ConfigError;
use pier_core::checkout::CheckoutError;
use pier_core::handover::HandoverError;
use pier_core::template::TemplateError;
use thiserror::Error;

/// A stage of the bootstrap pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Read the local config file.
    LoadConfig,
    /// Merge a previously persisted env file.
    LoadPersistedEnv,
    /// Write the env file.
    PersistEnv,
    /// Build the template context.
    ResolveRuntimeConfig,
    /// Resolve checkout parameters.
    ResolveVcs,
    /// Clone the repository.
    Checkout,
    /// Plan and apply shared-directory links.
    Mounts,
    /// Render config templates.
    Templates,
    /// Drop privileges and exec.
    Handover,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadConfig => "load-config",
            Self::LoadPersistedEnv => "load-persisted-env",
            Self::PersistEnv => "persist-env",
            Self::ResolveRuntimeConfig => "resolve-runtime-config",
            Self::ResolveVcs => "resolve-vcs",
            Self::Checkout => "checkout",
            Self::Mounts => "mounts",
            Self::Templates => "templates",
            Self::Handover => "handover",
        };
        f.write_str(name)
    }
}

/// An error that aborts the bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration is incomplete.
    #[error("{stage}: {source}")]
    Config {
        /// Stage that detected the problem.
        stage: Stage,
        /// Underlying error.
        source: ConfigError,
    },

    /// The source checkout failed.
    #[error("checkout: {0}")]
    Checkout(#[from] CheckoutError),

    /// A template could not be rendered.
    #[error("templates: {0}")]
    Template(#[from] TemplateError),

    /// Privileges could not be dropped or the command could not be run.
    #[error("handover: {0}")]
    Handover(#[from] HandoverError),
}

impl BootstrapError {
    /// The stage that failed.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Config { stage, .. } => *stage,
            Self::Checkout(_) => Stage::Checkout,
            Self::Template(_) => Stage::Templates,
            Self::Handover(_) => Stage::Handover,
        }
    }

    /// Exit classification of the failure.
    #[must_use]
    pub const fn exit_class(&self) -> ExitClass {
        match self {
            Self::Config { source, .. } => source.exit_class(),
            Self::Checkout(e) => e.exit_class(),
            Self::Template(e) => e.exit_class(),
            Self::Handover(e) => e.exit_class(),
        }
    }

    /// Process exit code for the failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.exit_class().code()
    }
}
