//! Source checkout through the `git` command-line client.
//!
//! The clone strategy depends on the revision selector: an arbitrary commit
//! needs full history, anything else is cloned shallow at the requested ref.
//! Commands run one after another in the destination directory and the first
//! non-zero exit aborts the checkout. There are no retries.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use pier_common::constants::VCS_PROGRAM;
use pier_common::error::ExitClass;
use pier_common::types::{VcsRef, VcsSpec};
use thiserror::Error;

/// Errors raised by a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The destination is not a usable directory.
    #[error("checkout destination {path} {reason}")]
    Destination {
        /// Configured destination.
        path: PathBuf,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The command line.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A command exited with a non-zero status.
    #[error("`{command}` exited with status {status}")]
    CommandFailed {
        /// The command line.
        command: String,
        /// Exit status reported by the command.
        status: i32,
    },
}

impl CheckoutError {
    /// Exit classification when this error aborts a run.
    #[must_use]
    pub const fn exit_class(&self) -> ExitClass {
        match self {
            Self::Destination { .. } => ExitClass::Config,
            Self::Spawn { .. } | Self::CommandFailed { .. } => ExitClass::Checkout,
        }
    }
}

/// Convenience alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Runs an external command to completion.
pub trait CommandRunner {
    /// Runs `argv` with `cwd` as working directory, blocking until it exits,
    /// and returns its exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started.
    fn run(&self, argv: &[String], cwd: &Path) -> std::io::Result<i32>;
}

/// Runs commands as real subprocesses sharing this process's stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], cwd: &Path) -> std::io::Result<i32> {
        let Some((program, args)) = argv.split_first() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            ));
        };
        let resolved = which::which(program)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e))?;

        let status = Command::new(resolved).args(args).current_dir(cwd).status()?;
        // A signal death is reported shell-style as 128 + signal number.
        Ok(status
            .code()
            .or_else(|| status.signal().map(|s| 128 + s))
            .unwrap_or(-1))
    }
}

fn git<const N: usize>(args: [&str; N]) -> Vec<String> {
    let mut argv = Vec::with_capacity(N + 1);
    argv.push(VCS_PROGRAM.to_string());
    argv.extend(args.iter().map(|a| (*a).to_string()));
    argv
}

/// Builds the ordered command list for `spec`.
#[must_use]
pub fn commands(spec: &VcsSpec) -> Vec<Vec<String>> {
    let url = spec.url.as_str();
    let mut cmds = match &spec.reference {
        VcsRef::Commit(hash) => vec![
            git(["clone", url, "."]),
            git(["checkout", hash.as_str()]),
        ],
        VcsRef::Tag(name) | VcsRef::Branch(name) => vec![git([
            "clone",
            "--depth",
            "1",
            "--branch",
            name.as_str(),
            url,
            ".",
        ])],
        VcsRef::Default => vec![git(["clone", "--depth", "1", url, "."])],
    };
    cmds.push(git(["submodule", "update", "--init"]));
    cmds
}

/// Materializes the working tree described by `spec`.
///
/// # Errors
///
/// Returns [`CheckoutError::Destination`] if the destination is not an
/// existing writable directory, otherwise the first command failure.
pub fn run(spec: &VcsSpec, runner: &dyn CommandRunner) -> Result<()> {
    check_destination(&spec.destination)?;
    tracing::info!(
        url = %spec.url,
        destination = %spec.destination.display(),
        reference = %spec.reference,
        "checking out source"
    );

    for argv in commands(spec) {
        let command = argv.join(" ");
        tracing::debug!(%command, "running");
        let status = runner
            .run(&argv, &spec.destination)
            .map_err(|e| CheckoutError::Spawn {
                command: command.clone(),
                source: e,
            })?;
        if status != 0 {
            tracing::error!(%command, status, "checkout command failed");
            return Err(CheckoutError::CommandFailed { command, status });
        }
    }

    tracing::info!(destination = %spec.destination.display(), "checkout complete");
    Ok(())
}

fn check_destination(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(CheckoutError::Destination {
            path: path.to_path_buf(),
            reason: "is not an existing directory",
        });
    }
    nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).map_err(|_| {
        CheckoutError::Destination {
            path: path.to_path_buf(),
            reason: "is not writable",
        }
    })
}
