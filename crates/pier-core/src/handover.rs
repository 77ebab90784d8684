//! Privilege drop and process replacement.
//!
//! The handover is the terminal step of a run. The group is changed before
//! the user (an unprivileged process can no longer change its group),
//! `HOME` is refreshed for the new user, and only then is the process image
//! replaced. [`execute`] returns only when one of these steps fails.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use nix::unistd::{Gid, Uid, User};
use pier_common::env::Environment;
use pier_common::error::ExitClass;
use pier_common::types::Identity;
use thiserror::Error;

/// Errors raised by the handover. Every one of them is terminal.
#[derive(Debug, Error)]
pub enum HandoverError {
    /// There is no command to hand over to.
    #[error("no command to execute")]
    EmptyCommand,

    /// An identity syscall failed.
    #[error("{op}({id}) failed: {source}")]
    Identity {
        /// The syscall that failed.
        op: &'static str,
        /// The ID passed to it.
        id: u32,
        /// Underlying errno.
        source: nix::errno::Errno,
    },

    /// The program does not exist on `PATH`.
    #[error("command not found: {program}")]
    CommandNotFound {
        /// Program name.
        program: String,
    },

    /// The exec itself failed.
    #[error("failed to execute {program}: {source}")]
    Exec {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl HandoverError {
    /// Exit classification for this error.
    #[must_use]
    pub const fn exit_class(&self) -> ExitClass {
        match self {
            Self::EmptyCommand => ExitClass::Config,
            Self::CommandNotFound { .. } => ExitClass::CommandNotFound,
            Self::Identity { .. } | Self::Exec { .. } => ExitClass::Handover,
        }
    }
}

/// Everything needed to replace the process: the command, who runs it, and
/// the finalized environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverPlan {
    /// Program and arguments.
    pub command: Vec<String>,
    /// Identity to switch to.
    pub identity: Identity,
    /// Environment of the new process image.
    pub env: Environment,
}

/// Process identity and exec primitives.
pub trait IdentityOps {
    /// Replaces the supplementary group list with `gid` alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the group list cannot be changed.
    fn drop_supplementary_groups(&self, gid: u32) -> Result<(), HandoverError>;

    /// Sets the real and effective group ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be changed.
    fn set_gid(&self, gid: u32) -> Result<(), HandoverError>;

    /// Sets the real and effective user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be changed.
    fn set_uid(&self, uid: u32) -> Result<(), HandoverError>;

    /// Home directory of `uid` from the user database.
    fn home_dir(&self, uid: u32) -> Option<PathBuf>;

    /// Replaces the process image. Returns only on failure.
    fn exec(&self, command: &[String], env: &Environment) -> HandoverError;
}

/// The real syscalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl IdentityOps for SystemIdentity {
    fn drop_supplementary_groups(&self, gid: u32) -> Result<(), HandoverError> {
        if !nix::unistd::geteuid().is_root() {
            tracing::debug!("not root, keeping supplementary groups");
            return Ok(());
        }
        nix::unistd::setgroups(&[Gid::from_raw(gid)]).map_err(|source| HandoverError::Identity {
            op: "setgroups",
            id: gid,
            source,
        })
    }

    fn set_gid(&self, gid: u32) -> Result<(), HandoverError> {
        nix::unistd::setgid(Gid::from_raw(gid)).map_err(|source| HandoverError::Identity {
            op: "setgid",
            id: gid,
            source,
        })
    }

    fn set_uid(&self, uid: u32) -> Result<(), HandoverError> {
        nix::unistd::setuid(Uid::from_raw(uid)).map_err(|source| HandoverError::Identity {
            op: "setuid",
            id: uid,
            source,
        })
    }

    fn home_dir(&self, uid: u32) -> Option<PathBuf> {
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(user) => user.map(|u| u.dir),
            Err(e) => {
                tracing::warn!(uid, error = %e, "user database lookup failed");
                None
            }
        }
    }

    fn exec(&self, command: &[String], env: &Environment) -> HandoverError {
        let Some((program, args)) = command.split_first() else {
            return HandoverError::EmptyCommand;
        };
        // PATH lookup uses the PATH of `env`.
        let err = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter())
            .exec();
        if err.kind() == std::io::ErrorKind::NotFound {
            HandoverError::CommandNotFound {
                program: program.clone(),
            }
        } else {
            HandoverError::Exec {
                program: program.clone(),
                source: err,
            }
        }
    }
}

/// Drops privileges to `plan.identity` and replaces the process with
/// `plan.command`.
///
/// Returns only if a step fails; on success the calling process no longer
/// exists.
pub fn execute(plan: HandoverPlan, ops: &dyn IdentityOps) -> HandoverError {
    let HandoverPlan {
        command,
        identity,
        env,
    } = plan;
    if command.is_empty() {
        return HandoverError::EmptyCommand;
    }
    tracing::info!(?command, %identity, "replacing current process");

    if let Err(e) = ops.drop_supplementary_groups(identity.gid) {
        return e;
    }
    if let Err(e) = ops.set_gid(identity.gid) {
        return e;
    }
    if let Err(e) = ops.set_uid(identity.uid) {
        return e;
    }

    let env = match ops.home_dir(identity.uid) {
        Some(home) => env.with_var("HOME", home.to_string_lossy()),
        None => {
            tracing::warn!(uid = identity.uid, "no home directory for user, keeping HOME");
            env
        }
    };
    tracing::info!(%identity, "privileges dropped");

    ops.exec(&command, &env)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct FakeIdentity {
        calls: RefCell<Vec<String>>,
        fail_setuid: bool,
        home: Option<PathBuf>,
        exec_env: RefCell<Option<Environment>>,
    }

    impl IdentityOps for FakeIdentity {
        fn drop_supplementary_groups(&self, gid: u32) -> Result<(), HandoverError> {
            self.calls.borrow_mut().push(format!("setgroups {gid}"));
            Ok(())
        }

        fn set_gid(&self, gid: u32) -> Result<(), HandoverError> {
            self.calls.borrow_mut().push(format!("setgid {gid}"));
            Ok(())
        }

        fn set_uid(&self, uid: u32) -> Result<(), HandoverError> {
            self.calls.borrow_mut().push(format!("setuid {uid}"));
            if self.fail_setuid {
                return Err(HandoverError::Identity {
                    op: "setuid",
                    id: uid,
                    source: nix::errno::Errno::EPERM,
                });
            }
            Ok(())
        }

        fn home_dir(&self, uid: u32) -> Option<PathBuf> {
            self.calls.borrow_mut().push(format!("home {uid}"));
            self.home.clone()
        }

        fn exec(&self, command: &[String], env: &Environment) -> HandoverError {
            self.calls.borrow_mut().push(format!("exec {}", command.join(" ")));
            *self.exec_env.borrow_mut() = Some(env.clone());
            HandoverError::Exec {
                program: command[0].clone(),
                source: std::io::Error::other("fake exec"),
            }
        }
    }

    fn plan() -> HandoverPlan {
        HandoverPlan {
            command: vec!["httpd".into(), "-DFOREGROUND".into()],
            identity: Identity { uid: 48, gid: 49 },
            env: Environment::from_pairs([("HOME", "/root"), ("APP", "1")]),
        }
    }

    #[test]
    fn drops_group_before_user_and_execs_last() {
        let ops = FakeIdentity {
            home: Some(PathBuf::from("/usr/share/httpd")),
            ..FakeIdentity::default()
        };
        let _ = execute(plan(), &ops);
        assert_eq!(
            *ops.calls.borrow(),
            vec![
                "setgroups 49",
                "setgid 49",
                "setuid 48",
                "home 48",
                "exec httpd -DFOREGROUND",
            ]
        );
    }

    #[test]
    fn home_is_refreshed_for_target_user() {
        let ops = FakeIdentity {
            home: Some(PathBuf::from("/usr/share/httpd")),
            ..FakeIdentity::default()
        };
        let _ = execute(plan(), &ops);
        let env = ops.exec_env.borrow().clone().expect("exec called");
        assert_eq!(env.get("HOME"), Some("/usr/share/httpd"));
        assert_eq!(env.get("APP"), Some("1"));
    }

    #[test]
    fn unknown_user_keeps_existing_home() {
        let ops = FakeIdentity::default();
        let _ = execute(plan(), &ops);
        let env = ops.exec_env.borrow().clone().expect("exec called");
        assert_eq!(env.get("HOME"), Some("/root"));
    }

    #[test]
    fn failed_setuid_stops_before_exec() {
        let ops = FakeIdentity {
            fail_setuid: true,
            ..FakeIdentity::default()
        };
        let err = execute(plan(), &ops);
        assert!(matches!(err, HandoverError::Identity { op: "setuid", .. }));
        assert_eq!(err.exit_class(), ExitClass::Handover);
        assert!(ops.exec_env.borrow().is_none());
    }

    #[test]
    fn empty_command_is_rejected_before_any_syscall() {
        let ops = FakeIdentity::default();
        let err = execute(
            HandoverPlan {
                command: Vec::new(),
                ..plan()
            },
            &ops,
        );
        assert!(matches!(err, HandoverError::EmptyCommand));
        assert!(ops.calls.borrow().is_empty());
    }

    #[test]
    fn not_found_maps_to_127() {
        let err = HandoverError::CommandNotFound {
            program: "nope".into(),
        };
        assert_eq!(err.exit_class().code(), 127);
    }
}
