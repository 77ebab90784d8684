//! Applies a mount plan to the filesystem.

use std::fs;
use std::path::{Component, Path, PathBuf};

use pier_common::constants::EPHEMERAL_PREFIX;
use pier_common::types::{Identity, MountBinding, MountDirs, RemoteTarget};

use super::seed::{self, chown};
use super::{MountError, Result};

/// A binding that was linked successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedMount {
    /// The symlink that now stands in place of the local path.
    pub local: PathBuf,
    /// Directory the symlink points at.
    pub remote: PathBuf,
    /// Number of entries copied from the local path into the remote one.
    pub seeded: usize,
}

/// A binding that was skipped, with the reason.
#[derive(Debug)]
pub struct SkippedMount {
    /// The binding as planned.
    pub binding: MountBinding,
    /// Why it was skipped.
    pub error: MountError,
}

/// Per-binding outcome of [`MountExecutor::apply`].
#[derive(Debug, Default)]
pub struct MountReport {
    /// Bindings that were linked, in plan order.
    pub linked: Vec<LinkedMount>,
    /// Bindings that failed and were skipped, in plan order.
    pub skipped: Vec<SkippedMount>,
}

impl MountReport {
    /// Whether every binding was linked.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Links local paths under the working directory to shared directories.
///
/// Directories it creates, and content it copies, are owned by `owner`.
#[derive(Debug, Clone)]
pub struct MountExecutor {
    dirs: MountDirs,
    owner: Identity,
}

impl MountExecutor {
    /// Creates an executor for the given directories and owner.
    #[must_use]
    pub const fn new(dirs: MountDirs, owner: Identity) -> Self {
        Self { dirs, owner }
    }

    /// Applies every binding of `plan`, continuing past failures.
    pub fn apply(&self, plan: &[MountBinding]) -> MountReport {
        let mut report = MountReport::default();
        for binding in plan {
            match self.apply_binding(binding) {
                Ok(linked) => {
                    tracing::info!(
                        local = %linked.local.display(),
                        remote = %linked.remote.display(),
                        seeded = linked.seeded,
                        "link created"
                    );
                    report.linked.push(linked);
                }
                Err(error) => {
                    tracing::warn!(%binding, %error, "skipping mount");
                    report.skipped.push(SkippedMount {
                        binding: binding.clone(),
                        error,
                    });
                }
            }
        }
        report
    }

    /// Applies a single binding.
    ///
    /// The order is fixed: safety checks, remote creation, seeding from the
    /// local content, then removal of the local path and linking. Nothing is
    /// removed before its content has been copied, and a seed copy that
    /// fails partway is removed again.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding fails a safety check (the filesystem is
    /// left untouched) or any filesystem step fails.
    pub fn apply_binding(&self, binding: &MountBinding) -> Result<LinkedMount> {
        let local = self.local_path(&binding.local)?;
        self.check_outside_remote(&local)?;

        let remote = self.remote_path(&binding.remote)?;
        self.ensure_remote(&remote)?;

        let seeded = if seed::has_content(&local) && seed::is_empty_dir(&remote) {
            tracing::info!(
                from = %local.display(),
                to = %remote.display(),
                "seeding remote from local content"
            );
            seed_or_rollback(&local, &remote, self.owner)?
        } else {
            0
        };

        replace_with_link(&local, &remote)?;
        Ok(LinkedMount {
            local,
            remote,
            seeded,
        })
    }

    fn local_path(&self, relative: &str) -> Result<PathBuf> {
        let relative = Path::new(relative);
        if !stays_below(relative) {
            return Err(MountError::EscapesBase {
                local: relative.display().to_string(),
            });
        }
        if relative.as_os_str().is_empty() {
            Ok(self.dirs.base.clone())
        } else {
            Ok(self.dirs.base.join(relative))
        }
    }

    fn remote_path(&self, target: &RemoteTarget) -> Result<PathBuf> {
        match target {
            RemoteTarget::Shared(name) if name.is_empty() => Ok(self.dirs.remote.clone()),
            RemoteTarget::Shared(name) if !stays_below(Path::new(name)) => {
                Err(MountError::EscapesRemote {
                    remote: name.clone(),
                })
            }
            RemoteTarget::Shared(name) => Ok(self.dirs.remote.join(name)),
            RemoteTarget::Ephemeral => {
                let dir = tempfile::Builder::new()
                    .prefix(EPHEMERAL_PREFIX)
                    .tempdir()
                    .map_err(MountError::io(std::env::temp_dir()))?
                    .keep();
                chown(&dir, self.owner)?;
                tracing::info!(path = %dir.display(), "using temporary remote");
                Ok(dir)
            }
        }
    }

    /// Rejects a local path whose real parent lies inside the remote root, so
    /// a link can never be created within the tree it points into.
    fn check_outside_remote(&self, local: &Path) -> Result<()> {
        let parent = local.parent().unwrap_or(local);
        let real_parent = fs::canonicalize(parent).map_err(MountError::io(parent))?;
        let real_remote =
            fs::canonicalize(&self.dirs.remote).unwrap_or_else(|_| self.dirs.remote.clone());
        if real_parent.starts_with(&real_remote) {
            return Err(MountError::InsideRemote {
                local: local.to_path_buf(),
                remote: self.dirs.remote.clone(),
            });
        }
        Ok(())
    }

    fn ensure_remote(&self, remote: &Path) -> Result<()> {
        if remote.exists() {
            return Ok(());
        }
        // Directories below the remote root that this call brings into
        // existence, deepest first.
        let created: Vec<PathBuf> = remote
            .ancestors()
            .take_while(|dir| *dir != self.dirs.remote.as_path() && !dir.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(remote).map_err(MountError::io(remote))?;
        for dir in created.iter().rev() {
            chown(dir, self.owner)?;
        }
        tracing::debug!(
            path = %remote.display(),
            created = created.len(),
            "created remote directory"
        );
        Ok(())
    }
}

/// Whether `relative` names something strictly below the directory it is
/// joined onto: no root, no prefix, no `..`.
fn stays_below(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Seeds the empty `remote` from `local`. A copy that fails partway is
/// removed again so `remote` is still empty and the next run seeds afresh.
fn seed_or_rollback(local: &Path, remote: &Path, owner: Identity) -> Result<usize> {
    seed::copy_tree(local, remote, owner).map_err(|error| {
        if let Err(cleanup) = seed::clear_dir(remote) {
            tracing::warn!(
                path = %remote.display(),
                error = %cleanup,
                "could not remove partial seed copy"
            );
        }
        error
    })
}

fn replace_with_link(local: &Path, remote: &Path) -> Result<()> {
    match fs::symlink_metadata(local) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(local).map_err(MountError::io(local))?,
        Ok(_) => fs::remove_file(local).map_err(MountError::io(local))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(MountError::Io {
                path: local.to_path_buf(),
                source: e,
            });
        }
    }
    std::os::unix::fs::symlink(remote, local).map_err(MountError::io(local))
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::MetadataExt;

    use super::*;
    use crate::mount::parse_line;

    struct Fixture {
        root: tempfile::TempDir,
        base: PathBuf,
        remote: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().expect("tempdir");
            let base = root.path().join("www");
            let remote = root.path().join("shared");
            fs::create_dir(&base).expect("mkdir base");
            fs::create_dir(&remote).expect("mkdir remote");
            Self {
                root,
                base,
                remote,
            }
        }

        fn executor(&self) -> MountExecutor {
            MountExecutor::new(
                MountDirs {
                    base: self.base.clone(),
                    remote: self.remote.clone(),
                },
                current_identity(),
            )
        }
    }

    fn current_identity() -> Identity {
        Identity {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }

    #[test]
    fn seeds_empty_remote_before_linking() {
        let fx = Fixture::new();
        let media = fx.base.join("media");
        fs::create_dir_all(media.join("2024")).expect("mkdir");
        fs::write(media.join("a.jpg"), b"jpeg").expect("write");
        fs::write(media.join("2024/b.jpg"), b"jpeg2").expect("write");

        let report = fx.executor().apply(&[MountBinding::new("media", "media")]);
        assert!(report.is_complete(), "skipped: {:?}", report.skipped);

        let remote_media = fx.remote.join("media");
        assert_eq!(fs::read(remote_media.join("a.jpg")).expect("read"), b"jpeg");
        assert_eq!(fs::read(remote_media.join("2024/b.jpg")).expect("read"), b"jpeg2");
        assert_eq!(report.linked[0].seeded, 3);

        let meta = fs::symlink_metadata(&media).expect("lstat");
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(&media).expect("readlink"), remote_media);
        assert_eq!(
            fs::metadata(remote_media.join("a.jpg")).expect("stat").uid(),
            current_identity().uid
        );
    }

    #[test]
    fn populated_remote_is_not_overwritten() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.base.join("media")).expect("mkdir");
        fs::write(fx.base.join("media/baked.txt"), b"image").expect("write");
        fs::create_dir_all(fx.remote.join("media")).expect("mkdir");
        fs::write(fx.remote.join("media/live.txt"), b"live").expect("write");

        let report = fx.executor().apply(&[MountBinding::new("media", "media")]);
        assert!(report.is_complete());
        assert_eq!(report.linked[0].seeded, 0);
        assert!(!fx.remote.join("media/baked.txt").exists());
        assert_eq!(fs::read(fx.base.join("media/live.txt")).expect("read"), b"live");
    }

    #[test]
    fn missing_local_path_is_linked() {
        let fx = Fixture::new();
        fs::create_dir(fx.base.join("www")).expect("mkdir");
        let report = fx.executor().apply(&[MountBinding::new("uploads", "www/uploads")]);
        assert!(report.is_complete());
        assert!(fx.remote.join("uploads").is_dir());
        assert_eq!(
            fs::read_link(fx.base.join("www/uploads")).expect("readlink"),
            fx.remote.join("uploads")
        );
    }

    #[test]
    fn existing_file_and_symlink_are_replaced() {
        let fx = Fixture::new();
        fs::write(fx.base.join("config"), b"stale").expect("write");
        std::os::unix::fs::symlink("/nonexistent", fx.base.join("cache")).expect("symlink");

        let report = fx.executor().apply(&[
            MountBinding::new("config", "config"),
            MountBinding::new("cache", "cache"),
        ]);
        assert!(report.is_complete(), "skipped: {:?}", report.skipped);
        assert_eq!(
            fs::read_link(fx.base.join("config")).expect("readlink"),
            fx.remote.join("config")
        );
        assert_eq!(
            fs::read_link(fx.base.join("cache")).expect("readlink"),
            fx.remote.join("cache")
        );
    }

    #[test]
    fn binding_inside_remote_is_skipped_untouched() {
        let fx = Fixture::new();
        // www/linked -> shared, so www/linked/data resolves inside the remote.
        std::os::unix::fs::symlink(&fx.remote, fx.base.join("linked")).expect("symlink");
        fs::create_dir(fx.remote.join("data")).expect("mkdir");
        fs::write(fx.remote.join("data/keep.txt"), b"keep").expect("write");

        let report = fx.executor().apply(&[MountBinding::new("other", "linked/data")]);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0].error,
            MountError::InsideRemote { .. }
        ));
        assert!(!fx.remote.join("other").exists());
        assert!(fx.remote.join("data").is_dir());
        assert_eq!(fs::read(fx.remote.join("data/keep.txt")).expect("read"), b"keep");
    }

    #[test]
    fn parent_dir_components_are_rejected() {
        let fx = Fixture::new();
        let report = fx.executor().apply(&[MountBinding::new("x", "../escape")]);
        assert!(matches!(
            report.skipped[0].error,
            MountError::EscapesBase { .. }
        ));
        assert!(!fx.remote.join("x").exists());
    }

    #[test]
    fn failure_on_one_binding_does_not_stop_the_rest() {
        let fx = Fixture::new();
        let report = fx.executor().apply(&[
            MountBinding::new("a", "missing-parent/a"),
            MountBinding::new("b", "b"),
        ]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.linked.len(), 1);
        assert_eq!(report.linked[0].local, fx.base.join("b"));
    }

    #[test]
    fn whole_root_binding_links_base_to_remote() {
        let fx = Fixture::new();
        let report = fx.executor().apply(&[MountBinding::whole_root()]);
        assert!(report.is_complete(), "skipped: {:?}", report.skipped);
        assert_eq!(fs::read_link(&fx.base).expect("readlink"), fx.remote);
    }

    #[test]
    fn ephemeral_binding_gets_fresh_temp_dir() {
        let fx = Fixture::new();
        let report = fx.executor().apply(&[
            MountBinding::new("ephemeral", "static"),
            MountBinding::new("ephemeral", "tmp"),
        ]);
        assert!(report.is_complete(), "skipped: {:?}", report.skipped);

        let first = fs::read_link(fx.base.join("static")).expect("readlink");
        let second = fs::read_link(fx.base.join("tmp")).expect("readlink");
        assert_ne!(first, second);
        assert!(!first.starts_with(&fx.remote));
        assert!(first.is_dir());

        for dir in [first, second] {
            fs::remove_dir_all(dir).expect("cleanup");
        }
    }

    #[test]
    fn nested_remote_is_created_and_owned_at_every_level() {
        let fx = Fixture::new();
        let report = fx.executor().apply(&[MountBinding::new("sites/a/media", "media")]);
        assert!(report.is_complete());
        assert!(fx.remote.join("sites/a/media").is_dir());

        for dir in ["sites", "sites/a", "sites/a/media"] {
            let meta = fs::metadata(fx.remote.join(dir)).expect("stat");
            assert_eq!(meta.uid(), current_identity().uid, "{dir}");
            assert_eq!(meta.gid(), current_identity().gid, "{dir}");
        }
    }

    #[test]
    fn absolute_local_path_from_manifest_is_rejected() {
        let fx = Fixture::new();
        let outside = fx.root.path().join("outside");
        fs::create_dir(&outside).expect("mkdir");
        fs::write(outside.join("keep.txt"), b"keep").expect("write");

        // A doubled leading slash survives manifest normalization as an
        // absolute path.
        let binding = parse_line(&format!("data : /{}", outside.display())).expect("parse");
        assert!(Path::new(&binding.local).is_absolute());

        let report = fx.executor().apply(&[binding]);
        assert!(matches!(
            report.skipped[0].error,
            MountError::EscapesBase { .. }
        ));
        assert!(fs::symlink_metadata(&outside).expect("lstat").is_dir());
        assert_eq!(fs::read(outside.join("keep.txt")).expect("read"), b"keep");
        assert!(!fx.remote.join("data").exists());
    }

    #[test]
    fn remote_climbing_out_of_root_is_rejected() {
        let fx = Fixture::new();
        let binding = parse_line("../outside : media").expect("parse");

        let report = fx.executor().apply(&[binding]);
        assert!(matches!(
            report.skipped[0].error,
            MountError::EscapesRemote { .. }
        ));
        assert!(!fx.root.path().join("outside").exists());
        assert!(fs::symlink_metadata(fx.base.join("media")).is_err());
    }

    #[test]
    fn absolute_remote_is_rejected() {
        let fx = Fixture::new();
        let report = fx.executor().apply(&[MountBinding::new("/etc", "etc")]);
        assert!(matches!(
            report.skipped[0].error,
            MountError::EscapesRemote { .. }
        ));
        assert!(!fx.base.join("etc").exists());
    }

    #[test]
    fn failed_seed_copy_leaves_remote_empty_and_local_intact() {
        let fx = Fixture::new();
        let component = |c: char| c.to_string().repeat(250);

        // The remote sits deep enough that copying the nested entry below
        // exceeds PATH_MAX while the source path stays short.
        let remote_name = (0..14)
            .map(|i| component(char::from(b'a' + i)))
            .collect::<Vec<_>>()
            .join("/");
        let media = fx.base.join("media");
        let deep = media.join(component('x')).join(component('y'));
        fs::create_dir_all(&deep).expect("mkdir");
        fs::write(deep.join(component('z')), b"z").expect("write");
        fs::write(media.join("a.txt"), b"a").expect("write");

        let report = fx.executor().apply(&[MountBinding::new(&remote_name, "media")]);
        assert_eq!(report.skipped.len(), 1);

        let remote = fx.remote.join(&remote_name);
        assert!(remote.is_dir());
        assert!(seed::is_empty_dir(&remote));
        assert!(fs::symlink_metadata(&media).expect("lstat").is_dir());
        assert_eq!(fs::read(media.join("a.txt")).expect("read"), b"a");
    }
}
