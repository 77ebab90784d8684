//! Turns a `Mountfile`, or the absence of one, into a mount plan.

use std::path::PathBuf;

use pier_common::constants::DEFAULT_MOUNT_FILE;
use pier_common::types::{MountBinding, MountDirs, MountPlan};

use super::manifest::parse_manifest;
use super::{MountError, Result};

/// Locates and reads the mount manifest for a pair of mount directories.
#[derive(Debug, Clone)]
pub struct MountPlanner {
    dirs: MountDirs,
    manifest_name: String,
}

impl MountPlanner {
    /// Creates a planner looking for the default `Mountfile`.
    #[must_use]
    pub fn new(dirs: MountDirs) -> Self {
        Self {
            dirs,
            manifest_name: DEFAULT_MOUNT_FILE.to_string(),
        }
    }

    /// Looks for a manifest with a different file name.
    #[must_use]
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Returns the manifest path, checking the working directory before the
    /// remote root.
    #[must_use]
    pub fn find_manifest(&self) -> Option<PathBuf> {
        [&self.dirs.base, &self.dirs.remote]
            .into_iter()
            .map(|dir| dir.join(&self.manifest_name))
            .find(|path| path.is_file())
    }

    /// Builds the mount plan.
    ///
    /// With a manifest, every matching line becomes a binding. Without one,
    /// an empty (or missing) working directory gets the single binding that
    /// maps the whole remote root onto it; a populated working directory
    /// gets no plan at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or the working directory cannot be
    /// read.
    pub fn build_plan(&self) -> Result<Option<MountPlan>> {
        if let Some(path) = self.find_manifest() {
            let content = std::fs::read_to_string(&path).map_err(MountError::io(&path))?;
            let plan = parse_manifest(&content);
            tracing::info!(manifest = %path.display(), bindings = plan.len(), "mount plan loaded");
            return Ok(Some(plan));
        }

        if self.base_is_empty()? {
            tracing::info!(
                base = %self.dirs.base.display(),
                remote = %self.dirs.remote.display(),
                "no manifest, mapping the whole remote root"
            );
            return Ok(Some(vec![MountBinding::whole_root()]));
        }

        tracing::info!(
            base = %self.dirs.base.display(),
            "no manifest and working directory is populated, nothing to mount"
        );
        Ok(None)
    }

    fn base_is_empty(&self) -> Result<bool> {
        match std::fs::read_dir(&self.dirs.base) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(MountError::Io {
                path: self.dirs.base.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn planner(base: &Path, remote: &Path) -> MountPlanner {
        MountPlanner::new(MountDirs {
            base: base.to_path_buf(),
            remote: remote.to_path_buf(),
        })
    }

    #[test]
    fn manifest_in_base_wins_over_remote() {
        let base = tempfile::tempdir().expect("tempdir");
        let remote = tempfile::tempdir().expect("tempdir");
        std::fs::write(base.path().join("Mountfile"), "a : b\n").expect("write");
        std::fs::write(remote.path().join("Mountfile"), "c : d\n").expect("write");

        let plan = planner(base.path(), remote.path())
            .build_plan()
            .expect("plan")
            .expect("some plan");
        assert_eq!(plan, vec![MountBinding::new("a", "b")]);
    }

    #[test]
    fn manifest_in_remote_is_used_as_fallback() {
        let base = tempfile::tempdir().expect("tempdir");
        let remote = tempfile::tempdir().expect("tempdir");
        std::fs::write(base.path().join("index.html"), "hi").expect("write");
        std::fs::write(remote.path().join("Mountfile"), "media : www/media\n").expect("write");

        let p = planner(base.path(), remote.path());
        assert_eq!(p.find_manifest(), Some(remote.path().join("Mountfile")));
        let plan = p.build_plan().expect("plan").expect("some plan");
        assert_eq!(plan, vec![MountBinding::new("media", "www/media")]);
    }

    #[test]
    fn empty_base_without_manifest_maps_whole_root() {
        let base = tempfile::tempdir().expect("tempdir");
        let remote = tempfile::tempdir().expect("tempdir");
        let plan = planner(base.path(), remote.path())
            .build_plan()
            .expect("plan");
        assert_eq!(plan, Some(vec![MountBinding::whole_root()]));
    }

    #[test]
    fn missing_base_without_manifest_maps_whole_root() {
        let parent = tempfile::tempdir().expect("tempdir");
        let remote = tempfile::tempdir().expect("tempdir");
        let plan = planner(&parent.path().join("www"), remote.path())
            .build_plan()
            .expect("plan");
        assert_eq!(plan, Some(vec![MountBinding::whole_root()]));
    }

    #[test]
    fn populated_base_without_manifest_has_no_plan() {
        let base = tempfile::tempdir().expect("tempdir");
        let remote = tempfile::tempdir().expect("tempdir");
        std::fs::write(base.path().join("app.py"), "print()").expect("write");
        let plan = planner(base.path(), remote.path())
            .build_plan()
            .expect("plan");
        assert_eq!(plan, None);
    }

    #[test]
    fn custom_manifest_name_is_honored() {
        let base = tempfile::tempdir().expect("tempdir");
        let remote = tempfile::tempdir().expect("tempdir");
        std::fs::write(base.path().join("Mounts.txt"), "x : y\n").expect("write");
        let plan = planner(base.path(), remote.path())
            .with_manifest_name("Mounts.txt")
            .build_plan()
            .expect("plan");
        assert_eq!(plan, Some(vec![MountBinding::new("x", "y")]));
    }
}
