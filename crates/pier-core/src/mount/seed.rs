//! Copies content baked into the image into a freshly created remote
//! directory, handing every copied entry to the mount owner.

use std::fs;
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid};
use pier_common::types::Identity;

use super::{MountError, Result};

/// Recursively copies the contents of `src` into the existing directory
/// `dst`. Regular files, directories and symlinks are copied; other file
/// types are skipped. Returns the number of entries copied.
///
/// Directory permissions are applied after their contents are written, so
/// read-only source directories copy cleanly.
pub(crate) fn copy_tree(src: &Path, dst: &Path, owner: Identity) -> Result<usize> {
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    let mut dir_perms = Vec::new();
    let mut copied = 0;

    while let Some((from_dir, to_dir)) = stack.pop() {
        for entry in fs::read_dir(&from_dir).map_err(MountError::io(&from_dir))? {
            let entry = entry.map_err(MountError::io(&from_dir))?;
            let from = entry.path();
            let to = to_dir.join(entry.file_name());
            let file_type = entry.file_type().map_err(MountError::io(&from))?;

            if file_type.is_dir() {
                fs::create_dir(&to).map_err(MountError::io(&to))?;
                chown(&to, owner)?;
                let perms = fs::metadata(&from).map_err(MountError::io(&from))?.permissions();
                dir_perms.push((to.clone(), perms));
                stack.push((from, to));
            } else if file_type.is_symlink() {
                let target = fs::read_link(&from).map_err(MountError::io(&from))?;
                std::os::unix::fs::symlink(&target, &to).map_err(MountError::io(&to))?;
                std::os::unix::fs::lchown(&to, Some(owner.uid), Some(owner.gid))
                    .map_err(MountError::io(&to))?;
            } else if file_type.is_file() {
                let _ = fs::copy(&from, &to).map_err(MountError::io(&to))?;
                chown(&to, owner)?;
            } else {
                tracing::debug!(path = %from.display(), "skipping special file");
                continue;
            }
            copied += 1;
        }
    }

    for (dir, perms) in dir_perms.into_iter().rev() {
        fs::set_permissions(&dir, perms).map_err(MountError::io(&dir))?;
    }
    Ok(copied)
}

pub(crate) fn chown(path: &Path, owner: Identity) -> Result<()> {
    nix::unistd::chown(
        path,
        Some(Uid::from_raw(owner.uid)),
        Some(Gid::from_raw(owner.gid)),
    )
    .map_err(|source| MountError::Chown {
        path: PathBuf::from(path),
        source,
    })
}

/// Removes every entry inside `dir`, keeping `dir` itself.
pub(crate) fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(MountError::io(dir))? {
        let path = entry.map_err(MountError::io(dir))?.path();
        let meta = fs::symlink_metadata(&path).map_err(MountError::io(&path))?;
        if meta.is_dir() {
            fs::remove_dir_all(&path).map_err(MountError::io(&path))?;
        } else {
            fs::remove_file(&path).map_err(MountError::io(&path))?;
        }
    }
    Ok(())
}

/// Whether `path` is a directory (not a symlink to one) with at least one
/// entry.
pub(crate) fn has_content(path: &Path) -> bool {
    let is_real_dir = fs::symlink_metadata(path).is_ok_and(|m| m.is_dir());
    is_real_dir && fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

/// Whether `path` is a directory with no entries.
pub(crate) fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}
