//! Mount point inspection and unmounting.

use std::path::Path;

use nix::sys::stat::stat;
use snafu::ResultExt;

use crate::error::{Result, StatSnafu, UnmountSnafu};
use crate::executor::ExecutionContext;

/// Returns true if `path` is the root of a mounted filesystem.
///
/// A mount point lives on a different device than its parent directory, or is
/// `/` itself.
pub fn is_mount_point(path: &Path) -> Result<bool> {
    let own = stat(path).context(StatSnafu { path })?;

    let Some(parent) = path.parent() else {
        return Ok(true);
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let parent_stat = stat(parent).context(StatSnafu { path: parent })?;

    Ok(own.st_dev != parent_stat.st_dev || own.st_ino == parent_stat.st_ino)
}

/// Unmounts the filesystem mounted at `mount_point`.
pub fn unmount_device(ctx: &ExecutionContext, mount_point: &Path) -> Result<()> {
    let target = mount_point.to_string_lossy().into_owned();
    ctx.run_privileged_checked("umount", &[target.as_str()])
        .context(UnmountSnafu { path: mount_point })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_root_is_mount_point() {
        assert!(is_mount_point(Path::new("/")).unwrap());
    }

    #[test]
    fn test_plain_directory_is_not_mount_point() {
        let dir = TempDir::new().unwrap();
        let child = dir.path().join("CARD1");
        std::fs::create_dir(&child).unwrap();

        assert!(!is_mount_point(&child).unwrap());
    }

    #[test]
    fn test_missing_path_is_stat_error() {
        let dir = TempDir::new().unwrap();
        let err = is_mount_point(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, Error::Stat { .. }));
    }

    #[test]
    fn test_unmount_non_mount_fails() {
        let dir = TempDir::new().unwrap();
        let err = unmount_device(&ExecutionContext::new(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Unmount { .. }));
    }
}
