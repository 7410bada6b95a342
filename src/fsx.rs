//! Filesystem helpers shared by the build and expand pipelines.
//!
//! On Unix the permission bits of sources are recorded in the archive and
//! restored on expansion. Elsewhere both directions are no-ops.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use crate::error::{IoResultExt, Result};

#[cfg(unix)]
/// POSIX permission bits of a source file or directory.
pub fn unix_mode(meta: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn unix_mode(_meta: &Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
/// Set POSIX permission bits on Unix.
pub fn set_unix_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
/// No-op: POSIX permission bits are not preserved.
pub fn set_unix_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Creates the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).at_path(parent),
        _ => Ok(()),
    }
}

/// Metadata of `path`, following symlinks; `None` when nothing is there.
pub fn metadata_if_exists(path: &Path) -> Result<Option<Metadata>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).at_path(path),
    }
}
