//! Filesystem operations
//!
//! Handles file and directory operations, plus [`ScopedCleanup`], which
//! removes a builder's intermediate files when it goes out of scope.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a file or a directory tree, ignoring missing paths
pub fn remove_path(path: &Path) -> Result<(), FilesystemError> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|e| FilesystemError::Remove {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove everything inside `path`, creating it if missing
pub fn empty_dir(path: &Path) -> Result<(), FilesystemError> {
    create_dir_all(path)?;
    let entries = std::fs::read_dir(path).map_err(|e| FilesystemError::Remove {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    for entry in entries.flatten() {
        remove_path(&entry.path())?;
    }
    Ok(())
}

/// Copy a single file, creating the destination's parent
pub fn copy_file(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| FilesystemError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: e.to_string(),
        })
}

/// Cancellation signal shared with blocking filesystem work
///
/// Work handed to `spawn_blocking` keeps running after the future awaiting
/// it is dropped. Clones of the flag let that work notice and stop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag was raised
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Guard raising the flag when dropped
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

/// Raises its [`CancelFlag`] on drop
#[derive(Debug)]
pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Recursively copy the contents of `from` into `to`
///
/// Symlinks are recreated rather than followed. The flag is checked after
/// every entry. A cancelled copy removes `to` before returning
/// [`FilesystemError::Cancelled`], including anything written while the
/// flag was being raised.
pub fn copy_dir_all(from: &Path, to: &Path, cancel: &CancelFlag) -> Result<(), FilesystemError> {
    let copy_err = |e: &dyn std::fmt::Display| FilesystemError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error: e.to_string(),
    };
    let cancelled = || {
        if let Err(e) = remove_path(to) {
            tracing::warn!("{e}");
        }
        FilesystemError::Cancelled {
            path: to.to_path_buf(),
        }
    };

    if cancel.is_cancelled() {
        return Err(cancelled());
    }
    create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let entry = entry.map_err(|e| copy_err(&e))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| copy_err(&e))?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    if cancel.is_cancelled() {
        return Err(cancelled());
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    let err = |e: std::io::Error| FilesystemError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error: e.to_string(),
    };
    let link = std::fs::read_link(from).map_err(err)?;
    std::os::unix::fs::symlink(link, to).map_err(err)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    copy_file(from, to)
}

/// Write a zero-filled file of exactly `size` bytes
pub fn write_zeroed(path: &Path, size: u64) -> Result<(), FilesystemError> {
    let err = |e: std::io::Error| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    };
    let file = std::fs::File::create(path).map_err(err)?;
    file.set_len(size).map_err(err)
}

/// Make a file or directory readable and executable by everyone (0755)
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<(), FilesystemError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        FilesystemError::Permissions {
            path: path.to_path_buf(),
            error: e.to_string(),
        }
    })
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<(), FilesystemError> {
    Ok(())
}

/// Paths removed when the guard is dropped
///
/// A builder tracks every intermediate file (and its own output) as soon as
/// it starts producing it, then calls [`ScopedCleanup::keep`] on the output
/// once the build succeeded. Failure, early return and task abort all drop
/// the guard and leave nothing behind.
#[derive(Debug, Default)]
pub struct ScopedCleanup {
    paths: Vec<PathBuf>,
}

impl ScopedCleanup {
    /// Create an empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal and return it
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    /// Stop tracking a path so it survives the guard
    pub fn keep(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    /// Paths currently tracked
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for ScopedCleanup {
    fn drop(&mut self) {
        for path in self.paths.drain(..).rev() {
            if let Err(e) = remove_path(&path) {
                tracing::warn!("{e}");
            } else {
                tracing::trace!("removed {}", path.display());
            }
        }
    }
}
