//! Trait definitions for control-file access
//!
//! This trait abstracts the filesystem so the engine can run against an
//! in-memory mock in tests and the real `/sys` in production.

use crate::error::SysfsError;
use std::path::{Path, PathBuf};

/// Access to sysfs-style control files
pub trait ControlFs: Send + Sync {
    /// Read a whole control file
    fn read(&self, path: &Path) -> Result<String, SysfsError>;

    /// Whether the path exists
    fn exists(&self, path: &Path) -> bool;

    /// Whether the process may read the path
    fn can_read(&self, path: &Path) -> bool;

    /// Whether the process may write the path
    fn can_write(&self, path: &Path) -> bool;

    /// Entries of a directory, sorted by name
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, SysfsError>;

    /// Target of a symbolic link
    fn link_target(&self, path: &Path) -> Result<PathBuf, SysfsError>;

    /// Write a literal value to a control file
    fn write(&self, path: &Path, value: &str) -> Result<(), SysfsError>;

    /// Read a control file and trim surrounding whitespace
    fn read_trimmed(&self, path: &Path) -> Result<String, SysfsError> {
        self.read(path).map(|s| s.trim().to_string())
    }

    /// Read the first line of a control file
    fn read_first_line(&self, path: &Path) -> Result<String, SysfsError> {
        self.read(path)
            .map(|s| s.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Name of the last component of a link target
    fn link_name(&self, path: &Path) -> Option<String> {
        self.link_target(path)
            .ok()
            .and_then(|t| t.file_name().map(|n| n.to_string_lossy().into_owned()))
    }
}

impl<T: ControlFs + ?Sized> ControlFs for std::sync::Arc<T> {
    fn read(&self, path: &Path) -> Result<String, SysfsError> {
        (**self).read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn can_read(&self, path: &Path) -> bool {
        (**self).can_read(path)
    }

    fn can_write(&self, path: &Path) -> bool {
        (**self).can_write(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, SysfsError> {
        (**self).list_dir(path)
    }

    fn link_target(&self, path: &Path) -> Result<PathBuf, SysfsError> {
        (**self).link_target(path)
    }

    fn write(&self, path: &Path, value: &str) -> Result<(), SysfsError> {
        (**self).write(path, value)
    }
}
