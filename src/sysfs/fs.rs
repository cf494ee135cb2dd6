//! Real filesystem implementation
//!
//! Implements `ControlFs` over `std::fs`, probing permissions with
//! `access(2)` so that probes never open (and never wake) the device.

use crate::error::SysfsError;
use crate::sysfs::traits::ControlFs;

use nix::unistd::{access, AccessFlags};
use std::fs;
use std::path::{Path, PathBuf};

/// Control files on the mounted sysfs
#[derive(Debug, Clone, Copy, Default)]
pub struct SysFs;

impl SysFs {
    pub fn new() -> Self {
        Self
    }
}

impl ControlFs for SysFs {
    fn read(&self, path: &Path) -> Result<String, SysfsError> {
        fs::read_to_string(path).map_err(|e| SysfsError::from_io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn can_read(&self, path: &Path) -> bool {
        access(path, AccessFlags::R_OK).is_ok()
    }

    fn can_write(&self, path: &Path) -> bool {
        access(path, AccessFlags::W_OK).is_ok()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, SysfsError> {
        let mut entries: Vec<PathBuf> = fs::read_dir(path)
            .map_err(|e| SysfsError::from_io(path, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn link_target(&self, path: &Path) -> Result<PathBuf, SysfsError> {
        fs::read_link(path).map_err(|e| SysfsError::from_io(path, e))
    }

    fn write(&self, path: &Path, value: &str) -> Result<(), SysfsError> {
        fs::write(path, value).map_err(|e| SysfsError::from_io(path, e))?;
        log::debug!("Wrote '{}' to {}", value, path.display());
        Ok(())
    }
}
