//! Mock implementations for testing
//!
//! Provides an in-memory sysfs tree for unit testing without real hardware.

use crate::error::SysfsError;
use crate::sysfs::ControlFs;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockFile {
    content: String,
    readable: bool,
    writable: bool,
    delay: Option<Duration>,
}

/// In-memory sysfs tree
#[derive(Debug, Default)]
pub struct MockFs {
    files: Mutex<BTreeMap<PathBuf, MockFile>>,
    links: Mutex<BTreeMap<PathBuf, PathBuf>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, path: impl Into<PathBuf>, file: MockFile) {
        let path = path.into();
        {
            let mut dirs = self.dirs.lock().unwrap();
            for ancestor in path.ancestors().skip(1) {
                dirs.insert(ancestor.to_path_buf());
            }
        }
        self.files.lock().unwrap().insert(path, file);
    }

    /// Builder: readable, non-writable file
    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.insert(
            path,
            MockFile {
                content: content.to_string(),
                readable: true,
                writable: false,
                delay: None,
            },
        );
        self
    }

    /// Builder: readable and writable file
    pub fn with_rw_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.insert(
            path,
            MockFile {
                content: content.to_string(),
                readable: true,
                writable: true,
                delay: None,
            },
        );
        self
    }

    /// Builder: file that can be written but not read
    pub fn with_write_only_file(self, path: impl Into<PathBuf>) -> Self {
        self.insert(
            path,
            MockFile {
                content: String::new(),
                readable: false,
                writable: true,
                delay: None,
            },
        );
        self
    }

    /// Builder: file whose reads block for `delay`
    pub fn with_slow_file(self, path: impl Into<PathBuf>, content: &str, delay: Duration) -> Self {
        self.insert(
            path,
            MockFile {
                content: content.to_string(),
                readable: true,
                writable: false,
                delay: Some(delay),
            },
        );
        self
    }

    /// Builder: symbolic link
    pub fn with_link(self, path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        let path = path.into();
        {
            let mut dirs = self.dirs.lock().unwrap();
            for ancestor in path.ancestors().skip(1) {
                dirs.insert(ancestor.to_path_buf());
            }
        }
        self.links.lock().unwrap().insert(path, target.into());
        self
    }

    /// Builder: empty directory
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        {
            let mut dirs = self.dirs.lock().unwrap();
            for ancestor in path.ancestors() {
                dirs.insert(ancestor.to_path_buf());
            }
        }
        self
    }

    /// Replace a file's content
    pub fn set_content(&self, path: impl AsRef<Path>, content: &str) {
        if let Some(file) = self.files.lock().unwrap().get_mut(path.as_ref()) {
            file.content = content.to_string();
        }
    }

    /// Change a file's write permission
    pub fn set_writable(&self, path: impl AsRef<Path>, writable: bool) {
        if let Some(file) = self.files.lock().unwrap().get_mut(path.as_ref()) {
            file.writable = writable;
        }
    }

    /// Remove a file
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.files.lock().unwrap().remove(path.as_ref());
    }

    /// Writes performed so far, in order
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().unwrap().clone()
    }
}

impl ControlFs for MockFs {
    fn read(&self, path: &Path) -> Result<String, SysfsError> {
        let file = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SysfsError::NotFound(path.to_path_buf()))?;
        if let Some(delay) = file.delay {
            std::thread::sleep(delay);
        }
        if !file.readable {
            return Err(SysfsError::PermissionDenied(path.to_path_buf()));
        }
        Ok(file.content)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
            || self.links.lock().unwrap().contains_key(path)
            || self.dirs.lock().unwrap().contains(path)
    }

    fn can_read(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|f| f.readable)
    }

    fn can_write(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|f| f.writable)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, SysfsError> {
        if !self.dirs.lock().unwrap().contains(path) {
            return Err(SysfsError::NotFound(path.to_path_buf()));
        }
        let mut children = BTreeSet::new();
        let files = self.files.lock().unwrap();
        let links = self.links.lock().unwrap();
        let dirs = self.dirs.lock().unwrap();
        for candidate in files.keys().chain(links.keys()).chain(dirs.iter()) {
            if candidate.parent() == Some(path) {
                children.insert(candidate.clone());
            }
        }
        Ok(children.into_iter().collect())
    }

    fn link_target(&self, path: &Path) -> Result<PathBuf, SysfsError> {
        self.links
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SysfsError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, value: &str) -> Result<(), SysfsError> {
        let mut files = self.files.lock().unwrap();
        let file = files
            .get_mut(path)
            .ok_or_else(|| SysfsError::NotFound(path.to_path_buf()))?;
        if !file.writable {
            return Err(SysfsError::PermissionDenied(path.to_path_buf()));
        }
        file.content = value.to_string();
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_write() {
        let fs = MockFs::new()
            .with_rw_file("/sys/a/pwm1", "128\n")
            .with_file("/sys/a/temp1_input", "45000\n");

        assert_eq!(fs.read_trimmed(Path::new("/sys/a/pwm1")).unwrap(), "128");
        fs.write(Path::new("/sys/a/pwm1"), "200").unwrap();
        assert_eq!(fs.read(Path::new("/sys/a/pwm1")).unwrap(), "200");
        assert!(fs.write(Path::new("/sys/a/temp1_input"), "1").is_err());
        assert_eq!(fs.writes().len(), 1);
    }

    #[test]
    fn test_mock_list_dir() {
        let fs = MockFs::new()
            .with_file("/sys/bus/pci/devices/0000:03:00.0/vendor", "0x1002")
            .with_file("/sys/bus/pci/devices/0000:0a:00.0/vendor", "0x10de")
            .with_dir("/sys/bus/pci/devices/0000:03:00.0/hwmon/hwmon2");

        let entries = fs.list_dir(Path::new("/sys/bus/pci/devices")).unwrap();
        assert_eq!(entries.len(), 2);
        let hwmon = fs
            .list_dir(Path::new("/sys/bus/pci/devices/0000:03:00.0/hwmon"))
            .unwrap();
        assert_eq!(hwmon.len(), 1);
        assert!(fs.list_dir(Path::new("/sys/none")).is_err());
    }

    #[test]
    fn test_mock_write_only() {
        let fs = MockFs::new().with_write_only_file("/sys/a/pwm1");
        assert!(fs.can_write(Path::new("/sys/a/pwm1")));
        assert!(!fs.can_read(Path::new("/sys/a/pwm1")));
        assert!(matches!(
            fs.read(Path::new("/sys/a/pwm1")),
            Err(SysfsError::PermissionDenied(_))
        ));
    }
}
