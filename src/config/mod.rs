//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging. The final
//! `Config` is passed explicitly to every engine entry point.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Device and parameter filtering
    pub filter: FilterConfig,
    /// Filesystem locations
    pub paths: PathsConfig,
    /// Write planning
    pub write: WriteConfig,
}

/// Timestamp zone for log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZone {
    #[default]
    Utc,
    Local,
}

impl std::str::FromStr for TimeZone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utc" => Ok(TimeZone::Utc),
            "local" => Ok(TimeZone::Local),
            other => Err(ConfigError::InvalidValue {
                key: "general.time_zone".into(),
                message: format!("expected 'utc' or 'local', got '{}'", other),
            }),
        }
    }
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
    /// Poll interval in seconds
    pub interval_seconds: u64,
    /// Per-device read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Timestamp zone for log records
    pub time_zone: TimeZone,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            interval_seconds: 2,
            read_timeout_ms: 1000,
            time_zone: TimeZone::Utc,
        }
    }
}

impl GeneralConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Filtering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Treat every fan parameter as inaccessible
    pub exclude_fans: bool,
    /// Drop non-AMD devices from the inventory
    pub exclude_incompatible: bool,
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Mount point of sysfs
    pub sysfs_root: PathBuf,
    /// PCI-ID database overriding the user-local and system copies
    pub pci_ids: Option<PathBuf>,
    /// Kernel module directory; defaults to `<sysfs_root>/module`
    pub module_root: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            pci_ids: None,
            module_root: None,
        }
    }
}

impl PathsConfig {
    /// System-wide PCI-ID databases, in lookup order
    pub const SYSTEM_PCI_IDS: [&'static str; 2] =
        ["/usr/share/misc/pci.ids", "/usr/share/hwdata/pci.ids"];

    /// Kernel release fallback for the driver version
    pub const KERNEL_RELEASE: &'static str = "/proc/sys/kernel/osrelease";

    /// Directory holding the PCI device entries
    pub fn pci_devices_dir(&self) -> PathBuf {
        self.sysfs_root.join("bus/pci/devices")
    }

    pub fn module_dir(&self) -> PathBuf {
        self.module_root
            .clone()
            .unwrap_or_else(|| self.sysfs_root.join("module"))
    }

    /// Per-user PCI-ID copy
    pub fn user_pci_ids() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("amdgpu-pac/pci.ids"))
    }

    /// PCI-ID candidates: configured override, user-local, then system-wide
    pub fn pci_ids_candidates(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = &self.pci_ids {
            paths.push(path.clone());
        }
        if let Some(path) = Self::user_pci_ids() {
            paths.push(path);
        }
        paths.extend(Self::SYSTEM_PCI_IDS.iter().map(PathBuf::from));
        paths
    }
}

/// Write planning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WriteConfig {
    /// Include unchanged writable targets in plans
    pub force: bool,
    /// Where `plan --script` writes the bash script
    pub script_path: Option<PathBuf>,
}

impl Config {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "general.interval_seconds".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.general.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "general.read_timeout_ms".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
