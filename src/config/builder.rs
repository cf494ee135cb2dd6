//! Configuration builder
//!
//! Merges configuration from files and CLI arguments. CLI values win.

use crate::config::{Config, ConfigFile, TimeZone};
use std::path::PathBuf;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file, or the default locations
    pub fn with_file(mut self, path: Option<&str>) -> Self {
        let file_config = match path {
            Some(path) => match ConfigFile::load(path) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    log::warn!("Could not load {}: {}", path, e);
                    None
                }
            },
            None => ConfigFile::load_default(),
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        self
    }

    /// Override with CLI debug flag
    pub fn with_debug(mut self, debug: Option<bool>) -> Self {
        if let Some(d) = debug {
            self.config.general.debug = d;
        }
        self
    }

    /// Override with CLI poll interval
    pub fn with_interval(mut self, interval: Option<u64>) -> Self {
        if let Some(i) = interval {
            self.config.general.interval_seconds = i;
        }
        self
    }

    /// Override with CLI read timeout
    pub fn with_read_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        if let Some(t) = timeout_ms {
            self.config.general.read_timeout_ms = t;
        }
        self
    }

    /// Override with CLI time zone
    pub fn with_time_zone(mut self, zone: Option<TimeZone>) -> Self {
        if let Some(z) = zone {
            self.config.general.time_zone = z;
        }
        self
    }

    /// Override with CLI fan exclusion
    pub fn with_exclude_fans(mut self, exclude: Option<bool>) -> Self {
        if let Some(e) = exclude {
            self.config.filter.exclude_fans = e;
        }
        self
    }

    /// Override with CLI incompatible-device exclusion
    pub fn with_exclude_incompatible(mut self, exclude: Option<bool>) -> Self {
        if let Some(e) = exclude {
            self.config.filter.exclude_incompatible = e;
        }
        self
    }

    /// Override the sysfs mount point
    pub fn with_sysfs_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(r) = root {
            self.config.paths.sysfs_root = r;
        }
        self
    }

    /// Override the PCI-ID database
    pub fn with_pci_ids(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.config.paths.pci_ids = path;
        }
        self
    }

    /// Override with CLI force flag
    pub fn with_force(mut self, force: Option<bool>) -> Self {
        if let Some(f) = force {
            self.config.write.force = f;
        }
        self
    }

    /// Override the script output path
    pub fn with_script_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.config.write.script_path = path;
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build();
        assert!(!config.general.debug);
        assert!(!config.write.force);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_debug(Some(true))
            .with_interval(Some(10))
            .with_time_zone(Some(TimeZone::Local))
            .with_exclude_fans(Some(true))
            .with_sysfs_root(Some(PathBuf::from("/tmp/sys")))
            .with_force(Some(true))
            .build();

        assert!(config.general.debug);
        assert_eq!(config.general.interval_seconds, 10);
        assert_eq!(config.general.time_zone, TimeZone::Local);
        assert!(config.filter.exclude_fans);
        assert_eq!(config.paths.sysfs_root, PathBuf::from("/tmp/sys"));
        assert!(config.write.force);
    }

    #[test]
    fn test_none_leaves_value() {
        let config = ConfigBuilder::new()
            .with_interval(None)
            .with_pci_ids(None)
            .build();
        assert_eq!(config.general.interval_seconds, 2);
        assert!(config.paths.pci_ids.is_none());
    }
}
