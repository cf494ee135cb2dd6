//! Capability classification
//!
//! Probes every parameter's source files for existence, read permission
//! and write permission. Probes use `access(2)` and never open a file.

use crate::config::Config;
use crate::domain::{Access, CapabilitySet, Device, ParamName, Source};
use crate::sysfs::ControlFs;

/// Probe one device; incompatible devices get an empty matrix
pub fn classify(fs: &dyn ControlFs, device: &Device, config: &Config) -> CapabilitySet {
    let mut set = CapabilitySet::new();
    if !device.compatibility.is_compatible() {
        return set;
    }

    for name in ParamName::ALL {
        if config.filter.exclude_fans && name.is_fan() {
            continue;
        }
        let access = probe(fs, device, name);
        log::debug!("card{} {}: {}", device.card_index, name, access);
        set.set(name, access);
    }

    // Derived parameters follow the parameter they derive from
    for name in ParamName::ALL {
        if let [Source::Derived(base)] = name.sources() {
            let access = if set.is_readable(*base) {
                Access::ReadOnly
            } else {
                Access::None
            };
            set.set(name, access);
        }
    }

    set
}

fn probe(fs: &dyn ControlFs, device: &Device, name: ParamName) -> Access {
    let mut readable = false;
    let mut writable = false;

    for (i, source) in name.sources().iter().enumerate() {
        let Some(path) = device.source_path(*source) else {
            continue;
        };
        if !fs.exists(&path) {
            continue;
        }
        readable |= fs.can_read(&path);
        // Fallback sources are read-only views
        if i == 0 && name.is_controllable() {
            writable = fs.can_write(&path);
        }
    }

    Access::from_probe(readable, writable)
}

/// Re-probe a device and store the result in its model
pub fn reclassify(fs: &dyn ControlFs, device: &mut Device, config: &Config) {
    let set = classify(fs, device, config);
    for name in ParamName::ALL {
        device.params.set_access(name, set.access(name));
    }
    device.capabilities = set;
}
