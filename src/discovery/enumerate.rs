//! PCI bus enumeration
//!
//! Scans `<sysfs_root>/bus/pci/devices` for display-class functions and
//! builds one `Device` per card, in bus address order.

use crate::config::{Config, PathsConfig};
use crate::discovery::classify::reclassify;
use crate::discovery::pci_ids::PciIdDb;
use crate::domain::{Compatibility, Device, DeviceCollection, Vendor};
use crate::error::{AppError, Result};
use crate::parse::parse_hex_id;
use crate::sysfs::ControlFs;
use std::path::{Path, PathBuf};

/// PCI base class of display controllers
const DISPLAY_CLASS: u32 = 0x03;

/// Kernel driver the engine supports
pub const SUPPORTED_DRIVER: &str = "amdgpu";

/// Dual-GPU boards whose second GPU shares the first one's control files
const DUAL_GPU_IDS: [u16; 1] = [0x67b9];

/// Discover, identify and classify every display device
///
/// # Errors
/// Returns `AppError::NoCompatibleDevices` when no amdgpu-driven device is
/// present; every other per-device failure degrades that device only.
pub fn discover(fs: &dyn ControlFs, config: &Config) -> Result<DeviceCollection> {
    let devices_dir = config.paths.pci_devices_dir();
    let entries = fs.list_dir(&devices_dir).unwrap_or_else(|e| {
        log::warn!("Cannot scan PCI bus: {}", e);
        Vec::new()
    });

    let display: Vec<PathBuf> = entries
        .into_iter()
        .filter(|path| is_display_device(fs, path))
        .collect();
    log::debug!("Found {} display devices", display.len());

    let db = PciIdDb::load(
        fs,
        &config.paths.pci_ids_candidates(),
        Some(&[Vendor::AMD_ID, Vendor::NVIDIA_ID, Vendor::INTEL_ID, Vendor::ASPEED_ID][..]),
    );

    let mut collection = DeviceCollection::new();
    for path in display {
        let mut device = identify(fs, &path, &db, config);
        if config.filter.exclude_incompatible && !device.compatibility.is_compatible() {
            log::info!("Skipping incompatible device {}", device.pci_address);
            continue;
        }
        let index = collection.len() as u32;
        device.card_index = index;
        reclassify(fs, &mut device, config);
        if let Compatibility::Warning(reason) = &device.compatibility {
            log::warn!("card{}: {}", index, reason);
        }
        collection.push(device);
    }

    if collection.compatible().next().is_none() {
        return Err(AppError::NoCompatibleDevices);
    }
    Ok(collection)
}

fn is_display_device(fs: &dyn ControlFs, path: &Path) -> bool {
    fs.read_trimmed(&path.join("class"))
        .ok()
        .and_then(|text| {
            let digits = text.trim_start_matches("0x");
            u32::from_str_radix(digits, 16).ok()
        })
        .is_some_and(|class| class >> 16 == DISPLAY_CLASS)
}

fn read_id(fs: &dyn ControlFs, path: &Path) -> Option<u16> {
    let text = fs.read(path).ok()?;
    match parse_hex_id(&text) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("{}: {}", path.display(), e);
            None
        }
    }
}

/// Build the identity part of a device; never fails
fn identify(fs: &dyn ControlFs, path: &Path, db: &PciIdDb, config: &Config) -> Device {
    let address = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut device = Device::new(0, address, path.to_path_buf());

    let vendor_id = read_id(fs, &path.join("vendor")).unwrap_or(0);
    let device_id = read_id(fs, &path.join("device")).unwrap_or(0);
    device = device.with_ids(vendor_id, device_id);
    device.subsystem_vendor_id = read_id(fs, &path.join("subsystem_vendor"));
    device.subsystem_device_id = read_id(fs, &path.join("subsystem_device"));

    let subsystem = device.subsystem_vendor_id.zip(device.subsystem_device_id);
    if let Some(model) = db.model_name(vendor_id, device_id, subsystem) {
        device.model = model.to_string();
    }

    device.driver = fs.link_name(&path.join("driver"));
    device.card_path = find_child(fs, &path.join("drm"), "card");
    device.hwmon_path = find_child(fs, &path.join("hwmon"), "hwmon");
    if let Some(driver) = &device.driver {
        device.driver_version = driver_version(fs, config, driver);
    }

    device.compatibility = compatibility(&device);
    device
}

/// First `<prefix>N` entry of a directory
fn find_child(fs: &dyn ControlFs, dir: &Path, prefix: &str) -> Option<PathBuf> {
    fs.list_dir(dir).ok()?.into_iter().find(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix))
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    })
}

/// Module version, else the kernel release for in-tree drivers
fn driver_version(fs: &dyn ControlFs, config: &Config, driver: &str) -> Option<String> {
    let module_version = config.paths.module_dir().join(driver).join("version");
    if let Ok(version) = fs.read_trimmed(&module_version) {
        return Some(version);
    }
    match fs.read_trimmed(Path::new(PathsConfig::KERNEL_RELEASE)) {
        Ok(release) => Some(release),
        Err(e) => {
            log::warn!("Could not determine {} version: {}", driver, e);
            None
        }
    }
}

fn compatibility(device: &Device) -> Compatibility {
    if device.vendor != Vendor::Amd {
        return Compatibility::Incompatible(format!("{} device", device.vendor));
    }
    match device.driver.as_deref() {
        Some(SUPPORTED_DRIVER) => {}
        Some(other) => {
            return Compatibility::Incompatible(format!("driver '{}' is not amdgpu", other))
        }
        None => return Compatibility::Incompatible("no driver bound".to_string()),
    }
    if is_dual_gpu(device) {
        return Compatibility::Warning(format!(
            "{} is a dual-GPU board; only one GPU may report",
            device.short_name()
        ));
    }
    Compatibility::Compatible
}

fn is_dual_gpu(device: &Device) -> bool {
    DUAL_GPU_IDS.contains(&device.device_id)
        || device.model.contains(" Duo")
        || device.model.contains(" X2")
}
