//! PCI-ID database
//!
//! Flat-file format: a vendor line (`1002  Advanced Micro Devices`), a tab
//! plus device line, and a two-tab subsystem line
//! (`\t\t1002 0b36  RX Vega64`). Class sections (`C 03 ...`) end the
//! vendor list.

use crate::sysfs::ControlFs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
struct DeviceEntry {
    name: String,
    subsystems: HashMap<(u16, u16), String>,
}

#[derive(Debug, Clone, Default)]
struct VendorEntry {
    name: String,
    devices: HashMap<u16, DeviceEntry>,
}

/// In-memory PCI-ID lookup table
#[derive(Debug, Clone, Default)]
pub struct PciIdDb {
    vendors: HashMap<u16, VendorEntry>,
    source: Option<PathBuf>,
}

impl PciIdDb {
    /// Parse a database, keeping only `vendors` when given
    pub fn parse(text: &str, vendors: Option<&[u16]>) -> Self {
        let mut db = PciIdDb::default();
        let mut vendor: Option<u16> = None;
        let mut device: Option<u16> = None;

        for line in text.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("C ") {
                break;
            }

            if let Some(rest) = line.strip_prefix("\t\t") {
                let (Some(v), Some(d)) = (vendor, device) else {
                    continue;
                };
                if let Some((sv, sd, name)) = split_subsystem(rest) {
                    if let Some(entry) = db
                        .vendors
                        .get_mut(&v)
                        .and_then(|e| e.devices.get_mut(&d))
                    {
                        entry.subsystems.insert((sv, sd), name);
                    }
                }
            } else if let Some(rest) = line.strip_prefix('\t') {
                device = None;
                let Some(v) = vendor else { continue };
                if let Some((id, name)) = split_id(rest) {
                    if let Some(entry) = db.vendors.get_mut(&v) {
                        entry.devices.insert(
                            id,
                            DeviceEntry {
                                name,
                                subsystems: HashMap::new(),
                            },
                        );
                        device = Some(id);
                    }
                }
            } else {
                vendor = None;
                device = None;
                if let Some((id, name)) = split_id(line) {
                    if vendors.map_or(true, |keep| keep.contains(&id)) {
                        db.vendors.insert(
                            id,
                            VendorEntry {
                                name,
                                devices: HashMap::new(),
                            },
                        );
                        vendor = Some(id);
                    }
                }
            }
        }

        db
    }

    /// Load the first readable database among `candidates`
    pub fn load(fs: &dyn ControlFs, candidates: &[PathBuf], vendors: Option<&[u16]>) -> Self {
        for path in candidates {
            match fs.read(path) {
                Ok(text) => {
                    log::debug!("Using PCI-ID database {}", path.display());
                    let mut db = Self::parse(&text, vendors);
                    db.source = Some(path.clone());
                    return db;
                }
                Err(e) => log::debug!("PCI-ID database unavailable: {}", e),
            }
        }
        log::warn!("No PCI-ID database found; model names will be unknown");
        PciIdDb::default()
    }

    /// File the database was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn vendor_name(&self, vendor: u16) -> Option<&str> {
        self.vendors.get(&vendor).map(|v| v.name.as_str())
    }

    pub fn device_name(&self, vendor: u16, device: u16) -> Option<&str> {
        self.vendors
            .get(&vendor)?
            .devices
            .get(&device)
            .map(|d| d.name.as_str())
    }

    /// Model name: the subsystem name when listed, else the device name
    pub fn model_name(
        &self,
        vendor: u16,
        device: u16,
        subsystem: Option<(u16, u16)>,
    ) -> Option<&str> {
        let entry = self.vendors.get(&vendor)?.devices.get(&device)?;
        subsystem
            .and_then(|key| entry.subsystems.get(&key))
            .map(String::as_str)
            .or(Some(entry.name.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

fn split_id(text: &str) -> Option<(u16, String)> {
    let (id, name) = text.split_once(char::is_whitespace)?;
    let id = u16::from_str_radix(id, 16).ok()?;
    Some((id, name.trim().to_string()))
}

fn split_subsystem(text: &str) -> Option<(u16, u16, String)> {
    let mut parts = text.splitn(3, char::is_whitespace);
    let sv = u16::from_str_radix(parts.next()?, 16).ok()?;
    let sd = u16::from_str_radix(parts.next()?, 16).ok()?;
    Some((sv, sd, parts.next()?.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFs;

    const IDS: &str = "# pci.ids excerpt
1002  Advanced Micro Devices, Inc. [AMD/ATI]
\t67b9  Vesuvius [Radeon R9 295X2]
\t687f  Vega 10 XL/XT [Radeon RX Vega 56/64]
\t\t1002 0b36  RX Vega64
\t\t1043 04c4  Radeon RX Vega
10de  NVIDIA Corporation
\t2204  GA102 [GeForce RTX 3090]
C 03  Display controller
\t00  VGA compatible controller
";

    #[test]
    fn test_device_and_subsystem_lookup() {
        let db = PciIdDb::parse(IDS, None);
        assert_eq!(
            db.vendor_name(0x1002),
            Some("Advanced Micro Devices, Inc. [AMD/ATI]")
        );
        assert_eq!(
            db.device_name(0x1002, 0x687f),
            Some("Vega 10 XL/XT [Radeon RX Vega 56/64]")
        );
        assert_eq!(
            db.model_name(0x1002, 0x687f, Some((0x1002, 0x0b36))),
            Some("RX Vega64")
        );
        assert_eq!(
            db.model_name(0x1002, 0x687f, Some((0x1458, 0x0000))),
            Some("Vega 10 XL/XT [Radeon RX Vega 56/64]")
        );
        assert_eq!(db.model_name(0x1002, 0x1234, None), None);
    }

    #[test]
    fn test_vendor_filter() {
        let db = PciIdDb::parse(IDS, Some(&[0x1002][..]));
        assert!(db.vendor_name(0x10de).is_none());
        assert!(db.device_name(0x10de, 0x2204).is_none());
        assert!(db.device_name(0x1002, 0x67b9).is_some());
    }

    #[test]
    fn test_class_section_ends_vendors() {
        let db = PciIdDb::parse(IDS, None);
        assert!(db.vendor_name(0x0003).is_none());
    }

    #[test]
    fn test_load_prefers_first_candidate() {
        let fs = MockFs::new()
            .with_file("/home/u/.local/share/amdgpu-pac/pci.ids", "1002  AMD local\n")
            .with_file("/usr/share/misc/pci.ids", IDS);
        let candidates = vec![
            PathBuf::from("/missing/pci.ids"),
            PathBuf::from("/home/u/.local/share/amdgpu-pac/pci.ids"),
            PathBuf::from("/usr/share/misc/pci.ids"),
        ];
        let db = PciIdDb::load(&fs, &candidates, None);
        assert_eq!(db.vendor_name(0x1002), Some("AMD local"));
        assert_eq!(
            db.source(),
            Some(Path::new("/home/u/.local/share/amdgpu-pac/pci.ids"))
        );
    }

    #[test]
    fn test_load_without_database() {
        let db = PciIdDb::load(&MockFs::new(), &[PathBuf::from("/none")], None);
        assert!(db.is_empty());
    }
}
