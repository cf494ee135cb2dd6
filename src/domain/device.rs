//! GPU device domain type
//!
//! One `Device` per physical card: identity, capability matrix, live
//! parameter table and the lazily populated p-state/PPM tables.

use crate::domain::{CapabilitySet, DeviceClass, ParamTable, PStateTable, PpmTable, Source};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// PCI vendor of a display device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Amd,
    Nvidia,
    Intel,
    Aspeed,
    Other(u16),
}

impl Vendor {
    pub const AMD_ID: u16 = 0x1002;
    pub const NVIDIA_ID: u16 = 0x10de;
    pub const INTEL_ID: u16 = 0x8086;
    pub const ASPEED_ID: u16 = 0x1a03;

    pub fn from_id(id: u16) -> Self {
        match id {
            Self::AMD_ID => Vendor::Amd,
            Self::NVIDIA_ID => Vendor::Nvidia,
            Self::INTEL_ID => Vendor::Intel,
            Self::ASPEED_ID => Vendor::Aspeed,
            other => Vendor::Other(other),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Amd => write!(f, "AMD"),
            Vendor::Nvidia => write!(f, "NVIDIA"),
            Vendor::Intel => write!(f, "INTEL"),
            Vendor::Aspeed => write!(f, "ASPEED"),
            Vendor::Other(id) => write!(f, "0x{:04x}", id),
        }
    }
}

/// How far the engine trusts a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Compatibility {
    /// amdgpu-driven AMD device
    Compatible,
    /// Known problematic variant; partially functional
    Warning(String),
    /// Listed for inventory only
    Incompatible(String),
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        !matches!(self, Compatibility::Incompatible(_))
    }
}

/// One physical card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable 0-based index in bus scan order
    pub card_index: u32,
    /// PCI address, e.g. `0000:03:00.0`
    pub pci_address: String,
    /// PCI device directory holding the control files
    pub device_path: PathBuf,
    /// DRM card directory (`drm/cardN`)
    pub card_path: Option<PathBuf>,
    /// hwmon directory for sensors
    pub hwmon_path: Option<PathBuf>,
    pub vendor: Vendor,
    pub vendor_id: u16,
    pub device_id: u16,
    pub subsystem_vendor_id: Option<u16>,
    pub subsystem_device_id: Option<u16>,
    /// Decoded model name, `(unknown)` when unresolved
    pub model: String,
    pub driver: Option<String>,
    pub driver_version: Option<String>,
    pub compatibility: Compatibility,
    pub capabilities: CapabilitySet,
    pub params: ParamTable,
    pub pstates: Option<PStateTable>,
    pub ppm: Option<PpmTable>,
    #[serde(skip)]
    static_loaded: bool,
}

impl Device {
    /// Placeholder model string for unresolved PCI ids
    pub const UNKNOWN_MODEL: &'static str = "(unknown)";

    /// Create a device with an empty parameter table
    pub fn new(card_index: u32, pci_address: impl Into<String>, device_path: PathBuf) -> Self {
        Self {
            card_index,
            pci_address: pci_address.into(),
            device_path,
            card_path: None,
            hwmon_path: None,
            vendor: Vendor::Other(0),
            vendor_id: 0,
            device_id: 0,
            subsystem_vendor_id: None,
            subsystem_device_id: None,
            model: Self::UNKNOWN_MODEL.to_string(),
            driver: None,
            driver_version: None,
            compatibility: Compatibility::Incompatible("not probed".to_string()),
            capabilities: CapabilitySet::new(),
            params: ParamTable::new(),
            pstates: None,
            ppm: None,
            static_loaded: false,
        }
    }

    /// Set the vendor and device ids
    pub fn with_ids(mut self, vendor_id: u16, device_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.device_id = device_id;
        self.vendor = Vendor::from_id(vendor_id);
        self
    }

    /// Set the hwmon directory
    pub fn with_hwmon(mut self, path: PathBuf) -> Self {
        self.hwmon_path = Some(path);
        self
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the compatibility status
    pub fn with_compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    /// Short model name: the bracketed marketing name when present
    pub fn short_name(&self) -> &str {
        match (self.model.rfind('['), self.model.rfind(']')) {
            (Some(open), Some(close)) if close > open + 1 => &self.model[open + 1..close],
            _ => &self.model,
        }
    }

    /// Name for tables and logs
    pub fn display_name(&self) -> String {
        format!("card{}: {}", self.card_index, self.short_name())
    }

    /// Device class including compatibility
    pub fn class(&self) -> DeviceClass {
        if !self.compatibility.is_compatible() {
            return DeviceClass::Incompatible;
        }
        self.capabilities.class()
    }

    /// Whether any parameter is readable (eligible for polling)
    pub fn is_readable(&self) -> bool {
        self.compatibility.is_compatible() && self.capabilities.readable_count() > 0
    }

    /// Whether any parameter is writable
    pub fn is_writable(&self) -> bool {
        self.compatibility.is_compatible() && self.capabilities.writable_count() > 0
    }

    /// Resolve a parameter source to a file path
    pub fn source_path(&self, source: Source) -> Option<PathBuf> {
        match source {
            Source::Device(file) => Some(self.device_path.join(file)),
            Source::Hwmon(file) => self.hwmon_path.as_ref().map(|h| h.join(file)),
            Source::Derived(_) => None,
        }
    }

    /// Path of a file in the device directory
    pub fn device_file(&self, file: &str) -> PathBuf {
        self.device_path.join(file)
    }

    /// Path of a file in the hwmon directory
    pub fn hwmon_file(&self, file: &str) -> Option<PathBuf> {
        self.hwmon_path.as_ref().map(|h| h.join(file))
    }

    pub fn static_loaded(&self) -> bool {
        self.static_loaded
    }

    pub(crate) fn set_static_loaded(&mut self, loaded: bool) {
        self.static_loaded = loaded;
    }

    /// Keep last values but flag all of them as stale
    pub fn mark_stale(&mut self) {
        self.params.mark_all_stale();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.card_index, self.model, self.pci_address)
    }
}
