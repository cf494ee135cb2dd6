//! Capability classification types
//!
//! Per-parameter access and the derived per-device class.

use crate::domain::ParamName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Access the process has to one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// File absent or inaccessible
    #[default]
    None,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    /// Combine read and write probe results
    pub fn from_probe(readable: bool, writable: bool) -> Self {
        match (readable, writable) {
            (true, true) => Access::ReadWrite,
            (true, false) => Access::ReadOnly,
            (false, true) => Access::WriteOnly,
            (false, false) => Access::None,
        }
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::None => "--",
            Access::ReadOnly => "r-",
            Access::WriteOnly => "-w",
            Access::ReadWrite => "rw",
        };
        f.write_str(s)
    }
}

/// Device-level class derived from the capability matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// At least one parameter is both readable and writable
    ReadWrite,
    /// Readable parameters exist, none writable
    ReadOnly,
    /// Writable parameters exist, none readable
    WriteOnly,
    /// Nothing usable, or not an amdgpu device
    Incompatible,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceClass::ReadWrite => "r/w",
            DeviceClass::ReadOnly => "read-only",
            DeviceClass::WriteOnly => "write-only",
            DeviceClass::Incompatible => "incompatible",
        };
        f.write_str(s)
    }
}

/// Result of classifying one device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    access: BTreeMap<ParamName, Access>,
}

impl CapabilitySet {
    /// Create an empty set (every parameter inaccessible)
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the access for a parameter
    pub fn set(&mut self, name: ParamName, access: Access) {
        self.access.insert(name, access);
    }

    /// Access for a parameter; unknown parameters are inaccessible
    pub fn access(&self, name: ParamName) -> Access {
        self.access.get(&name).copied().unwrap_or_default()
    }

    pub fn is_readable(&self, name: ParamName) -> bool {
        self.access(name).is_readable()
    }

    pub fn is_writable(&self, name: ParamName) -> bool {
        self.access(name).is_writable()
    }

    /// Number of readable parameters
    pub fn readable_count(&self) -> usize {
        self.access.values().filter(|a| a.is_readable()).count()
    }

    /// Number of writable parameters
    pub fn writable_count(&self) -> usize {
        self.access.values().filter(|a| a.is_writable()).count()
    }

    /// Iterate the matrix in parameter order
    pub fn iter(&self) -> impl Iterator<Item = (ParamName, Access)> + '_ {
        self.access.iter().map(|(name, access)| (*name, *access))
    }

    /// Derive the device class from the matrix
    pub fn class(&self) -> DeviceClass {
        if self.access.values().any(|a| *a == Access::ReadWrite) {
            DeviceClass::ReadWrite
        } else if self.readable_count() > 0 && self.writable_count() == 0 {
            DeviceClass::ReadOnly
        } else if self.writable_count() > 0 && self.readable_count() == 0 {
            DeviceClass::WriteOnly
        } else if self.readable_count() > 0 {
            // readable and writable on disjoint parameters
            DeviceClass::ReadWrite
        } else {
            DeviceClass::Incompatible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_from_probe() {
        assert_eq!(Access::from_probe(true, true), Access::ReadWrite);
        assert_eq!(Access::from_probe(false, true), Access::WriteOnly);
        assert!(Access::WriteOnly.is_writable());
        assert!(!Access::WriteOnly.is_readable());
    }

    #[test]
    fn test_class_derivation() {
        let mut caps = CapabilitySet::new();
        assert_eq!(caps.class(), DeviceClass::Incompatible);

        caps.set(ParamName::Temp, Access::ReadOnly);
        assert_eq!(caps.class(), DeviceClass::ReadOnly);

        caps.set(ParamName::FanPwm, Access::ReadWrite);
        assert_eq!(caps.class(), DeviceClass::ReadWrite);
    }

    #[test]
    fn test_write_only_class() {
        let mut caps = CapabilitySet::new();
        caps.set(ParamName::FanPwm, Access::WriteOnly);
        assert_eq!(caps.class(), DeviceClass::WriteOnly);
    }

    #[test]
    fn test_unknown_param_is_none() {
        let caps = CapabilitySet::new();
        assert_eq!(caps.access(ParamName::Power), Access::None);
    }
}
