//! Ordered device registry
//!
//! Card indices are unique and contiguous from 0 in insertion order.
//! Devices are never removed. Every query here is a pure projection.

use crate::domain::{Device, DeviceClass, Vendor};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts of devices per class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassCounts {
    pub read_write: usize,
    pub read_only: usize,
    pub write_only: usize,
    pub incompatible: usize,
    pub total: usize,
}

/// Registry of discovered devices
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceCollection {
    devices: Vec<Device>,
}

impl DeviceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a device, assigning the next card index
    pub fn push(&mut self, mut device: Device) -> u32 {
        let index = self.devices.len() as u32;
        device.card_index = index;
        self.devices.push(device);
        index
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device by card index
    pub fn get(&self, index: u32) -> Option<&Device> {
        self.devices.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Device> {
        self.devices.get_mut(index as usize)
    }

    /// Devices in card-index order
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    /// Devices eligible for polling
    pub fn readable(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_readable())
    }

    /// Devices with at least one writable parameter
    pub fn writable(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_writable())
    }

    /// Devices the engine can work with
    pub fn compatible(&self) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(|d| d.compatibility.is_compatible())
    }

    /// Devices of one vendor
    pub fn by_vendor(&self, vendor: Vendor) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(move |d| d.vendor == vendor)
    }

    /// Device counts per vendor
    pub fn count_by_vendor(&self) -> BTreeMap<Vendor, usize> {
        let mut counts = BTreeMap::new();
        for device in &self.devices {
            *counts.entry(device.vendor).or_insert(0) += 1;
        }
        counts
    }

    /// Device counts per class; `total` always equals the sum of the rest
    pub fn count_by_class(&self) -> ClassCounts {
        let mut counts = ClassCounts::default();
        for device in &self.devices {
            match device.class() {
                DeviceClass::ReadWrite => counts.read_write += 1,
                DeviceClass::ReadOnly => counts.read_only += 1,
                DeviceClass::WriteOnly => counts.write_only += 1,
                DeviceClass::Incompatible => counts.incompatible += 1,
            }
        }
        counts.total = self.devices.len();
        counts
    }

    /// Whether indices are contiguous from 0
    pub fn indices_contiguous(&self) -> bool {
        self.devices
            .iter()
            .enumerate()
            .all(|(i, d)| d.card_index as usize == i)
    }
}

impl FromIterator<Device> for DeviceCollection {
    fn from_iter<T: IntoIterator<Item = Device>>(iter: T) -> Self {
        let mut collection = DeviceCollection::new();
        for device in iter {
            collection.push(device);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a DeviceCollection {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Access, Compatibility, ParamName};
    use std::path::PathBuf;

    fn amd(access: &[(ParamName, Access)]) -> Device {
        let mut d = Device::new(9, "0000:03:00.0", PathBuf::from("/x"))
            .with_ids(0x1002, 0x73bf)
            .with_compatibility(Compatibility::Compatible);
        for (name, a) in access {
            d.capabilities.set(*name, *a);
        }
        d
    }

    fn collection() -> DeviceCollection {
        vec![
            amd(&[(ParamName::Temp, Access::ReadOnly), (ParamName::FanPwm, Access::ReadWrite)]),
            amd(&[(ParamName::Temp, Access::ReadOnly)]),
            amd(&[(ParamName::FanPwm, Access::WriteOnly)]),
            amd(&[]),
            Device::new(0, "0000:0a:00.0", PathBuf::from("/y"))
                .with_ids(0x10de, 0x2204)
                .with_compatibility(Compatibility::Incompatible("nvidia".into())),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_push_assigns_contiguous_indices() {
        let c = collection();
        assert!(c.indices_contiguous());
        assert_eq!(c.get(4).unwrap().vendor, Vendor::Nvidia);
    }

    #[test]
    fn test_class_counts_sum_to_total() {
        let counts = collection().count_by_class();
        assert_eq!(counts.read_write, 1);
        assert_eq!(counts.read_only, 1);
        assert_eq!(counts.write_only, 1);
        assert_eq!(counts.incompatible, 2);
        assert_eq!(
            counts.total,
            counts.read_write + counts.read_only + counts.write_only + counts.incompatible
        );
    }

    #[test]
    fn test_vendor_counts() {
        let counts = collection().count_by_vendor();
        assert_eq!(counts[&Vendor::Amd], 4);
        assert_eq!(counts[&Vendor::Nvidia], 1);
    }

    #[test]
    fn test_filtered_views() {
        let c = collection();
        assert_eq!(c.readable().count(), 2);
        assert_eq!(c.writable().count(), 2);
        assert_eq!(c.compatible().count(), 4);
        assert_eq!(c.by_vendor(Vendor::Amd).count(), 4);
    }
}
