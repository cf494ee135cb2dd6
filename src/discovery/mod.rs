//! Device discovery
//!
//! Enumerates display devices on the PCI bus, names them through the
//! PCI-ID database and classifies their per-parameter access.

pub mod classify;
pub mod enumerate;
pub mod pci_ids;

pub use classify::{classify, reclassify};
pub use enumerate::{discover, SUPPORTED_DRIVER};
pub use pci_ids::PciIdDb;
