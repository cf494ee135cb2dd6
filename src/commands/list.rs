//! List command implementation
//!
//! Lists all detected display devices with their capability class.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, DeviceList, DeviceListEntry};
use crate::config::Config;
use crate::discovery::discover;
use crate::error::Result;
use crate::sysfs::ControlFs;

/// Execute the list command
pub fn run_list(fs: &dyn ControlFs, config: &Config, format: OutputFormat) -> Result<()> {
    let devices = discover(fs, config)?;

    let list = DeviceList {
        devices: devices.iter().map(DeviceListEntry::from).collect(),
        counts: devices.count_by_class(),
    };

    print_output(&list, format)?;

    Ok(())
}
