//! Read command implementation
//!
//! Reads one category of parameters, and optionally the p-state and
//! power profile tables, from the selected cards.

use crate::cli::args::{OutputFormat, ReadArgs};
use crate::cli::output::{print_output, DeviceReadout, ReadoutList};
use crate::commands::select_cards;
use crate::config::Config;
use crate::discovery::discover;
use crate::domain::Category;
use crate::error::{AppError, Result};
use crate::services::{read_params, read_ppm, read_pstates};
use crate::sysfs::ControlFs;

/// Execute the read command
pub fn run_read(
    fs: &dyn ControlFs,
    config: &Config,
    args: &ReadArgs,
    format: OutputFormat,
    card: Option<u32>,
) -> Result<()> {
    let mut devices = discover(fs, config)?;
    let category = Category::from(args.category);
    let cards = select_cards(&devices, card, |d| d.is_readable())?;

    let mut readouts = Vec::with_capacity(cards.len());
    for index in cards {
        let device = devices
            .get_mut(index)
            .ok_or(AppError::CardNotFound(index))?;

        let report = read_params(fs, device, category, args.force);
        log::debug!(
            "card{}: {} updated, {} unavailable, {} failed",
            index,
            report.updated.len(),
            report.unavailable.len(),
            report.failed.len()
        );

        let pstates = if args.pstates {
            match read_pstates(fs, device, args.force) {
                Ok(table) => Some(table.clone()),
                Err(e) => {
                    log::warn!("card{}: p-states unavailable: {}", index, e);
                    None
                }
            }
        } else {
            None
        };
        let ppm = if args.ppm {
            match read_ppm(fs, device, args.force) {
                Ok(table) => Some(table.clone()),
                Err(e) => {
                    log::warn!("card{}: power profiles unavailable: {}", index, e);
                    None
                }
            }
        } else {
            None
        };

        let mut readout = DeviceReadout::from(&*device);
        readout.pstates = pstates;
        readout.ppm = ppm;
        readouts.push(readout);
    }

    print_output(&ReadoutList { devices: readouts }, format)?;

    Ok(())
}
