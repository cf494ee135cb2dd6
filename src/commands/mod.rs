//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod list;
pub mod monitor;
pub mod plan;
pub mod read;

pub use list::run_list;
pub use monitor::run_monitor;
pub use plan::run_plan;
pub use read::run_read;

use crate::cli::args::{Cli, Commands};
use crate::config::{Config, ConfigBuilder};
use crate::domain::DeviceCollection;
use crate::error::{AppError, Result};

/// Merge the config file with global and per-command CLI overrides
pub fn build_config(cli: &Cli) -> Result<Config> {
    let mut builder = ConfigBuilder::new()
        .with_file(cli.config.as_deref())
        .with_debug(cli.verbose.then_some(true))
        .with_sysfs_root(cli.sysfs_root.clone())
        .with_pci_ids(cli.pci_ids.clone())
        .with_exclude_fans(cli.no_fans.then_some(true))
        .with_exclude_incompatible(cli.compatible_only.then_some(true));

    match &cli.command {
        Commands::Monitor(args) => {
            builder = builder
                .with_interval(args.interval)
                .with_read_timeout(args.read_timeout)
                .with_time_zone(args.time_zone.map(Into::into));
        }
        Commands::Plan(args) => {
            builder = builder
                .with_force(args.force.then_some(true))
                .with_script_path(args.script.clone());
        }
        _ => {}
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

/// Card indices a command acts on: the selected card, or every card
/// passing `filter`
fn select_cards(
    devices: &DeviceCollection,
    card: Option<u32>,
    filter: impl Fn(&crate::domain::Device) -> bool,
) -> Result<Vec<u32>> {
    match card {
        Some(index) => {
            devices.get(index).ok_or(AppError::CardNotFound(index))?;
            Ok(vec![index])
        }
        None => Ok(devices
            .iter()
            .filter(|d| filter(d))
            .map(|d| d.card_index)
            .collect()),
    }
}
