//! Monitor command implementation
//!
//! Polls every readable card and prints pipe-delimited log rows until
//! interrupted or the requested number of ticks has run.

use crate::cli::args::MonitorArgs;
use crate::config::Config;
use crate::discovery::discover;
use crate::error::{AppError, Result};
use crate::services::log_record::{format_row, header};
use crate::services::{CollectionSnapshot, PollConfig, Poller};
use crate::sysfs::ControlFs;

use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Execute the monitor command
pub fn run_monitor(fs: Arc<dyn ControlFs>, config: &Config, args: &MonitorArgs) -> Result<()> {
    let devices = discover(fs.as_ref(), config)?;
    let poll_config = PollConfig::from(config);

    log::info!("Starting monitor");
    log::info!("  Interval: {:?}", poll_config.interval);
    log::info!("  Read timeout: {:?}", poll_config.read_timeout);
    log::info!("  Cards: {}", devices.readable().count());

    let poller = Poller::new(fs, devices, poll_config);

    let stop = poller.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Io(std::io::Error::other(e.to_string())))?;

    let zone = config.general.time_zone;
    println!("{}", header());

    let mut ticks = 0u64;
    poller.run(|snapshot: &CollectionSnapshot| {
        for device in snapshot.devices.readable() {
            println!("{}", format_row(device, snapshot.taken_at, zone));
        }
        ticks += 1;
        if args.count.is_some_and(|limit| ticks >= limit) {
            poller.stop();
        }
    });

    Ok(())
}
