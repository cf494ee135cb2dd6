//! amdgpu-pac - AMD GPU sysfs state engine
//!
//! A command-line tool for reading AMD GPU sensors and p-state tables and
//! for planning writes to the amdgpu control files.

use amdgpu_pac::cli::args::{generate_completions, Cli, Commands};
use amdgpu_pac::commands::{build_config, run_list, run_monitor, run_plan, run_read};
use amdgpu_pac::config::Config;
use amdgpu_pac::error::AppError;
use amdgpu_pac::sysfs::{ControlFs, SysFs};
use clap::Parser;
use std::sync::Arc;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        generate_completions(*shell);
        return;
    }

    let config = build_config(&cli);

    // Initialize logging
    let debug = match &config {
        Ok(config) => config.general.debug,
        Err(_) => cli.verbose,
    };
    logger(debug).init();

    let result = config.and_then(|config| run(&cli, &config));

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

/// `warn` unless RUST_LOG says otherwise; `-v` or `general.debug` raise it to debug
fn logger(debug: bool) -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder
}

fn run(cli: &Cli, config: &Config) -> Result<(), AppError> {
    let fs: Arc<dyn ControlFs> = Arc::new(SysFs::new());

    match &cli.command {
        Commands::List => run_list(fs.as_ref(), config, cli.format),

        Commands::Read(args) => run_read(fs.as_ref(), config, args, cli.format, cli.card),

        Commands::Plan(args) => {
            run_plan(fs.as_ref(), config, args, cli.format, cli.card, cli.dry_run)
        }

        Commands::Monitor(args) => run_monitor(fs, config, args),

        Commands::Completions { .. } => Ok(()),
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::NoCompatibleDevices => {
            eprintln!();
            eprintln!("Hint: Make sure an AMD GPU is installed and bound to the amdgpu driver.");
            eprintln!("      Check 'lspci -k' for the kernel driver in use.");
        }
        AppError::Sysfs(amdgpu_pac::error::SysfsError::PermissionDenied(_)) => {
            eprintln!();
            eprintln!("Hint: Writing control files requires root.");
            eprintln!("      Use 'plan --script FILE' and run the script with sudo.");
        }
        AppError::CardNotFound(_) => {
            eprintln!();
            eprintln!("Hint: Run 'amdgpu-pac list' to see card indices.");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_raises_log_filter() {
        let logger = logger(true).build();
        assert!(logger.filter() >= log::LevelFilter::Debug);
    }
}
