//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::config::TimeZone;
use crate::domain::{Category, FanControlMode};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// AMD GPU sysfs state engine
///
/// Discover AMD GPUs, read sensors and p-state tables, and plan or apply
/// writes to the amdgpu control files.
#[derive(Parser, Debug)]
#[command(name = "amdgpu-pac")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "AMDGPU_PAC_CONFIG")]
    pub config: Option<String>,

    /// Target card by index (0-based)
    #[arg(long, global = true)]
    pub card: Option<u32>,

    /// Root of the sysfs tree (default /sys)
    #[arg(long, global = true, value_name = "DIR")]
    pub sysfs_root: Option<PathBuf>,

    /// pci.ids file to decode model names
    #[arg(long, global = true, value_name = "FILE")]
    pub pci_ids: Option<PathBuf>,

    /// Skip fan parameters
    #[arg(long, global = true)]
    pub no_fans: bool,

    /// Drop incompatible devices from the collection
    #[arg(long, global = true)]
    pub compatible_only: bool,

    /// Dry run mode - don't actually apply changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all detected GPUs and their classes
    List,

    /// Read parameters of one or all cards
    Read(ReadArgs),

    /// Plan writes toward a desired state, optionally apply them
    Plan(PlanArgs),

    /// Poll cards and print one log row per card per tick
    Monitor(MonitorArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the read command
#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Parameter category to read
    #[arg(long, value_enum, default_value = "all")]
    pub category: CategoryArg,

    /// Also load the p-state table
    #[arg(long)]
    pub pstates: bool,

    /// Also load the power profile table
    #[arg(long)]
    pub ppm: bool,

    /// Re-read static values
    #[arg(long)]
    pub force: bool,
}

/// Parameter category argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CategoryArg {
    Static,
    Dynamic,
    Info,
    State,
    All,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Static => Category::Static,
            CategoryArg::Dynamic => Category::Dynamic,
            CategoryArg::Info => Category::Info,
            CategoryArg::State => Category::State,
            CategoryArg::All => Category::All,
        }
    }
}

/// Arguments for the plan command
#[derive(Parser, Debug, Default)]
pub struct PlanArgs {
    /// Forced performance level (auto, low, high, manual, profile_*)
    #[arg(long, value_name = "LEVEL")]
    pub perf_level: Option<String>,

    /// Power profile mode id
    #[arg(long, value_name = "ID")]
    pub ppm: Option<u32>,

    /// Power cap in watts
    #[arg(long, value_name = "WATTS")]
    pub power_cap: Option<u32>,

    /// Fan control mode
    #[arg(long, value_enum)]
    pub fan_mode: Option<FanModeArg>,

    /// Fan PWM percentage (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub fan_pwm: Option<u8>,

    /// Enabled sclk p-states, e.g. "5 6 7"
    #[arg(long, value_name = "INDICES")]
    pub sclk_mask: Option<String>,

    /// Enabled mclk p-states, e.g. "2 3"
    #[arg(long, value_name = "INDICES")]
    pub mclk_mask: Option<String>,

    /// Sclk p-state target (format: INDEX:MHZ[:MV], e.g., 7:1600:1150)
    #[arg(long = "sclk-state", value_name = "INDEX:MHZ[:MV]")]
    pub sclk_states: Vec<String>,

    /// Mclk p-state target (format: INDEX:MHZ[:MV])
    #[arg(long = "mclk-state", value_name = "INDEX:MHZ[:MV]")]
    pub mclk_states: Vec<String>,

    /// Voltage curve point target (format: INDEX:MHZ:MV)
    #[arg(long = "curve-point", value_name = "INDEX:MHZ:MV")]
    pub curve_points: Vec<String>,

    /// Include targets that already match the current value
    #[arg(long)]
    pub force: bool,

    /// Save the plan as a bash script
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Apply the plan to the control files
    #[arg(long)]
    pub apply: bool,
}

/// Fan mode argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FanModeArg {
    /// Firmware controlled
    Auto,
    /// Manual PWM control
    Manual,
    /// No control, full speed
    FullSpeed,
}

impl From<FanModeArg> for FanControlMode {
    fn from(arg: FanModeArg) -> Self {
        match arg {
            FanModeArg::Auto => FanControlMode::Auto,
            FanModeArg::Manual => FanControlMode::Manual,
            FanModeArg::FullSpeed => FanControlMode::FullSpeed,
        }
    }
}

/// Arguments for the monitor command
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Poll interval in seconds
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Per-card read timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub read_timeout: Option<u64>,

    /// Timestamp zone of log rows
    #[arg(long, value_enum)]
    pub time_zone: Option<TimeZoneArg>,

    /// Stop after this many ticks
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

/// Time zone argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TimeZoneArg {
    Utc,
    Local,
}

impl From<TimeZoneArg> for TimeZone {
    fn from(arg: TimeZoneArg) -> Self {
        match arg {
            TimeZoneArg::Utc => TimeZone::Utc,
            TimeZoneArg::Local => TimeZone::Local,
        }
    }
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
