//! Output formatting utilities
//!
//! Provides table, JSON and compact output for CLI commands.

use crate::cli::args::OutputFormat;
use crate::domain::{
    Access, ClassCounts, Compatibility, Device, Freshness, PStateTable, ParamName, PpmTable,
};
use crate::services::{ApplyReport, WritePlan};
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

fn compatibility_text(compatibility: &Compatibility) -> String {
    match compatibility {
        Compatibility::Compatible => "compatible".to_string(),
        Compatibility::Warning(reason) => format!("warning: {}", reason),
        Compatibility::Incompatible(reason) => format!("incompatible: {}", reason),
    }
}

/// Device list entry for display
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListEntry {
    pub card: u32,
    pub pci_address: String,
    pub vendor: String,
    pub model: String,
    pub driver: Option<String>,
    pub driver_version: Option<String>,
    pub class: String,
    pub compatibility: String,
    pub readable: usize,
    pub writable: usize,
}

impl From<&Device> for DeviceListEntry {
    fn from(device: &Device) -> Self {
        Self {
            card: device.card_index,
            pci_address: device.pci_address.clone(),
            vendor: device.vendor.to_string(),
            model: device.model.clone(),
            driver: device.driver.clone(),
            driver_version: device.driver_version.clone(),
            class: device.class().to_string(),
            compatibility: compatibility_text(&device.compatibility),
            readable: device.capabilities.readable_count(),
            writable: device.capabilities.writable_count(),
        }
    }
}

impl TableDisplay for DeviceListEntry {
    fn to_table(&self) -> String {
        let mut output = format!(
            "[{}] {} {} ({})\n  Driver: {} {}\n  Class: {} ({} readable, {} writable)",
            self.card,
            self.vendor,
            self.model,
            self.pci_address,
            self.driver.as_deref().unwrap_or("none"),
            self.driver_version.as_deref().unwrap_or(""),
            self.class,
            self.readable,
            self.writable
        );
        if self.compatibility != "compatible" {
            output.push_str(&format!("\n  Status: {}", self.compatibility));
        }
        output
    }

    fn to_compact(&self) -> String {
        format!("{}:{}:{}", self.card, self.class, self.model)
    }
}

/// Device list for display
#[derive(Debug, Clone, Serialize)]
pub struct DeviceList {
    pub devices: Vec<DeviceListEntry>,
    pub counts: ClassCounts,
}

impl TableDisplay for DeviceList {
    fn to_table(&self) -> String {
        let mut output = format!(
            "GPUs Found: {} ({} r/w, {} read-only, {} write-only, {} incompatible)\n\n",
            self.counts.total,
            self.counts.read_write,
            self.counts.read_only,
            self.counts.write_only,
            self.counts.incompatible
        );

        for device in &self.devices {
            output.push_str(&device.to_table());
            output.push('\n');
        }

        output
    }

    fn to_compact(&self) -> String {
        self.devices
            .iter()
            .map(|d| d.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One parameter row
#[derive(Debug, Clone, Serialize)]
pub struct ParamEntry {
    pub name: ParamName,
    pub value: Option<String>,
    pub unit: &'static str,
    pub freshness: Freshness,
    pub access: Access,
}

/// Parameters of one device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReadout {
    pub card: u32,
    pub name: String,
    pub params: Vec<ParamEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pstates: Option<PStateTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppm: Option<PpmTable>,
}

impl From<&Device> for DeviceReadout {
    fn from(device: &Device) -> Self {
        let params = device
            .params
            .iter()
            .map(|(name, cell)| ParamEntry {
                name,
                value: cell.value().map(|v| v.to_string()),
                unit: name.unit().symbol(),
                freshness: cell.freshness(),
                access: cell.access,
            })
            .collect();
        Self {
            card: device.card_index,
            name: device.display_name(),
            params,
            pstates: None,
            ppm: None,
        }
    }
}

impl TableDisplay for DeviceReadout {
    fn to_table(&self) -> String {
        let mut output = format!("{}\n", self.name);

        for param in &self.params {
            let value = match (&param.value, param.freshness) {
                (Some(v), Freshness::Fresh) => format!("{}{}", v, param.unit),
                (Some(v), _) => format!("{}{} (stale)", v, param.unit),
                (None, _) => "n/a".to_string(),
            };
            output.push_str(&format!("  {:<22} {:<24} {}\n", param.name.key(), value, param.access));
        }

        if let Some(table) = &self.pstates {
            output.push_str("  P-states:\n");
            for state in &table.sclk {
                output.push_str(&format!("    SCLK {}\n", state));
            }
            for state in &table.mclk {
                output.push_str(&format!("    MCLK {}\n", state));
            }
            for point in &table.curve {
                output.push_str(&format!(
                    "    VDDC_CURVE {}: {}MHz {}mV\n",
                    point.index, point.freq_mhz, point.voltage_mv
                ));
            }
            if let Some(range) = table.ranges.sclk {
                output.push_str(&format!("    SCLK range: {}MHz\n", range));
            }
            if let Some(range) = table.ranges.mclk {
                output.push_str(&format!("    MCLK range: {}MHz\n", range));
            }
            if let Some(range) = table.curve_range() {
                output.push_str(&format!("    Voltage range: {}mV\n", range));
            }
        }

        if let Some(table) = &self.ppm {
            output.push_str("  Power profiles:\n");
            for mode in &table.modes {
                let marker = if table.current == Some(mode.id) { "*" } else { " " };
                output.push_str(&format!("   {}{}\n", marker, mode));
            }
        }

        output
    }

    fn to_compact(&self) -> String {
        let values = self
            .params
            .iter()
            .filter_map(|p| p.value.as_ref().map(|v| format!("{}={}", p.name.key(), v)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("card{}: {}", self.card, values)
    }
}

/// Readouts of several devices
#[derive(Debug, Clone, Serialize)]
pub struct ReadoutList {
    pub devices: Vec<DeviceReadout>,
}

impl TableDisplay for ReadoutList {
    fn to_table(&self) -> String {
        self.devices
            .iter()
            .map(|d| d.to_table())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_compact(&self) -> String {
        self.devices
            .iter()
            .map(|d| d.to_compact())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Write plans for display
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutput {
    pub plans: Vec<WritePlan>,
}

impl TableDisplay for PlanOutput {
    fn to_table(&self) -> String {
        let mut output = String::new();
        for plan in &self.plans {
            output.push_str(&format!("card{}: {} write(s)\n", plan.card_index, plan.len()));
            for (i, command) in plan.commands.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, command));
            }
            for skipped in &plan.skipped {
                output.push_str(&format!("  skipped {}: {}\n", skipped.param, skipped.reason));
            }
        }
        if output.is_empty() {
            output.push_str("Nothing to write");
        }
        output
    }

    fn to_compact(&self) -> String {
        self.plans
            .iter()
            .map(|p| {
                let values = p
                    .commands
                    .iter()
                    .map(|c| format!("{}={}", c.param, c.value))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("card{}:[{}]", p.card_index, values)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Apply results for display
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutput {
    pub reports: Vec<ApplyReport>,
    pub dry_run: bool,
}

impl TableDisplay for ApplyOutput {
    fn to_table(&self) -> String {
        let mut output = String::new();
        let verb = if self.dry_run { "Would write" } else { "Wrote" };
        for report in &self.reports {
            for command in &report.applied {
                output.push_str(&format!("✓ card{}: {} {}\n", report.card_index, verb, command));
            }
            for failed in &report.failed {
                output.push_str(&format!(
                    "✗ card{}: {}: {}\n",
                    report.card_index, failed.command.param, failed.reason
                ));
            }
        }
        output
    }
}

/// Simple message output
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
    pub success: bool,
}

impl TableDisplay for Message {
    fn to_table(&self) -> String {
        if self.success {
            format!("✓ {}", self.message)
        } else {
            format!("✗ {}", self.message)
        }
    }
}
