//! Pipe-delimited log records
//!
//! One header line, then one row per readable device per tick. Values
//! that are absent or stale render as `---`.

use crate::config::TimeZone;
use crate::domain::{Device, ParamName, ParamValue};
use chrono::{DateTime, Local, Utc};

/// Placeholder for absent values
pub const MISSING: &str = "---";

/// Columns after `Time`, `Card#` and `Model`
const COLUMNS: [(&str, ParamName); 12] = [
    ("Load%", ParamName::Loading),
    ("Power", ParamName::Power),
    ("PowerCap", ParamName::PowerCap),
    ("Energy", ParamName::Energy),
    ("T", ParamName::Temp),
    ("VddGFX", ParamName::Vddgfx),
    ("FanPWM", ParamName::FanPwm),
    ("Sclk", ParamName::SclkFreq),
    ("Sclk Pstate", ParamName::SclkPstate),
    ("Mclk", ParamName::MclkFreq),
    ("Mclk Pstate", ParamName::MclkPstate),
    ("Perf Mode", ParamName::PerfLevel),
];

/// The record header line
pub fn header() -> String {
    let mut fields = vec!["Time", "Card#", "Model"];
    fields.extend(COLUMNS.iter().map(|(label, _)| *label));
    fields.join("|")
}

/// Timestamp in the configured zone
pub fn format_time(time: DateTime<Utc>, zone: TimeZone) -> String {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
    match zone {
        TimeZone::Utc => time.format(FORMAT).to_string(),
        TimeZone::Local => time.with_timezone(&Local).format(FORMAT).to_string(),
    }
}

fn field(device: &Device, name: ParamName) -> String {
    match device.params.value(name) {
        Some(ParamValue::Float(v)) if name == ParamName::Energy => format!("{:.3}", v),
        Some(value) => value.to_string(),
        None => MISSING.to_string(),
    }
}

/// One row for one device
pub fn format_row(device: &Device, time: DateTime<Utc>, zone: TimeZone) -> String {
    let mut fields = vec![
        format_time(time, zone),
        device.card_index.to_string(),
        device.short_name().replace('|', "/"),
    ];
    fields.extend(COLUMNS.iter().map(|(_, name)| field(device, *name)));
    fields.join("|")
}
