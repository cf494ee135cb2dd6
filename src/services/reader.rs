//! Parameter reading
//!
//! Converts control-file text into typed cells of a device's parameter
//! table, scaling driver units (µW, m°C, Hz, bytes, raw PWM) to the
//! table's units. A failed read degrades only that parameter.

use crate::domain::{
    Bound, Category, ClockDomain, Device, DpmState, FanControlMode, FanPwm, ParamName,
    ParamValue, PerformanceLevel, PStateMask, PStateTable, PpmTable, Source,
};
use crate::error::{ParseError, ServiceError, SysfsError};
use crate::parse::{
    parse_dpm, parse_int, parse_numeric, parse_od_clk_voltage, parse_ppm, pstates_from_dpm,
    DpmTable,
};
use crate::sysfs::ControlFs;

const MICRO: f64 = 1_000_000.0;
const MIB: i64 = 1024 * 1024;

/// Outcome of one `read` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReport {
    /// Parameters that received a fresh value
    pub updated: Vec<ParamName>,
    /// Parameters that reported "not available"
    pub unavailable: Vec<ParamName>,
    /// Parameters whose read failed; last value kept as stale
    pub failed: Vec<ParamName>,
}

/// Read every readable parameter of `category` (Static values are cached)
pub fn read(fs: &dyn ControlFs, device: &mut Device, category: Category) -> ReadReport {
    read_params(fs, device, category, false)
}

/// Read parameters; `force` re-reads cached Static values
pub fn read_params(
    fs: &dyn ControlFs,
    device: &mut Device,
    category: Category,
    force: bool,
) -> ReadReport {
    let mut report = ReadReport::default();
    if !device.compatibility.is_compatible() {
        return report;
    }
    let skip_static = device.static_loaded() && !force;

    for name in ParamName::ALL {
        if !category.includes(name.category()) || !device.capabilities.is_readable(name) {
            continue;
        }
        if name.category() == Category::Static && skip_static {
            continue;
        }
        if matches!(name.sources(), [Source::Derived(_)]) {
            continue;
        }

        match read_value(fs, device, name) {
            Ok(value) => {
                if value.is_unknown_code() {
                    log::warn!(
                        "card{} {}: unrecognized driver code '{}'",
                        device.card_index,
                        name,
                        value
                    );
                }
                match device.params.set(name, value) {
                    Ok(()) => report.updated.push(name),
                    Err(e) => {
                        log::warn!("card{}: {}", device.card_index, e);
                        device.params.mark_unavailable(name);
                        report.unavailable.push(name);
                    }
                }
            }
            Err(ServiceError::Parse(ParseError::NotAvailable)) => {
                device.params.mark_unavailable(name);
                report.unavailable.push(name);
            }
            Err(ServiceError::Parse(e)) => {
                log::warn!("card{} {}: {}", device.card_index, name, e);
                device.params.mark_unavailable(name);
                report.unavailable.push(name);
            }
            Err(e) => {
                log::debug!("card{} {}: {}", device.card_index, name, e);
                device.params.mark_stale(name);
                report.failed.push(name);
            }
        }
    }

    if category.includes(Category::Static) {
        for (name, target) in [
            (ParamName::PowerCapRange, ParamName::PowerCap),
            (ParamName::FanPwmRange, ParamName::FanPwm),
        ] {
            if let Some(range) = device.params.value(name).and_then(ParamValue::as_range) {
                device.params.set_range(target, range);
            }
        }
        device.set_static_loaded(true);
    }

    report
}

fn read_raw(
    fs: &dyn ControlFs,
    device: &Device,
    source: Source,
) -> Result<String, ServiceError> {
    let path = device
        .source_path(source)
        .ok_or(ServiceError::Parse(ParseError::NotAvailable))?;
    Ok(fs.read(&path)?)
}

/// Content of the first source that reads successfully
fn read_first(
    fs: &dyn ControlFs,
    device: &Device,
    name: ParamName,
) -> Result<String, ServiceError> {
    let mut last = ServiceError::Parse(ParseError::NotAvailable);
    for source in name.sources() {
        match read_raw(fs, device, *source) {
            Ok(text) => return Ok(text),
            Err(e) => last = e,
        }
    }
    Err(last)
}

fn read_dpm(
    fs: &dyn ControlFs,
    device: &Device,
    domain: ClockDomain,
) -> Result<DpmTable, ServiceError> {
    let text = read_raw(fs, device, Source::Device(domain.dpm_file()))?;
    Ok(parse_dpm(&text))
}

fn current_dpm(
    fs: &dyn ControlFs,
    device: &Device,
    domain: ClockDomain,
) -> Result<u32, ServiceError> {
    read_dpm(fs, device, domain)?
        .current()
        .map(|e| e.index)
        .ok_or(ServiceError::Parse(ParseError::NotAvailable))
}

fn clock_mhz(
    fs: &dyn ControlFs,
    device: &Device,
    name: ParamName,
    domain: ClockDomain,
) -> Result<ParamValue, ServiceError> {
    // freq*_input is in Hz; the DPM row is the fallback
    if let Some(Source::Hwmon(file)) = name.sources().first() {
        let hz = read_raw(fs, device, Source::Hwmon(*file))
            .and_then(|text| parse_numeric(&text).map_err(ServiceError::from));
        match hz {
            Ok(hz) => return Ok(ParamValue::Int((hz / MICRO).round() as i64)),
            Err(e) => log::debug!("card{} {}: {}, trying DPM", device.card_index, file, e),
        }
    }
    let table = read_dpm(fs, device, domain)?;
    let entry = table
        .current()
        .ok_or(ServiceError::Parse(ParseError::NotAvailable))?;
    Ok(ParamValue::Int(entry.freq_mhz as i64))
}

fn microwatt_range(
    fs: &dyn ControlFs,
    device: &Device,
    max: &'static str,
    min: &'static str,
) -> Result<Bound, ServiceError> {
    let max = parse_numeric(&read_raw(fs, device, Source::Hwmon(max))?)?;
    let min = parse_numeric(&read_raw(fs, device, Source::Hwmon(min))?)?;
    Ok(Bound::new((min / MICRO).round() as i64, (max / MICRO).round() as i64))
}

/// Raw 0-255 PWM as a percentage
fn pwm_percent(raw: i64) -> i64 {
    FanPwm::from_raw(raw.clamp(0, 255) as u8).as_percent() as i64
}

fn text_value(text: &str) -> Result<ParamValue, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::NotAvailable.into());
    }
    Ok(ParamValue::Text(trimmed.to_string()))
}

/// Read and convert one parameter
pub fn read_value(
    fs: &dyn ControlFs,
    device: &Device,
    name: ParamName,
) -> Result<ParamValue, ServiceError> {
    use ParamName::*;
    let value = match name {
        Vbios | UniqueId | LinkSpeed | LinkSpeedMax => {
            text_value(&read_first(fs, device, name)?)?
        }
        VramTotal | VramUsed => {
            ParamValue::Int(parse_int(&read_first(fs, device, name)?)? / MIB)
        }
        PowerCapRange => ParamValue::Range(microwatt_range(
            fs,
            device,
            "power1_cap_max",
            "power1_cap_min",
        )?),
        FanPwmRange => {
            let max = parse_int(&read_raw(fs, device, Source::Hwmon("pwm1_max"))?)?;
            let min = parse_int(&read_raw(fs, device, Source::Hwmon("pwm1_min"))?)?;
            ParamValue::Range(Bound::new(pwm_percent(min), pwm_percent(max)))
        }
        TempCrit | Temp | TempJunction | TempMem => {
            ParamValue::Float(parse_numeric(&read_first(fs, device, name)?)? / 1000.0)
        }
        Power => ParamValue::Float(parse_numeric(&read_first(fs, device, name)?)? / MICRO),
        PowerCap => {
            let uw = parse_numeric(&read_first(fs, device, name)?)?;
            ParamValue::Int((uw / MICRO).round() as i64)
        }
        Loading | MemLoading | Vddgfx | FanSpeed | LinkWidth | LinkWidthMax => {
            ParamValue::Int(parse_int(&read_first(fs, device, name)?)?)
        }
        FanEnable => ParamValue::FanMode(FanControlMode::from_code(
            read_first(fs, device, name)?.trim(),
        )),
        FanPwm => {
            let raw = parse_int(&read_first(fs, device, name)?)?;
            ParamValue::Int(pwm_percent(raw))
        }
        SclkFreq => clock_mhz(fs, device, name, ClockDomain::Sclk)?,
        MclkFreq => clock_mhz(fs, device, name, ClockDomain::Mclk)?,
        SclkPstate => ParamValue::Int(current_dpm(fs, device, ClockDomain::Sclk)? as i64),
        MclkPstate => ParamValue::Int(current_dpm(fs, device, ClockDomain::Mclk)? as i64),
        PowerDpmState => {
            ParamValue::DpmState(DpmState::from_code(read_first(fs, device, name)?.trim()))
        }
        PerfLevel => ParamValue::Level(PerformanceLevel::from_code(
            read_first(fs, device, name)?.trim(),
        )),
        Ppm => {
            let table = parse_ppm(&read_first(fs, device, name)?);
            let current = table
                .current
                .ok_or(ServiceError::Parse(ParseError::NotAvailable))?;
            ParamValue::Int(current as i64)
        }
        SclkMask | MclkMask => {
            // The live mask is write-only; report the driver default
            let domain = if name == SclkMask {
                ClockDomain::Sclk
            } else {
                ClockDomain::Mclk
            };
            let table = read_dpm(fs, device, domain)?;
            let mask = PStateMask::new(table.entries.iter().map(|e| e.index))
                .map_err(|_| ServiceError::Parse(ParseError::NotAvailable))?;
            ParamValue::Text(mask.to_command())
        }
        OdClkVoltage => {
            let table = parse_od_clk_voltage(&read_first(fs, device, name)?);
            if table.sclk.is_empty() && table.mclk.is_empty() && table.curve.is_empty() {
                return Err(ParseError::NotAvailable.into());
            }
            ParamValue::Text(format!(
                "{} sclk, {} mclk, {} curve",
                table.sclk.len(),
                table.mclk.len(),
                table.curve.len()
            ))
        }
        Energy => return Err(ParseError::NotAvailable.into()),
    };
    Ok(value)
}

/// Load the p-state table once; `force` re-reads it
///
/// Uses `pp_od_clk_voltage` when readable, else the frequency-only
/// `pp_dpm_*` lists.
pub fn read_pstates<'a>(
    fs: &dyn ControlFs,
    device: &'a mut Device,
    force: bool,
) -> Result<&'a PStateTable, ServiceError> {
    if device.pstates.is_none() || force {
        let table = load_pstates(fs, device)?;
        for warning in &table.warnings {
            log::warn!("card{} pp_od_clk_voltage {}", device.card_index, warning);
        }
        device.pstates = Some(table);
    }
    device
        .pstates
        .as_ref()
        .ok_or(ServiceError::Parse(ParseError::NotAvailable))
}

fn load_pstates(fs: &dyn ControlFs, device: &Device) -> Result<PStateTable, ServiceError> {
    if device.capabilities.is_readable(ParamName::OdClkVoltage) {
        let text = read_raw(fs, device, Source::Device("pp_od_clk_voltage"))?;
        return Ok(parse_od_clk_voltage(&text));
    }
    let sclk = read_dpm(fs, device, ClockDomain::Sclk);
    let mclk = read_dpm(fs, device, ClockDomain::Mclk);
    match (sclk, mclk) {
        (Err(e), Err(_)) => Err(e),
        (sclk, mclk) => Ok(pstates_from_dpm(
            &sclk.unwrap_or_default(),
            &mclk.unwrap_or_default(),
        )),
    }
}

/// Load the PPM table once; `force` re-reads it
pub fn read_ppm<'a>(
    fs: &dyn ControlFs,
    device: &'a mut Device,
    force: bool,
) -> Result<&'a PpmTable, ServiceError> {
    if device.ppm.is_none() || force {
        if !device.capabilities.is_readable(ParamName::Ppm) {
            return Err(SysfsError::NotFound(device.device_file("pp_power_profile_mode")).into());
        }
        let table = parse_ppm(&read_first(fs, device, ParamName::Ppm)?);
        for warning in &table.warnings {
            log::warn!("card{} pp_power_profile_mode {}", device.card_index, warning);
        }
        device.ppm = Some(table);
    }
    device
        .ppm
        .as_ref()
        .ok_or(ServiceError::Parse(ParseError::NotAvailable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::discovery::reclassify;
    use crate::domain::{Compatibility, Freshness};
    use crate::mock::MockFs;
    use std::path::PathBuf;

    const DEV: &str = "/sys/devices/pci0000:00/0000:03:00.0";
    const HW: &str = "/sys/devices/pci0000:00/0000:03:00.0/hwmon/hwmon1";

    fn fs() -> MockFs {
        MockFs::new()
            .with_file(format!("{}/vbios_version", DEV), "113-D0500100-102\n")
            .with_file(format!("{}/mem_info_vram_total", DEV), "8573157376\n")
            .with_file(format!("{}/gpu_busy_percent", DEV), "37\n")
            .with_file(format!("{}/current_link_speed", DEV), "8.0 GT/s PCIe\n")
            .with_file(format!("{}/current_link_width", DEV), "16\n")
            .with_file(format!("{}/pp_dpm_sclk", DEV), "0: 852Mhz\n1: 991Mhz *\n2: 1084Mhz\n")
            .with_file(format!("{}/pp_dpm_mclk", DEV), "0: 167Mhz\n1: 945Mhz *\n")
            .with_rw_file(format!("{}/power_dpm_force_performance_level", DEV), "auto\n")
            .with_file(format!("{}/power_dpm_state", DEV), "performance\n")
            .with_rw_file(
                format!("{}/pp_power_profile_mode", DEV),
                "NUM MODE_NAME\n 0 BOOTUP_DEFAULT:\n 1 3D_FULL_SCREEN *:\n",
            )
            .with_file(format!("{}/power1_average", HW), "35123000\n")
            .with_rw_file(format!("{}/power1_cap", HW), "220000000\n")
            .with_file(format!("{}/power1_cap_min", HW), "0\n")
            .with_file(format!("{}/power1_cap_max", HW), "264000000\n")
            .with_file(format!("{}/temp1_input", HW), "54000\n")
            .with_file(format!("{}/temp2_input", HW), "-1\n")
            .with_rw_file(format!("{}/pwm1", HW), "204\n")
            .with_rw_file(format!("{}/pwm1_enable", HW), "2\n")
            .with_file(format!("{}/pwm1_min", HW), "0\n")
            .with_file(format!("{}/pwm1_max", HW), "255\n")
            .with_file(format!("{}/freq1_input", HW), "991000000\n")
    }

    fn device(fs: &MockFs) -> Device {
        let mut d = Device::new(0, "0000:03:00.0", PathBuf::from(DEV))
            .with_ids(0x1002, 0x687f)
            .with_hwmon(PathBuf::from(HW))
            .with_compatibility(Compatibility::Compatible);
        reclassify(fs, &mut d, &Config::default());
        d
    }

    #[test]
    fn test_dynamic_unit_scaling() {
        let fs = fs();
        let mut d = device(&fs);
        read(&fs, &mut d, Category::Dynamic);

        let p = &d.params;
        assert_eq!(p.value(ParamName::Loading), Some(&ParamValue::Int(37)));
        assert_eq!(p.value(ParamName::Power), Some(&ParamValue::Float(35.123)));
        assert_eq!(p.value(ParamName::PowerCap), Some(&ParamValue::Int(220)));
        assert_eq!(p.value(ParamName::Temp), Some(&ParamValue::Float(54.0)));
        assert_eq!(p.value(ParamName::FanPwm), Some(&ParamValue::Int(80)));
        assert_eq!(
            p.value(ParamName::FanEnable),
            Some(&ParamValue::FanMode(FanControlMode::Auto))
        );
        assert_eq!(p.value(ParamName::SclkFreq), Some(&ParamValue::Int(991)));
        // no freq2_input: falls back to the current DPM row
        assert_eq!(p.value(ParamName::MclkFreq), Some(&ParamValue::Int(945)));
        assert_eq!(p.value(ParamName::SclkPstate), Some(&ParamValue::Int(1)));
        assert_eq!(p.value(ParamName::LinkWidth), Some(&ParamValue::Int(16)));
    }

    #[test]
    fn test_sentinel_is_not_available() {
        let fs = fs();
        let mut d = device(&fs);
        let report = read(&fs, &mut d, Category::Dynamic);
        assert!(report.unavailable.contains(&ParamName::TempJunction));
        assert_eq!(
            d.params.get(ParamName::TempJunction).unwrap().freshness(),
            Freshness::NotAvailable
        );
    }

    #[test]
    fn test_static_cached_and_ranges_propagated() {
        let fs = fs();
        let mut d = device(&fs);
        let first = read(&fs, &mut d, Category::Static);
        assert!(first.updated.contains(&ParamName::Vbios));
        assert_eq!(d.params.value(ParamName::VramTotal), Some(&ParamValue::Int(8176)));
        assert_eq!(
            d.params.get(ParamName::PowerCap).unwrap().range,
            Some(Bound::new(0, 264))
        );
        assert_eq!(
            d.params.get(ParamName::FanPwm).unwrap().range,
            Some(Bound::new(0, 100))
        );

        let second = read(&fs, &mut d, Category::Static);
        assert!(second.updated.is_empty());
        let forced = read_params(&fs, &mut d, Category::Static, true);
        assert!(!forced.updated.is_empty());
    }

    #[test]
    fn test_state_values() {
        let fs = fs();
        let mut d = device(&fs);
        read(&fs, &mut d, Category::State);
        assert_eq!(
            d.params.value(ParamName::PerfLevel),
            Some(&ParamValue::Level(PerformanceLevel::Auto))
        );
        assert_eq!(d.params.value(ParamName::Ppm), Some(&ParamValue::Int(1)));
        assert_eq!(
            d.params.value(ParamName::SclkMask),
            Some(&ParamValue::Text("0 1 2".into()))
        );
    }

    #[test]
    fn test_failed_read_marks_stale() {
        let fs = fs();
        let mut d = device(&fs);
        read(&fs, &mut d, Category::Dynamic);
        fs.remove(format!("{}/temp1_input", HW));
        let report = read(&fs, &mut d, Category::Dynamic);
        assert!(report.failed.contains(&ParamName::Temp));
        let cell = d.params.get(ParamName::Temp).unwrap();
        assert_eq!(cell.freshness(), Freshness::Stale);
        assert_eq!(cell.value(), Some(&ParamValue::Float(54.0)));
    }

    #[test]
    fn test_clock_falls_back_to_dpm_on_bad_hwmon_value() {
        let fs = fs()
            .with_file(format!("{}/freq1_input", HW), "-1\n")
            .with_file(format!("{}/freq2_input", HW), "garbage\n");
        let mut d = device(&fs);
        read(&fs, &mut d, Category::Dynamic);
        assert_eq!(d.params.value(ParamName::SclkFreq), Some(&ParamValue::Int(991)));
        assert_eq!(d.params.value(ParamName::MclkFreq), Some(&ParamValue::Int(945)));
    }

    #[test]
    fn test_pstates_fall_back_to_dpm() {
        let fs = fs();
        let mut d = device(&fs);
        let table = read_pstates(&fs, &mut d, false).unwrap();
        assert!(!table.overdrive);
        assert_eq!(table.sclk.len(), 3);
        assert_eq!(table.mclk.len(), 2);
    }

    #[test]
    fn test_pstates_lazy_until_forced() {
        let od = "OD_SCLK:\n0: 852Mhz 800mV\nOD_MCLK:\n0: 167Mhz 800mV\nOD_RANGE:\nVDDC: 800mV 1200mV\n";
        let fs = fs().with_rw_file(format!("{}/pp_od_clk_voltage", DEV), od);
        let mut d = device(&fs);
        assert_eq!(read_pstates(&fs, &mut d, false).unwrap().sclk.len(), 1);

        fs.set_content(
            format!("{}/pp_od_clk_voltage", DEV),
            "OD_SCLK:\n0: 852Mhz 800mV\n1: 991Mhz 900mV\n",
        );
        assert_eq!(read_pstates(&fs, &mut d, false).unwrap().sclk.len(), 1);
        let forced = read_pstates(&fs, &mut d, true).unwrap();
        assert_eq!(forced.sclk.len(), 2);
        assert!(forced.curve_range().is_none());
    }

    #[test]
    fn test_read_ppm() {
        let fs = fs();
        let mut d = device(&fs);
        let table = read_ppm(&fs, &mut d, false).unwrap();
        assert_eq!(table.modes.len(), 2);
        assert_eq!(table.current, Some(1));
    }
}
