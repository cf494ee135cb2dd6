//! Typed parameter model
//!
//! Every parameter the engine knows is a variant of the closed
//! [`ParamName`] enumeration. Each name declares its category, semantic
//! kind, unit and the sysfs files it comes from, so a value of the wrong
//! kind can never be stored under it.

use crate::domain::{Access, DpmState, FanControlMode, PerformanceLevel};
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// When a parameter is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Read once and cached
    Static,
    /// Re-read on every poll
    Dynamic,
    /// Capability descriptors, read on demand
    Info,
    /// Control state, read on demand
    State,
    /// Every category
    All,
}

impl Category {
    /// Whether a parameter of category `other` is selected by `self`
    pub fn includes(&self, other: Category) -> bool {
        *self == Category::All || *self == other
    }
}

/// Declared semantic kind of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Numeric,
    Range,
    Enum,
    Text,
}

impl ParamKind {
    pub fn label(&self) -> &'static str {
        match self {
            ParamKind::Numeric => "numeric",
            ParamKind::Range => "range",
            ParamKind::Enum => "enumerated",
            ParamKind::Text => "text",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display unit after scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    None,
    Percent,
    Watt,
    WattHour,
    Celsius,
    MilliVolt,
    MegaHertz,
    Rpm,
    MebiByte,
    GigaTransfers,
    Lanes,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Percent => "%",
            Unit::Watt => "W",
            Unit::WattHour => "Wh",
            Unit::Celsius => "C",
            Unit::MilliVolt => "mV",
            Unit::MegaHertz => "MHz",
            Unit::Rpm => "rpm",
            Unit::MebiByte => "MiB",
            Unit::GigaTransfers => "GT/s",
            Unit::Lanes => "x",
        }
    }
}

/// Where a parameter's data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// File directly in the PCI device directory
    Device(&'static str),
    /// File in the device's hwmon directory
    Hwmon(&'static str),
    /// Computed from other parameters
    Derived(ParamName),
}

/// Closed set of parameters the engine reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    // static
    Vbios,
    UniqueId,
    VramTotal,
    PowerCapRange,
    FanPwmRange,
    TempCrit,
    // dynamic
    Loading,
    MemLoading,
    Power,
    PowerCap,
    Energy,
    Temp,
    TempJunction,
    TempMem,
    Vddgfx,
    FanEnable,
    FanPwm,
    FanSpeed,
    #[serde(rename = "sclk_f")]
    SclkFreq,
    #[serde(rename = "mclk_f")]
    MclkFreq,
    #[serde(rename = "sclk_ps")]
    SclkPstate,
    #[serde(rename = "mclk_ps")]
    MclkPstate,
    VramUsed,
    #[serde(rename = "link_spd")]
    LinkSpeed,
    #[serde(rename = "link_wth")]
    LinkWidth,
    // info
    #[serde(rename = "link_spd_max")]
    LinkSpeedMax,
    #[serde(rename = "link_wth_max")]
    LinkWidthMax,
    PowerDpmState,
    // state
    PerfLevel,
    Ppm,
    SclkMask,
    MclkMask,
    OdClkVoltage,
}

impl ParamName {
    /// Every parameter, in table order
    pub const ALL: [ParamName; 33] = [
        ParamName::Vbios,
        ParamName::UniqueId,
        ParamName::VramTotal,
        ParamName::PowerCapRange,
        ParamName::FanPwmRange,
        ParamName::TempCrit,
        ParamName::Loading,
        ParamName::MemLoading,
        ParamName::Power,
        ParamName::PowerCap,
        ParamName::Energy,
        ParamName::Temp,
        ParamName::TempJunction,
        ParamName::TempMem,
        ParamName::Vddgfx,
        ParamName::FanEnable,
        ParamName::FanPwm,
        ParamName::FanSpeed,
        ParamName::SclkFreq,
        ParamName::MclkFreq,
        ParamName::SclkPstate,
        ParamName::MclkPstate,
        ParamName::VramUsed,
        ParamName::LinkSpeed,
        ParamName::LinkWidth,
        ParamName::LinkSpeedMax,
        ParamName::LinkWidthMax,
        ParamName::PowerDpmState,
        ParamName::PerfLevel,
        ParamName::Ppm,
        ParamName::SclkMask,
        ParamName::MclkMask,
        ParamName::OdClkVoltage,
    ];

    /// Short key used in records and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            ParamName::Vbios => "vbios",
            ParamName::UniqueId => "unique_id",
            ParamName::VramTotal => "vram_total",
            ParamName::PowerCapRange => "power_cap_range",
            ParamName::FanPwmRange => "fan_pwm_range",
            ParamName::TempCrit => "temp_crit",
            ParamName::Loading => "loading",
            ParamName::MemLoading => "mem_loading",
            ParamName::Power => "power",
            ParamName::PowerCap => "power_cap",
            ParamName::Energy => "energy",
            ParamName::Temp => "temp",
            ParamName::TempJunction => "temp_junction",
            ParamName::TempMem => "temp_mem",
            ParamName::Vddgfx => "vddgfx",
            ParamName::FanEnable => "fan_enable",
            ParamName::FanPwm => "fan_pwm",
            ParamName::FanSpeed => "fan_speed",
            ParamName::SclkFreq => "sclk_f",
            ParamName::MclkFreq => "mclk_f",
            ParamName::SclkPstate => "sclk_ps",
            ParamName::MclkPstate => "mclk_ps",
            ParamName::VramUsed => "vram_used",
            ParamName::LinkSpeed => "link_spd",
            ParamName::LinkWidth => "link_wth",
            ParamName::LinkSpeedMax => "link_spd_max",
            ParamName::LinkWidthMax => "link_wth_max",
            ParamName::PowerDpmState => "power_dpm_state",
            ParamName::PerfLevel => "perf_level",
            ParamName::Ppm => "ppm",
            ParamName::SclkMask => "sclk_mask",
            ParamName::MclkMask => "mclk_mask",
            ParamName::OdClkVoltage => "od_clk_voltage",
        }
    }

    /// Look a parameter up by its key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.key() == key)
    }

    pub fn category(&self) -> Category {
        use ParamName::*;
        match self {
            Vbios | UniqueId | VramTotal | PowerCapRange | FanPwmRange | TempCrit => {
                Category::Static
            }
            LinkSpeedMax | LinkWidthMax | PowerDpmState => Category::Info,
            PerfLevel | Ppm | SclkMask | MclkMask | OdClkVoltage => Category::State,
            _ => Category::Dynamic,
        }
    }

    pub fn kind(&self) -> ParamKind {
        use ParamName::*;
        match self {
            PowerCapRange | FanPwmRange => ParamKind::Range,
            FanEnable | PerfLevel | PowerDpmState => ParamKind::Enum,
            Vbios | UniqueId | LinkSpeed | LinkSpeedMax | SclkMask | MclkMask | OdClkVoltage => {
                ParamKind::Text
            }
            _ => ParamKind::Numeric,
        }
    }

    pub fn unit(&self) -> Unit {
        use ParamName::*;
        match self {
            Loading | MemLoading | FanPwm | FanPwmRange => Unit::Percent,
            Power | PowerCap | PowerCapRange => Unit::Watt,
            Energy => Unit::WattHour,
            Temp | TempJunction | TempMem | TempCrit => Unit::Celsius,
            Vddgfx => Unit::MilliVolt,
            SclkFreq | MclkFreq => Unit::MegaHertz,
            FanSpeed => Unit::Rpm,
            VramTotal | VramUsed => Unit::MebiByte,
            LinkSpeed | LinkSpeedMax => Unit::GigaTransfers,
            LinkWidth | LinkWidthMax => Unit::Lanes,
            _ => Unit::None,
        }
    }

    /// Candidate sources, primary first
    pub fn sources(&self) -> &'static [Source] {
        use ParamName::*;
        use Source::{Derived, Device as D, Hwmon as H};
        match self {
            Vbios => &[D("vbios_version")],
            UniqueId => &[D("unique_id")],
            VramTotal => &[D("mem_info_vram_total")],
            PowerCapRange => &[H("power1_cap_max"), H("power1_cap_min")],
            FanPwmRange => &[H("pwm1_max"), H("pwm1_min")],
            TempCrit => &[H("temp1_crit")],
            Loading => &[D("gpu_busy_percent")],
            MemLoading => &[D("mem_busy_percent")],
            Power => &[H("power1_average"), H("power1_input")],
            PowerCap => &[H("power1_cap")],
            Energy => &[Derived(Power)],
            Temp => &[H("temp1_input")],
            TempJunction => &[H("temp2_input")],
            TempMem => &[H("temp3_input")],
            Vddgfx => &[H("in0_input")],
            FanEnable => &[H("pwm1_enable")],
            FanPwm => &[H("pwm1")],
            FanSpeed => &[H("fan1_input")],
            SclkFreq => &[H("freq1_input"), D("pp_dpm_sclk")],
            MclkFreq => &[H("freq2_input"), D("pp_dpm_mclk")],
            SclkPstate => &[D("pp_dpm_sclk")],
            MclkPstate => &[D("pp_dpm_mclk")],
            VramUsed => &[D("mem_info_vram_used")],
            LinkSpeed => &[D("current_link_speed")],
            LinkWidth => &[D("current_link_width")],
            LinkSpeedMax => &[D("max_link_speed")],
            LinkWidthMax => &[D("max_link_width")],
            PowerDpmState => &[D("power_dpm_state")],
            PerfLevel => &[D("power_dpm_force_performance_level")],
            Ppm => &[D("pp_power_profile_mode")],
            SclkMask => &[D("pp_dpm_sclk")],
            MclkMask => &[D("pp_dpm_mclk")],
            OdClkVoltage => &[D("pp_od_clk_voltage")],
        }
    }

    /// Whether the driver ever accepts writes for this parameter
    pub fn is_controllable(&self) -> bool {
        use ParamName::*;
        matches!(
            self,
            PowerCap | FanEnable | FanPwm | PerfLevel | Ppm | SclkMask | MclkMask | OdClkVoltage
        )
    }

    /// Whether the parameter belongs to the fan group
    pub fn is_fan(&self) -> bool {
        use ParamName::*;
        matches!(self, FanEnable | FanPwm | FanSpeed | FanPwmRange)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Inclusive two-element bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub min: i64,
    pub max: i64,
}

impl Bound {
    /// Create a bound, ordering the endpoints
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Range(Bound),
    Level(PerformanceLevel),
    FanMode(FanControlMode),
    DpmState(DpmState),
    Text(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) | ParamValue::Float(_) => ParamKind::Numeric,
            ParamValue::Range(_) => ParamKind::Range,
            ParamValue::Level(_) | ParamValue::FanMode(_) | ParamValue::DpmState(_) => {
                ParamKind::Enum
            }
            ParamValue::Text(_) => ParamKind::Text,
        }
    }

    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value (floats are rounded)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<Bound> {
        match self {
            ParamValue::Range(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether an enumerated value carries an unrecognized code
    pub fn is_unknown_code(&self) -> bool {
        match self {
            ParamValue::Level(l) => !l.is_known(),
            ParamValue::FanMode(m) => !m.is_known(),
            ParamValue::DpmState(s) => !s.is_known(),
            _ => false,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{:.1}", v),
            ParamValue::Range(b) => write!(f, "{}", b),
            ParamValue::Level(l) => write!(f, "{}", l),
            ParamValue::FanMode(m) => write!(f, "{}", m),
            ParamValue::DpmState(s) => write!(f, "{}", s),
            ParamValue::Text(t) => f.write_str(t),
        }
    }
}

/// Whether a cell's value reflects the last read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Last read succeeded
    Fresh,
    /// Last read failed; value is the last known one
    Stale,
    /// No value
    #[default]
    NotAvailable,
}

/// One entry of the parameter table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamCell {
    value: Option<ParamValue>,
    freshness: Freshness,
    /// Valid range reported by the driver, if any
    pub range: Option<Bound>,
    /// Access from the last classification
    pub access: Access,
}

impl ParamCell {
    /// The stored value; check [`ParamCell::freshness`] before trusting it
    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    /// The value only if the last read produced it
    pub fn fresh_value(&self) -> Option<&ParamValue> {
        match self.freshness {
            Freshness::Fresh => self.value.as_ref(),
            _ => None,
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn is_available(&self) -> bool {
        self.freshness == Freshness::Fresh
    }
}

/// Per-device parameter table keyed by [`ParamName`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamTable {
    cells: BTreeMap<ParamName, ParamCell>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: ParamName) -> Option<&ParamCell> {
        self.cells.get(&name)
    }

    /// Fresh value of a parameter
    pub fn value(&self, name: ParamName) -> Option<&ParamValue> {
        self.cells.get(&name).and_then(ParamCell::fresh_value)
    }

    /// Store a fresh value, rejecting values of the wrong kind
    pub fn set(&mut self, name: ParamName, value: ParamValue) -> Result<(), DomainError> {
        if value.kind() != name.kind() {
            return Err(DomainError::KindMismatch {
                param: name.key(),
                expected: name.kind().label(),
            });
        }
        let cell = self.cells.entry(name).or_default();
        cell.value = Some(value);
        cell.freshness = Freshness::Fresh;
        Ok(())
    }

    /// Record the driver-reported valid range
    pub fn set_range(&mut self, name: ParamName, range: Bound) {
        self.cells.entry(name).or_default().range = Some(range);
    }

    /// Record the classified access
    pub fn set_access(&mut self, name: ParamName, access: Access) {
        self.cells.entry(name).or_default().access = access;
    }

    pub fn access(&self, name: ParamName) -> Access {
        self.cells.get(&name).map(|c| c.access).unwrap_or_default()
    }

    /// The parameter could not be read: drop the value
    pub fn mark_unavailable(&mut self, name: ParamName) {
        let cell = self.cells.entry(name).or_default();
        cell.value = None;
        cell.freshness = Freshness::NotAvailable;
    }

    /// One read failed: keep the last value, flag it
    pub fn mark_stale(&mut self, name: ParamName) {
        let cell = self.cells.entry(name).or_default();
        cell.freshness = match cell.value {
            Some(_) => Freshness::Stale,
            None => Freshness::NotAvailable,
        };
    }

    /// The device could not be read: keep last values, flag them
    pub fn mark_all_stale(&mut self) {
        for cell in self.cells.values_mut() {
            cell.freshness = match cell.value {
                Some(_) => Freshness::Stale,
                None => Freshness::NotAvailable,
            };
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamName, &ParamCell)> {
        self.cells.iter().map(|(n, c)| (*n, c))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_unique_and_resolvable() {
        for name in ParamName::ALL {
            assert_eq!(ParamName::from_key(name.key()), Some(name));
        }
        assert_eq!(ParamName::from_key("sclk_f"), Some(ParamName::SclkFreq));
        assert_eq!(ParamName::from_key("nonsense"), None);
    }

    #[test]
    fn test_serde_name_matches_key() {
        for name in ParamName::ALL {
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.key()));
        }
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let mut table = ParamTable::new();
        let err = table
            .set(ParamName::Power, ParamValue::Text("hot".into()))
            .unwrap_err();
        assert!(matches!(err, DomainError::KindMismatch { param: "power", .. }));
        assert!(table.set(ParamName::Power, ParamValue::Float(120.5)).is_ok());
    }

    #[test]
    fn test_stale_keeps_value() {
        let mut table = ParamTable::new();
        table.set(ParamName::Temp, ParamValue::Float(55.0)).unwrap();
        table.mark_unavailable(ParamName::Vddgfx);
        table.mark_all_stale();

        let temp = table.get(ParamName::Temp).unwrap();
        assert_eq!(temp.freshness(), Freshness::Stale);
        assert_eq!(temp.value(), Some(&ParamValue::Float(55.0)));
        assert!(table.value(ParamName::Temp).is_none());

        let vdd = table.get(ParamName::Vddgfx).unwrap();
        assert_eq!(vdd.freshness(), Freshness::NotAvailable);
    }

    #[test]
    fn test_unavailable_clears_value() {
        let mut table = ParamTable::new();
        table.set(ParamName::FanPwm, ParamValue::Int(40)).unwrap();
        table.mark_unavailable(ParamName::FanPwm);
        assert!(table.get(ParamName::FanPwm).unwrap().value().is_none());
    }

    #[test]
    fn test_bound_orders_endpoints() {
        let b = Bound::new(1200, 800);
        assert_eq!(b, Bound { min: 800, max: 1200 });
        assert!(b.contains(1000));
        assert!(!b.contains(1201));
    }

    #[test]
    fn test_category_includes() {
        assert!(Category::All.includes(Category::Static));
        assert!(!Category::Dynamic.includes(Category::Static));
        assert_eq!(ParamName::Vbios.category(), Category::Static);
        assert_eq!(ParamName::PerfLevel.category(), Category::State);
    }
}
