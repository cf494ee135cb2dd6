//! P-state and clock/voltage curve types
//!
//! Populated lazily from `pp_od_clk_voltage` (or the `pp_dpm_*` files on
//! hardware without overdrive support).

use crate::domain::Bound;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Clock domain a p-state belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockDomain {
    /// System (core) clock
    Sclk,
    /// Memory clock
    Mclk,
}

impl ClockDomain {
    /// Prefix letter of overdrive write commands
    pub fn od_command(&self) -> char {
        match self {
            ClockDomain::Sclk => 's',
            ClockDomain::Mclk => 'm',
        }
    }

    /// DPM file listing this domain's states
    pub fn dpm_file(&self) -> &'static str {
        match self {
            ClockDomain::Sclk => "pp_dpm_sclk",
            ClockDomain::Mclk => "pp_dpm_mclk",
        }
    }
}

impl fmt::Display for ClockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockDomain::Sclk => write!(f, "sclk"),
            ClockDomain::Mclk => write!(f, "mclk"),
        }
    }
}

/// One discrete clock/voltage operating point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PState {
    pub index: u32,
    pub freq_mhz: u32,
    /// Absent on hardware that reports frequency only
    pub voltage_mv: Option<u32>,
    /// False when masked off
    pub enabled: bool,
}

impl PState {
    pub fn new(index: u32, freq_mhz: u32, voltage_mv: Option<u32>) -> Self {
        Self {
            index,
            freq_mhz,
            voltage_mv,
            enabled: true,
        }
    }
}

impl fmt::Display for PState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.voltage_mv {
            Some(mv) => write!(f, "{}: {}MHz {}mV", self.index, self.freq_mhz, mv),
            None => write!(f, "{}: {}MHz", self.index, self.freq_mhz),
        }
    }
}

/// One point of a continuous clock/voltage curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub index: u32,
    pub freq_mhz: u32,
    pub voltage_mv: u32,
}

impl CurvePoint {
    pub fn new(index: u32, freq_mhz: u32, voltage_mv: u32) -> Self {
        Self {
            index,
            freq_mhz,
            voltage_mv,
        }
    }
}

/// Limits from the `OD_RANGE` section; each is optional
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OdRanges {
    pub sclk: Option<Bound>,
    pub mclk: Option<Bound>,
    /// `VDDC` voltage bound
    pub vddc: Option<Bound>,
    /// `VDDC_CURVE_SCLK[n]` bounds by point index
    pub curve_sclk: Vec<(u32, Bound)>,
    /// `VDDC_CURVE_VOLT[n]` bounds by point index
    pub curve_volt: Vec<(u32, Bound)>,
}

impl OdRanges {
    /// Whether any range was reported
    pub fn is_empty(&self) -> bool {
        self.sclk.is_none()
            && self.mclk.is_none()
            && self.vddc.is_none()
            && self.curve_sclk.is_empty()
            && self.curve_volt.is_empty()
    }

    /// Clock bound for a domain
    pub fn clock(&self, domain: ClockDomain) -> Option<Bound> {
        match domain {
            ClockDomain::Sclk => self.sclk,
            ClockDomain::Mclk => self.mclk,
        }
    }
}

/// Parsed p-state table of one device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PStateTable {
    pub sclk: Vec<PState>,
    pub mclk: Vec<PState>,
    pub curve: Vec<CurvePoint>,
    pub ranges: OdRanges,
    /// Whether the table came from the overdrive file (writable values)
    pub overdrive: bool,
    /// Non-fatal problems found while parsing
    pub warnings: Vec<String>,
}

impl PStateTable {
    pub fn states(&self, domain: ClockDomain) -> &[PState] {
        match domain {
            ClockDomain::Sclk => &self.sclk,
            ClockDomain::Mclk => &self.mclk,
        }
    }

    pub fn states_mut(&mut self, domain: ClockDomain) -> &mut Vec<PState> {
        match domain {
            ClockDomain::Sclk => &mut self.sclk,
            ClockDomain::Mclk => &mut self.mclk,
        }
    }

    pub fn state(&self, domain: ClockDomain, index: u32) -> Option<&PState> {
        self.states(domain).iter().find(|p| p.index == index)
    }

    /// Voltage bound for curve points; `None` when `OD_RANGE` was absent
    pub fn curve_range(&self) -> Option<Bound> {
        self.ranges.vddc.or_else(|| {
            let mins = self.ranges.curve_volt.iter().map(|(_, b)| b.min).min()?;
            let maxs = self.ranges.curve_volt.iter().map(|(_, b)| b.max).max()?;
            Some(Bound::new(mins, maxs))
        })
    }

    /// Whether the hardware uses curve points instead of per-state voltages
    pub fn is_curve_based(&self) -> bool {
        !self.curve.is_empty()
    }

    /// The enabled states of a domain as a mask
    pub fn mask(&self, domain: ClockDomain) -> Option<PStateMask> {
        let enabled: Vec<u32> = self
            .states(domain)
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.index)
            .collect();
        PStateMask::new(enabled).ok()
    }
}

/// Set of enabled p-state indices for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct PStateMask(BTreeSet<u32>);

impl PStateMask {
    /// Create a mask; must name at least one state
    ///
    /// # Errors
    /// Returns `DomainError::EmptyMask` if `indices` is empty
    pub fn new(indices: impl IntoIterator<Item = u32>) -> Result<Self, DomainError> {
        let set: BTreeSet<u32> = indices.into_iter().collect();
        if set.is_empty() {
            return Err(DomainError::EmptyMask);
        }
        Ok(Self(set))
    }

    /// Parse a space or comma separated list of indices
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let indices = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<u32>()
                    .map_err(|_| DomainError::InvalidValue(format!("bad p-state index '{}'", t)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(indices)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.0.contains(&index)
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Literal written to `pp_dpm_*`
    pub fn to_command(&self) -> String {
        self.0
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for PStateMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command())
    }
}

impl TryFrom<Vec<u32>> for PStateMask {
    type Error = DomainError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PStateMask> for Vec<u32> {
    fn from(mask: PStateMask) -> Self {
        mask.0.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_parse_and_command() {
        let mask = PStateMask::parse("3, 1 2").unwrap();
        assert_eq!(mask.to_command(), "1 2 3");
        assert!(mask.contains(2));
        assert!(!mask.contains(0));
    }

    #[test]
    fn test_mask_rejects_empty() {
        assert_eq!(PStateMask::parse("  ").unwrap_err(), DomainError::EmptyMask);
        assert!(PStateMask::parse("1 x").is_err());
    }

    #[test]
    fn test_default_mask_is_all_states() {
        let table = PStateTable {
            sclk: vec![PState::new(0, 300, None), PState::new(1, 1000, None)],
            ..Default::default()
        };
        assert_eq!(table.mask(ClockDomain::Sclk).unwrap().to_command(), "0 1");
        assert!(table.mask(ClockDomain::Mclk).is_none());
    }

    #[test]
    fn test_curve_range_from_curve_volt() {
        let mut table = PStateTable::default();
        assert!(table.curve_range().is_none());
        table.ranges.curve_volt = vec![(0, Bound::new(750, 1100)), (2, Bound::new(800, 1200))];
        assert_eq!(table.curve_range(), Some(Bound::new(750, 1200)));
    }
}
