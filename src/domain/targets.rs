//! Desired-state types for write planning
//!
//! Validated on construction (fail-fast pattern), like the values they
//! will eventually be written as.

use crate::domain::{Bound, ClockDomain, FanControlMode, PStateMask, PerformanceLevel};
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fan PWM as a percentage (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FanPwm(u8);

impl FanPwm {
    pub const MAX: u8 = 100;

    /// # Errors
    /// Returns `DomainError::InvalidFanPwm` if value > 100
    pub fn new(percent: u8) -> Result<Self, DomainError> {
        if percent > Self::MAX {
            return Err(DomainError::InvalidFanPwm(percent));
        }
        Ok(Self(percent))
    }

    #[inline]
    pub const fn as_percent(&self) -> u8 {
        self.0
    }

    /// Raw 0-255 duty cycle written to `pwm1`
    pub fn to_raw(&self) -> u8 {
        ((self.0 as u32 * 255 + 50) / 100) as u8
    }

    /// Convert a raw 0-255 duty cycle to percent
    pub fn from_raw(raw: u8) -> Self {
        Self(((raw as u32 * 100 + 127) / 255) as u8)
    }
}

impl fmt::Display for FanPwm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for FanPwm {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FanPwm> for u8 {
    fn from(pwm: FanPwm) -> Self {
        pwm.0
    }
}

/// Power cap in whole watts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PowerCap(u32);

impl PowerCap {
    pub const fn from_watts(watts: u32) -> Self {
        Self(watts)
    }

    #[inline]
    pub const fn as_watts(&self) -> u32 {
        self.0
    }

    /// Value written to `power1_cap`
    pub fn as_microwatts(&self) -> u64 {
        self.0 as u64 * 1_000_000
    }

    /// Validate against the device's reported range
    pub fn validate(&self, range: &Bound) -> Result<(), DomainError> {
        if !range.contains(self.0 as i64) {
            return Err(DomainError::InvalidPowerCap {
                value: self.0,
                min: range.min.max(0) as u32,
                max: range.max.max(0) as u32,
            });
        }
        Ok(())
    }
}

impl fmt::Display for PowerCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}W", self.0)
    }
}

/// Target clock (and optional voltage) of one p-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTarget {
    pub freq_mhz: u32,
    pub voltage_mv: Option<u32>,
}

/// Target of one curve point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveTarget {
    pub freq_mhz: u32,
    pub voltage_mv: u32,
}

/// Partial desired state; unset fields are left alone
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredState {
    pub perf_level: Option<PerformanceLevel>,
    pub ppm: Option<u32>,
    pub power_cap: Option<PowerCap>,
    pub fan_mode: Option<FanControlMode>,
    pub fan_pwm: Option<FanPwm>,
    pub sclk_mask: Option<PStateMask>,
    pub mclk_mask: Option<PStateMask>,
    pub sclk_states: BTreeMap<u32, ClockTarget>,
    pub mclk_states: BTreeMap<u32, ClockTarget>,
    pub curve_points: BTreeMap<u32, CurveTarget>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set fan PWM
    pub fn with_fan_pwm(mut self, pwm: FanPwm) -> Self {
        self.fan_pwm = Some(pwm);
        self
    }

    /// Builder: set fan control mode
    pub fn with_fan_mode(mut self, mode: FanControlMode) -> Self {
        self.fan_mode = Some(mode);
        self
    }

    /// Builder: set power cap
    pub fn with_power_cap(mut self, cap: PowerCap) -> Self {
        self.power_cap = Some(cap);
        self
    }

    /// Builder: set performance level
    pub fn with_perf_level(mut self, level: PerformanceLevel) -> Self {
        self.perf_level = Some(level);
        self
    }

    /// Builder: set PPM mode id
    pub fn with_ppm(mut self, id: u32) -> Self {
        self.ppm = Some(id);
        self
    }

    /// Builder: set a domain mask
    pub fn with_mask(mut self, domain: ClockDomain, mask: PStateMask) -> Self {
        match domain {
            ClockDomain::Sclk => self.sclk_mask = Some(mask),
            ClockDomain::Mclk => self.mclk_mask = Some(mask),
        }
        self
    }

    /// Builder: set one p-state target
    pub fn with_state(mut self, domain: ClockDomain, index: u32, target: ClockTarget) -> Self {
        self.states_mut(domain).insert(index, target);
        self
    }

    /// Builder: set one curve point target
    pub fn with_curve_point(mut self, index: u32, target: CurveTarget) -> Self {
        self.curve_points.insert(index, target);
        self
    }

    pub fn mask(&self, domain: ClockDomain) -> Option<&PStateMask> {
        match domain {
            ClockDomain::Sclk => self.sclk_mask.as_ref(),
            ClockDomain::Mclk => self.mclk_mask.as_ref(),
        }
    }

    pub fn states(&self, domain: ClockDomain) -> &BTreeMap<u32, ClockTarget> {
        match domain {
            ClockDomain::Sclk => &self.sclk_states,
            ClockDomain::Mclk => &self.mclk_states,
        }
    }

    fn states_mut(&mut self, domain: ClockDomain) -> &mut BTreeMap<u32, ClockTarget> {
        match domain {
            ClockDomain::Sclk => &mut self.sclk_states,
            ClockDomain::Mclk => &mut self.mclk_states,
        }
    }

    /// Whether nothing is requested
    pub fn is_empty(&self) -> bool {
        self.perf_level.is_none()
            && self.ppm.is_none()
            && self.power_cap.is_none()
            && self.fan_mode.is_none()
            && self.fan_pwm.is_none()
            && self.sclk_mask.is_none()
            && self.mclk_mask.is_none()
            && self.sclk_states.is_empty()
            && self.mclk_states.is_empty()
            && self.curve_points.is_empty()
    }
}
