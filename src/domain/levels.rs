//! Enumerated driver codes
//!
//! Short codes the amdgpu driver reports for performance level, fan
//! control mode and DPM state. Unrecognized codes are kept verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Forced performance level (`power_dpm_force_performance_level`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    /// Driver selects clocks dynamically
    Auto,
    /// Lowest clocks
    Low,
    /// Highest clocks
    High,
    /// User controlled (masks, PPM, OD writes)
    Manual,
    /// Stable profiling clocks
    ProfileStandard,
    /// Minimum system clock profile
    ProfileMinSclk,
    /// Minimum memory clock profile
    ProfileMinMclk,
    /// Peak clocks profile
    ProfilePeak,
    /// A code this version does not know
    Unknown(String),
}

impl PerformanceLevel {
    /// All levels the driver accepts as writes
    pub const KNOWN: [PerformanceLevel; 8] = [
        PerformanceLevel::Auto,
        PerformanceLevel::Low,
        PerformanceLevel::High,
        PerformanceLevel::Manual,
        PerformanceLevel::ProfileStandard,
        PerformanceLevel::ProfileMinSclk,
        PerformanceLevel::ProfileMinMclk,
        PerformanceLevel::ProfilePeak,
    ];

    /// Parse a driver code, keeping unknown codes verbatim
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "auto" => Self::Auto,
            "low" => Self::Low,
            "high" => Self::High,
            "manual" => Self::Manual,
            "profile_standard" => Self::ProfileStandard,
            "profile_min_sclk" => Self::ProfileMinSclk,
            "profile_min_mclk" => Self::ProfileMinMclk,
            "profile_peak" => Self::ProfilePeak,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The literal code written to / read from sysfs
    pub fn code(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::Low => "low",
            Self::High => "high",
            Self::Manual => "manual",
            Self::ProfileStandard => "profile_standard",
            Self::ProfileMinSclk => "profile_min_sclk",
            Self::ProfileMinMclk => "profile_min_mclk",
            Self::ProfilePeak => "profile_peak",
            Self::Unknown(code) => code,
        }
    }

    /// Whether the code was recognized
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "{} (unknown)", code),
            other => f.write_str(other.code()),
        }
    }
}

/// Fan control mode (`pwm1_enable`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanControlMode {
    /// No control, fan runs at full speed
    FullSpeed,
    /// Manual PWM control
    Manual,
    /// Firmware controlled
    Auto,
    /// A code this version does not know
    Unknown(String),
}

impl FanControlMode {
    /// Parse a driver code, keeping unknown codes verbatim
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" => Self::FullSpeed,
            "1" => Self::Manual,
            "2" => Self::Auto,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The literal code written to / read from sysfs
    pub fn code(&self) -> &str {
        match self {
            Self::FullSpeed => "0",
            Self::Manual => "1",
            Self::Auto => "2",
            Self::Unknown(code) => code,
        }
    }

    /// Whether the code was recognized
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for FanControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullSpeed => write!(f, "full-speed"),
            Self::Manual => write!(f, "manual"),
            Self::Auto => write!(f, "auto"),
            Self::Unknown(code) => write!(f, "{} (unknown)", code),
        }
    }
}

/// Legacy DPM state (`power_dpm_state`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DpmState {
    Battery,
    Balanced,
    Performance,
    Unknown(String),
}

impl DpmState {
    /// Parse a driver code, keeping unknown codes verbatim
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "battery" => Self::Battery,
            "balanced" => Self::Balanced,
            "performance" => Self::Performance,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The literal driver code
    pub fn code(&self) -> &str {
        match self {
            Self::Battery => "battery",
            Self::Balanced => "balanced",
            Self::Performance => "performance",
            Self::Unknown(code) => code,
        }
    }

    /// Whether the code was recognized
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for DpmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_level_round_trip_known() {
        for level in PerformanceLevel::KNOWN {
            assert_eq!(PerformanceLevel::from_code(level.code()), level);
        }
    }

    #[test]
    fn test_performance_level_unknown_preserved() {
        let level = PerformanceLevel::from_code("turbo\n");
        assert_eq!(level, PerformanceLevel::Unknown("turbo".to_string()));
        assert!(!level.is_known());
        assert_eq!(level.code(), "turbo");
        assert_eq!(level.to_string(), "turbo (unknown)");
    }

    #[test]
    fn test_fan_mode_codes() {
        assert_eq!(FanControlMode::from_code("1"), FanControlMode::Manual);
        assert_eq!(FanControlMode::from_code("2 "), FanControlMode::Auto);
        assert_eq!(
            FanControlMode::from_code("7"),
            FanControlMode::Unknown("7".to_string())
        );
        assert_eq!(FanControlMode::Manual.code(), "1");
    }

    #[test]
    fn test_dpm_state() {
        assert_eq!(DpmState::from_code("performance"), DpmState::Performance);
        assert!(!DpmState::from_code("weird").is_known());
    }
}
