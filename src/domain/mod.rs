//! Domain models for amdgpu-pac
//!
//! This module contains the device model, typed parameter table and the
//! p-state/PPM tables. Types are validated on construction (fail-fast
//! pattern).

pub mod capability;
pub mod collection;
pub mod device;
pub mod levels;
pub mod param;
pub mod ppm;
pub mod pstate;
pub mod targets;

pub use capability::{Access, CapabilitySet, DeviceClass};
pub use collection::{ClassCounts, DeviceCollection};
pub use device::{Compatibility, Device, Vendor};
pub use levels::{DpmState, FanControlMode, PerformanceLevel};
pub use param::{
    Bound, Category, Freshness, ParamCell, ParamKind, ParamName, ParamTable, ParamValue, Source,
    Unit,
};
pub use ppm::{PowerMode, PpmTable};
pub use pstate::{ClockDomain, CurvePoint, OdRanges, PState, PStateMask, PStateTable};
pub use targets::{ClockTarget, CurveTarget, DesiredState, FanPwm, PowerCap};
