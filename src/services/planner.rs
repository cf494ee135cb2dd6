//! Write planning
//!
//! Turns a desired partial state into the minimal, ordered list of
//! control-file writes. Planning performs no I/O: it diffs against the
//! cached parameter table and p-state table only.
//!
//! Command order is fixed:
//! performance level, PPM, per clock domain (sclk then mclk) the mask
//! followed by OD values, curve points, OD commit, fan mode, fan PWM and
//! finally the power cap.

use crate::domain::{
    Bound, ClockDomain, ClockTarget, CurveTarget, DesiredState, Device, FanControlMode, FanPwm,
    ParamName, ParamValue, PStateMask, PStateTable, PerformanceLevel, PowerCap,
};
use crate::error::DomainError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What a command does, in typed form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WriteAction {
    PerfLevel { level: PerformanceLevel },
    Ppm { id: u32 },
    Mask { domain: ClockDomain, mask: PStateMask },
    State { domain: ClockDomain, index: u32, target: ClockTarget },
    CurvePoint { index: u32, target: CurveTarget },
    Commit,
    FanMode { mode: FanControlMode },
    FanPwm { pwm: FanPwm },
    PowerCap { cap: PowerCap },
}

impl WriteAction {
    /// Literal written to the control file
    pub fn literal(&self) -> String {
        match self {
            WriteAction::PerfLevel { level } => level.code().to_string(),
            WriteAction::Ppm { id } => id.to_string(),
            WriteAction::Mask { mask, .. } => mask.to_command(),
            WriteAction::State {
                domain,
                index,
                target,
            } => {
                let cmd = domain.od_command();
                match target.voltage_mv {
                    Some(mv) => format!("{} {} {} {}", cmd, index, target.freq_mhz, mv),
                    None => format!("{} {} {}", cmd, index, target.freq_mhz),
                }
            }
            WriteAction::CurvePoint { index, target } => {
                format!("vc {} {} {}", index, target.freq_mhz, target.voltage_mv)
            }
            WriteAction::Commit => "c".to_string(),
            WriteAction::FanMode { mode } => mode.code().to_string(),
            WriteAction::FanPwm { pwm } => pwm.to_raw().to_string(),
            WriteAction::PowerCap { cap } => cap.as_microwatts().to_string(),
        }
    }

    /// Human readable target value
    fn describe(&self) -> String {
        match self {
            WriteAction::PerfLevel { level } => level.to_string(),
            WriteAction::Ppm { id } => id.to_string(),
            WriteAction::Mask { mask, .. } => mask.to_string(),
            WriteAction::State { target, .. } => describe_clock(target.freq_mhz, target.voltage_mv),
            WriteAction::CurvePoint { target, .. } => {
                describe_clock(target.freq_mhz, Some(target.voltage_mv))
            }
            WriteAction::Commit => "commit".to_string(),
            WriteAction::FanMode { mode } => mode.to_string(),
            WriteAction::FanPwm { pwm } => pwm.to_string(),
            WriteAction::PowerCap { cap } => cap.to_string(),
        }
    }
}

fn describe_clock(freq_mhz: u32, voltage_mv: Option<u32>) -> String {
    match voltage_mv {
        Some(mv) => format!("{}MHz {}mV", freq_mhz, mv),
        None => format!("{}MHz", freq_mhz),
    }
}

/// One control-file write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteCommand {
    pub param: ParamName,
    pub path: PathBuf,
    /// Literal value to write
    pub value: String,
    /// Cached value before the write; `None` when unknown
    pub prior: Option<String>,
    /// Target value for display
    pub target: String,
    #[serde(flatten)]
    pub action: WriteAction,
}

impl fmt::Display for WriteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} (echo \"{}\" > {})",
            self.param,
            self.prior.as_deref().unwrap_or("?"),
            self.target,
            self.value,
            self.path.display()
        )
    }
}

/// A requested target that will not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTarget {
    pub param: ParamName,
    pub reason: String,
}

/// Ordered write commands for one device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WritePlan {
    pub card_index: u32,
    pub commands: Vec<WriteCommand>,
    pub skipped: Vec<SkippedTarget>,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Parameters touched, in command order
    pub fn params(&self) -> impl Iterator<Item = ParamName> + '_ {
        self.commands.iter().map(|c| c.param)
    }
}

struct PlanBuilder<'a> {
    device: &'a Device,
    force: bool,
    plan: WritePlan,
}

impl<'a> PlanBuilder<'a> {
    fn new(device: &'a Device, force: bool) -> Self {
        Self {
            device,
            force,
            plan: WritePlan {
                card_index: device.card_index,
                ..Default::default()
            },
        }
    }

    /// Add a target: skipped if not writable, emitted if changed or forced
    fn target(
        &mut self,
        param: ParamName,
        action: WriteAction,
        changed: bool,
        prior: Option<String>,
    ) -> bool {
        if !self.device.capabilities.is_writable(param) {
            self.plan.skipped.push(SkippedTarget {
                param,
                reason: format!("{} is not writable", param),
            });
            return false;
        }
        if !changed && !self.force {
            return false;
        }
        let Some(path) = param
            .sources()
            .first()
            .and_then(|s| self.device.source_path(*s))
        else {
            self.plan.skipped.push(SkippedTarget {
                param,
                reason: format!("{} has no control file", param),
            });
            return false;
        };
        self.plan.commands.push(WriteCommand {
            param,
            path,
            value: action.literal(),
            prior,
            target: action.describe(),
            action,
        });
        true
    }

    /// Flag a target that will not be written
    fn skip(&mut self, param: ParamName, reason: impl Into<String>) {
        let reason = reason.into();
        log::debug!("card{}: skipping {}: {}", self.device.card_index, param, reason);
        self.plan.skipped.push(SkippedTarget { param, reason });
    }

    fn current(&self, param: ParamName) -> Option<&ParamValue> {
        self.device.params.value(param)
    }

    fn prior(&self, param: ParamName) -> Option<String> {
        self.current(param).map(|v| v.to_string())
    }
}

fn check_clock(domain: ClockDomain, freq: u32, bound: Option<Bound>) -> Result<(), DomainError> {
    match bound {
        Some(b) if !b.contains(freq as i64) => Err(DomainError::InvalidClock {
            domain: match domain {
                ClockDomain::Sclk => "sclk",
                ClockDomain::Mclk => "mclk",
            },
            value: freq,
            min: b.min.max(0) as u32,
            max: b.max.max(0) as u32,
        }),
        _ => Ok(()),
    }
}

fn check_voltage(mv: u32, bound: Option<Bound>) -> Result<(), DomainError> {
    match bound {
        Some(b) if !b.contains(mv as i64) => Err(DomainError::InvalidVoltage {
            value: mv,
            min: b.min.max(0) as u32,
            max: b.max.max(0) as u32,
        }),
        _ => Ok(()),
    }
}

fn check_mask(
    domain: ClockDomain,
    mask: &PStateMask,
    table: Option<&PStateTable>,
) -> Result<(), DomainError> {
    let Some(table) = table else { return Ok(()) };
    let states = table.states(domain);
    if states.is_empty() {
        return Ok(());
    }
    match mask.indices().find(|i| table.state(domain, *i).is_none()) {
        Some(bad) => Err(DomainError::InvalidValue(format!(
            "{} has no p-state {}",
            domain, bad
        ))),
        None => Ok(()),
    }
}

/// Index and range checks for one OD state target
fn check_state(
    domain: ClockDomain,
    index: u32,
    target: &ClockTarget,
    table: &PStateTable,
) -> Result<(), String> {
    if !table.states(domain).is_empty() && table.state(domain, index).is_none() {
        return Err(format!("{} has no p-state {}", domain, index));
    }
    check_clock(domain, target.freq_mhz, table.ranges.clock(domain))
        .map_err(|e| e.to_string())?;
    if let Some(mv) = target.voltage_mv {
        check_voltage(mv, table.ranges.vddc).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Range checks for one curve point, per-point ranges first
fn check_curve_point(index: u32, target: &CurveTarget, table: &PStateTable) -> Result<(), String> {
    let per_point = |ranges: &[(u32, Bound)]| {
        ranges.iter().find(|(i, _)| *i == index).map(|(_, b)| *b)
    };
    let sclk = per_point(table.ranges.curve_sclk.as_slice()).or(table.ranges.sclk);
    let volt = per_point(table.ranges.curve_volt.as_slice()).or(table.ranges.vddc);
    check_clock(ClockDomain::Sclk, target.freq_mhz, sclk).map_err(|e| e.to_string())?;
    check_voltage(target.voltage_mv, volt).map_err(|e| e.to_string())
}

/// Plan the writes taking `device` to `desired`
///
/// Never fails: a target that is not writable, lies outside the device's
/// reported range or contradicts another target becomes a `skipped`
/// entry and the remaining targets are still planned. With `force`,
/// unchanged writable targets are emitted too.
pub fn plan_write(device: &Device, desired: &DesiredState, force: bool) -> WritePlan {
    let mut b = PlanBuilder::new(device, force);
    let pstates = device.pstates.as_ref();

    let needs_manual = desired.sclk_mask.is_some()
        || desired.mclk_mask.is_some()
        || !desired.sclk_states.is_empty()
        || !desired.mclk_states.is_empty()
        || !desired.curve_points.is_empty();

    // 1. performance level, explicit or implied
    let mut pstates_blocked = None;
    let level = match &desired.perf_level {
        Some(level) if needs_manual && *level != PerformanceLevel::Manual => {
            let reason = format!(
                "p-state changes need the manual performance level, not {}",
                level
            );
            b.skip(ParamName::PerfLevel, reason.clone());
            pstates_blocked = Some(reason);
            None
        }
        Some(level) => Some(level.clone()),
        None if needs_manual => Some(PerformanceLevel::Manual),
        None => None,
    };
    if let Some(level) = level {
        if level.is_known() {
            let changed =
                b.current(ParamName::PerfLevel) != Some(&ParamValue::Level(level.clone()));
            let prior = b.prior(ParamName::PerfLevel);
            let action = WriteAction::PerfLevel { level };
            b.target(ParamName::PerfLevel, action, changed, prior);
        } else {
            b.skip(
                ParamName::PerfLevel,
                format!("unknown performance level '{}'", level.code()),
            );
        }
    }

    // 2. power/performance mode
    if let Some(id) = desired.ppm {
        let unknown = device
            .ppm
            .as_ref()
            .is_some_and(|ppm| !ppm.is_empty() && ppm.mode(id).is_none());
        if unknown {
            b.skip(ParamName::Ppm, format!("no PPM mode {}", id));
        } else {
            let changed = b.current(ParamName::Ppm) != Some(&ParamValue::Int(id as i64));
            let prior = b.prior(ParamName::Ppm);
            b.target(ParamName::Ppm, WriteAction::Ppm { id }, changed, prior);
        }
    }

    // 3. per domain: mask, then OD values
    let mut od_written = false;
    for domain in [ClockDomain::Sclk, ClockDomain::Mclk] {
        let mask_param = match domain {
            ClockDomain::Sclk => ParamName::SclkMask,
            ClockDomain::Mclk => ParamName::MclkMask,
        };
        if let Some(mask) = desired.mask(domain) {
            let checked = match &pstates_blocked {
                Some(reason) => Err(reason.clone()),
                None => check_mask(domain, mask, pstates).map_err(|e| e.to_string()),
            };
            match checked {
                Err(reason) => b.skip(mask_param, reason),
                Ok(()) => {
                    let changed =
                        b.current(mask_param) != Some(&ParamValue::Text(mask.to_command()));
                    let prior = b.prior(mask_param);
                    let action = WriteAction::Mask {
                        domain,
                        mask: mask.clone(),
                    };
                    b.target(mask_param, action, changed, prior);
                }
            }
        }

        for (&index, target) in desired.states(domain) {
            let current = pstates.and_then(|t| t.state(domain, index));
            let checked = match (&pstates_blocked, pstates) {
                (Some(reason), _) => Err(reason.clone()),
                (None, Some(table)) => check_state(domain, index, target, table),
                (None, None) => Ok(()),
            };
            if let Err(reason) = checked {
                b.skip(ParamName::OdClkVoltage, reason);
                continue;
            }
            let changed = match current {
                Some(state) => {
                    state.freq_mhz != target.freq_mhz
                        || (target.voltage_mv.is_some() && state.voltage_mv != target.voltage_mv)
                }
                None => true,
            };
            let prior = current.map(|s| describe_clock(s.freq_mhz, s.voltage_mv));
            let action = WriteAction::State {
                domain,
                index,
                target: *target,
            };
            od_written |= b.target(ParamName::OdClkVoltage, action, changed, prior);
        }
    }

    // 4. curve points
    for (&index, target) in &desired.curve_points {
        let current = pstates.and_then(|t| t.curve.iter().find(|p| p.index == index));
        let checked = match (&pstates_blocked, pstates) {
            (Some(reason), _) => Err(reason.clone()),
            (None, Some(table)) => check_curve_point(index, target, table),
            (None, None) => Ok(()),
        };
        if let Err(reason) = checked {
            b.skip(ParamName::OdClkVoltage, reason);
            continue;
        }
        let changed = current
            .map(|p| p.freq_mhz != target.freq_mhz || p.voltage_mv != target.voltage_mv)
            .unwrap_or(true);
        let prior = current.map(|p| describe_clock(p.freq_mhz, Some(p.voltage_mv)));
        let action = WriteAction::CurvePoint {
            index,
            target: *target,
        };
        od_written |= b.target(ParamName::OdClkVoltage, action, changed, prior);
    }

    // 5. commit OD edits
    if od_written {
        b.target(ParamName::OdClkVoltage, WriteAction::Commit, true, None);
    }

    // 6. fan mode, explicit or implied by a PWM target
    let mut pwm_blocked = None;
    let mode = match &desired.fan_mode {
        Some(mode) if desired.fan_pwm.is_some() && *mode != FanControlMode::Manual => {
            let reason = format!("fan PWM needs manual fan control, not {}", mode);
            b.skip(ParamName::FanEnable, reason.clone());
            pwm_blocked = Some(reason);
            None
        }
        Some(mode) => Some(mode.clone()),
        None if desired.fan_pwm.is_some() => Some(FanControlMode::Manual),
        None => None,
    };
    if let Some(mode) = mode {
        if mode.is_known() {
            let changed =
                b.current(ParamName::FanEnable) != Some(&ParamValue::FanMode(mode.clone()));
            let prior = b.prior(ParamName::FanEnable);
            let action = WriteAction::FanMode { mode };
            b.target(ParamName::FanEnable, action, changed, prior);
        } else {
            b.skip(
                ParamName::FanEnable,
                format!("unknown fan mode '{}'", mode.code()),
            );
        }
    }

    // 7. fan PWM
    if let Some(pwm) = desired.fan_pwm {
        let range = device.params.get(ParamName::FanPwm).and_then(|c| c.range);
        match (pwm_blocked, range) {
            (Some(reason), _) => b.skip(ParamName::FanPwm, reason),
            (None, Some(range)) if !range.contains(pwm.as_percent() as i64) => {
                b.skip(ParamName::FanPwm, format!("fan PWM {} outside {}", pwm, range))
            }
            (None, _) => {
                let changed = b.current(ParamName::FanPwm)
                    != Some(&ParamValue::Int(pwm.as_percent() as i64));
                let prior = b.prior(ParamName::FanPwm);
                b.target(ParamName::FanPwm, WriteAction::FanPwm { pwm }, changed, prior);
            }
        }
    }

    // 8. power cap
    if let Some(cap) = desired.power_cap {
        let range = device.params.get(ParamName::PowerCap).and_then(|c| c.range);
        match range.map_or(Ok(()), |range| cap.validate(&range)) {
            Err(e) => b.skip(ParamName::PowerCap, e.to_string()),
            Ok(()) => {
                let changed = b.current(ParamName::PowerCap)
                    != Some(&ParamValue::Int(cap.as_watts() as i64));
                let prior = b.prior(ParamName::PowerCap);
                b.target(ParamName::PowerCap, WriteAction::PowerCap { cap }, changed, prior);
            }
        }
    }

    b.plan
}

/// Update the cached model as if `plan` had been written
pub fn apply_to_model(device: &mut Device, plan: &WritePlan) {
    for command in &plan.commands {
        let result = match &command.action {
            WriteAction::PerfLevel { level } => device
                .params
                .set(ParamName::PerfLevel, ParamValue::Level(level.clone())),
            WriteAction::Ppm { id } => {
                if let Some(ppm) = device.ppm.as_mut() {
                    ppm.current = Some(*id);
                }
                device.params.set(ParamName::Ppm, ParamValue::Int(*id as i64))
            }
            WriteAction::Mask { domain, mask } => {
                if let Some(table) = device.pstates.as_mut() {
                    for state in table.states_mut(*domain) {
                        state.enabled = mask.contains(state.index);
                    }
                }
                let param = match domain {
                    ClockDomain::Sclk => ParamName::SclkMask,
                    ClockDomain::Mclk => ParamName::MclkMask,
                };
                device.params.set(param, ParamValue::Text(mask.to_command()))
            }
            WriteAction::State {
                domain,
                index,
                target,
            } => {
                let table = device.pstates.get_or_insert_with(PStateTable::default);
                let states = table.states_mut(*domain);
                match states.iter_mut().find(|s| s.index == *index) {
                    Some(state) => {
                        state.freq_mhz = target.freq_mhz;
                        if target.voltage_mv.is_some() {
                            state.voltage_mv = target.voltage_mv;
                        }
                    }
                    None => states.push(crate::domain::PState::new(
                        *index,
                        target.freq_mhz,
                        target.voltage_mv,
                    )),
                }
                Ok(())
            }
            WriteAction::CurvePoint { index, target } => {
                let table = device.pstates.get_or_insert_with(PStateTable::default);
                match table.curve.iter_mut().find(|p| p.index == *index) {
                    Some(point) => {
                        point.freq_mhz = target.freq_mhz;
                        point.voltage_mv = target.voltage_mv;
                    }
                    None => table.curve.push(crate::domain::CurvePoint::new(
                        *index,
                        target.freq_mhz,
                        target.voltage_mv,
                    )),
                }
                Ok(())
            }
            WriteAction::Commit => Ok(()),
            WriteAction::FanMode { mode } => device
                .params
                .set(ParamName::FanEnable, ParamValue::FanMode(mode.clone())),
            WriteAction::FanPwm { pwm } => device
                .params
                .set(ParamName::FanPwm, ParamValue::Int(pwm.as_percent() as i64)),
            WriteAction::PowerCap { cap } => device
                .params
                .set(ParamName::PowerCap, ParamValue::Int(cap.as_watts() as i64)),
        };
        if let Err(e) = result {
            log::warn!("card{}: {}", device.card_index, e);
        }
    }
}
