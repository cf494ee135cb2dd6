//! Plan command implementation
//!
//! Builds a desired state from the CLI, plans the writes for each card,
//! and optionally saves them as a script or applies them.

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::output::{print_output, ApplyOutput, Message, PlanOutput};
use crate::commands::select_cards;
use crate::config::Config;
use crate::discovery::discover;
use crate::domain::{
    Category, ClockDomain, ClockTarget, CurveTarget, DesiredState, FanPwm, PStateMask,
    PerformanceLevel, PowerCap,
};
use crate::error::{AppError, DomainError, Result};
use crate::services::{
    plan_write, read_params, read_ppm, read_pstates, render_script, save_script, PlanApplier,
};
use crate::sysfs::ControlFs;

/// Execute the plan command
pub fn run_plan(
    fs: &dyn ControlFs,
    config: &Config,
    args: &PlanArgs,
    format: OutputFormat,
    card: Option<u32>,
    dry_run: bool,
) -> Result<()> {
    let desired = desired_state(args)?;
    let mut devices = discover(fs, config)?;
    let cards = select_cards(&devices, card, |d| d.is_writable())?;
    let needs_pstates = desired.sclk_mask.is_some()
        || desired.mclk_mask.is_some()
        || !desired.sclk_states.is_empty()
        || !desired.mclk_states.is_empty()
        || !desired.curve_points.is_empty();

    let mut plans = Vec::with_capacity(cards.len());
    for index in &cards {
        let device = devices
            .get_mut(*index)
            .ok_or(AppError::CardNotFound(*index))?;
        read_params(fs, device, Category::All, false);
        if needs_pstates {
            if let Err(e) = read_pstates(fs, device, false) {
                log::warn!("card{}: p-states unavailable: {}", index, e);
            }
        }
        if desired.ppm.is_some() {
            if let Err(e) = read_ppm(fs, device, false) {
                log::warn!("card{}: power profiles unavailable: {}", index, e);
            }
        }
        plans.push(plan_write(device, &desired, config.write.force));
    }

    print_output(
        &PlanOutput {
            plans: plans.clone(),
        },
        format,
    )?;

    if let Some(path) = &config.write.script_path {
        let pairs = cards
            .iter()
            .filter_map(|i| devices.get(*i))
            .zip(plans.iter());
        save_script(path, &render_script(pairs, chrono::Utc::now()))?;
        print_output(
            &Message {
                message: format!("Saved script to {}", path.display()),
                success: true,
            },
            format,
        )?;
    }

    if args.apply {
        let applier = PlanApplier::new(dry_run);
        let reports: Vec<_> = plans.iter().map(|p| applier.apply(fs, p)).collect();
        let complete = reports.iter().all(|r| r.is_complete());
        print_output(&ApplyOutput { reports, dry_run }, format)?;
        if !complete {
            log::warn!("Some writes failed; earlier writes were kept");
        }
    }

    Ok(())
}

/// Build a desired state from the plan arguments
pub fn desired_state(args: &PlanArgs) -> Result<DesiredState> {
    let mut desired = DesiredState::new();

    if let Some(code) = &args.perf_level {
        let level = PerformanceLevel::from_code(code);
        if !level.is_known() {
            return Err(DomainError::InvalidValue(format!(
                "Unknown performance level '{}'",
                code
            ))
            .into());
        }
        desired = desired.with_perf_level(level);
    }
    if let Some(id) = args.ppm {
        desired = desired.with_ppm(id);
    }
    if let Some(watts) = args.power_cap {
        desired = desired.with_power_cap(PowerCap::from_watts(watts));
    }
    if let Some(mode) = args.fan_mode {
        desired = desired.with_fan_mode(mode.into());
    }
    if let Some(pwm) = args.fan_pwm {
        desired = desired.with_fan_pwm(FanPwm::new(pwm)?);
    }
    if let Some(mask) = &args.sclk_mask {
        desired = desired.with_mask(ClockDomain::Sclk, PStateMask::parse(mask)?);
    }
    if let Some(mask) = &args.mclk_mask {
        desired = desired.with_mask(ClockDomain::Mclk, PStateMask::parse(mask)?);
    }
    for (domain, specs) in [
        (ClockDomain::Sclk, &args.sclk_states),
        (ClockDomain::Mclk, &args.mclk_states),
    ] {
        for spec in specs {
            let (index, target) = parse_state_target(spec)?;
            desired = desired.with_state(domain, index, target);
        }
    }
    for spec in &args.curve_points {
        let (index, target) = parse_state_target(spec)?;
        let voltage_mv = target.voltage_mv.ok_or_else(|| {
            DomainError::InvalidValue(format!(
                "Invalid curve point '{}'. Expected INDEX:MHZ:MV (e.g., 2:1900:1100)",
                spec
            ))
        })?;
        desired = desired.with_curve_point(
            index,
            CurveTarget {
                freq_mhz: target.freq_mhz,
                voltage_mv,
            },
        );
    }

    Ok(desired)
}

/// Parse `INDEX:MHZ[:MV]`
fn parse_state_target(spec: &str) -> Result<(u32, ClockTarget)> {
    let invalid = |what: &str| {
        AppError::Domain(DomainError::InvalidValue(format!(
            "Invalid {} in '{}'. Expected INDEX:MHZ[:MV] (e.g., 7:1600:1150)",
            what, spec
        )))
    };

    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid("format"));
    }

    let index: u32 = parts[0].parse().map_err(|_| invalid("p-state index"))?;
    let freq_mhz: u32 = parts[1].parse().map_err(|_| invalid("clock"))?;
    let voltage_mv = match parts.get(2) {
        Some(mv) => Some(mv.parse::<u32>().map_err(|_| invalid("voltage"))?),
        None => None,
    };

    Ok((
        index,
        ClockTarget {
            freq_mhz,
            voltage_mv,
        },
    ))
}
