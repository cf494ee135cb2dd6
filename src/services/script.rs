//! Bash script rendering
//!
//! A plan can be saved as a script and run with root privileges instead
//! of being applied in-process.

use crate::domain::Device;
use crate::services::planner::WritePlan;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

/// Render plans as one bash script
pub fn render_script<'a>(
    plans: impl IntoIterator<Item = (&'a Device, &'a WritePlan)>,
    generated: DateTime<Utc>,
) -> String {
    let mut out = String::from("#!/bin/bash\n");
    let _ = writeln!(out, "# Generated by amdgpu-pac {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "# {}", generated.format("%Y-%m-%d %H:%M:%S UTC"));
    out.push_str("# Run with root privileges.\n");

    for (device, plan) in plans {
        let _ = writeln!(out, "\n# {} ({})", device.display_name(), device.pci_address);
        for skipped in &plan.skipped {
            let _ = writeln!(out, "# skipped {}: {}", skipped.param, skipped.reason);
        }
        if plan.is_empty() {
            out.push_str("# nothing to write\n");
        }
        for command in &plan.commands {
            let _ = writeln!(
                out,
                "# {}: {} -> {}",
                command.param,
                command.prior.as_deref().unwrap_or("?"),
                command.target
            );
            let _ = writeln!(
                out,
                "echo \"{}\" > {}",
                command.value,
                shell_quote(&command.path.to_string_lossy())
            );
        }
    }
    out
}

/// Quote a path for the shell when it needs it
fn shell_quote(text: &str) -> String {
    let plain = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-:".contains(c));
    if plain {
        text.to_string()
    } else {
        format!("'{}'", text.replace('\'', "'\\''"))
    }
}

/// Write a script and mark it executable
pub fn save_script(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    log::info!("Wrote script {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Access, Compatibility, DesiredState, FanPwm, ParamName};
    use crate::services::planner::plan_write;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn device() -> Device {
        let path = PathBuf::from("/sys/bus/pci/devices/0000:03:00.0");
        let mut d = Device::new(0, "0000:03:00.0", path)
            .with_model("Vega 10 XL/XT [Radeon RX Vega 56/64]")
            .with_hwmon(PathBuf::from("/sys/bus/pci/devices/0000:03:00.0/hwmon/hwmon2"))
            .with_compatibility(Compatibility::Compatible);
        d.capabilities.set(ParamName::FanPwm, Access::WriteOnly);
        d
    }

    #[test]
    fn test_render_script() {
        let d = device();
        let desired = DesiredState::new().with_fan_pwm(FanPwm::new(80).unwrap());
        let plan = plan_write(&d, &desired, false);
        let time = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let script = render_script([(&d, &plan)], time);

        let lines: Vec<_> = script.lines().collect();
        assert_eq!(lines[0], "#!/bin/bash");
        assert!(script.contains("# card0: Radeon RX Vega 56/64 (0000:03:00.0)"));
        assert!(script.contains("# skipped fan_enable: fan_enable is not writable"));
        assert!(script.contains("# fan_pwm: ? -> 80%\n"));
        assert!(script.contains(
            "echo \"204\" > /sys/bus/pci/devices/0000:03:00.0/hwmon/hwmon2/pwm1\n"
        ));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/sys/a/pwm1"), "/sys/a/pwm1");
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apply.sh");
        save_script(&path, "#!/bin/bash\n").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
