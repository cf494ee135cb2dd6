//! End-to-end tests over a fake sysfs tree on disk
//!
//! The tree is built in a temporary directory and accessed through the
//! real `SysFs` backend with `paths.sysfs_root` pointing at it.

use amdgpu_pac::config::Config;
use amdgpu_pac::discovery::discover;
use amdgpu_pac::domain::{
    Category, ClockDomain, ClockTarget, DesiredState, DeviceClass, FanPwm, PStateMask,
    ParamName, ParamValue, PerformanceLevel, PowerCap, Vendor,
};
use amdgpu_pac::error::AppError;
use amdgpu_pac::services::{
    plan_write, read, read_ppm, read_pstates, render_script, save_script, PlanApplier,
    PollConfig, Poller,
};
use amdgpu_pac::sysfs::{ControlFs, SysFs};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const AMD: &str = "0000:03:00.0";
const NVIDIA: &str = "0000:0a:00.0";

const PCI_IDS: &str = "1002  Advanced Micro Devices, Inc. [AMD/ATI]
\t687f  Vega 10 XL/XT [Radeon RX Vega 56/64]
10de  NVIDIA Corporation
\t2204  GA102 [GeForce RTX 3090]
";

const OD_TABLE: &str = "OD_SCLK:
0:        852Mhz        800mV
1:        991Mhz        900mV
2:       1084Mhz        950mV
3:       1138Mhz       1000mV
4:       1200Mhz       1050mV
5:       1401Mhz       1100mV
6:       1536Mhz       1150mV
7:       1630Mhz       1200mV
OD_MCLK:
0:        167Mhz        800mV
1:        500Mhz        800mV
2:        800Mhz        950mV
3:        945Mhz       1100mV
OD_RANGE:
SCLK:     852MHz       2400MHz
MCLK:     167MHz       1500MHz
VDDC:     800mV        1200mV
";

const PPM_TABLE: &str = "NUM        MODE_NAME     SCLK_UP_HYST   SCLK_DOWN_HYST SCLK_ACTIVE_LEVEL
  0   BOOTUP_DEFAULT:        -                -                -
  1 3D_FULL_SCREEN *:        0              100               30
  2     POWER_SAVING:       10                0               30
";

struct FakeSysfs {
    dir: TempDir,
}

impl FakeSysfs {
    fn new() -> Self {
        let fake = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fake.amd_card();
        fake.nvidia_card();
        fake.write("module/amdgpu/version", "5.18.13\n");
        fake.write("pci.ids", PCI_IDS);
        fake
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn device_dir(&self, address: &str) -> PathBuf {
        self.root().join("bus/pci/devices").join(address)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn device_file(&self, address: &str, file: &str, content: &str) {
        self.write(&format!("bus/pci/devices/{}/{}", address, file), content);
    }

    fn bind_driver(&self, address: &str, driver: &str) {
        let driver_dir = self.root().join("bus/pci/drivers").join(driver);
        fs::create_dir_all(&driver_dir).unwrap();
        std::os::unix::fs::symlink(&driver_dir, self.device_dir(address).join("driver")).unwrap();
    }

    fn amd_card(&self) {
        let files = [
            ("class", "0x030000\n"),
            ("vendor", "0x1002\n"),
            ("device", "0x687f\n"),
            ("gpu_busy_percent", "12\n"),
            ("vbios_version", "113-D0500100-102\n"),
            ("mem_info_vram_total", "8573157376\n"),
            ("power_dpm_force_performance_level", "auto\n"),
            ("pp_dpm_sclk", "0: 852Mhz\n1: 991Mhz *\n"),
            ("pp_dpm_mclk", "0: 167Mhz\n1: 945Mhz *\n"),
            ("pp_od_clk_voltage", OD_TABLE),
            ("pp_power_profile_mode", PPM_TABLE),
            ("hwmon/hwmon0/temp1_input", "45000\n"),
            ("hwmon/hwmon0/power1_average", "100000000\n"),
            ("hwmon/hwmon0/power1_cap", "200000000\n"),
            ("hwmon/hwmon0/power1_cap_min", "100000000\n"),
            ("hwmon/hwmon0/power1_cap_max", "220000000\n"),
            ("hwmon/hwmon0/pwm1", "128\n"),
            ("hwmon/hwmon0/pwm1_enable", "2\n"),
            ("hwmon/hwmon0/pwm1_min", "0\n"),
            ("hwmon/hwmon0/pwm1_max", "255\n"),
            ("hwmon/hwmon0/fan1_input", "1200\n"),
        ];
        for (file, content) in files {
            self.device_file(AMD, file, content);
        }
        fs::create_dir_all(self.device_dir(AMD).join("drm/card0")).unwrap();
        self.bind_driver(AMD, "amdgpu");
    }

    fn nvidia_card(&self) {
        self.device_file(NVIDIA, "class", "0x030000\n");
        self.device_file(NVIDIA, "vendor", "0x10de\n");
        self.device_file(NVIDIA, "device", "0x2204\n");
        self.bind_driver(NVIDIA, "nvidia");
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.paths.sysfs_root = self.root().to_path_buf();
        config.paths.pci_ids = Some(self.root().join("pci.ids"));
        config
    }

    fn hwmon_content(&self, file: &str) -> String {
        fs::read_to_string(self.device_dir(AMD).join("hwmon/hwmon0").join(file)).unwrap()
    }
}

#[test]
fn test_discover_fake_tree() {
    let fake = FakeSysfs::new();
    let devices = discover(&SysFs::new(), &fake.config()).unwrap();

    assert_eq!(devices.len(), 2);
    assert!(devices.indices_contiguous());

    let amd = devices.get(0).unwrap();
    assert_eq!(amd.pci_address, AMD);
    assert_eq!(amd.vendor, Vendor::Amd);
    assert_eq!(amd.short_name(), "Radeon RX Vega 56/64");
    assert_eq!(amd.driver.as_deref(), Some("amdgpu"));
    assert_eq!(amd.driver_version.as_deref(), Some("5.18.13"));
    assert!(amd.card_path.as_ref().unwrap().ends_with("drm/card0"));
    assert!(amd.hwmon_path.as_ref().unwrap().ends_with("hwmon/hwmon0"));
    assert!(amd.capabilities.is_readable(ParamName::Temp));
    assert!(amd.capabilities.is_writable(ParamName::FanPwm));
    assert!(amd.capabilities.is_readable(ParamName::Energy));

    let nvidia = devices.get(1).unwrap();
    assert_eq!(nvidia.class(), DeviceClass::Incompatible);

    let counts = devices.count_by_class();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.incompatible, 1);
}

#[test]
fn test_exclude_incompatible() {
    let fake = FakeSysfs::new();
    let mut config = fake.config();
    config.filter.exclude_incompatible = true;

    let devices = discover(&SysFs::new(), &config).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices.get(0).unwrap().vendor, Vendor::Amd);
}

#[test]
fn test_no_compatible_device_is_fatal() {
    let fake = FakeSysfs::new();
    fs::remove_dir_all(fake.device_dir(AMD)).unwrap();

    let result = discover(&SysFs::new(), &fake.config());
    assert!(matches!(result, Err(AppError::NoCompatibleDevices)));
}

#[test]
fn test_read_scales_values() {
    let fake = FakeSysfs::new();
    let sysfs = SysFs::new();
    let mut devices = discover(&sysfs, &fake.config()).unwrap();
    let device = devices.get_mut(0).unwrap();

    let report = read(&sysfs, device, Category::All);
    assert!(report.failed.is_empty());

    let p = &device.params;
    assert_eq!(p.value(ParamName::Loading), Some(&ParamValue::Int(12)));
    assert_eq!(p.value(ParamName::Temp), Some(&ParamValue::Float(45.0)));
    assert_eq!(p.value(ParamName::PowerCap), Some(&ParamValue::Int(200)));
    assert_eq!(
        p.value(ParamName::PerfLevel),
        Some(&ParamValue::Level(PerformanceLevel::Auto))
    );
    assert_eq!(p.value(ParamName::SclkFreq), Some(&ParamValue::Int(991)));

    let table = read_pstates(&sysfs, device, false).unwrap();
    assert!(table.overdrive);
    assert_eq!(table.sclk.len(), 8);
    assert_eq!(table.mclk.len(), 4);

    let ppm = read_ppm(&sysfs, device, false).unwrap();
    assert_eq!(ppm.current, Some(1));
    assert_eq!(ppm.modes.len(), 3);
}

#[test]
fn test_plan_apply_and_replan() {
    let fake = FakeSysfs::new();
    let sysfs = SysFs::new();
    let config = fake.config();
    let mut devices = discover(&sysfs, &config).unwrap();
    let device = devices.get_mut(0).unwrap();
    read(&sysfs, device, Category::All);

    let desired = DesiredState::new()
        .with_fan_pwm(FanPwm::new(80).unwrap())
        .with_power_cap(PowerCap::from_watts(150));
    let plan = plan_write(device, &desired, false);
    let values: Vec<&str> = plan.commands.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, ["1", "204", "150000000"]);

    let report = PlanApplier::new(false).apply(&sysfs, &plan);
    assert!(report.is_complete());
    assert_eq!(fake.hwmon_content("pwm1_enable"), "1");
    assert_eq!(fake.hwmon_content("pwm1"), "204");
    assert_eq!(fake.hwmon_content("power1_cap"), "150000000");

    // a fresh read of the written files leaves nothing to do
    let mut devices = discover(&sysfs, &config).unwrap();
    let device = devices.get_mut(0).unwrap();
    read(&sysfs, device, Category::All);
    assert!(plan_write(device, &desired, false).is_empty());
    assert_eq!(plan_write(device, &desired, true).len(), 3);
}

#[test]
fn test_out_of_range_cap_does_not_block_fan_writes() {
    let fake = FakeSysfs::new();
    let sysfs = SysFs::new();
    let mut devices = discover(&sysfs, &fake.config()).unwrap();
    let device = devices.get_mut(0).unwrap();
    read(&sysfs, device, Category::All);

    // power1_cap_max is 220W
    let desired = DesiredState::new()
        .with_fan_pwm(FanPwm::new(80).unwrap())
        .with_power_cap(PowerCap::from_watts(300));
    let plan = plan_write(device, &desired, false);
    let values: Vec<&str> = plan.commands.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, ["1", "204"]);
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].param, ParamName::PowerCap);

    let report = PlanApplier::new(false).apply(&sysfs, &plan);
    assert!(report.is_complete());
    assert_eq!(fake.hwmon_content("pwm1"), "204");
    assert_eq!(fake.hwmon_content("power1_cap"), "200000000\n");
}

#[test]
fn test_dry_run_writes_nothing() {
    let fake = FakeSysfs::new();
    let sysfs = SysFs::new();
    let mut devices = discover(&sysfs, &fake.config()).unwrap();
    let device = devices.get_mut(0).unwrap();
    read(&sysfs, device, Category::All);

    let desired = DesiredState::new().with_power_cap(PowerCap::from_watts(150));
    let plan = plan_write(device, &desired, false);
    let report = PlanApplier::new(true).apply(&sysfs, &plan);

    assert_eq!(report.applied.len(), 1);
    assert_eq!(fake.hwmon_content("power1_cap"), "200000000\n");
}

#[test]
fn test_overdrive_plan_script() {
    let fake = FakeSysfs::new();
    let sysfs = SysFs::new();
    let mut devices = discover(&sysfs, &fake.config()).unwrap();
    let device = devices.get_mut(0).unwrap();
    read(&sysfs, device, Category::All);
    read_pstates(&sysfs, device, false).unwrap();

    let desired = DesiredState::new()
        .with_mask(ClockDomain::Sclk, PStateMask::new([5, 6, 7]).unwrap())
        .with_state(
            ClockDomain::Sclk,
            7,
            ClockTarget {
                freq_mhz: 1600,
                voltage_mv: Some(1150),
            },
        );
    let plan = plan_write(device, &desired, false);
    let values: Vec<&str> = plan.commands.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, ["manual", "5 6 7", "s 7 1600 1150", "c"]);

    let script_path = fake.root().join("apply.sh");
    let device = devices.get(0).unwrap();
    let script = render_script([(device, &plan)], chrono::Utc::now());
    save_script(&script_path, &script).unwrap();

    let saved = fs::read_to_string(&script_path).unwrap();
    assert!(saved.starts_with("#!/bin/bash\n"));
    assert!(saved.contains("echo \"s 7 1600 1150\" > "));
    assert!(saved.contains("pp_od_clk_voltage"));
    assert!(saved.trim_end().ends_with(&format!(
        "echo \"c\" > {}",
        fake.device_dir(AMD).join("pp_od_clk_voltage").display()
    )));
}

#[test]
fn test_poller_over_fake_tree() {
    let fake = FakeSysfs::new();
    let fs: Arc<dyn ControlFs> = Arc::new(SysFs::new());
    let config = fake.config();
    let devices = discover(fs.as_ref(), &config).unwrap();

    let poll_config = PollConfig {
        interval: Duration::from_millis(10),
        read_timeout: Duration::from_secs(2),
        ..PollConfig::from(&config)
    };
    let poller = Poller::new(fs, devices, poll_config);

    let report = poller.tick().unwrap();
    assert_eq!(report.updated, [0]);
    assert!(report.stale.is_empty());

    let snapshot = poller.snapshots().latest();
    assert_eq!(snapshot.tick, 1);
    let amd = snapshot.devices.get(0).unwrap();
    assert_eq!(amd.params.value(ParamName::Power), Some(&ParamValue::Float(100.0)));
    assert_eq!(amd.params.value(ParamName::Energy), Some(&ParamValue::Float(0.0)));
}
