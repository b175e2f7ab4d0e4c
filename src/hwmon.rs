/*
 * This file is part of Superfan.
 *
 * Copyright (C) 2025 Superfan contributors
 *
 * Superfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Superfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Superfan. If not, see <https://www.gnu.org/licenses/>.
 */

//! hwmon discovery and PWM output control
//!
//! # PWM enable modes
//!
//! - 0 = disabled (full speed on most chips)
//! - 1 = manual (software control)
//! - 2+ = automatic (firmware/chip thermal control, chip specific)
//!
//! Every write is best-effort: one channel failing never stops the others,
//! and the caller gets a [`WriteReport`] saying exactly which channels failed.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::config::ControlConfig;
use crate::error::{FanError, Result};

/// Value written to `pwmN_enable` to take manual control
pub const PWM_ENABLE_MANUAL: &str = "1";

/// Full-scale native PWM value
pub const PWM_MAX: u8 = 255;

/// A discovered hwmon chip with its fan channels.
///
/// `enable_paths[i]` and `pwm_paths[i]` always refer to the same fan
/// (channel `i + 1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwmonDevice {
    base: PathBuf,
    enable_paths: Vec<PathBuf>,
    pwm_paths: Vec<PathBuf>,
}

impl HwmonDevice {
    /// Build the device for a known chip directory with channels `1..=channels`
    pub fn from_path(base: impl Into<PathBuf>, channels: usize) -> Self {
        let base = base.into();
        let enable_paths = (1..=channels)
            .map(|i| base.join(format!("pwm{}_enable", i)))
            .collect();
        let pwm_paths = (1..=channels)
            .map(|i| base.join(format!("pwm{}", i)))
            .collect();
        Self { base, enable_paths, pwm_paths }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn channels(&self) -> usize {
        self.pwm_paths.len()
    }

    pub fn enable_paths(&self) -> &[PathBuf] {
        &self.enable_paths
    }

    pub fn pwm_paths(&self) -> &[PathBuf] {
        &self.pwm_paths
    }

    /// Chip driver name as currently reported by the kernel
    pub fn name(&self) -> Option<String> {
        read_trimmed(&self.base.join("name")).ok()
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| FanError::FileRead { path: path.to_path_buf(), source })
}

/// Scan `root` for the first chip whose `name` contains one of `chip_names`.
///
/// Entries whose `name` cannot be read are skipped. Scan order is whatever the
/// directory listing yields.
pub fn discover(root: &Path, chip_names: &[String], channels: usize) -> Result<HwmonDevice> {
    let not_found = || FanError::NoSuitableHardware {
        root: root.to_path_buf(),
        wanted: chip_names.join(", "),
    };

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %root.display(), error = %e, "Cannot list hwmon root");
            return Err(not_found());
        }
    };

    for ent in entries.flatten() {
        let dir = ent.path();
        let name = match read_trimmed(&dir.join("name")) {
            Ok(n) => n,
            Err(e) => {
                trace!(dir = %dir.display(), error = %e, "Skipping hwmon entry without readable name");
                continue;
            }
        };
        if chip_names.iter().any(|target| name.contains(target.as_str())) {
            info!(chip = %name, path = %dir.display(), channels, "Found hwmon device");
            return Ok(HwmonDevice::from_path(dir, channels));
        }
        trace!(chip = %name, "hwmon chip not in allow-list");
    }

    Err(not_found())
}

/// [`discover`] using the root, allow-list and channel count from `cfg`
pub fn discover_with(cfg: &ControlConfig) -> Result<HwmonDevice> {
    discover(&cfg.hwmon_root, &cfg.chip_names, cfg.channels)
}

/// Result of writing one endpoint
#[derive(Debug)]
pub struct ChannelOutcome {
    /// 1-based channel number
    pub channel: usize,
    pub path: PathBuf,
    pub result: Result<()>,
}

/// Per-endpoint outcomes of one actuator operation, in channel order
#[derive(Debug, Default)]
pub struct WriteReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl WriteReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Channel numbers whose write failed
    pub fn failed_channels(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.channel)
            .collect()
    }
}

/// Write to an existing attribute. Never creates the file.
fn write_attr(path: &Path, value: &str) -> Result<()> {
    let to_err = |source| FanError::FileWrite { path: path.to_path_buf(), source };
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(to_err)?;
    file.write_all(value.as_bytes()).map_err(to_err)
}

fn write_each<'a, I>(targets: I, what: &str) -> WriteReport
where
    I: IntoIterator<Item = (usize, &'a Path, String)>,
{
    let mut report = WriteReport::default();
    for (channel, path, value) in targets {
        let result = write_attr(path, &value);
        if let Err(e) = &result {
            warn!(channel, path = %path.display(), value = %value, error = %e, "Could not write {}", what);
        }
        report.outcomes.push(ChannelOutcome { channel, path: path.to_path_buf(), result });
    }
    report
}

/// Switch every channel from firmware control to manual PWM control
pub fn set_manual_mode(device: &HwmonDevice) -> WriteReport {
    let report = write_each(
        device
            .enable_paths
            .iter()
            .enumerate()
            .map(|(i, p)| (i + 1, p.as_path(), PWM_ENABLE_MANUAL.to_string())),
        "manual mode",
    );
    info!(
        enabled = report.succeeded(),
        failed = report.failed_channels().len(),
        "Manual PWM mode requested"
    );
    report
}

/// Convert a duty percentage to the native 0-255 scale: `round(2.55 * percent)`
pub fn percent_to_pwm(percent: f64) -> u8 {
    if percent.is_nan() {
        return PWM_MAX;
    }
    (2.55 * percent).round().clamp(0.0, PWM_MAX as f64) as u8
}

/// Write the same duty cycle to every channel
pub fn set_fan_speed(device: &HwmonDevice, percent: f64) -> WriteReport {
    let value = percent_to_pwm(percent).to_string();
    write_each(
        device
            .pwm_paths
            .iter()
            .enumerate()
            .map(|(i, p)| (i + 1, p.as_path(), value.clone())),
        "PWM value",
    )
}

/// `pwmN_enable` values as found before manual control was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSnapshot {
    modes: Vec<Option<String>>,
}

impl ModeSnapshot {
    /// Mode of 1-based `channel`, if it could be read
    pub fn mode(&self, channel: usize) -> Option<&str> {
        self.modes.get(channel.checked_sub(1)?)?.as_deref()
    }

    pub fn captured(&self) -> usize {
        self.modes.iter().filter(|m| m.is_some()).count()
    }
}

pub fn snapshot_modes(device: &HwmonDevice) -> ModeSnapshot {
    let modes = device
        .enable_paths
        .iter()
        .map(|p| match read_trimmed(p) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(path = %p.display(), error = %e, "No enable mode to remember");
                None
            }
        })
        .collect();
    ModeSnapshot { modes }
}

/// Hand channels back to the modes captured by [`snapshot_modes`].
/// Channels with no captured mode are left untouched.
pub fn restore_modes(device: &HwmonDevice, snapshot: &ModeSnapshot) -> WriteReport {
    let report = write_each(
        device
            .enable_paths
            .iter()
            .zip(snapshot.modes.iter())
            .enumerate()
            .filter_map(|(i, (p, m))| m.as_ref().map(|m| (i + 1, p.as_path(), m.clone()))),
        "restored enable mode",
    );
    info!(restored = report.succeeded(), failed = report.failed_channels().len(), "PWM modes restored");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{create_mock_hwmon_dir, hwmon_root, read_attr};
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_device_paths_are_parallel() {
        let dev = HwmonDevice::from_path("/sys/class/hwmon/hwmon2", 8);
        assert_eq!(dev.channels(), 8);
        assert_eq!(dev.enable_paths().len(), dev.pwm_paths().len());
        assert_eq!(dev.enable_paths()[0], PathBuf::from("/sys/class/hwmon/hwmon2/pwm1_enable"));
        assert_eq!(dev.pwm_paths()[0], PathBuf::from("/sys/class/hwmon/hwmon2/pwm1"));
        assert_eq!(dev.enable_paths()[7], PathBuf::from("/sys/class/hwmon/hwmon2/pwm8_enable"));
        assert_eq!(dev.pwm_paths()[7], PathBuf::from("/sys/class/hwmon/hwmon2/pwm8"));
    }

    #[test]
    fn test_discover_matches_allow_listed_chip() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "k10temp"), ("hwmon1", "nct6687"), ("hwmon2", "amdgpu")], 8);
        let dev = discover(&hwmon_root(&tmp), &names(&["nct6687", "it87", "superio"]), 8).unwrap();
        assert_eq!(dev.base(), hwmon_root(&tmp).join("hwmon1"));
        assert_eq!(dev.name().as_deref(), Some("nct6687"));
    }

    #[test]
    fn test_discover_substring_match() {
        let tmp = create_mock_hwmon_dir(&[("hwmon4", "it8792e_superio")], 5);
        let dev = discover(&hwmon_root(&tmp), &names(&["it87"]), 8).unwrap();
        assert_eq!(dev.base(), hwmon_root(&tmp).join("hwmon4"));
        // channel count comes from the request, not from what the chip exposes
        assert_eq!(dev.channels(), 8);
    }

    #[test]
    fn test_discover_skips_entries_without_name() {
        let tmp = create_mock_hwmon_dir(&[("hwmon1", "it87")], 8);
        fs::create_dir_all(hwmon_root(&tmp).join("hwmon0")).unwrap();
        let dev = discover(&hwmon_root(&tmp), &names(&["it87"]), 8).unwrap();
        assert_eq!(dev.base(), hwmon_root(&tmp).join("hwmon1"));
    }

    #[test]
    fn test_discover_no_match_is_fatal() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "k10temp"), ("hwmon1", "nvme")], 8);
        let err = discover(&hwmon_root(&tmp), &names(&["nct6687", "it87", "superio"]), 8).unwrap_err();
        match err {
            FanError::NoSuitableHardware { wanted, .. } => assert_eq!(wanted, "nct6687, it87, superio"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_discover_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("nope"), &names(&["it87"]), 8).unwrap_err();
        assert!(matches!(err, FanError::NoSuitableHardware { .. }));
    }

    #[test]
    fn test_percent_to_pwm() {
        assert_eq!(percent_to_pwm(100.0), 255);
        assert_eq!(percent_to_pwm(35.0), 89);
        assert_eq!(percent_to_pwm(0.0), 0);
        assert_eq!(percent_to_pwm(67.5), 172);
        assert_eq!(percent_to_pwm(120.0), 255);
        assert_eq!(percent_to_pwm(-5.0), 0);
        assert_eq!(percent_to_pwm(f64::NAN), 255);
    }

    #[test]
    fn test_set_manual_mode_writes_all_channels() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "nct6687")], 8);
        let dev = HwmonDevice::from_path(hwmon_root(&tmp).join("hwmon0"), 8);
        let report = set_manual_mode(&dev);
        assert!(report.all_ok());
        assert_eq!(report.succeeded(), 8);
        for p in dev.enable_paths() {
            assert_eq!(read_attr(p), "1");
        }
    }

    #[test]
    fn test_set_manual_mode_is_best_effort() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "nct6687")], 8);
        let base = hwmon_root(&tmp).join("hwmon0");
        // an unwritable endpoint: a directory where the attribute should be
        fs::remove_file(base.join("pwm3_enable")).unwrap();
        fs::create_dir(base.join("pwm3_enable")).unwrap();

        let dev = HwmonDevice::from_path(&base, 8);
        let report = set_manual_mode(&dev);
        assert_eq!(report.failed_channels(), vec![3]);
        assert_eq!(report.succeeded(), 7);
        for (i, p) in dev.enable_paths().iter().enumerate() {
            if i != 2 {
                assert_eq!(read_attr(p), "1");
            }
        }
    }

    #[test]
    fn test_missing_channels_fail_without_creating_files() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "it87")], 5);
        let dev = HwmonDevice::from_path(hwmon_root(&tmp).join("hwmon0"), 8);
        let report = set_fan_speed(&dev, 100.0);
        assert_eq!(report.failed_channels(), vec![6, 7, 8]);
        assert!(report.outcomes[5].result.as_ref().unwrap_err().is_not_found());
        assert!(!dev.pwm_paths()[5].exists());
        assert_eq!(read_attr(&dev.pwm_paths()[0]), "255");
    }

    #[test]
    fn test_set_fan_speed_writes_native_value() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "nct6687")], 8);
        let dev = HwmonDevice::from_path(hwmon_root(&tmp).join("hwmon0"), 8);
        let report = set_fan_speed(&dev, 67.5);
        assert!(report.all_ok());
        for p in dev.pwm_paths() {
            assert_eq!(read_attr(p), "172");
        }
    }

    #[test]
    fn test_snapshot_and_restore_modes() {
        let tmp = create_mock_hwmon_dir(&[("hwmon0", "nct6687")], 3);
        let base = hwmon_root(&tmp).join("hwmon0");
        fs::write(base.join("pwm1_enable"), "2\n").unwrap();
        fs::write(base.join("pwm2_enable"), "5\n").unwrap();
        fs::write(base.join("pwm3_enable"), "99\n").unwrap();

        let dev = HwmonDevice::from_path(&base, 4);
        let snapshot = snapshot_modes(&dev);
        assert_eq!(snapshot.captured(), 3);
        assert_eq!(snapshot.mode(2), Some("5"));
        assert_eq!(snapshot.mode(4), None);
        assert_eq!(snapshot.mode(0), None);

        assert_eq!(set_manual_mode(&dev).failed_channels(), vec![4]);
        assert_eq!(read_attr(&dev.enable_paths()[2]), "1");

        let report = restore_modes(&dev, &snapshot);
        assert!(report.all_ok());
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(read_attr(&dev.enable_paths()[0]), "2");
        assert_eq!(read_attr(&dev.enable_paths()[1]), "5");
        assert_eq!(read_attr(&dev.enable_paths()[2]), "99");
    }
}
