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

//! Control configuration.
//!
//! Every threshold the controller uses lives in [`ControlConfig`]. The
//! defaults are the stock bands; `/etc/superfan/config.json` may override
//! any subset of fields.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FanError, Result};

/// Linear ramp region for one temperature source, in °C
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TempBand {
    pub min_temp: f64,
    pub max_temp: f64,
}

impl TempBand {
    pub const fn new(min_temp: f64, max_temp: f64) -> Self {
        Self { min_temp, max_temp }
    }

    fn validate(&self, field: &str) -> Result<()> {
        if !self.min_temp.is_finite() || !self.max_temp.is_finite() {
            return Err(FanError::invalid_config(field, "temperatures must be finite"));
        }
        if self.min_temp >= self.max_temp {
            return Err(FanError::invalid_config(
                field,
                format!("min_temp {} must be below max_temp {}", self.min_temp, self.max_temp),
            ));
        }
        Ok(())
    }
}

/// Fan duty range shared by all sources, in percent
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FanRange {
    pub min_percent: f64,
    pub max_percent: f64,
}

impl FanRange {
    pub const fn new(min_percent: f64, max_percent: f64) -> Self {
        Self { min_percent, max_percent }
    }

    fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.min_percent) || !in_range(self.max_percent) {
            return Err(FanError::invalid_config("fan", "percentages must be within 0-100"));
        }
        if self.min_percent > self.max_percent {
            return Err(FanError::invalid_config("fan", "min_percent > max_percent"));
        }
        Ok(())
    }
}

/// External program invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";
pub const DEFAULT_CHIP_NAMES: &[&str] = &["nct6687", "it87", "superio"];
pub const DEFAULT_CHANNELS: usize = 8;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

pub const SYSTEM_BAND: TempBand = TempBand::new(45.0, 60.0);
pub const CPU_BAND: TempBand = TempBand::new(60.0, 85.0);
pub const GPU_BAND: TempBand = TempBand::new(60.0, 85.0);
pub const FAN_RANGE: FanRange = FanRange::new(35.0, 100.0);

const MAX_CHANNELS: usize = 32;
const MIN_POLL_INTERVAL_MS: u64 = 10;
const MAX_POLL_INTERVAL_MS: u64 = 600_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Directory holding one subdirectory per hwmon chip
    pub hwmon_root: PathBuf,
    /// Driver identifiers matched as substrings of each chip's `name`
    pub chip_names: Vec<String>,
    /// Number of `pwmN`/`pwmN_enable` pairs driven, starting at 1
    pub channels: usize,
    pub system: TempBand,
    pub cpu: TempBand,
    pub gpu: TempBand,
    pub fan: FanRange,
    pub poll_interval_ms: u64,
    /// lm-sensors style command reporting CPU and board temperatures
    pub sensors_command: CommandSpec,
    pub cpu_label: String,
    pub system_label: String,
    /// Command printing one GPU core temperature per line
    pub gpu_command: CommandSpec,
    /// Put the firmware's `pwmN_enable` modes back when the loop is stopped
    pub restore_on_exit: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            hwmon_root: PathBuf::from(DEFAULT_HWMON_ROOT),
            chip_names: DEFAULT_CHIP_NAMES.iter().map(|s| s.to_string()).collect(),
            channels: DEFAULT_CHANNELS,
            system: SYSTEM_BAND,
            cpu: CPU_BAND,
            gpu: GPU_BAND,
            fan: FAN_RANGE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            sensors_command: CommandSpec::new("sensors", &[]),
            cpu_label: "Tctl:".to_string(),
            system_label: "System:".to_string(),
            gpu_command: CommandSpec::new(
                "nvidia-smi",
                &["--query-gpu=temperature.gpu", "--format=csv,noheader,nounits"],
            ),
            restore_on_exit: true,
        }
    }
}

pub fn config_system_path() -> PathBuf { PathBuf::from("/etc/superfan/config.json") }

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Parse and validate a JSON config file. Fields left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| FanError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_json(&data)?;
        Ok(cfg)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let cfg: ControlConfig = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Explicit path wins and must load; otherwise the system file is used
    /// when present, else the built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load(p);
        }
        let system = config_system_path();
        if system.exists() {
            return Self::load(&system);
        }
        Ok(Self::default())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chip_names.is_empty() {
            return Err(FanError::invalid_config("chip_names", "at least one driver name required"));
        }
        if self.chip_names.iter().any(|n| n.trim().is_empty()) {
            return Err(FanError::invalid_config("chip_names", "driver names cannot be blank"));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(FanError::invalid_config(
                "channels",
                format!("must be within 1-{}", MAX_CHANNELS),
            ));
        }
        self.system.validate("system")?;
        self.cpu.validate("cpu")?;
        self.gpu.validate("gpu")?;
        self.fan.validate()?;
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(FanError::invalid_config(
                "poll_interval_ms",
                format!("must be within {}-{}", MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
            ));
        }
        if self.sensors_command.program.trim().is_empty() {
            return Err(FanError::invalid_config("sensors_command", "program cannot be empty"));
        }
        if self.gpu_command.program.trim().is_empty() {
            return Err(FanError::invalid_config("gpu_command", "program cannot be empty"));
        }
        if self.cpu_label.trim().is_empty() || self.system_label.trim().is_empty() {
            return Err(FanError::invalid_config("labels", "sensor labels cannot be empty"));
        }
        Ok(())
    }
}
