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

//! Temperature sources
//!
//! The controller only sees [`TemperatureSource`]. Implementations:
//! - [`SensorsLabel`]: one labelled line of lm-sensors output (`Tctl:`, `System:`)
//! - [`NvidiaSmi`]: hottest GPU core reported by `nvidia-smi`
//! - [`HwmonInput`]: an hwmon `tempN_input` file
//!
//! External commands run synchronously with no timeout.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, trace, warn};

use crate::config::{CommandSpec, ControlConfig};
use crate::error::{FanError, Result};

/// Anything that can report a temperature in °C
#[cfg_attr(test, mockall::automock)]
pub trait TemperatureSource {
    /// Short description for log lines
    fn describe(&self) -> String;

    /// Current temperature, or `None` when no value could be obtained
    fn read(&mut self) -> Option<f64>;
}

/// Run `cmd` and return its stdout. Non-zero exit is an error.
pub fn run_command(cmd: &CommandSpec) -> Result<String> {
    let output = Command::new(&cmd.program)
        .args(&cmd.args)
        .output()
        .map_err(|e| FanError::command(&cmd.program, e.to_string()))?;

    if !output.status.success() {
        return Err(FanError::command(
            &cmd.program,
            format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Find the first line starting with `label` and parse the `+NN.N°C` value
/// that directly follows it. Limits later on the line are never read.
pub fn parse_labelled_temp(output: &str, label: &str) -> Option<f64> {
    let line = output.lines().map(str::trim).find(|l| l.starts_with(label))?;
    let value = line[label.len()..].trim_start();
    if !value.starts_with(|c: char| c == '+' || c == '-') {
        return None;
    }
    let end = value.find("°C")?;
    value[..end].trim().trim_start_matches('+').parse::<f64>().ok()
}

/// Hottest of the one-integer-per-line GPU temperatures. Lines that are not
/// integers (`[N/A]`) are ignored.
pub fn parse_gpu_temps(output: &str) -> Option<f64> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| match l.parse::<i64>() {
            Ok(t) => Some(t),
            Err(e) => {
                trace!("Skipping malformed GPU temperature line '{}': {}", l, e);
                None
            }
        })
        .max()
        .map(|t| t as f64)
}

/// One labelled line of lm-sensors style output
#[derive(Debug, Clone)]
pub struct SensorsLabel {
    command: CommandSpec,
    label: String,
}

impl SensorsLabel {
    pub fn new(command: CommandSpec, label: impl Into<String>) -> Self {
        Self { command, label: label.into() }
    }

    /// CPU die temperature (`Tctl:` by default)
    pub fn cpu(cfg: &ControlConfig) -> Self {
        Self::new(cfg.sensors_command.clone(), cfg.cpu_label.clone())
    }

    /// Motherboard temperature (`System:` by default)
    pub fn system(cfg: &ControlConfig) -> Self {
        Self::new(cfg.sensors_command.clone(), cfg.system_label.clone())
    }
}

impl TemperatureSource for SensorsLabel {
    fn describe(&self) -> String {
        format!("{} {}", self.command.program, self.label.trim_end_matches(':'))
    }

    fn read(&mut self) -> Option<f64> {
        let output = match run_command(&self.command) {
            Ok(out) => out,
            Err(e) => {
                warn!(source = %self.describe(), error = %e, "Sensor command failed");
                return None;
            }
        };
        let temp = parse_labelled_temp(&output, &self.label);
        if temp.is_none() {
            debug!(source = %self.describe(), "No '{}' line in sensor output", self.label);
        }
        temp
    }
}

/// Hottest GPU as reported by `nvidia-smi`.
///
/// Never returns `None`: any failure yields `fallback` (the GPU band's lower
/// bound), i.e. the GPU is treated as idle.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    command: CommandSpec,
    fallback: f64,
}

impl NvidiaSmi {
    pub fn new(command: CommandSpec, fallback: f64) -> Self {
        Self { command, fallback }
    }

    pub fn from_config(cfg: &ControlConfig) -> Self {
        Self::new(cfg.gpu_command.clone(), cfg.gpu.min_temp)
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    /// Query without the fallback applied
    pub fn query(&self) -> Result<f64> {
        let output = run_command(&self.command)?;
        parse_gpu_temps(&output)
            .ok_or_else(|| FanError::parse("GPU temperature", "no usable lines in output"))
    }
}

impl TemperatureSource for NvidiaSmi {
    fn describe(&self) -> String {
        format!("{} gpu", self.command.program)
    }

    fn read(&mut self) -> Option<f64> {
        match self.query() {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %e, fallback = self.fallback, "Could not read GPU temp, assuming idle");
                Some(self.fallback)
            }
        }
    }
}

/// hwmon `tempN_input` attribute (millidegrees Celsius)
#[derive(Debug, Clone)]
pub struct HwmonInput {
    path: PathBuf,
}

impl HwmonInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_inner(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.path).map_err(|source| FanError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        let milli = raw
            .trim()
            .parse::<i64>()
            .map_err(|e| FanError::parse(self.path.display().to_string(), e.to_string()))?;
        Ok(milli as f64 / 1000.0)
    }
}

impl TemperatureSource for HwmonInput {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&mut self) -> Option<f64> {
        match self.read_inner() {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %e, "Could not read hwmon temperature");
                None
            }
        }
    }
}
