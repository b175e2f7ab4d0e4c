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

//! Superfan - fan control daemon for Linux using hwmon
//!
//! Reads CPU, GPU and board temperatures, maps each through its own band onto
//! a fan percentage, and drives every PWM channel of the Super I/O chip with
//! the highest of the three.

pub mod error;
pub mod config;
pub mod hwmon;
pub mod sensors;
pub mod curves;
pub mod service;
pub mod logger;

#[cfg(test)]
pub mod test_utils;

pub use config::{ControlConfig, FanRange, TempBand};
pub use error::{FanError, Result};
pub use hwmon::{HwmonDevice, WriteReport};
pub use service::{FanController, Sources, StopHandle};
pub use sensors::TemperatureSource;
