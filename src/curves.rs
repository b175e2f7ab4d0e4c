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

use crate::config::{FanRange, TempBand};

/// Map a temperature onto the fan range through `band`.
///
/// Flat at `range.min_percent` up to `band.min_temp`, flat at
/// `range.max_percent` from `band.max_temp`, linear in between.
pub fn temp_to_fan(temp_c: f64, band: TempBand, range: FanRange) -> f64 {
    if temp_c <= band.min_temp {
        return range.min_percent;
    }
    if temp_c >= band.max_temp {
        return range.max_percent;
    }
    range.min_percent
        + (temp_c - band.min_temp) * (range.max_percent - range.min_percent)
            / (band.max_temp - band.min_temp)
}

/// The hottest source relative to its own band drives the fans
pub fn aggregate(cpu_pct: f64, gpu_pct: f64, sys_pct: f64) -> f64 {
    cpu_pct.max(gpu_pct).max(sys_pct)
}
