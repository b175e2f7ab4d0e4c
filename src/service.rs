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

//! Fan control loop
//!
//! Each cycle reads the CPU, GPU and system sources, maps each through its
//! band, takes the maximum and writes it to every PWM channel. The loop runs
//! until its [`StopHandle`] is triggered.
//!
//! # Missing readings
//! A source that returns nothing reuses its last good reading. Before any
//! good reading exists it contributes the top of the fan range.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{ControlConfig, FanRange, TempBand};
use crate::curves::{aggregate, temp_to_fan};
use crate::hwmon::{self, HwmonDevice, ModeSnapshot, WriteReport};
use crate::sensors::{NvidiaSmi, SensorsLabel, TemperatureSource};

/// Longest uninterrupted sleep between stop-flag checks
const STOP_POLL_SLICE: Duration = Duration::from_millis(50);

/// Cooperative stop signal shared with signal handlers
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The three temperature inputs
pub struct Sources {
    pub cpu: Box<dyn TemperatureSource>,
    pub gpu: Box<dyn TemperatureSource>,
    pub system: Box<dyn TemperatureSource>,
}

impl Sources {
    /// `sensors` for CPU and board, `nvidia-smi` for the GPU
    pub fn from_config(cfg: &ControlConfig) -> Self {
        Self {
            cpu: Box::new(SensorsLabel::cpu(cfg)),
            gpu: Box::new(NvidiaSmi::from_config(cfg)),
            system: Box::new(SensorsLabel::system(cfg)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Initializing,
    Running,
    Stopped,
}

/// What one cycle read, decided and wrote
#[derive(Debug)]
pub struct CycleReport {
    /// Temperatures actually used; `None` when the source had no value yet
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub system_temp: Option<f64>,
    pub cpu_pct: f64,
    pub gpu_pct: f64,
    pub system_pct: f64,
    pub target_pct: f64,
    pub pwm: u8,
    pub writes: WriteReport,
}

/// Last good reading of one source
#[derive(Debug, Default, Clone, Copy)]
struct Held(Option<f64>);

impl Held {
    /// Returns the temperature to use and its fan percentage
    fn resolve(&mut self, fresh: Option<f64>, band: TempBand, range: FanRange) -> (Option<f64>, f64) {
        if let Some(t) = fresh.filter(|t| t.is_finite()) {
            self.0 = Some(t);
        }
        match self.0 {
            Some(t) => (Some(t), temp_to_fan(t, band, range)),
            None => (None, range.max_percent),
        }
    }
}

pub struct FanController {
    config: ControlConfig,
    device: HwmonDevice,
    sources: Sources,
    cpu: Held,
    gpu: Held,
    system: Held,
    snapshot: Option<ModeSnapshot>,
    state: ControllerState,
    stop: StopHandle,
}

impl FanController {
    pub fn new(config: ControlConfig, device: HwmonDevice, sources: Sources) -> Self {
        Self {
            config,
            device,
            sources,
            cpu: Held::default(),
            gpu: Held::default(),
            system: Held::default(),
            snapshot: None,
            state: ControllerState::Initializing,
            stop: StopHandle::new(),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn device(&self) -> &HwmonDevice {
        &self.device
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Take manual control of every channel. Remembers the previous modes
    /// first when they are to be restored on exit.
    pub fn start(&mut self) -> WriteReport {
        if self.config.restore_on_exit {
            let snapshot = hwmon::snapshot_modes(&self.device);
            debug!(captured = snapshot.captured(), "Captured PWM enable modes");
            self.snapshot = Some(snapshot);
        }
        let report = hwmon::set_manual_mode(&self.device);
        if report.succeeded() == 0 {
            warn!(device = %self.device.base().display(), "No channel accepted manual mode");
        }
        self.state = ControllerState::Running;
        report
    }

    /// One read → map → aggregate → write cycle
    pub fn tick(&mut self) -> CycleReport {
        let range = self.config.fan;

        let (cpu_temp, cpu_pct) = self.cpu.resolve(self.sources.cpu.read(), self.config.cpu, range);
        let (gpu_temp, gpu_pct) = self.gpu.resolve(self.sources.gpu.read(), self.config.gpu, range);
        let (system_temp, system_pct) =
            self.system.resolve(self.sources.system.read(), self.config.system, range);

        let target_pct = aggregate(cpu_pct, gpu_pct, system_pct);
        let pwm = hwmon::percent_to_pwm(target_pct);
        let writes = hwmon::set_fan_speed(&self.device, target_pct);

        debug!(
            cpu = ?cpu_temp,
            gpu = ?gpu_temp,
            system = ?system_temp,
            cpu_pct,
            gpu_pct,
            system_pct,
            target_pct,
            pwm,
            failed = writes.failed_channels().len(),
            "Control cycle"
        );

        CycleReport {
            cpu_temp,
            gpu_temp,
            system_temp,
            cpu_pct,
            gpu_pct,
            system_pct,
            target_pct,
            pwm,
            writes,
        }
    }

    /// Run until the stop handle fires, then apply the exit policy
    pub fn run(&mut self) {
        if self.state == ControllerState::Initializing {
            self.start();
        }
        info!(
            interval_ms = self.config.poll_interval_ms,
            channels = self.device.channels(),
            "Fan control loop running"
        );

        let interval = self.config.poll_interval();
        let mut cycles: u64 = 0;
        while !self.stop.is_stopped() {
            self.tick();
            cycles += 1;
            self.sleep_until(Instant::now() + interval);
        }

        info!(cycles, "Fan control loop stopping");
        self.shutdown();
    }

    fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.stop.is_stopped() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(STOP_POLL_SLICE));
        }
    }

    /// Hand channels back to their original modes if configured to.
    /// Returns `None` when outputs are left at their last duty cycle.
    pub fn shutdown(&mut self) -> Option<WriteReport> {
        self.state = ControllerState::Stopped;
        match self.snapshot.take() {
            Some(snapshot) => Some(hwmon::restore_modes(&self.device, &snapshot)),
            None => {
                info!("Leaving PWM outputs at their last commanded duty cycle");
                None
            }
        }
    }
}
