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

//! superfand - fan control daemon
//!
//! Startup: parse args, init logging, load config, discover the hwmon chip,
//! take manual control, then run the control loop until SIGINT/SIGTERM.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info, warn};

use superfan::config::ControlConfig;
use superfan::hwmon::{self, HwmonDevice};
use superfan::logger;
use superfan::service::{FanController, Sources};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    config: Option<PathBuf>,
    hwmon: Option<PathBuf>,
    once: bool,
    print_config: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Run(Options),
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut opts = Options::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-v" | "--version" => return Ok(Invocation::Version),
            "--once" => opts.once = true,
            "--print-config" => opts.print_config = true,
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).ok_or("--config requires a path argument")?;
                opts.config = Some(PathBuf::from(path));
            }
            "--hwmon" => {
                i += 1;
                let path = args.get(i).ok_or("--hwmon requires a path argument")?;
                opts.hwmon = Some(PathBuf::from(path));
            }
            arg => return Err(format!("Unknown argument: {}", arg)),
        }
        i += 1;
    }
    Ok(Invocation::Run(opts))
}

fn print_help() {
    eprintln!("superfand {} - CPU/GPU/system temperature fan control", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    superfand [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Config file (default /etc/superfan/config.json if present)");
    eprintln!("        --hwmon PATH    Use this hwmon directory instead of discovery");
    eprintln!("        --once          Run a single control cycle and exit");
    eprintln!("        --print-config  Print the effective configuration as JSON and exit");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    {}        Log filter (trace, debug, info, warn, error)", logger::LOG_ENV);
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let opts = match parse_args(&args) {
        Ok(Invocation::Run(opts)) => opts,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("superfand {}", VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let sink = logger::init_logging();
    info!("STARTUP: superfand {} (logging to {:?})", VERSION, sink);

    let config = match ControlConfig::resolve(opts.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if opts.print_config {
        println!("{}", config.to_json_pretty().context("serialize config")?);
        return Ok(());
    }

    // SAFETY: geteuid has no preconditions and only returns the effective user ID.
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root - PWM writes will most likely be refused");
    }

    let device = match &opts.hwmon {
        Some(path) => HwmonDevice::from_path(path, config.channels),
        None => match hwmon::discover_with(&config) {
            Ok(dev) => dev,
            Err(e) => {
                error!("{}", e);
                eprintln!("superfand: {}", e);
                std::process::exit(1);
            }
        },
    };
    info!(
        "STARTUP: Using {} ({})",
        device.base().display(),
        device.name().unwrap_or_else(|| "unknown chip".to_string())
    );

    let sources = Sources::from_config(&config);
    let once = opts.once;
    let mut controller = FanController::new(config, device, sources);

    if once {
        controller.start();
        let report = controller.tick();
        info!(
            target_pct = report.target_pct,
            pwm = report.pwm,
            failed = ?report.writes.failed_channels(),
            "Single cycle applied"
        );
        return Ok(());
    }

    // Must be in place before manual mode is taken, or a signal in between
    // would skip the restore.
    let stop = controller.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - stopping control loop");
        stop.stop();
    }) {
        warn!("Failed to set signal handler: {}. Only SIGKILL will stop the daemon.", e);
    }

    controller.start();
    controller.run();
    info!("SHUTDOWN: superfand stopped");
    Ok(())
}
