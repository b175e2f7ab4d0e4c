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

//! Unified error handling for Superfan
//!
//! A single error type is used by discovery, the sensor sources, the actuator
//! and the configuration loader.

use std::io;
use std::path::PathBuf;

/// Result type alias using FanError
pub type Result<T> = std::result::Result<T, FanError>;

#[derive(thiserror::Error, Debug)]
pub enum FanError {
    // ============================================================================
    // Hardware Discovery
    // ============================================================================
    #[error("No suitable hwmon device under {root} (looked for: {wanted})")]
    NoSuitableHardware {
        root: PathBuf,
        wanted: String,
    },

    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // External Commands
    // ============================================================================
    #[error("Command `{program}` failed: {reason}")]
    Command {
        program: String,
        reason: String,
    },

    #[error("Failed to parse {what}: {reason}")]
    Parse {
        what: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl FanError {
    pub fn command(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised because a path does not exist (missing channel, vanished device)
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileRead { source, .. } | Self::FileWrite { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_suitable_hardware_message() {
        let err = FanError::NoSuitableHardware {
            root: PathBuf::from("/sys/class/hwmon"),
            wanted: "nct6687, it87".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/sys/class/hwmon"));
        assert!(msg.contains("nct6687, it87"));
    }

    #[test]
    fn test_is_not_found() {
        let err = FanError::FileWrite {
            path: PathBuf::from("/sys/class/hwmon/hwmon3/pwm8"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.is_not_found());

        let err = FanError::FileWrite {
            path: PathBuf::from("/sys/class/hwmon/hwmon3/pwm1"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        };
        assert!(!err.is_not_found());
        assert!(!FanError::invalid_config("channels", "x").is_not_found());
    }

    #[test]
    fn test_read_error_keeps_path() {
        let err = FanError::FileRead {
            path: PathBuf::from("/etc/superfan/config.json"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/etc/superfan/config.json"));
    }
}
