/*
 * This file is part of camrig.
 *
 * Copyright (C) 2025 camrig contributors
 *
 * camrig is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * camrig is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with camrig. If not, see <https://www.gnu.org/licenses/>.
 */

//! Process-wide logging setup
//!
//! Installs the `tracing` subscriber once, from the entry point. Library code
//! only emits events.

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use cr_core::constants::defaults;
use cr_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, overrides everything
pub const LOG_ENV: &str = "CAMRIG_LOG";

/// Pick the filter directive
///
/// `CAMRIG_LOG` wins, then the `-v` count, then the configured level.
pub fn filter_directive(config: &LoggingConfig, verbosity: u8, env: Option<&str>) -> String {
    if let Some(directive) = env.map(str::trim).filter(|d| !d.is_empty()) {
        return directive.to_string();
    }
    match verbosity {
        0 if config.level.trim().is_empty() => defaults::LOG_LEVEL.to_string(),
        0 => config.level.trim().to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber
///
/// Logs go to stderr, or are appended without colour to `config.file`.
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, verbosity: u8) -> anyhow::Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(config, verbosity, env.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            file: None,
        }
    }

    #[test]
    fn test_env_overrides_everything() {
        assert_eq!(filter_directive(&config("warn"), 2, Some("cr_core=trace")), "cr_core=trace");
    }

    #[test]
    fn test_verbosity_overrides_config() {
        assert_eq!(filter_directive(&config("warn"), 0, None), "warn");
        assert_eq!(filter_directive(&config("warn"), 1, None), "debug");
        assert_eq!(filter_directive(&config("warn"), 3, None), "trace");
    }

    #[test]
    fn test_blank_values_fall_back() {
        assert_eq!(filter_directive(&config(" "), 0, Some("")), "info");
    }
}
