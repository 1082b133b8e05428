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

//! CLI settings: where the configuration lives and where devices come from

use std::path::{Path, PathBuf};

use anyhow::Context;
use cr_core::constants::paths;
use cr_core::{read_config, DeviceDiscovery, LoggingConfig, StaticDiscovery, SysfsDiscovery};

/// Configuration file path
///
/// `--config`, then `CAMRIG_CONFIG`, then the user config directory.
pub fn resolve_config_path(cli_override: Option<&Path>) -> PathBuf {
    match cli_override {
        Some(path) => path.to_path_buf(),
        None => paths::default_config_path(),
    }
}

/// Logging section of the configuration at `path`
///
/// Falls back to defaults when the file is missing or unreadable; loading
/// errors are reported later by the command itself.
pub fn logging_settings(path: &Path) -> LoggingConfig {
    read_config(path)
        .map(|config| config.logging)
        .unwrap_or_default()
}

/// Device source: a device list file if given, sysfs otherwise
pub fn discovery_for(devices: Option<&Path>) -> anyhow::Result<Box<dyn DeviceDiscovery>> {
    match devices {
        Some(path) => {
            let discovery = StaticDiscovery::from_file(path)
                .with_context(|| format!("failed to read device list {}", path.display()))?;
            Ok(Box::new(discovery))
        }
        None => Ok(Box::new(SysfsDiscovery::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_core::{ConfigLifecycle, DeviceDescriptor};
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_cli_override_wins() {
        std::env::set_var(paths::CONFIG_ENV, "/tmp/from-env.json");
        let path = resolve_config_path(Some(Path::new("/tmp/from-cli.json")));
        std::env::remove_var(paths::CONFIG_ENV);
        assert_eq!(path, PathBuf::from("/tmp/from-cli.json"));
    }

    #[test]
    #[serial]
    fn test_env_var_used_without_override() {
        std::env::set_var(paths::CONFIG_ENV, "/tmp/from-env.json");
        let path = resolve_config_path(None);
        std::env::remove_var(paths::CONFIG_ENV);
        assert_eq!(path, PathBuf::from("/tmp/from-env.json"));
    }

    #[test]
    #[serial]
    fn test_xdg_default_path() {
        std::env::remove_var(paths::CONFIG_ENV);
        let old = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg");

        let path = resolve_config_path(None);

        match old {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
        assert_eq!(path, PathBuf::from("/tmp/xdg/camrig/rig.json"));
    }

    #[test]
    fn test_logging_settings_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rig.json");

        let mut lc = ConfigLifecycle::default();
        lc.create_default(&[]).unwrap();
        lc.update_draft(|cfg| cfg.logging.level = "debug".into()).unwrap();
        lc.promote(false).unwrap();
        lc.save_as(&path).unwrap();

        assert_eq!(logging_settings(&path).level, "debug");
        assert_eq!(logging_settings(&tmp.path().join("missing.json")), LoggingConfig::default());
    }

    #[test]
    fn test_discovery_from_device_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("devices.json");
        fs::write(&path, r#"["SN1", "SN2"]"#).unwrap();

        let devices: Vec<DeviceDescriptor> =
            discovery_for(Some(&path)).unwrap().discover().unwrap();
        assert_eq!(devices.len(), 2);
        assert!(discovery_for(Some(&tmp.path().join("none.json"))).is_err());
    }
}
