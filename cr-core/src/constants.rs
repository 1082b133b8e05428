//! Constants and configuration values for camrig
//!
//! Centralizes limits, paths, and defaults. Add new magic numbers here first.

/// System and user paths
pub mod paths {
    use std::path::PathBuf;

    /// Base path for V4L2 capture devices
    pub const VIDEO4LINUX_BASE: &str = "/sys/class/video4linux";

    /// Application directory name under the user config dir
    pub const APP_DIR: &str = "camrig";

    /// Default configuration file name
    pub const CONFIG_FILE: &str = "rig.json";

    /// Environment variable overriding the configuration path
    pub const CONFIG_ENV: &str = "CAMRIG_CONFIG";

    /// User configuration directory
    ///
    /// XDG_CONFIG_HOME, then HOME/.config, then the platform default.
    pub fn user_config_dir() -> Option<PathBuf> {
        let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            Some(PathBuf::from(xdg))
        } else if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".config"))
        } else {
            dirs::config_dir()
        };

        base.map(|p| p.join(APP_DIR))
    }

    /// Default location of the rig configuration file
    pub fn default_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        user_config_dir()
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
            .join(CONFIG_FILE)
    }
}

/// Role binding limits
pub mod binding {
    /// Maximum number of entries kept in a role's device history
    pub const MAX_HISTORY: usize = 5;

    /// Maximum length of a device identifier
    pub const MAX_DEVICE_ID_LEN: usize = 64;
}

/// Configuration file limits
pub mod limits {
    /// Maximum accepted configuration file size (1 MiB)
    pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

    /// Maximum accepted device-list file size (256 KiB)
    pub const MAX_DEVICE_LIST_SIZE: u64 = 256 * 1024;
}

/// Configuration format
pub mod config {
    /// Current configuration schema version
    pub const CURRENT_VERSION: &str = "1.0";

    /// Extension used for the temporary file during atomic writes
    pub const TEMP_SUFFIX: &str = "tmp";
}

/// Sub-configuration defaults
pub mod defaults {
    pub const WIDTH: u32 = 1280;
    pub const HEIGHT: u32 = 720;
    pub const FRAME_RATE: u32 = 30;
    pub const GAIN_DB: f32 = 0.0;

    pub const WINDOW_TITLE: &str = "camrig";
    pub const DISPLAY_SCALE: f32 = 1.0;

    pub const CAN_INTERFACE: &str = "can0";
    pub const CAN_BITRATE: u32 = 500_000;
    pub const CAN_NODE_ID: u8 = 1;

    pub const DETECTION_THRESHOLD: f32 = 0.5;
    pub const MAX_LATENCY_MS: u32 = 100;

    pub const LOG_LEVEL: &str = "info";
}
