//! Rig configuration
//!
//! The aggregate of all role bindings, the device metadata table, and the
//! module sub-configurations consumed downstream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::{config::CURRENT_VERSION, defaults};
use crate::data::types::{ConnectionState, DeviceDescriptor, Role, RoleBinding};

// ============================================================================
// Sub-configurations
// ============================================================================

/// Capture trigger source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    #[default]
    FreeRun,
    Hardware,
    Software,
}

/// Camera hardware parameters shared by all roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Exposure time in microseconds, `None` for auto exposure
    #[serde(default)]
    pub exposure_us: Option<u32>,
    #[serde(default = "default_gain_db")]
    pub gain_db: f32,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            width: defaults::WIDTH,
            height: defaults::HEIGHT,
            frame_rate: defaults::FRAME_RATE,
            exposure_us: None,
            gain_db: defaults::GAIN_DB,
            trigger_mode: TriggerMode::default(),
        }
    }
}

/// Preview window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default = "default_display_scale")]
    pub scale: f32,
    #[serde(default)]
    pub show_overlay: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_title: defaults::WINDOW_TITLE.to_string(),
            scale: defaults::DISPLAY_SCALE,
            show_overlay: false,
        }
    }
}

/// CAN bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_can_interface")]
    pub interface: String,
    #[serde(default = "default_can_bitrate")]
    pub bitrate: u32,
    #[serde(default = "default_can_node_id")]
    pub node_id: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            interface: defaults::CAN_INTERFACE.to_string(),
            bitrate: defaults::CAN_BITRATE,
            node_id: defaults::CAN_NODE_ID,
        }
    }
}

/// Camera pose relative to the rig origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Metres
    #[serde(default)]
    pub translation: [f64; 3],
    /// Roll, pitch, yaw in radians
    #[serde(default)]
    pub rotation_rpy: [f64; 3],
}

/// Vision processing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Per-role camera transforms, keyed by role name
    #[serde(default)]
    pub transforms: BTreeMap<String, Transform>,
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f32,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            transforms: BTreeMap::new(),
            detection_threshold: defaults::DETECTION_THRESHOLD,
            max_latency_ms: defaults::MAX_LATENCY_MS,
        }
    }
}

/// Logging settings, applied once by the process entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Append log lines to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    defaults::WIDTH
}

fn default_height() -> u32 {
    defaults::HEIGHT
}

fn default_frame_rate() -> u32 {
    defaults::FRAME_RATE
}

fn default_gain_db() -> f32 {
    defaults::GAIN_DB
}

fn default_window_title() -> String {
    defaults::WINDOW_TITLE.to_string()
}

fn default_display_scale() -> f32 {
    defaults::DISPLAY_SCALE
}

fn default_can_interface() -> String {
    defaults::CAN_INTERFACE.to_string()
}

fn default_can_bitrate() -> u32 {
    defaults::CAN_BITRATE
}

fn default_can_node_id() -> u8 {
    defaults::CAN_NODE_ID
}

fn default_detection_threshold() -> f32 {
    defaults::DETECTION_THRESHOLD
}

fn default_max_latency_ms() -> u32 {
    defaults::MAX_LATENCY_MS
}

fn default_log_level() -> String {
    defaults::LOG_LEVEL.to_string()
}

// ============================================================================
// Configuration
// ============================================================================

/// Complete rig configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub version: String,
    /// One binding per role, in binding order
    pub bindings: Vec<RoleBinding>,
    /// Device metadata, keyed by device id
    pub devices: BTreeMap<String, DeviceDescriptor>,
    pub hardware: HardwareConfig,
    pub display: DisplayConfig,
    pub transport: TransportConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl Configuration {
    /// A fresh configuration with every role unbound
    ///
    /// Discovered devices seed the metadata table; each role gets an identity
    /// transform.
    pub fn default_for(roles: &[Role], devices: &[DeviceDescriptor]) -> Self {
        let processing = ProcessingConfig {
            transforms: roles
                .iter()
                .map(|role| (role.as_str().to_string(), Transform::default()))
                .collect(),
            ..ProcessingConfig::default()
        };

        Self {
            version: CURRENT_VERSION.to_string(),
            bindings: roles.iter().copied().map(RoleBinding::new).collect(),
            devices: devices
                .iter()
                .map(|dev| (dev.id.clone(), dev.clone()))
                .collect(),
            hardware: HardwareConfig::default(),
            display: DisplayConfig::default(),
            transport: TransportConfig::default(),
            processing,
            logging: LoggingConfig::default(),
        }
    }

    pub fn binding(&self, role: Role) -> Option<&RoleBinding> {
        self.bindings.iter().find(|b| b.role == role)
    }

    /// Roles in binding order
    pub fn roles(&self) -> Vec<Role> {
        self.bindings.iter().map(|b| b.role).collect()
    }

    /// Copy with new bindings, everything else unchanged
    pub fn with_bindings(&self, bindings: Vec<RoleBinding>) -> Self {
        Self {
            bindings,
            ..self.clone()
        }
    }

    /// Copy with every session assignment cleared, as written to disk
    pub fn without_active_ids(&self) -> Self {
        let mut persisted = self.clone();
        persisted.clear_active_ids();
        persisted
    }

    pub fn clear_active_ids(&mut self) {
        for binding in &mut self.bindings {
            binding.deactivate();
        }
    }

    /// Device table refreshed from an online list
    ///
    /// Online devices are inserted or updated (keeping the original
    /// `first_seen`); known devices that are not online become `unknown`.
    pub fn refreshed_devices(
        &self,
        online: &[DeviceDescriptor],
    ) -> BTreeMap<String, DeviceDescriptor> {
        let mut devices = self.devices.clone();

        for known in devices.values_mut() {
            if !online.iter().any(|dev| dev.id == known.id) {
                known.state = ConnectionState::Unknown;
            }
        }

        for dev in online {
            let mut entry = dev.clone();
            entry.state = ConnectionState::Connected;
            if let Some(known) = devices.get(&dev.id) {
                if known.first_seen != 0
                    && (entry.first_seen == 0 || known.first_seen < entry.first_seen)
                {
                    entry.first_seen = known.first_seen;
                }
                if entry.product_name.is_none() {
                    entry.product_name = known.product_name.clone();
                }
                if entry.notes.is_empty() {
                    entry.notes = known.notes.clone();
                }
            }
            devices.insert(dev.id.clone(), entry);
        }

        devices
    }
}
